//! Display formatting for search results and errors.

use std::error::Error as StdError;

use serde_json::Value;
use thiserror::Error;

use super::state::SearchMode;

/// Why a response body could not be shown as structured content.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("response is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("response is JSON but not an object")]
    NotAnObject,
}

/// Pretty-print a JSON object with two-space indentation.
///
/// Bodies that are not a JSON object are rejected.
pub fn pretty_json(body: &str) -> Result<String, RenderError> {
    let value: Value = serde_json::from_str(body)?;
    if !value.is_object() {
        return Err(RenderError::NotAnObject);
    }
    Ok(serde_json::to_string_pretty(&value)?)
}

/// The content-pane text for a delivered response body.
///
/// May be slow for large bodies; the controller calls it off its own task.
pub fn render_body(mode: SearchMode, body: &str) -> String {
    match pretty_json(body) {
        Ok(pretty) => pretty,
        Err(e) => {
            log::warn!("cannot display response as JSON: {e}");
            mode.malformed_content(body)
        }
    }
}

/// An error message followed by every `source()` in its chain.
pub fn describe_error(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str("\ncaused by: ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("outer failure")]
    struct Outer(#[source] Inner);

    #[derive(Debug, Error)]
    #[error("inner failure")]
    struct Inner;

    #[test]
    fn pretty_json_indents_objects() {
        let pretty = pretty_json(r#"{"Status":"OK","AllResults":[]}"#).expect("valid");
        assert_eq!(pretty, "{\n  \"AllResults\": [],\n  \"Status\": \"OK\"\n}");
    }

    #[test]
    fn pretty_json_rejects_arrays() {
        assert!(matches!(pretty_json("[1, 2]"), Err(RenderError::NotAnObject)));
    }

    #[test]
    fn pretty_json_rejects_garbage() {
        assert!(matches!(
            pretty_json("{not json"),
            Err(RenderError::InvalidJson(_))
        ));
    }

    #[test]
    fn render_body_uses_mode_specific_fallback() {
        assert_eq!(
            render_body(SearchMode::Text, "oops"),
            "Bad JSON\n\noops"
        );
        assert_eq!(
            render_body(SearchMode::Voice, "oops"),
            "Failed to parse content:\noops"
        );
    }

    #[test]
    fn describe_error_walks_source_chain() {
        let text = describe_error(&Outer(Inner));
        assert_eq!(text, "outer failure\ncaused by: inner failure");
    }
}
