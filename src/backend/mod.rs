//! Search service collaborator.
//!
//! # Overview
//!
//! [`SearchBackend`] is the seam between the session controller and the
//! remote search engine.  `submit` returns immediately with an
//! [`InFlightSearch`] handle; everything the engine has to say afterwards
//! (partial transcripts, the response, an error, an abort confirmation)
//! arrives through the [`EventSink`] handed in with the request.
//!
//! [`HttpBackend`] is the production implementation.  [`ScriptedBackend`]
//! (available under `#[cfg(test)]`) records submissions and lets tests play
//! the engine's side of the conversation.

pub mod http;
#[cfg(test)]
pub mod scripted;

pub use http::HttpBackend;
#[cfg(test)]
pub use scripted::{ScriptedBackend, Submission};

use std::fmt;

use serde_json::Value;
use thiserror::Error;

use crate::audio::AudioSource;
use crate::context::RequestContext;
use crate::session::render::describe_error;
use crate::session::{EventSink, SearchMode, SessionInput};

// ---------------------------------------------------------------------------
// SearchQuery
// ---------------------------------------------------------------------------

/// What the user is searching with: typed text or an audio stream.
pub enum SearchQuery {
    Text(String),
    Voice(Box<dyn AudioSource>),
}

impl SearchQuery {
    pub fn text(query: impl Into<String>) -> Self {
        Self::Text(query.into())
    }

    pub fn voice(source: impl AudioSource + 'static) -> Self {
        Self::Voice(Box::new(source))
    }

    pub fn mode(&self) -> SearchMode {
        match self {
            Self::Text(_) => SearchMode::Text,
            Self::Voice(_) => SearchMode::Voice,
        }
    }

    /// The record of this query kept on the session.
    pub fn input(&self) -> SessionInput {
        match self {
            Self::Text(text) => SessionInput::Text(text.clone()),
            Self::Voice(source) => SessionInput::Audio {
                description: source.describe(),
            },
        }
    }
}

impl fmt::Debug for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Voice(source) => f.debug_tuple("Voice").field(&source.describe()).finish(),
        }
    }
}

// ---------------------------------------------------------------------------
// SearchResponse
// ---------------------------------------------------------------------------

/// Service-level outcome carried inside a delivered response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    Ok,
    Error,
}

/// A response delivered by the search service.
///
/// `body` is kept verbatim; it is only parsed for display.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResponse {
    pub status: ResponseStatus,
    pub error_message: Option<String>,
    pub body: String,
}

impl SearchResponse {
    /// A response with status OK.
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Ok,
            error_message: None,
            body: body.into(),
        }
    }

    /// Classify a raw response body.
    ///
    /// Only a JSON object whose `Status` field is a string other than `"OK"`
    /// counts as a service error; anything else, including malformed JSON,
    /// is an OK response whose body is judged at display time.
    pub fn from_body(body: String) -> Self {
        let parsed: Option<Value> = serde_json::from_str(&body).ok();
        let status = parsed
            .as_ref()
            .and_then(|v| v.get("Status"))
            .and_then(Value::as_str);

        match status {
            Some(status) if status != "OK" => {
                let error_message = parsed
                    .as_ref()
                    .and_then(|v| v.get("ErrorMessage"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .or_else(|| Some(format!("status {status}")));
                Self {
                    status: ResponseStatus::Error,
                    error_message,
                    body,
                }
            }
            _ => Self::ok(body),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ResponseStatus::Ok
    }
}

// ---------------------------------------------------------------------------
// SearchError
// ---------------------------------------------------------------------------

/// Failures reported by the search collaborator.  All of them end the
/// session; none is retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SearchError {
    /// Connection, TLS, timeout or body-read failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The service answered with a non-success HTTP status.
    #[error("service returned HTTP {status}: {message}")]
    Service { status: u16, message: String },

    /// The audio input could not be read or encoded.
    #[error("audio input error: {0}")]
    Audio(String),

    /// The request could not be submitted at all.
    #[error("cannot submit search: {0}")]
    Submit(String),
}

impl From<reqwest::Error> for SearchError {
    fn from(e: reqwest::Error) -> Self {
        SearchError::Transport(describe_error(&e))
    }
}

// ---------------------------------------------------------------------------
// SearchBackend / InFlightSearch
// ---------------------------------------------------------------------------

/// Handle to a submitted search.
pub trait InFlightSearch: Send {
    /// Ask the backend to cancel.  The backend confirms through
    /// [`EventSink::aborted`] unless the search already finished.
    fn abort(&self);

    /// Voice only: stop consuming audio and send what was captured.
    fn stop_recording(&self) {}
}

/// The remote search engine.
///
/// Implementations must be `Send + Sync` so they can be held behind an
/// `Arc<dyn SearchBackend>`.  `submit` must not block.
pub trait SearchBackend: Send + Sync {
    /// Start a search.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Submit`] when the request cannot even be
    /// started (e.g. missing credentials); later failures go to `sink`.
    fn submit(
        &self,
        query: SearchQuery,
        context: RequestContext,
        sink: EventSink,
    ) -> Result<Box<dyn InFlightSearch>, SearchError>;
}

// Compile-time assertion: Box<dyn SearchBackend> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn SearchBackend>, _: Box<dyn InFlightSearch>) {}
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::BufferedSource;

    #[test]
    fn status_ok_body_is_ok() {
        let resp = SearchResponse::from_body(r#"{"Status":"OK","NumToReturn":1}"#.into());
        assert!(resp.is_ok());
        assert!(resp.error_message.is_none());
    }

    #[test]
    fn status_error_body_carries_message() {
        let resp = SearchResponse::from_body(
            r#"{"Status":"Error","ErrorMessage":"Invalid client id"}"#.into(),
        );
        assert_eq!(resp.status, ResponseStatus::Error);
        assert_eq!(resp.error_message.as_deref(), Some("Invalid client id"));
    }

    #[test]
    fn status_error_without_message_gets_placeholder() {
        let resp = SearchResponse::from_body(r#"{"Status":"Error"}"#.into());
        assert_eq!(resp.error_message.as_deref(), Some("status Error"));
    }

    #[test]
    fn malformed_body_is_still_ok() {
        let resp = SearchResponse::from_body("<html>gateway</html>".into());
        assert!(resp.is_ok());
        assert_eq!(resp.body, "<html>gateway</html>");
    }

    #[test]
    fn query_mode_and_input() {
        let text = SearchQuery::text("What is the weather");
        assert_eq!(text.mode(), SearchMode::Text);
        assert_eq!(text.input(), SessionInput::Text("What is the weather".into()));

        let voice = SearchQuery::voice(BufferedSource::new("clip.wav", vec![0.0; 10]));
        assert_eq!(voice.mode(), SearchMode::Voice);
        assert_eq!(
            voice.input(),
            SessionInput::Audio {
                description: "clip.wav".into()
            }
        );
        assert!(format!("{voice:?}").contains("clip.wav"));
    }

    #[test]
    fn search_error_display() {
        let e = SearchError::Service {
            status: 401,
            message: "unauthorised".into(),
        };
        assert_eq!(e.to_string(), "service returned HTTP 401: unauthorised");
    }
}
