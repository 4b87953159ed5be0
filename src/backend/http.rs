//! `reqwest` adapter for the remote search service.
//!
//! * Text: `GET {base_url}/v1/text?query=…`
//! * Voice: the audio source is drained into a 16 kHz mono WAV and sent as
//!   `POST {base_url}/v1/audio`.  Recording ends when the source ends, on
//!   `stop_recording`, or after `max_recording_secs` of audio.
//!
//! Both carry the request context as the `Hound-Request-Info` JSON header and
//! the client id as `Hound-Client-Id`.  Request signing belongs to the
//! service SDK and is not done here.
//!
//! The whole recording is uploaded in one request, so this backend never
//! reports [`SearchEvent::Progress`](crate::session::SearchEvent::Progress).
//! Partial transcripts need a streaming collaborator behind
//! [`SearchBackend`]; the controller already displays them.
//!
//! Each search runs on its own tokio task.  Aborting cancels the task and
//! confirms through the sink.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::audio::{encode_voice_wav, AudioSource, VOICE_SAMPLE_RATE};
use crate::config::BackendConfig;
use crate::context::RequestContext;
use crate::session::EventSink;

use super::{InFlightSearch, SearchBackend, SearchError, SearchQuery, SearchResponse};

const REQUEST_INFO_HEADER: &str = "Hound-Request-Info";
const CLIENT_ID_HEADER: &str = "Hound-Client-Id";

/// Production search backend.
pub struct HttpBackend {
    client: reqwest::Client,
    config: BackendConfig,
}

impl HttpBackend {
    /// Build a backend from application config.
    ///
    /// The HTTP client is pre-configured with the per-request timeout from
    /// `config.timeout_secs`; a default client is used if the builder fails.
    pub fn from_config(config: &BackendConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.config.base_url.trim_end_matches('/'))
    }

    fn max_recording_samples(&self) -> usize {
        VOICE_SAMPLE_RATE as usize * self.config.max_recording_secs as usize
    }
}

impl SearchBackend for HttpBackend {
    fn submit(
        &self,
        query: SearchQuery,
        context: RequestContext,
        sink: EventSink,
    ) -> Result<Box<dyn InFlightSearch>, SearchError> {
        if self.config.client_id.trim().is_empty() {
            return Err(SearchError::Submit("client id is not configured".into()));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SearchError::Submit(format!("no async runtime: {e}")))?;

        let request_info = context.to_request_info().to_string();
        if self.config.debug {
            log::debug!("{REQUEST_INFO_HEADER}: {request_info}");
        }

        let request = |builder: reqwest::RequestBuilder| {
            builder
                .header(REQUEST_INFO_HEADER, request_info.clone())
                .header(CLIENT_ID_HEADER, self.config.client_id.clone())
        };

        let stop = Arc::new(Notify::new());
        let task = match query {
            SearchQuery::Text(text) => {
                let builder = request(self.client.get(self.endpoint("v1/text")))
                    .query(&[("query", text)]);
                runtime.spawn(deliver(sink.clone(), send(builder)))
            }
            SearchQuery::Voice(source) => {
                let builder = request(self.client.post(self.endpoint("v1/audio")))
                    .header(reqwest::header::CONTENT_TYPE, "audio/wav");
                let stop = Arc::clone(&stop);
                let events = sink.clone();
                let max_samples = self.max_recording_samples();
                runtime.spawn(deliver(sink.clone(), async move {
                    let samples = record(source, &stop, max_samples).await;
                    events.recording_stopped();
                    upload(builder, samples).await
                }))
            }
        };

        Ok(Box::new(HttpSearch { task, stop, sink }))
    }
}

// ---------------------------------------------------------------------------
// Request plumbing
// ---------------------------------------------------------------------------

/// Run `work` and report its outcome as the session's terminal event.
async fn deliver(
    sink: EventSink,
    work: impl std::future::Future<Output = Result<SearchResponse, SearchError>>,
) {
    match work.await {
        Ok(response) => sink.success(response),
        Err(error) => sink.failure(error),
    }
}

async fn send(builder: reqwest::RequestBuilder) -> Result<SearchResponse, SearchError> {
    let response = builder.send().await?;
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(SearchError::Service {
            status: status.as_u16(),
            message: body,
        });
    }
    Ok(SearchResponse::from_body(body))
}

/// Drain `source` until it ends, `stop` is notified, or `max_samples` have
/// been collected.
async fn record(mut source: Box<dyn AudioSource>, stop: &Notify, max_samples: usize) -> Vec<f32> {
    let mut samples = Vec::new();
    while samples.len() < max_samples {
        tokio::select! {
            chunk = source.next_chunk() => match chunk {
                Some(chunk) => {
                    let room = max_samples - samples.len();
                    samples.extend_from_slice(&chunk[..chunk.len().min(room)]);
                }
                None => break,
            },
            _ = stop.notified() => break,
        }
    }
    if samples.len() >= max_samples {
        log::warn!(
            "recording limit of {:.0} s reached, stopping",
            max_samples as f32 / VOICE_SAMPLE_RATE as f32
        );
    }
    log::debug!(
        "recorded {:.2} s from {}",
        samples.len() as f32 / VOICE_SAMPLE_RATE as f32,
        source.describe()
    );
    samples
}

async fn upload(
    builder: reqwest::RequestBuilder,
    samples: Vec<f32>,
) -> Result<SearchResponse, SearchError> {
    if samples.is_empty() {
        return Err(SearchError::Audio("no audio was captured".into()));
    }
    let wav = encode_voice_wav(&samples).map_err(|e| SearchError::Audio(e.to_string()))?;
    send(builder.body(wav)).await
}

// ---------------------------------------------------------------------------
// HttpSearch
// ---------------------------------------------------------------------------

struct HttpSearch {
    task: JoinHandle<()>,
    stop: Arc<Notify>,
    sink: EventSink,
}

impl InFlightSearch for HttpSearch {
    fn abort(&self) {
        if self.task.is_finished() {
            return;
        }
        self.task.abort();
        self.sink.aborted();
    }

    fn stop_recording(&self) {
        self.stop.notify_one();
    }
}
