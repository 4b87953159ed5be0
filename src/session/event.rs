//! Collaborator events and the sink that carries them to the controller.
//!
//! Every listener callback of the search engine collapses into one
//! [`SearchEvent`] variant.  Events travel over a single unbounded channel
//! into the controller's inbox, stamped with the [`RequestId`] of the session
//! they belong to, so the controller can drop events of sessions that are
//! already over.

use tokio::sync::mpsc;

use crate::backend::{SearchError, SearchResponse};
use crate::context::RequestId;

/// What the search engine reports about a session.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchEvent {
    /// Partial transcript of the spoken query (voice only).
    Progress(String),
    /// Audio capture ended; the query is being processed (voice only).
    RecordingStopped,
    /// The engine answered.
    Success(SearchResponse),
    /// Transport or service failure.
    Failure(SearchError),
    /// A requested abort went through.
    Aborted,
}

impl SearchEvent {
    /// `true` for the three outcomes that end a session.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success(_) | Self::Failure(_) | Self::Aborted)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Progress(_) => "progress",
            Self::RecordingStopped => "recording-stopped",
            Self::Success(_) => "success",
            Self::Failure(_) => "failure",
            Self::Aborted => "aborted",
        }
    }
}

/// A [`SearchEvent`] stamped with its session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEvent {
    pub request_id: RequestId,
    pub event: SearchEvent,
}

/// Messages delivered to the controller's inbox.
#[derive(Debug)]
pub(crate) enum Inbound {
    Event(SessionEvent),
    /// Display text produced off the owner task for a completed session.
    Rendered { request_id: RequestId, text: String },
}

/// Sending half handed to the backend with each submission.
///
/// Cheap to clone and usable from any thread.  Sends after the controller is
/// gone are dropped silently.
#[derive(Debug, Clone)]
pub struct EventSink {
    request_id: RequestId,
    tx: mpsc::UnboundedSender<Inbound>,
}

impl EventSink {
    pub(crate) fn new(request_id: RequestId, tx: mpsc::UnboundedSender<Inbound>) -> Self {
        Self { request_id, tx }
    }

    /// A sink wired to a fresh channel instead of a controller.
    #[cfg(test)]
    pub(crate) fn detached(request_id: RequestId) -> (Self, mpsc::UnboundedReceiver<Inbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(request_id, tx), rx)
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn send(&self, event: SearchEvent) {
        let event = SessionEvent {
            request_id: self.request_id,
            event,
        };
        if self.tx.send(Inbound::Event(event)).is_err() {
            log::debug!("search {}: controller gone, event dropped", self.request_id);
        }
    }

    pub fn progress(&self, partial: impl Into<String>) {
        self.send(SearchEvent::Progress(partial.into()));
    }

    pub fn recording_stopped(&self) {
        self.send(SearchEvent::RecordingStopped);
    }

    pub fn success(&self, response: SearchResponse) {
        self.send(SearchEvent::Success(response));
    }

    pub fn failure(&self, error: SearchError) {
        self.send(SearchEvent::Failure(error));
    }

    pub fn aborted(&self) {
        self.send(SearchEvent::Aborted);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_events() {
        assert!(!SearchEvent::Progress("what".into()).is_terminal());
        assert!(!SearchEvent::RecordingStopped.is_terminal());
        assert!(SearchEvent::Success(SearchResponse::ok("{}")).is_terminal());
        assert!(SearchEvent::Failure(SearchError::Transport("x".into())).is_terminal());
        assert!(SearchEvent::Aborted.is_terminal());
    }

    #[tokio::test]
    async fn sink_stamps_events_with_request_id() {
        let id = RequestId::random();
        let (sink, mut rx) = EventSink::detached(id);

        sink.progress("what is");
        sink.aborted();

        let mut received = Vec::new();
        while let Ok(Inbound::Event(event)) = rx.try_recv() {
            assert_eq!(event.request_id, id);
            received.push(event.event);
        }
        assert_eq!(
            received,
            vec![SearchEvent::Progress("what is".into()), SearchEvent::Aborted]
        );
    }

    #[test]
    fn send_after_receiver_dropped_does_not_panic() {
        let (sink, rx) = EventSink::detached(RequestId::random());
        drop(rx);
        sink.success(SearchResponse::ok("{}"));
    }
}
