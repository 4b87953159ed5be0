//! Session state machine and the view model the UI renders.
//!
//! [`SessionState`] is the lifecycle of one [`SearchSession`]:
//!
//! ```text
//! Idle ──start──▶ Started ──progress──▶ Searching ──success──▶ Completed
//!                 Started | Searching ──abort confirmed──▶ Aborted
//!                 Started | Searching ──failure──────────▶ Failed
//! ```
//!
//! [`SearchView`] is what a screen shows: a status line, a content pane and
//! the label of its single search button.  It lives behind [`SharedView`] so
//! a renderer on another thread can read it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::backend::{SearchError, SearchResponse};
use crate::context::RequestId;

// ---------------------------------------------------------------------------
// SearchMode
// ---------------------------------------------------------------------------

/// Text or voice search.  Selects the screen texts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Text,
    Voice,
}

impl SearchMode {
    pub fn label(&self) -> &'static str {
        match self {
            SearchMode::Text => "text",
            SearchMode::Voice => "voice",
        }
    }

    /// Button label while no search is running.
    pub fn idle_button(&self) -> &'static str {
        match self {
            SearchMode::Text => "Submit text",
            SearchMode::Voice => "Search",
        }
    }

    /// Button label while a search is running.
    pub fn active_button(&self) -> &'static str {
        match self {
            SearchMode::Text => "Stop Search",
            SearchMode::Voice => "Stop Listening",
        }
    }

    pub fn started_status(&self) -> &'static str {
        match self {
            SearchMode::Text => "Waiting for response...",
            SearchMode::Voice => "Listening...",
        }
    }

    pub fn received_status(&self) -> &'static str {
        match self {
            SearchMode::Text => "Received response...displaying the JSON",
            SearchMode::Voice => "Received Response",
        }
    }

    /// Content shown when a delivered body is not a JSON object.
    pub fn malformed_content(&self, raw: &str) -> String {
        match self {
            SearchMode::Text => format!("Bad JSON\n\n{raw}"),
            SearchMode::Voice => format!("Failed to parse content:\n{raw}"),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No session; a new search may start.
    #[default]
    Idle,
    /// Submitted; nothing heard from the engine yet.
    Started,
    /// The engine reported progress.
    Searching,
    Completed,
    Aborted,
    Failed,
}

impl SessionState {
    /// `true` while the session occupies the controller.
    ///
    /// ```
    /// use houndify_sample::session::SessionState;
    ///
    /// assert!(!SessionState::Idle.is_active());
    /// assert!(SessionState::Started.is_active());
    /// assert!(SessionState::Searching.is_active());
    /// assert!(!SessionState::Completed.is_active());
    /// ```
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Started | SessionState::Searching)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Aborted | SessionState::Failed
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::Started => "Started",
            SessionState::Searching => "Searching",
            SessionState::Completed => "Completed",
            SessionState::Aborted => "Aborted",
            SessionState::Failed => "Failed",
        }
    }
}

// ---------------------------------------------------------------------------
// SearchSession
// ---------------------------------------------------------------------------

/// The query a session was started with.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionInput {
    Text(String),
    Audio { description: String },
}

impl SessionInput {
    pub fn mode(&self) -> SearchMode {
        match self {
            SessionInput::Text(_) => SearchMode::Text,
            SessionInput::Audio { .. } => SearchMode::Voice,
        }
    }
}

/// One search request and its lifecycle.
#[derive(Debug, Clone)]
pub struct SearchSession {
    request_id: RequestId,
    input: SessionInput,
    state: SessionState,
    partial_transcript: Option<String>,
    result: Option<SearchResponse>,
    error: Option<SearchError>,
    abort_requested: bool,
    recording_stopped: bool,
}

impl SearchSession {
    /// A freshly submitted session, in [`SessionState::Started`].
    pub fn new(request_id: RequestId, input: SessionInput) -> Self {
        Self {
            request_id,
            input,
            state: SessionState::Started,
            partial_transcript: None,
            result: None,
            error: None,
            abort_requested: false,
            recording_stopped: false,
        }
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn input(&self) -> &SessionInput {
        &self.input
    }

    pub fn mode(&self) -> SearchMode {
        self.input.mode()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn partial_transcript(&self) -> Option<&str> {
        self.partial_transcript.as_deref()
    }

    /// Present only once [`SessionState::Completed`].
    pub fn result(&self) -> Option<&SearchResponse> {
        self.result.as_ref()
    }

    /// Present only once [`SessionState::Failed`].
    pub fn error(&self) -> Option<&SearchError> {
        self.error.as_ref()
    }

    pub fn abort_requested(&self) -> bool {
        self.abort_requested
    }

    pub fn recording_stopped(&self) -> bool {
        self.recording_stopped
    }

    pub(crate) fn record_progress(&mut self, partial: String) {
        if self.state == SessionState::Started {
            self.state = SessionState::Searching;
        }
        self.partial_transcript = Some(partial);
    }

    pub(crate) fn mark_recording_stopped(&mut self) {
        self.recording_stopped = true;
    }

    pub(crate) fn request_abort(&mut self) {
        self.abort_requested = true;
    }

    pub(crate) fn complete(&mut self, response: SearchResponse) {
        self.state = SessionState::Completed;
        self.result = Some(response);
    }

    pub(crate) fn fail(&mut self, error: SearchError) {
        self.state = SessionState::Failed;
        self.error = Some(error);
    }

    pub(crate) fn confirm_abort(&mut self) {
        self.state = SessionState::Aborted;
    }
}

/// Returned by a successful start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionHandle {
    pub request_id: RequestId,
    pub mode: SearchMode,
}

// ---------------------------------------------------------------------------
// SearchView
// ---------------------------------------------------------------------------

/// Everything a search screen displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchView {
    pub status: String,
    pub content: String,
    pub button_label: String,
}

impl SearchView {
    /// The screen before any search.
    pub fn idle(mode: SearchMode) -> Self {
        Self {
            status: String::new(),
            content: String::new(),
            button_label: mode.idle_button().to_string(),
        }
    }
}

/// Thread-safe handle to [`SearchView`].
///
/// Written only by the controller.  Hold the lock briefly and never across
/// an `.await`.
pub type SharedView = Arc<Mutex<SearchView>>;

pub fn new_shared_view(mode: SearchMode) -> SharedView {
    Arc::new(Mutex::new(SearchView::idle(mode)))
}

/// Lock `view`, recovering the data if a writer panicked.
pub fn lock_view(view: &SharedView) -> MutexGuard<'_, SearchView> {
    view.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn text_session() -> SearchSession {
        SearchSession::new(
            RequestId::random(),
            SessionInput::Text("What is the weather".into()),
        )
    }

    #[test]
    fn terminal_and_active_are_disjoint() {
        let all = [
            SessionState::Idle,
            SessionState::Started,
            SessionState::Searching,
            SessionState::Completed,
            SessionState::Aborted,
            SessionState::Failed,
        ];
        for state in all {
            assert!(!(state.is_active() && state.is_terminal()), "{state:?}");
        }
        assert!(!SessionState::Idle.is_active());
        assert!(!SessionState::Idle.is_terminal());
    }

    #[test]
    fn labels() {
        assert_eq!(SessionState::Searching.label(), "Searching");
        assert_eq!(SessionState::Aborted.label(), "Aborted");
        assert_eq!(SessionState::default(), SessionState::Idle);
    }

    #[test]
    fn new_session_is_started() {
        let session = text_session();
        assert_eq!(session.state(), SessionState::Started);
        assert_eq!(session.mode(), SearchMode::Text);
        assert!(session.result().is_none());
        assert!(session.error().is_none());
    }

    #[test]
    fn progress_moves_started_to_searching_once() {
        let mut session = text_session();
        session.record_progress("what".into());
        assert_eq!(session.state(), SessionState::Searching);
        session.record_progress("what is the".into());
        assert_eq!(session.state(), SessionState::Searching);
        assert_eq!(session.partial_transcript(), Some("what is the"));
    }

    #[test]
    fn complete_stores_result_only() {
        let mut session = text_session();
        session.complete(SearchResponse::ok("{}"));
        assert_eq!(session.state(), SessionState::Completed);
        assert!(session.result().is_some());
        assert!(session.error().is_none());
    }

    #[test]
    fn fail_stores_error_only() {
        let mut session = text_session();
        session.fail(SearchError::Transport("reset".into()));
        assert_eq!(session.state(), SessionState::Failed);
        assert!(session.result().is_none());
        assert!(session.error().is_some());
    }

    #[test]
    fn mode_texts() {
        assert_eq!(SearchMode::Text.idle_button(), "Submit text");
        assert_eq!(SearchMode::Voice.active_button(), "Stop Listening");
        assert_eq!(SearchMode::Voice.started_status(), "Listening...");
        assert_eq!(SearchView::idle(SearchMode::Voice).button_label, "Search");
    }

    #[test]
    fn shared_view_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SharedView>();
    }
}
