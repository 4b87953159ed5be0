//! Search session controller: the single-flight state machine.
//!
//! [`SearchController`] owns at most one active [`SearchSession`] (the slot)
//! and the [`SharedView`] a screen renders.  Everything the backend reports
//! comes back through one inbox, stamped with the request id of the session
//! it belongs to.
//!
//! # Flow
//!
//! ```text
//! start_search ──▶ RequestContext::build ──▶ SearchBackend::submit   [Started]
//!
//! inbox: Progress          ──▶ partial transcript                     [Searching]
//!        RecordingStopped  ──▶ "Receiving..."
//!        Success           ──▶ spawn_blocking(render_body)            [Completed]
//!        Failure           ──▶ error chain                            [Failed]
//!        Aborted           ──▶                                        [Aborted]
//!        Rendered          ──▶ content pane
//! ```
//!
//! The first terminal event of a session wins.  Events whose request id does
//! not match the slot are dropped, so a late success after a confirmed abort,
//! or an abort confirmation after a success, changes nothing.

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::mpsc;

use crate::backend::{InFlightSearch, SearchBackend, SearchQuery, SearchResponse};
use crate::context::{IdentityProvider, LocationProvider, RequestContext, RequestId};

use super::event::{EventSink, Inbound, SearchEvent, SessionEvent};
use super::render::{describe_error, render_body};
use super::state::{
    lock_view, new_shared_view, SearchMode, SearchSession, SearchView, SessionHandle,
    SessionState, SharedView,
};

const FAILURE_STATUS: &str = "Something went wrong";
const ABORTED_STATUS: &str = "Aborted";
const RECEIVING_STATUS: &str = "Receiving...";

// ---------------------------------------------------------------------------
// Commands and outcomes
// ---------------------------------------------------------------------------

/// Input accepted by [`SearchController::run`].
#[derive(Debug)]
pub enum SearchCommand {
    /// Start a search unless one is active.
    Start(SearchQuery),
    /// The screen's single button; see [`SearchController::press`].
    Press(SearchQuery),
    Abort,
    StopRecording,
    /// Abort whatever is running and stop accepting commands.
    Shutdown,
}

/// What one inbox message did to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The active session moved to this state.
    Transition(SessionState),
    /// The active session changed without changing state.
    Updated,
    /// Display text for the last completed session arrived.
    Rendered,
    /// Stale or superseded message; nothing changed.
    Ignored,
}

/// What [`SearchController::press`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressAction {
    Started(SessionHandle),
    Aborting,
    StoppingRecording,
    Ignored,
}

// ---------------------------------------------------------------------------
// SearchController
// ---------------------------------------------------------------------------

struct ActiveSession {
    session: SearchSession,
    search: Box<dyn InFlightSearch>,
}

/// Drives search sessions for one screen.
///
/// All transitions happen on the task that owns the controller; the backend
/// only talks to it through [`EventSink`]s.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use houndify_sample::backend::{HttpBackend, SearchQuery};
/// use houndify_sample::config::AppConfig;
/// use houndify_sample::context::{InstallationIdentity, NoLocation};
/// use houndify_sample::session::{SearchController, SearchCommand, SearchMode};
///
/// # async fn example() {
/// let config = AppConfig::default();
/// let controller = SearchController::new(
///     SearchMode::Text,
///     Arc::new(HttpBackend::from_config(&config.backend)),
///     Arc::new(InstallationIdentity::ephemeral("demo-user")),
///     Arc::new(NoLocation),
/// );
///
/// let (tx, rx) = tokio::sync::mpsc::channel(8);
/// tx.send(SearchCommand::Start(SearchQuery::text("What is the weather")))
///     .await
///     .unwrap();
/// drop(tx);
/// let last = controller.run(rx).await;
/// # }
/// ```
pub struct SearchController {
    mode: SearchMode,
    backend: Arc<dyn SearchBackend>,
    identity: Arc<dyn IdentityProvider>,
    location: Arc<dyn LocationProvider>,
    extras: Map<String, Value>,
    view: SharedView,
    active: Option<ActiveSession>,
    last: Option<SearchSession>,
    pending_render: Option<RequestId>,
    inbox_tx: mpsc::UnboundedSender<Inbound>,
    inbox_rx: mpsc::UnboundedReceiver<Inbound>,
}

impl SearchController {
    pub fn new(
        mode: SearchMode,
        backend: Arc<dyn SearchBackend>,
        identity: Arc<dyn IdentityProvider>,
        location: Arc<dyn LocationProvider>,
    ) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        Self {
            mode,
            backend,
            identity,
            location,
            extras: Map::new(),
            view: new_shared_view(mode),
            active: None,
            last: None,
            pending_render: None,
            inbox_tx,
            inbox_rx,
        }
    }

    /// Extra request-info fields sent with every search of this controller.
    pub fn with_extras(mut self, extras: Map<String, Value>) -> Self {
        self.extras = extras;
        self
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn mode(&self) -> SearchMode {
        self.mode
    }

    /// State of the active session, or `Idle` when the slot is empty.
    pub fn state(&self) -> SessionState {
        self.active
            .as_ref()
            .map(|a| a.session.state())
            .unwrap_or_default()
    }

    pub fn active_request_id(&self) -> Option<RequestId> {
        self.active.as_ref().map(|a| a.session.request_id())
    }

    pub fn active_session(&self) -> Option<&SearchSession> {
        self.active.as_ref().map(|a| &a.session)
    }

    /// The most recent session that reached a terminal state.
    pub fn last_session(&self) -> Option<&SearchSession> {
        self.last.as_ref()
    }

    pub fn view(&self) -> SharedView {
        Arc::clone(&self.view)
    }

    pub fn snapshot(&self) -> SearchView {
        lock_view(&self.view).clone()
    }

    /// No active session and no render outstanding.
    pub fn is_settled(&self) -> bool {
        self.active.is_none() && self.pending_render.is_none()
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Start a search.
    ///
    /// Returns `None` without side effects while another session is active.
    /// A submission the backend rejects outright fails the new session
    /// immediately; its handle is still returned.
    pub fn start_search(&mut self, query: SearchQuery) -> Option<SessionHandle> {
        if let Some(active) = &self.active {
            log::debug!(
                "search {}: still {}, ignoring new {} query",
                active.session.request_id(),
                active.session.state().label(),
                query.mode().label()
            );
            return None;
        }

        let context = RequestContext::build(
            self.identity.as_ref(),
            self.location.as_ref(),
            self.extras.clone(),
        );
        let request_id = context.request_id();
        let mut session = SearchSession::new(request_id, query.input());
        let mode = session.mode();

        // A render still in flight belongs to the previous session.
        self.pending_render = None;
        {
            let mut view = lock_view(&self.view);
            view.status = mode.started_status().to_string();
            view.content.clear();
            view.button_label = mode.active_button().to_string();
        }

        let sink = EventSink::new(request_id, self.inbox_tx.clone());
        match self.backend.submit(query, context, sink) {
            Ok(search) => {
                log::info!("search {request_id}: started ({} query)", mode.label());
                self.active = Some(ActiveSession { session, search });
            }
            Err(error) => {
                log::error!("search {request_id}: submission rejected: {error}");
                self.show_failure(mode, &describe_error(&error));
                session.fail(error);
                self.last = Some(session);
            }
        }

        Some(SessionHandle { request_id, mode })
    }

    /// Ask the backend to cancel the active session.
    ///
    /// The session stays active until the backend confirms.  Returns `false`
    /// when there is nothing to abort or an abort is already pending.
    pub fn abort(&mut self) -> bool {
        let Some(active) = self.active.as_mut() else {
            log::debug!("abort requested with no active search");
            return false;
        };
        if active.session.abort_requested() {
            log::debug!("search {}: abort already pending", active.session.request_id());
            return false;
        }

        log::info!("search {}: abort requested", active.session.request_id());
        active.session.request_abort();
        active.search.abort();
        true
    }

    /// End audio capture of the active voice session.
    ///
    /// Returns `false` for text sessions, when nothing is active, or once the
    /// recording has already stopped.
    pub fn stop_recording(&mut self) -> bool {
        match self.active.as_ref() {
            Some(active)
                if active.session.mode() == SearchMode::Voice
                    && !active.session.recording_stopped() =>
            {
                log::debug!("search {}: stop recording", active.session.request_id());
                active.search.stop_recording();
                true
            }
            _ => false,
        }
    }

    /// The screen's search button.
    ///
    /// Idle starts `query`.  While a text search runs it aborts; while a
    /// voice search is still recording it stops the recording, and after
    /// that it aborts.
    pub fn press(&mut self, query: SearchQuery) -> PressAction {
        let Some(active) = self.active.as_ref() else {
            return self
                .start_search(query)
                .map_or(PressAction::Ignored, PressAction::Started);
        };

        let recording = active.session.mode() == SearchMode::Voice
            && !active.session.recording_stopped();
        if recording {
            self.stop_recording();
            PressAction::StoppingRecording
        } else if self.abort() {
            PressAction::Aborting
        } else {
            PressAction::Ignored
        }
    }

    /// Abort any active session before the controller goes away.
    pub fn shutdown(&mut self) {
        if self.active.is_some() {
            log::info!("shutting down with a search in flight");
            self.abort();
        }
    }

    // -----------------------------------------------------------------------
    // Inbox
    // -----------------------------------------------------------------------

    /// Apply one collaborator event.
    pub fn handle_event(&mut self, event: SessionEvent) -> Step {
        let SessionEvent { request_id, event } = event;
        let Some(active) = self
            .active
            .as_mut()
            .filter(|a| a.session.request_id() == request_id)
        else {
            if event.is_terminal() {
                log::debug!("search {request_id}: already settled, dropping late {}", event.name());
            } else {
                log::debug!("search {request_id}: ignoring stale {} event", event.name());
            }
            return Step::Ignored;
        };
        debug_assert!(active.session.state().is_active());

        let mode = active.session.mode();
        match event {
            SearchEvent::Progress(partial) => {
                let before = active.session.state();
                lock_view(&self.view).status = format!("Transcription:\n{partial}");
                active.session.record_progress(partial);
                let after = active.session.state();
                if before == after {
                    Step::Updated
                } else {
                    log::debug!("search {request_id}: {} -> {}", before.label(), after.label());
                    Step::Transition(after)
                }
            }
            SearchEvent::RecordingStopped => {
                active.session.mark_recording_stopped();
                lock_view(&self.view).status = RECEIVING_STATUS.to_string();
                Step::Updated
            }
            SearchEvent::Success(response) => {
                self.show_response(request_id, mode, &response);
                self.finish(|session| session.complete(response))
            }
            SearchEvent::Failure(error) => {
                log::error!("search {request_id}: {error}");
                self.show_failure(mode, &describe_error(&error));
                self.finish(|session| session.fail(error))
            }
            SearchEvent::Aborted => {
                {
                    let mut view = lock_view(&self.view);
                    view.status = ABORTED_STATUS.to_string();
                    view.button_label = mode.idle_button().to_string();
                }
                self.finish(SearchSession::confirm_abort)
            }
        }
    }

    /// Wait for the next inbox message and apply it.
    pub async fn pump(&mut self) -> Step {
        match self.inbox_rx.recv().await {
            Some(message) => self.apply(message),
            // The controller holds a sender, so the inbox never closes.
            None => Step::Ignored,
        }
    }

    /// Apply the next inbox message if one is ready.
    pub fn try_pump(&mut self) -> Option<Step> {
        let message = self.inbox_rx.try_recv().ok()?;
        Some(self.apply(message))
    }

    /// Apply inbox messages until the controller [is settled](Self::is_settled).
    pub async fn settle(&mut self) {
        while self.try_pump().is_some() {}
        while !self.is_settled() {
            self.pump().await;
        }
    }

    /// Serve `commands` until the channel closes (or [`SearchCommand::Shutdown`]
    /// arrives) and the controller has settled.  Returns the last finished
    /// session.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<SearchCommand>,
    ) -> Option<SearchSession> {
        let mut accepting = true;
        loop {
            if !accepting && self.is_settled() {
                break;
            }
            tokio::select! {
                command = commands.recv(), if accepting => match command {
                    Some(command) => accepting = self.execute(command),
                    None => accepting = false,
                },
                Some(message) = self.inbox_rx.recv() => {
                    self.apply(message);
                }
                else => break,
            }
        }

        log::info!("search controller stopped");
        self.last
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Returns `false` once commands should no longer be read.
    fn execute(&mut self, command: SearchCommand) -> bool {
        match command {
            SearchCommand::Start(query) => {
                self.start_search(query);
            }
            SearchCommand::Press(query) => {
                self.press(query);
            }
            SearchCommand::Abort => {
                self.abort();
            }
            SearchCommand::StopRecording => {
                self.stop_recording();
            }
            SearchCommand::Shutdown => {
                self.shutdown();
                return false;
            }
        }
        true
    }

    fn apply(&mut self, message: Inbound) -> Step {
        match message {
            Inbound::Event(event) => self.handle_event(event),
            Inbound::Rendered { request_id, text } => {
                if self.pending_render != Some(request_id) {
                    log::debug!("search {request_id}: dropping superseded render");
                    return Step::Ignored;
                }
                self.pending_render = None;
                lock_view(&self.view).content = text;
                Step::Rendered
            }
        }
    }

    /// Apply the terminal transition and empty the slot.
    fn finish(&mut self, transition: impl FnOnce(&mut SearchSession)) -> Step {
        let Some(ActiveSession { mut session, .. }) = self.active.take() else {
            return Step::Ignored;
        };
        transition(&mut session);
        let state = session.state();
        debug_assert!(state.is_terminal(), "session ended in {state:?}");
        log::info!("search {}: {}", session.request_id(), state.label());
        self.last = Some(session);
        Step::Transition(state)
    }

    fn show_response(&mut self, request_id: RequestId, mode: SearchMode, response: &SearchResponse) {
        {
            let mut view = lock_view(&self.view);
            view.button_label = mode.idle_button().to_string();
            if mode == SearchMode::Text && !response.is_ok() {
                view.status = format!(
                    "Request failed with: {}",
                    response.error_message.as_deref().unwrap_or_default()
                );
                return;
            }
            view.status = mode.received_status().to_string();
        }
        self.schedule_render(request_id, mode, response.body.clone());
    }

    fn show_failure(&self, mode: SearchMode, detail: &str) {
        let mut view = lock_view(&self.view);
        view.status = FAILURE_STATUS.to_string();
        view.content = detail.to_string();
        view.button_label = mode.idle_button().to_string();
    }

    /// Pretty-print `body` off this task; the text comes back as
    /// [`Inbound::Rendered`].
    fn schedule_render(&mut self, request_id: RequestId, mode: SearchMode, body: String) {
        self.pending_render = Some(request_id);
        let tx = self.inbox_tx.clone();
        let render = move || {
            let text = render_body(mode, &body);
            // Fails only when the controller is gone.
            let _ = tx.send(Inbound::Rendered { request_id, text });
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn_blocking(render);
            }
            Err(_) => render(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
