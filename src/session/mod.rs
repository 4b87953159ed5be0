//! Search sessions: state machine, collaborator events and display.
//!
//! # Overview
//!
//! ```text
//! SearchCommand ──▶ SearchController ──submit──▶ SearchBackend
//!                        ▲    │                        │
//!                        │    └──▶ SharedView          │
//!                        └──── EventSink (SearchEvent) ◀┘
//! ```
//!
//! [`SearchController`] is the only writer of session state.  A UI holds the
//! controller (or a command sender) and reads the [`SharedView`].

pub mod controller;
pub mod event;
pub mod render;
pub mod state;

pub use controller::{PressAction, SearchCommand, SearchController, Step};
#[cfg(test)]
pub(crate) use event::Inbound;
pub use event::{EventSink, SearchEvent, SessionEvent};
pub use render::{describe_error, pretty_json, render_body, RenderError};
pub use state::{
    lock_view, new_shared_view, SearchMode, SearchSession, SearchView, SessionHandle,
    SessionInput, SessionState, SharedView,
};
