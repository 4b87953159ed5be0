//! Test double for [`SearchBackend`].
//!
//! Records every submission together with its [`EventSink`], so a test can
//! play the search engine: emit progress, deliver a response, confirm an
//! abort.  Optionally replies immediately or rejects every submission.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::context::RequestContext;
use crate::session::{EventSink, SearchMode};

use super::{InFlightSearch, SearchBackend, SearchError, SearchQuery, SearchResponse};

/// One recorded call to [`SearchBackend::submit`].
#[derive(Clone)]
pub struct Submission {
    pub mode: SearchMode,
    pub context: RequestContext,
    pub sink: EventSink,
    pub aborts: Arc<AtomicUsize>,
    pub stops: Arc<AtomicUsize>,
}

impl Submission {
    pub fn abort_calls(&self) -> usize {
        self.aborts.load(Ordering::SeqCst)
    }

    pub fn stop_calls(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct ScriptedBackend {
    submissions: Mutex<Vec<Submission>>,
    reply: Option<SearchResponse>,
    reject: Option<SearchError>,
}

impl ScriptedBackend {
    /// Records submissions; the test drives every event.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers `response` as soon as a search is submitted.
    pub fn replying(response: SearchResponse) -> Self {
        Self {
            reply: Some(response),
            ..Self::default()
        }
    }

    /// Rejects every submission with `error`.
    pub fn rejecting(error: SearchError) -> Self {
        Self {
            reject: Some(error),
            ..Self::default()
        }
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }

    /// The most recent submission.
    pub fn last(&self) -> Submission {
        self.submissions
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no search was submitted")
    }
}

struct ScriptedSearch {
    aborts: Arc<AtomicUsize>,
    stops: Arc<AtomicUsize>,
}

impl InFlightSearch for ScriptedSearch {
    fn abort(&self) {
        self.aborts.fetch_add(1, Ordering::SeqCst);
    }

    fn stop_recording(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

impl SearchBackend for ScriptedBackend {
    fn submit(
        &self,
        query: SearchQuery,
        context: RequestContext,
        sink: EventSink,
    ) -> Result<Box<dyn InFlightSearch>, SearchError> {
        if let Some(error) = &self.reject {
            return Err(error.clone());
        }

        let submission = Submission {
            mode: query.mode(),
            context,
            sink: sink.clone(),
            aborts: Arc::new(AtomicUsize::new(0)),
            stops: Arc::new(AtomicUsize::new(0)),
        };
        let search = ScriptedSearch {
            aborts: Arc::clone(&submission.aborts),
            stops: Arc::clone(&submission.stops),
        };
        self.submissions.lock().unwrap().push(submission);

        if let Some(response) = &self.reply {
            sink.success(response.clone());
        }
        Ok(Box::new(search))
    }
}
