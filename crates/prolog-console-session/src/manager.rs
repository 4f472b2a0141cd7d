//! Query session manager: owns at most one live query per console.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::{debug, info, warn};

use prolog_console_core::{QueryId, QueryMode, QueryResult, TrailingPeriodPolicy};

use crate::client::{ConsoleObserver, Editor, QueryClient, ResultCallback};
use crate::history::{HistoryCursor, HistoryNavigator};
use crate::session::QuerySession;

/// Observer event waiting to be delivered.
#[derive(Debug)]
enum Notice {
    Submitted(QueryId, String),
    Answer(QueryId, QueryResult),
    Finished(QueryId),
}

impl Notice {
    fn deliver(self, observer: &dyn ConsoleObserver) {
        match self {
            Notice::Submitted(id, query) => observer.on_query_submitted(&id, &query),
            Notice::Answer(id, result) => observer.on_answer(&id, &result),
            Notice::Finished(id) => observer.on_session_finished(&id),
        }
    }
}

#[derive(Debug, Default)]
struct ManagerState {
    active: Option<Arc<QuerySession>>,
    /// Events queued in the order the state changed.
    pending: VecDeque<Notice>,
    /// Set while some thread is delivering `pending`.
    draining: bool,
}

impl ManagerState {
    fn is_active(&self, id: &QueryId) -> bool {
        self.active.as_ref().is_some_and(|s| s.id() == id)
    }

    /// Take the active session and queue its finish event.
    ///
    /// The caller releases the returned session after dropping the lock.
    fn take_active(&mut self) -> Option<Arc<QuerySession>> {
        let session = self.active.take()?;
        self.pending.push_back(Notice::Finished(session.id().clone()));
        Some(session)
    }
}

fn lock(state: &Mutex<ManagerState>) -> MutexGuard<'_, ManagerState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Deliver queued events until the queue is empty.
///
/// Only one thread drains at a time; a call made while another drain is in
/// progress (including one from inside an observer) returns at once and
/// leaves its events to that drain.
fn drain(state: &Mutex<ManagerState>, observer: &dyn ConsoleObserver) {
    {
        let mut guard = lock(state);
        if guard.draining {
            return;
        }
        guard.draining = true;
    }
    loop {
        let notice = {
            let mut guard = lock(state);
            match guard.pending.pop_front() {
                Some(notice) => notice,
                None => {
                    guard.draining = false;
                    return;
                }
            }
        };
        notice.deliver(observer);
    }
}

/// Coordinates the single active query of one console.
///
/// Answers are tagged with the id of the session that asked for them and
/// are only passed to the observer while that session is still the active
/// one; answers for superseded or terminated sessions are dropped.
///
/// State changes and the observer events they cause are queued under one
/// lock and delivered in that order, so an answer is never reported after
/// its session's finish even when answers arrive on another thread. No lock
/// is held while calling into the query client, the editor or the observer.
pub struct QuerySessionManager {
    client: Arc<dyn QueryClient>,
    editor: Arc<dyn Editor>,
    observer: Arc<dyn ConsoleObserver>,
    history: Arc<HistoryNavigator>,
    policy: TrailingPeriodPolicy,
    state: Arc<Mutex<ManagerState>>,
}

impl QuerySessionManager {
    /// Create a session manager for one console.
    pub fn new(
        client: Arc<dyn QueryClient>,
        editor: Arc<dyn Editor>,
        observer: Arc<dyn ConsoleObserver>,
        history: Arc<HistoryNavigator>,
        policy: TrailingPeriodPolicy,
    ) -> Self {
        Self {
            client,
            editor,
            observer,
            history,
            policy,
            state: Arc::new(Mutex::new(ManagerState::default())),
        }
    }

    /// Trailing period policy in effect.
    pub fn policy(&self) -> TrailingPeriodPolicy {
        self.policy
    }

    /// History navigator fed by submissions.
    pub fn history(&self) -> &Arc<HistoryNavigator> {
        &self.history
    }

    /// Id of the active session, if any.
    pub fn active_query_id(&self) -> Option<QueryId> {
        lock(&self.state).active.as_ref().map(|s| s.id().clone())
    }

    /// Goal of the active session, if any.
    pub fn active_query_text(&self) -> Option<String> {
        lock(&self.state)
            .active
            .as_ref()
            .map(|s| s.query().to_string())
    }

    /// Whether a session is active and can still produce solutions.
    pub fn has_open_session(&self) -> bool {
        lock(&self.state)
            .active
            .as_ref()
            .is_some_and(|s| !s.is_finished())
    }

    /// Submit a query.
    ///
    /// Uses `text` if given, otherwise the editor contents. Any active
    /// session is finished before the new one is opened. Returns the new
    /// query id, or `None` if nothing was submitted (incomplete or empty
    /// text, no connection).
    pub fn submit_query(&self, text: Option<&str>) -> Option<QueryId> {
        let raw = match text {
            Some(text) => text.to_string(),
            None => self.editor.text(),
        };

        let Some(query) = self.policy.normalize(&raw) else {
            debug!("Query text has no terminator, closing open query instead");
            self.terminate();
            return None;
        };
        if query.is_empty() {
            debug!("Ignoring empty query");
            return None;
        }
        if !self.client.is_connected() {
            debug!("Not connected, query not submitted");
            return None;
        }

        let previous = lock(&self.state).take_active();
        if let Some(previous) = previous {
            debug!(query_id = %previous.id(), "Superseding active query");
            previous.finish();
        }
        self.drain();

        let session = match QuerySession::open(self.client.as_ref(), query) {
            Ok(session) => Arc::new(session),
            Err(e) => {
                warn!("Failed to open query session: {}", e);
                return None;
            }
        };
        let id = session.id().clone();

        // Another submission may have slipped in while the session opened
        let displaced = {
            let mut state = lock(&self.state);
            let displaced = state.take_active();
            state.active = Some(Arc::clone(&session));
            state
                .pending
                .push_back(Notice::Submitted(id.clone(), session.query().to_string()));
            displaced
        };
        if let Some(displaced) = displaced {
            debug!(query_id = %displaced.id(), "Superseding active query");
            displaced.finish();
        }

        info!(query_id = %id, "Submitting query: '{}'", session.query());
        self.drain();
        session.evaluate(QueryMode::Incremental, self.answer_callback(&id));

        self.editor.set_text("");
        self.history.record(session.query());
        self.history.reset();

        Some(id)
    }

    /// Ask the active session for its next solution.
    ///
    /// Does nothing if there is no unfinished session.
    pub fn request_next_solution(&self) {
        let session = lock(&self.state).active.clone();
        match session {
            Some(session) if !session.is_finished() => {
                session.advance(self.answer_callback(session.id()));
                self.editor.focus();
            }
            _ => debug!("No open query to advance"),
        }
    }

    /// Finish the active session, if any.
    pub fn terminate(&self) {
        let session = lock(&self.state).take_active();
        if let Some(session) = session {
            session.finish();
        }
        self.drain();
    }

    /// Finish the session `id` if it is the active one.
    ///
    /// Returns `false` if `id` is not (or no longer) active.
    pub fn terminate_session(&self, id: &QueryId) -> bool {
        let session = {
            let mut state = lock(&self.state);
            if state.is_active(id) {
                state.take_active()
            } else {
                None
            }
        };
        let Some(session) = session else {
            return false;
        };
        session.finish();
        self.drain();
        true
    }

    /// Current history cursor.
    pub fn history_cursor(&self) -> HistoryCursor {
        self.history.cursor()
    }

    fn drain(&self) {
        drain(&self.state, self.observer.as_ref());
    }

    fn answer_callback(&self, id: &QueryId) -> ResultCallback {
        let state = Arc::downgrade(&self.state);
        let observer = Arc::clone(&self.observer);
        let id = id.clone();
        Box::new(move |result| dispatch_answer(&state, observer.as_ref(), &id, result))
    }
}

/// Queue `result` for the observer if `id` is still the active session, and
/// finish the session once no more answers can follow.
fn dispatch_answer(
    state: &Weak<Mutex<ManagerState>>,
    observer: &dyn ConsoleObserver,
    id: &QueryId,
    result: QueryResult,
) {
    let Some(state) = state.upgrade() else {
        return;
    };

    let finished = {
        let mut guard = lock(&state);
        if !guard.is_active(id) {
            debug!(query_id = %id, "Discarding answer for inactive query");
            return;
        }
        let terminal = result.is_terminal();
        guard.pending.push_back(Notice::Answer(id.clone(), result));
        if terminal {
            guard.take_active()
        } else {
            None
        }
    };
    if let Some(session) = finished {
        debug!(query_id = %id, "Query has no more solutions");
        session.finish();
    }
    drain(&state, observer);
}

impl Drop for QuerySessionManager {
    fn drop(&mut self) {
        self.terminate();
    }
}
