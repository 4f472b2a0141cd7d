//! Scripted collaborators for tests.
//!
//! [`ScriptedClient`] hands out [`ScriptedHandle`]s that record what they
//! were asked to evaluate and hold on to the answer callback until the test
//! calls [`ScriptedHandle::deliver`]. Goals matching a registered reply
//! prefix are answered synchronously from inside `evaluate`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use uuid::Uuid;

use prolog_console_core::{
    ConsoleCommand, Error, KeyChord, QueryId, QueryMode, QueryResult, Result,
};

use crate::client::{ConsoleObserver, Editor, QueryClient, QueryHandle, ResultCallback};
use crate::history::{HistoryCallback, HistoryStore};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

type Replies = Arc<Mutex<Vec<(String, QueryResult)>>>;

/// Query client whose answers are scripted by the test.
#[derive(Default)]
pub struct ScriptedClient {
    disconnected: AtomicBool,
    retain_callbacks: AtomicBool,
    handles: Mutex<Vec<Arc<ScriptedHandle>>>,
    replies: Replies,
}

impl ScriptedClient {
    /// Connected client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Client without a live connection.
    pub fn disconnected() -> Self {
        let client = Self::default();
        client.set_connected(false);
        client
    }

    /// Toggle the connection.
    pub fn set_connected(&self, connected: bool) {
        self.disconnected.store(!connected, Ordering::SeqCst);
    }

    /// Make handles created from now on keep their callback when released,
    /// like a service that answers a query it was told to drop.
    pub fn retain_callbacks_on_release(&self) {
        self.retain_callbacks.store(true, Ordering::SeqCst);
    }

    /// Answer every goal starting with `prefix` with `result`, synchronously.
    pub fn reply_to(&self, prefix: impl Into<String>, result: QueryResult) {
        lock(&self.replies).push((prefix.into(), result));
    }

    /// Every handle created so far, oldest first.
    pub fn handles(&self) -> Vec<Arc<ScriptedHandle>> {
        lock(&self.handles).clone()
    }

    /// Most recently created handle.
    pub fn last_handle(&self) -> Option<Arc<ScriptedHandle>> {
        lock(&self.handles).last().cloned()
    }

    /// Handles whose goal starts with `prefix`.
    pub fn handles_for(&self, prefix: &str) -> Vec<Arc<ScriptedHandle>> {
        self.handles()
            .into_iter()
            .filter(|h| h.query().is_some_and(|q| q.starts_with(prefix)))
            .collect()
    }

    /// Number of handles created.
    pub fn created(&self) -> usize {
        lock(&self.handles).len()
    }

    /// Number of handles not yet released.
    pub fn outstanding(&self) -> usize {
        lock(&self.handles)
            .iter()
            .filter(|h| h.release_count() == 0)
            .count()
    }
}

impl QueryClient for ScriptedClient {
    fn is_connected(&self) -> bool {
        !self.disconnected.load(Ordering::SeqCst)
    }

    fn create(&self) -> Result<Arc<dyn QueryHandle>> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        let handle = Arc::new(ScriptedHandle::new(
            QueryId::new(format!("pl_{}", Uuid::new_v4().simple())),
            Arc::clone(&self.replies),
            self.retain_callbacks.load(Ordering::SeqCst),
        ));
        lock(&self.handles).push(Arc::clone(&handle));
        Ok(handle)
    }
}

/// Handle created by [`ScriptedClient`].
pub struct ScriptedHandle {
    id: QueryId,
    replies: Replies,
    evaluated: Mutex<Option<(String, QueryMode)>>,
    callback: Mutex<Option<ResultCallback>>,
    advances: AtomicUsize,
    releases: AtomicUsize,
    finished: AtomicBool,
    retain_callback: bool,
}

impl ScriptedHandle {
    fn new(id: QueryId, replies: Replies, retain_callback: bool) -> Self {
        Self {
            id,
            replies,
            evaluated: Mutex::new(None),
            callback: Mutex::new(None),
            advances: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
            finished: AtomicBool::new(false),
            retain_callback,
        }
    }

    /// Goal passed to `evaluate`.
    pub fn query(&self) -> Option<String> {
        lock(&self.evaluated).as_ref().map(|(q, _)| q.clone())
    }

    /// Mode passed to `evaluate`.
    pub fn mode(&self) -> Option<QueryMode> {
        lock(&self.evaluated).as_ref().map(|(_, m)| *m)
    }

    /// Number of `advance` calls.
    pub fn advance_count(&self) -> usize {
        self.advances.load(Ordering::SeqCst)
    }

    /// Number of `release` calls.
    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    /// Whether a callback is waiting for an answer.
    pub fn has_pending_callback(&self) -> bool {
        lock(&self.callback).is_some()
    }

    /// Hand `result` to the most recent callback.
    ///
    /// Returns `false` if no callback was registered (or the handle was
    /// released, which drops it unless callbacks are retained). Delivering works regardless of whether the
    /// console still cares about this handle, which is how tests simulate
    /// late answers.
    pub fn deliver(&self, result: QueryResult) -> bool {
        let taken = lock(&self.callback).take();
        let Some(mut callback) = taken else {
            return false;
        };
        if result.is_terminal() {
            self.finished.store(true, Ordering::SeqCst);
        }
        callback(result);

        let mut slot = lock(&self.callback);
        if slot.is_none() && self.release_count() == 0 {
            *slot = Some(callback);
        }
        true
    }

    /// Take the pending callback out so a test can call it after `release`.
    pub fn detach_callback(&self) -> Option<ResultCallback> {
        lock(&self.callback).take()
    }

    fn install(&self, on_result: ResultCallback) {
        *lock(&self.callback) = Some(on_result);
    }
}

impl QueryHandle for ScriptedHandle {
    fn id(&self) -> QueryId {
        self.id.clone()
    }

    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst) || self.release_count() > 0
    }

    fn evaluate(&self, query: &str, mode: QueryMode, on_result: ResultCallback) {
        *lock(&self.evaluated) = Some((query.to_string(), mode));
        self.install(on_result);

        let reply = lock(&self.replies)
            .iter()
            .find(|(prefix, _)| query.starts_with(prefix.as_str()))
            .map(|(_, result)| result.clone());
        if let Some(result) = reply {
            self.deliver(result);
        }
    }

    fn advance(&self, on_result: ResultCallback) {
        self.advances.fetch_add(1, Ordering::SeqCst);
        self.install(on_result);
    }

    fn release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
        self.finished.store(true, Ordering::SeqCst);
        if !self.retain_callback {
            lock(&self.callback).take();
        }
    }
}

/// Editor that records what the console did to it.
#[derive(Default)]
pub struct RecordingEditor {
    text: Mutex<String>,
    focus_count: AtomicUsize,
    bindings: Mutex<Vec<(ConsoleCommand, KeyChord)>>,
}

impl RecordingEditor {
    /// Empty editor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Editor pre-filled with `text`.
    pub fn with_text(text: impl Into<String>) -> Self {
        let editor = Self::default();
        *lock(&editor.text) = text.into();
        editor
    }

    /// Simulate the user typing over the contents.
    pub fn type_text(&self, text: impl Into<String>) {
        *lock(&self.text) = text.into();
    }

    /// Number of `focus` calls.
    pub fn focus_count(&self) -> usize {
        self.focus_count.load(Ordering::SeqCst)
    }

    /// Registered commands.
    pub fn bindings(&self) -> Vec<(ConsoleCommand, KeyChord)> {
        lock(&self.bindings).clone()
    }
}

impl Editor for RecordingEditor {
    fn text(&self) -> String {
        lock(&self.text).clone()
    }

    fn set_text(&self, value: &str) {
        *lock(&self.text) = value.to_string();
    }

    fn focus(&self) {
        self.focus_count.fetch_add(1, Ordering::SeqCst);
    }

    fn bind_command(&self, command: ConsoleCommand, chord: KeyChord) {
        lock(&self.bindings).push((command, chord));
    }
}

/// Event seen by [`RecordingObserver`].
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleEvent {
    /// `on_query_submitted`
    Submitted(QueryId, String),
    /// `on_answer`
    Answer(QueryId, QueryResult),
    /// `on_session_finished`
    Finished(QueryId),
}

/// Observer that records every event.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ConsoleEvent>>,
}

impl RecordingObserver {
    /// Observer with no events.
    pub fn new() -> Self {
        Self::default()
    }

    /// All events, in order.
    pub fn events(&self) -> Vec<ConsoleEvent> {
        lock(&self.events).clone()
    }

    /// Answers delivered for `id`.
    pub fn answers_for(&self, id: &QueryId) -> Vec<QueryResult> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ConsoleEvent::Answer(qid, result) if &qid == id => Some(result),
                _ => None,
            })
            .collect()
    }

    /// Ids passed to `on_session_finished`, in order.
    pub fn finished(&self) -> Vec<QueryId> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ConsoleEvent::Finished(qid) => Some(qid),
                _ => None,
            })
            .collect()
    }

    /// `(id, goal)` pairs passed to `on_query_submitted`.
    pub fn submitted(&self) -> Vec<(QueryId, String)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ConsoleEvent::Submitted(qid, query) => Some((qid, query)),
                _ => None,
            })
            .collect()
    }
}

impl ConsoleObserver for RecordingObserver {
    fn on_query_submitted(&self, id: &QueryId, query: &str) {
        lock(&self.events).push(ConsoleEvent::Submitted(id.clone(), query.to_string()));
    }

    fn on_answer(&self, id: &QueryId, result: &QueryResult) {
        lock(&self.events).push(ConsoleEvent::Answer(id.clone(), result.clone()));
    }

    fn on_session_finished(&self, id: &QueryId) {
        lock(&self.events).push(ConsoleEvent::Finished(id.clone()));
    }
}

/// History store answering from a fixed list, optionally deferred.
///
/// Index 0 is the most recent entry.
#[derive(Default)]
pub struct ScriptedHistoryStore {
    entries: Mutex<Vec<String>>,
    added: Mutex<Vec<String>>,
    requests: Mutex<Vec<usize>>,
    deferred: AtomicBool,
    pending: Mutex<VecDeque<(usize, HistoryCallback)>>,
}

impl ScriptedHistoryStore {
    /// Store serving `entries`, most recent first.
    pub fn with_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::default();
        *lock(&store.entries) = entries.into_iter().map(Into::into).collect();
        store
    }

    /// Hold lookups until [`ScriptedHistoryStore::resolve_next`] is called.
    pub fn defer(&self) {
        self.deferred.store(true, Ordering::SeqCst);
    }

    /// Answer the oldest held lookup. Returns the index it asked for.
    pub fn resolve_next(&self) -> Option<usize> {
        let (index, callback) = lock(&self.pending).pop_front()?;
        callback(self.entry(index));
        Some(index)
    }

    /// Indices requested so far.
    pub fn requests(&self) -> Vec<usize> {
        lock(&self.requests).clone()
    }

    /// Queries passed to `add`.
    pub fn added(&self) -> Vec<String> {
        lock(&self.added).clone()
    }

    fn entry(&self, index: usize) -> Option<String> {
        lock(&self.entries).get(index).cloned()
    }
}

impl HistoryStore for ScriptedHistoryStore {
    fn add(&self, query: &str) {
        lock(&self.added).push(query.to_string());
    }

    fn get(&self, index: usize, on_entry: HistoryCallback) {
        lock(&self.requests).push(index);
        if self.deferred.load(Ordering::SeqCst) {
            lock(&self.pending).push_back((index, on_entry));
        } else {
            on_entry(self.entry(index));
        }
    }
}
