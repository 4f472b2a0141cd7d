//! Query history: a cursor over a (usually server-side) list of past queries.
//!
//! The list itself lives in a [`HistoryStore`]; the navigator only keeps the
//! cursor. Index 0 is the most recent entry, so "next" walks back in time.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::{debug, warn};

use prolog_console_core::{Error, QueryMode, QueryResult, Result};

use crate::client::{Editor, QueryClient};
use crate::session::{release_after_first, ReleaseOnce};

/// Callback receiving a history entry, or `None` on a miss.
pub type HistoryCallback = Box<dyn FnOnce(Option<String>) + Send + 'static>;

/// Ordered list of past queries.
pub trait HistoryStore: Send + Sync {
    /// Append `query` as the most recent entry.
    fn add(&self, query: &str);

    /// Look up the entry at `index` (0 = most recent).
    fn get(&self, index: usize, on_entry: HistoryCallback);
}

/// Quote `text` as a single-quoted Prolog atom.
///
/// # Example
/// ```
/// use prolog_console_session::quote_atom;
///
/// assert_eq!(quote_atom("It's a test"), r"'It\'s a test'");
/// ```
pub fn quote_atom(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('\'');
    for ch in text.chars() {
        match ch {
            '\\' => quoted.push_str("\\\\"),
            '\'' => quoted.push_str("\\'"),
            '\n' => quoted.push_str("\\n"),
            '\t' => quoted.push_str("\\t"),
            _ => quoted.push(ch),
        }
    }
    quoted.push('\'');
    quoted
}

/// Inverse of [`quote_atom`]; also accepts the doubled-quote form `''`.
pub fn unquote_atom(quoted: &str) -> Result<String> {
    let inner = quoted
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .ok_or_else(|| Error::ParseError(format!("not a quoted atom: {quoted}")))?;

    let mut text = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some('\\') => text.push('\\'),
                Some('\'') => text.push('\''),
                Some('n') => text.push('\n'),
                Some('t') => text.push('\t'),
                Some(other) => {
                    return Err(Error::ParseError(format!(
                        "unsupported escape '\\{other}' in {quoted}"
                    )))
                }
                None => {
                    return Err(Error::ParseError(format!(
                        "dangling escape in {quoted}"
                    )))
                }
            },
            '\'' => {
                if chars.next() != Some('\'') {
                    return Err(Error::ParseError(format!(
                        "unescaped quote in {quoted}"
                    )));
                }
                text.push('\'');
            }
            _ => text.push(ch),
        }
    }
    Ok(text)
}

/// History kept on the query service through `history_add/1` and
/// `history_get/2`.
pub struct RemoteHistoryStore {
    client: Arc<dyn QueryClient>,
}

impl RemoteHistoryStore {
    /// Store talking to the service through `client`.
    pub fn new(client: Arc<dyn QueryClient>) -> Self {
        Self { client }
    }

    /// Goal appending `query` to the server-side log.
    pub fn add_goal(query: &str) -> String {
        format!("history_add({}).", quote_atom(query))
    }

    /// Goal binding `Q` to the entry at `index`.
    pub fn get_goal(index: usize) -> String {
        format!("history_get({index},Q).")
    }

    /// Run `goal` on a fresh handle, pass its first answer to `on_result` and
    /// release the handle.
    fn run_once<F>(&self, goal: &str, on_result: F) -> Result<()>
    where
        F: FnOnce(QueryResult) + Send + 'static,
    {
        if !self.client.is_connected() {
            return Err(Error::NotConnected);
        }
        let handle = self.client.create()?;
        let release = ReleaseOnce::new(Arc::clone(&handle));
        handle.evaluate(goal, QueryMode::All, release_after_first(&release, on_result));
        Ok(())
    }
}

impl HistoryStore for RemoteHistoryStore {
    fn add(&self, query: &str) {
        let goal = Self::add_goal(query);
        let outcome = self.run_once(&goal, |result| {
            if let QueryResult::Error { message } = result {
                warn!("history_add failed: {}", message);
            }
        });
        if let Err(e) = outcome {
            debug!("History entry not stored: {}", e);
        }
    }

    fn get(&self, index: usize, on_entry: HistoryCallback) {
        // The callback is moved into the handle on success; keep it reachable
        // for the failure path.
        let slot = Arc::new(Mutex::new(Some(on_entry)));
        let answer_slot = Arc::clone(&slot);
        let outcome = self.run_once(&Self::get_goal(index), move |result| {
            let entry = result.binding_str("Q").map(str::to_string);
            if let Some(on_entry) = lock(&answer_slot).take() {
                on_entry(entry);
            }
        });
        if let Err(e) = outcome {
            debug!(index, "History lookup skipped: {}", e);
            if let Some(on_entry) = lock(&slot).take() {
                on_entry(None);
            }
        }
    }
}

/// History with persistence switched off: nothing is stored, every lookup
/// misses.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledHistoryStore;

impl HistoryStore for DisabledHistoryStore {
    fn add(&self, _query: &str) {}

    fn get(&self, _index: usize, on_entry: HistoryCallback) {
        on_entry(None);
    }
}

/// History kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryHistoryStore {
    entries: Mutex<Vec<String>>,
}

impl InMemoryHistoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    /// Whether nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl HistoryStore for InMemoryHistoryStore {
    fn add(&self, query: &str) {
        lock(&self.entries).push(query.to_string());
    }

    fn get(&self, index: usize, on_entry: HistoryCallback) {
        let entry = {
            let entries = lock(&self.entries);
            entries
                .len()
                .checked_sub(index + 1)
                .and_then(|i| entries.get(i).cloned())
        };
        on_entry(entry);
    }
}

/// Position in the history list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HistoryCursor {
    /// Fresh input, no entry shown
    #[default]
    NoSelection,
    /// Entry `i` is shown
    AtIndex(usize),
}

impl HistoryCursor {
    /// Integer form: `-1` for no selection.
    pub fn as_index(&self) -> i64 {
        match self {
            HistoryCursor::NoSelection => -1,
            HistoryCursor::AtIndex(i) => *i as i64,
        }
    }

    /// Index requested by "next".
    pub fn next_index(&self) -> usize {
        match self {
            HistoryCursor::NoSelection => 0,
            HistoryCursor::AtIndex(i) => i + 1,
        }
    }

    /// Index requested by "previous"; only defined when the cursor is past 0.
    pub fn previous_index(&self) -> Option<usize> {
        match self {
            HistoryCursor::AtIndex(i) if *i > 0 => Some(i - 1),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct NavigatorState {
    cursor: HistoryCursor,
    /// Bumped by every navigation and reset; answers for older requests are
    /// dropped.
    generation: u64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Moves the history cursor and shows the selected entry in the editor.
pub struct HistoryNavigator {
    store: Arc<dyn HistoryStore>,
    editor: Arc<dyn Editor>,
    state: Arc<Mutex<NavigatorState>>,
}

impl HistoryNavigator {
    /// Navigator over `store`, showing entries in `editor`.
    pub fn new(store: Arc<dyn HistoryStore>, editor: Arc<dyn Editor>) -> Self {
        Self {
            store,
            editor,
            state: Arc::new(Mutex::new(NavigatorState::default())),
        }
    }

    /// Current cursor.
    pub fn cursor(&self) -> HistoryCursor {
        lock(&self.state).cursor
    }

    /// Remember a submitted query.
    pub fn record(&self, query: &str) {
        self.store.add(query);
    }

    /// Back to fresh input; pending lookups are discarded.
    pub fn reset(&self) {
        let mut state = lock(&self.state);
        state.cursor = HistoryCursor::NoSelection;
        state.generation += 1;
    }

    /// Show the entry after the cursor. Returns the requested index.
    pub fn next(&self) -> usize {
        let (index, generation) = {
            let mut state = lock(&self.state);
            state.generation += 1;
            (state.cursor.next_index(), state.generation)
        };
        self.request(index, generation);
        index
    }

    /// Show the entry before the cursor, if the cursor is past 0. Returns
    /// the requested index.
    pub fn previous(&self) -> Option<usize> {
        let (index, generation) = {
            let mut state = lock(&self.state);
            let index = state.cursor.previous_index()?;
            state.generation += 1;
            (index, state.generation)
        };
        self.request(index, generation);
        Some(index)
    }

    fn request(&self, index: usize, generation: u64) {
        debug!(index, "Requesting history entry");
        let state: Weak<Mutex<NavigatorState>> = Arc::downgrade(&self.state);
        let editor = Arc::clone(&self.editor);
        self.store.get(
            index,
            Box::new(move |entry| {
                let Some(entry) = entry else {
                    debug!(index, "No history entry");
                    return;
                };
                let Some(state) = state.upgrade() else {
                    return;
                };
                {
                    let mut state = lock(&state);
                    if state.generation != generation {
                        debug!(index, "Discarding stale history entry");
                        return;
                    }
                    state.cursor = HistoryCursor::AtIndex(index);
                }
                editor.set_text(&format!("{entry}."));
                editor.focus();
            }),
        );
    }
}
