//! Predicate-name completion.
//!
//! The names known to the remote engine are fetched once per console with a
//! single enumeration query and served from memory afterwards.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info, warn};

use prolog_console_core::{Completion, CompletionContext, QueryMode, QueryResult};

use crate::client::QueryClient;
use crate::session::{release_after_first, ReleaseOnce};

lazy_static! {
    /// Identifier characters directly before the caret.
    static ref IDENTIFIER_PREFIX: Regex = Regex::new(r"[A-Za-z0-9_:]+$").unwrap();
}

/// Something that can offer completions at a caret position.
pub trait CompletionSource: Send + Sync {
    /// Completions for `prefix` typed at `context`.
    fn completions(&self, context: &CompletionContext, prefix: &str) -> Vec<Completion>;
}

/// The completion sources of one console.
#[derive(Default)]
pub struct CompletionRegistry {
    sources: RwLock<Vec<Arc<dyn CompletionSource>>>,
}

impl CompletionRegistry {
    /// Registry without sources.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source.
    pub fn add(&self, source: Arc<dyn CompletionSource>) {
        self.sources
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(source);
    }

    /// Number of registered sources.
    pub fn len(&self) -> usize {
        self.sources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no source is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Completions from every source, best score first, then by label.
    pub fn completions(&self, context: &CompletionContext, prefix: &str) -> Vec<Completion> {
        // Sources may call out to the query client; don't hold the lock.
        let sources = self
            .sources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut completions: Vec<Completion> = sources
            .iter()
            .flat_map(|source| source.completions(context, prefix))
            .collect();
        completions.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.label.cmp(&b.label)));
        completions
    }
}

/// Word being typed at `context`: the identifier characters right before the
/// caret.
pub fn identifier_prefix(context: &CompletionContext) -> String {
    let before: String = context.line_text.chars().take(context.column).collect();
    IDENTIFIER_PREFIX
        .find(&before)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Extract names from the textual answer of the enumeration query.
///
/// The first and last lines are framing; every other line of the form
/// `<var> = <name>` contributes `name`. The result is sorted and free of
/// duplicates.
///
/// # Example
/// ```
/// use prolog_console_session::parse_predicate_names;
///
/// let text = "L = [\nX = append\nX = lists\nX = append\n].";
/// assert_eq!(parse_predicate_names(text), vec!["append", "lists"]);
/// ```
pub fn parse_predicate_names(text: &str) -> Vec<String> {
    let lines: Vec<&str> = text.split('\n').collect();
    if lines.len() < 3 {
        return Vec::new();
    }

    let mut names: Vec<String> = lines[1..lines.len() - 1]
        .iter()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split(" = ").collect();
            match parts.as_slice() {
                [_, name] => Some(name.trim().to_string()),
                _ => None,
            }
        })
        .filter(|name| !name.is_empty())
        .collect();
    names.sort();
    names.dedup();
    names
}

/// Names from the `L` binding when the service answers with structured
/// bindings instead of text.
fn names_from_binding(result: &QueryResult) -> Option<Vec<String>> {
    let list = result.binding("L")?.as_array()?;
    let mut names: Vec<String> = list
        .iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect();
    names.sort();
    names.dedup();
    Some(names)
}

/// Population state of a [`PredicateNameCache`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum NameCacheState {
    /// Nothing requested yet
    #[default]
    Empty,
    /// Enumeration query in flight
    Pending,
    /// Names available
    Ready(Vec<String>),
    /// Enumeration failed; no further attempt until invalidated
    Failed,
}

fn lock(state: &Mutex<NameCacheState>) -> MutexGuard<'_, NameCacheState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Lazily populated list of predicate and module names.
pub struct PredicateNameCache {
    client: Arc<dyn QueryClient>,
    query: String,
    score: i32,
    source_tag: String,
    state: Arc<Mutex<NameCacheState>>,
}

impl PredicateNameCache {
    /// Cache filled by running `query` through `client`; completions carry
    /// `score` and `source_tag`.
    pub fn new(
        client: Arc<dyn QueryClient>,
        query: impl Into<String>,
        score: i32,
        source_tag: impl Into<String>,
    ) -> Self {
        Self {
            client,
            query: query.into(),
            score,
            source_tag: source_tag.into(),
            state: Arc::new(Mutex::new(NameCacheState::Empty)),
        }
    }

    /// Current state.
    pub fn state(&self) -> NameCacheState {
        lock(&self.state).clone()
    }

    /// Forget the cached names; the next use enumerates again.
    pub fn invalidate(&self) {
        *lock(&self.state) = NameCacheState::Empty;
    }

    /// Cached names, starting the enumeration on first use.
    ///
    /// Returns `None` until the enumeration has answered. Without a
    /// connection nothing is sent and a later call tries again.
    pub fn names(&self) -> Option<Vec<String>> {
        {
            let mut state = lock(&self.state);
            match &*state {
                NameCacheState::Ready(names) => return Some(names.clone()),
                NameCacheState::Pending | NameCacheState::Failed => return None,
                NameCacheState::Empty => {
                    if !self.client.is_connected() {
                        debug!("Not connected, predicate names not requested");
                        return None;
                    }
                    *state = NameCacheState::Pending;
                }
            }
        }

        self.populate();

        match &*lock(&self.state) {
            NameCacheState::Ready(names) => Some(names.clone()),
            _ => None,
        }
    }

    fn populate(&self) {
        let handle = match self.client.create() {
            Ok(handle) => handle,
            Err(e) => {
                debug!("Predicate name enumeration not started: {}", e);
                *lock(&self.state) = NameCacheState::Empty;
                return;
            }
        };

        info!(query_id = %handle.id(), "Enumerating predicate names");
        let state = Arc::clone(&self.state);
        let release = ReleaseOnce::new(Arc::clone(&handle));
        let on_result = release_after_first(&release, move |result| {
            let names = match result.solution_text() {
                Some(text) => Some(parse_predicate_names(text)),
                None => names_from_binding(&result),
            };
            let next = match (names, &result) {
                (Some(names), _) => {
                    debug!(count = names.len(), "Predicate names cached");
                    NameCacheState::Ready(names)
                }
                (None, QueryResult::Error { message }) => {
                    warn!("Predicate name enumeration failed: {}", message);
                    NameCacheState::Failed
                }
                (None, _) => {
                    warn!("Predicate name enumeration returned no names");
                    NameCacheState::Failed
                }
            };
            *lock(&state) = next;
        });
        handle.evaluate(&self.query, QueryMode::All, on_result);
    }
}

impl CompletionSource for PredicateNameCache {
    fn completions(&self, _context: &CompletionContext, prefix: &str) -> Vec<Completion> {
        let Some(names) = self.names() else {
            return Vec::new();
        };
        names
            .iter()
            .filter(|name| name.starts_with(prefix))
            .map(|name| Completion::new(name.as_str(), self.score, self.source_tag.as_str()))
            .collect()
    }
}
