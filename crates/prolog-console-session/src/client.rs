//! Collaborator traits the console talks to.
//!
//! The remote query client, the editor widget and the embedder's observers
//! all live outside this crate. Callbacks handed to a [`QueryHandle`] may run
//! synchronously inside the call or later from another thread, so every
//! trait here is `Send + Sync`.

use std::sync::Arc;

use prolog_console_core::{ConsoleCommand, KeyChord, QueryId, QueryMode, QueryResult, Result};

/// Callback invoked once per answer of an evaluated query.
pub type ResultCallback = Box<dyn FnMut(QueryResult) + Send + 'static>;

/// Factory for remote query handles.
pub trait QueryClient: Send + Sync {
    /// Whether a live connection to the query service exists.
    fn is_connected(&self) -> bool;

    /// Open a new server-side query.
    ///
    /// Returns [`prolog_console_core::Error::NotConnected`] when there is no
    /// live connection. The identifier is available immediately, before the
    /// service has evaluated anything.
    fn create(&self) -> Result<Arc<dyn QueryHandle>>;
}

/// One server-side query.
///
/// `release` must be called exactly once per handle, otherwise the
/// server-side resources leak.
pub trait QueryHandle: Send + Sync {
    /// Identifier assigned by the client.
    fn id(&self) -> QueryId;

    /// Whether the service reported that no further answers will follow.
    fn is_finished(&self) -> bool;

    /// Start evaluating `query`; answers are delivered through `on_result`.
    fn evaluate(&self, query: &str, mode: QueryMode, on_result: ResultCallback);

    /// Request the next solution of an incrementally evaluated query.
    fn advance(&self, on_result: ResultCallback);

    /// Release the server-side query.
    fn release(&self);
}

/// The query input widget.
pub trait Editor: Send + Sync {
    /// Current contents.
    fn text(&self) -> String;

    /// Replace the contents and put the caret after the last character.
    fn set_text(&self, value: &str);

    /// Move keyboard focus to the editor.
    fn focus(&self);

    /// Register `command` under `chord`.
    fn bind_command(&self, command: ConsoleCommand, chord: KeyChord);
}

/// Observer of query lifecycle events. Every method defaults to a no-op.
///
/// Calls for one console never overlap and arrive in event order, though
/// possibly on the thread that delivered an answer. An observer may call
/// back into the console; those events are delivered after it returns.
pub trait ConsoleObserver: Send + Sync {
    /// A query was submitted and given `id`.
    fn on_query_submitted(&self, _id: &QueryId, _query: &str) {}

    /// An answer arrived for the active query `id`.
    fn on_answer(&self, _id: &QueryId, _result: &QueryResult) {}

    /// The query `id` was released.
    fn on_session_finished(&self, _id: &QueryId) {}
}

/// Observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ConsoleObserver for NoopObserver {}
