//! The local representative of one in-flight remote query.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use tracing::{debug, info, warn};

use prolog_console_core::{QueryId, QueryMode, QueryResult, Result};

use crate::client::{QueryClient, QueryHandle, ResultCallback};

/// A query session.
///
/// Owns its remote handle and releases it at most once, no matter how many
/// times [`QuerySession::finish`] is called.
pub struct QuerySession {
    /// Identifier assigned by the query client
    id: QueryId,

    /// Goal text sent to the service
    query: String,

    /// Remote handle
    handle: Arc<dyn QueryHandle>,

    /// Set once the handle has been released
    released: AtomicBool,

    /// Session creation time
    created_at: SystemTime,
}

impl QuerySession {
    /// Open a new remote query for `query` without evaluating it yet.
    pub fn open(client: &dyn QueryClient, query: impl Into<String>) -> Result<Self> {
        let handle = client.create()?;
        let id = handle.id();
        let query = query.into();
        info!(query_id = %id, "Opened query session: '{}'", query);

        Ok(Self {
            id,
            query,
            handle,
            released: AtomicBool::new(false),
            created_at: SystemTime::now(),
        })
    }

    /// Get the query ID.
    pub fn id(&self) -> &QueryId {
        &self.id
    }

    /// Get the goal text.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Get the session creation time.
    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// Whether the handle has been released.
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// Whether no further solutions can be requested.
    pub fn is_finished(&self) -> bool {
        self.is_released() || self.handle.is_finished()
    }

    /// Evaluate the goal; answers go to `on_result`.
    pub fn evaluate(&self, mode: QueryMode, on_result: ResultCallback) {
        if self.is_released() {
            warn!(query_id = %self.id, "Evaluate on released query session ignored");
            return;
        }
        debug!(query_id = %self.id, ?mode, "Evaluating query");
        self.handle.evaluate(&self.query, mode, on_result);
    }

    /// Request the next solution; answers go to `on_result`.
    pub fn advance(&self, on_result: ResultCallback) {
        if self.is_finished() {
            debug!(query_id = %self.id, "Advance on finished query session ignored");
            return;
        }
        debug!(query_id = %self.id, "Requesting next solution");
        self.handle.advance(on_result);
    }

    /// Release the remote handle.
    ///
    /// Returns `true` only for the call that actually released it.
    pub fn finish(&self) -> bool {
        if self.released.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.handle.release();
        info!(query_id = %self.id, "Query session finished");
        true
    }
}

impl Drop for QuerySession {
    fn drop(&mut self) {
        if !self.is_released() {
            warn!(query_id = %self.id, "Query session dropped while open, releasing");
            self.finish();
        }
    }
}

/// Releases a handle at most once, whichever path gets there first.
///
/// Shared between an answer callback and the caller's error paths for
/// one-shot handles that never become a [`QuerySession`].
pub(crate) struct ReleaseOnce {
    handle: Arc<dyn QueryHandle>,
    released: AtomicBool,
}

impl ReleaseOnce {
    pub(crate) fn new(handle: Arc<dyn QueryHandle>) -> Arc<Self> {
        Arc::new(Self {
            handle,
            released: AtomicBool::new(false),
        })
    }

    /// Returns `true` only for the call that actually released the handle.
    pub(crate) fn release(&self) -> bool {
        if self.released.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.handle.release();
        true
    }
}

/// Wrap `on_result` so the handle is released after the first answer.
pub(crate) fn release_after_first<F>(release: &Arc<ReleaseOnce>, on_result: F) -> ResultCallback
where
    F: FnOnce(QueryResult) + Send + 'static,
{
    let mut pending = Some((Arc::clone(release), on_result));
    Box::new(move |result| {
        if let Some((release, on_result)) = pending.take() {
            on_result(result);
            release.release();
        }
    })
}

impl std::fmt::Debug for QuerySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuerySession")
            .field("id", &self.id)
            .field("query", &self.query)
            .field("released", &self.is_released())
            .finish()
    }
}
