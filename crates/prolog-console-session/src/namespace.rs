//! Namespace prefix map kept in sync with the query service.
//!
//! The map is refreshed by a background task that periodically asks the
//! service for its registered `prefix -> uri` pairs.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use prolog_console_core::{Error, NamespaceSettings, QueryMode, QueryResult, Result};

use crate::client::QueryClient;
use crate::session::{release_after_first, ReleaseOnce};

/// Registered namespaces, keyed by URI.
#[derive(Debug, Default)]
pub struct NamespacePrefixMap {
    by_uri: RwLock<BTreeMap<String, String>>,
}

impl NamespacePrefixMap {
    /// Empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the contents with `(prefix, uri)` pairs.
    pub fn replace_all<I>(&self, pairs: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let by_uri = pairs.into_iter().map(|(prefix, uri)| (uri, prefix)).collect();
        *self.by_uri.write().unwrap_or_else(PoisonError::into_inner) = by_uri;
    }

    /// Prefix registered for exactly `uri`.
    pub fn prefix_for(&self, uri: &str) -> Option<String> {
        self.by_uri
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(uri)
            .cloned()
    }

    /// Shorten `iri` to `prefix:local` using the longest matching namespace.
    ///
    /// # Example
    /// ```
    /// use prolog_console_session::NamespacePrefixMap;
    ///
    /// let map = NamespacePrefixMap::new();
    /// map.replace_all([("rdf".to_string(), "http://www.w3.org/1999/02/22-rdf-syntax-ns#".to_string())]);
    /// assert_eq!(
    ///     map.abbreviate("http://www.w3.org/1999/02/22-rdf-syntax-ns#type").as_deref(),
    ///     Some("rdf:type")
    /// );
    /// ```
    pub fn abbreviate(&self, iri: &str) -> Option<String> {
        let by_uri = self.by_uri.read().unwrap_or_else(PoisonError::into_inner);
        by_uri
            .iter()
            .filter(|(uri, _)| iri.starts_with(uri.as_str()))
            .max_by_key(|(uri, _)| uri.len())
            .map(|(uri, prefix)| format!("{}:{}", prefix, &iri[uri.len()..]))
    }

    /// Number of namespaces.
    pub fn len(&self) -> usize {
        self.by_uri
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no namespace is known.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the contents as `uri -> prefix`.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.by_uri
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Read the `(prefix, uri)` pairs bound to `L`.
///
/// `L` must be a list of two-element `[Prefix, URI]` lists. A query without
/// solutions yields no pairs.
pub fn parse_prefix_pairs(result: &QueryResult) -> Result<Vec<(String, String)>> {
    match result {
        QueryResult::Exhausted => return Ok(Vec::new()),
        QueryResult::Error { message } => return Err(Error::Other(message.clone())),
        QueryResult::Solution { .. } => {}
    }

    let list = result
        .binding("L")
        .and_then(|v| v.as_array())
        .ok_or_else(|| Error::ParseError("expected a list bound to L".to_string()))?;

    list.iter()
        .map(|entry| match entry.as_array().map(Vec::as_slice) {
            Some([prefix, uri]) => match (prefix.as_str(), uri.as_str()) {
                (Some(prefix), Some(uri)) => Ok((prefix.to_string(), uri.to_string())),
                _ => Err(Error::ParseError(format!("non-text prefix pair: {entry}"))),
            },
            _ => Err(Error::ParseError(format!("expected [Prefix, URI], got {entry}"))),
        })
        .collect()
}

/// Run `query` once and replace the contents of `map` with its answer.
///
/// Returns the number of namespaces now in the map. The handle is released
/// whether or not an answer arrives within `timeout`.
pub async fn refresh_once(
    client: &Arc<dyn QueryClient>,
    query: &str,
    map: &NamespacePrefixMap,
    timeout: Duration,
) -> Result<usize> {
    if !client.is_connected() {
        return Err(Error::NotConnected);
    }
    let handle = client.create()?;
    let id = handle.id();
    let release = ReleaseOnce::new(Arc::clone(&handle));

    let (tx, rx) = oneshot::channel();
    handle.evaluate(
        query,
        QueryMode::All,
        release_after_first(&release, move |result| {
            let _ = tx.send(result);
        }),
    );

    let result = match tokio::time::timeout(timeout, rx).await {
        Ok(Ok(result)) => result,
        Ok(Err(_)) => {
            release.release();
            return Err(Error::HandleReleased(id));
        }
        Err(_) => {
            release.release();
            return Err(Error::Timeout(timeout.as_millis() as u64));
        }
    };

    if let QueryResult::Error { message } = result {
        return Err(Error::QueryFailed { id, message });
    }
    let pairs = parse_prefix_pairs(&result)?;
    map.replace_all(pairs);
    Ok(map.len())
}

struct RefresherState {
    stop_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

/// Background task keeping a [`NamespacePrefixMap`] up to date.
pub struct NamespaceRefresher {
    state: Option<RefresherState>,
}

impl NamespaceRefresher {
    /// Spawn the refresh task on the current tokio runtime.
    ///
    /// The first refresh runs immediately, then every
    /// `settings.refresh_interval_ms`.
    pub fn start(
        client: Arc<dyn QueryClient>,
        map: Arc<NamespacePrefixMap>,
        settings: &NamespaceSettings,
    ) -> Result<Self> {
        if settings.refresh_interval_ms == 0 {
            return Err(Error::Config(
                "namespaces.refresh_interval_ms must be greater than 0".to_string(),
            ));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Other(format!("namespace refresher needs a tokio runtime: {e}")))?;

        let period = Duration::from_millis(settings.refresh_interval_ms);
        let query = settings.query.clone();
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let task = runtime.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = interval.tick() => {
                        match refresh_once(&client, &query, &map, period).await {
                            Ok(count) => debug!(count, "Namespace prefixes refreshed"),
                            Err(Error::NotConnected) => debug!("Not connected, namespace refresh skipped"),
                            Err(error) => warn!(error = %error, "Namespace refresh failed"),
                        }
                    }
                }
            }
        });

        info!(interval_ms = settings.refresh_interval_ms, "Namespace refresher started");
        Ok(Self {
            state: Some(RefresherState {
                stop_tx: Some(stop_tx),
                task,
            }),
        })
    }

    /// Whether the task has been started and not stopped.
    pub fn is_running(&self) -> bool {
        self.state
            .as_ref()
            .is_some_and(|state| !state.task.is_finished())
    }

    /// Stop the task and wait for it to exit.
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(mut state) = self.state.take() {
            if let Some(stop_tx) = state.stop_tx.take() {
                let _ = stop_tx.send(());
            }
            state
                .task
                .await
                .map_err(|e| Error::Other(format!("namespace refresher join failed: {e}")))?;
            info!("Namespace refresher stopped");
        }
        Ok(())
    }
}

impl Drop for NamespaceRefresher {
    fn drop(&mut self) {
        if let Some(state) = self.state.take() {
            state.task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedClient;
    use serde_json::json;

    const QUERY: &str = "findall([P,U], rdf_current_prefix(P,U), L)";

    fn pairs_result() -> QueryResult {
        QueryResult::solution([(
            "L",
            json!([
                ["rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#"],
                ["ex", "http://example.org/"],
                ["exv", "http://example.org/vocab/"]
            ]),
        )])
    }

    fn settings(interval_ms: u64) -> NamespaceSettings {
        NamespaceSettings {
            enabled: true,
            refresh_interval_ms: interval_ms,
            query: QUERY.to_string(),
        }
    }

    #[test]
    fn test_parse_prefix_pairs() {
        let pairs = parse_prefix_pairs(&pairs_result()).unwrap();
        assert_eq!(pairs.len(), 3);
        assert_eq!(
            pairs[1],
            ("ex".to_string(), "http://example.org/".to_string())
        );
    }

    #[test]
    fn test_parse_prefix_pairs_rejects_malformed() {
        let bad = QueryResult::solution([("L", json!([["only_one"]]))]);
        assert!(matches!(parse_prefix_pairs(&bad), Err(Error::ParseError(_))));

        let missing = QueryResult::solution([("X", json!(1))]);
        assert!(parse_prefix_pairs(&missing).is_err());

        assert!(parse_prefix_pairs(&QueryResult::Exhausted).unwrap().is_empty());
    }

    #[test]
    fn test_abbreviate_uses_longest_namespace() {
        let map = NamespacePrefixMap::new();
        map.replace_all(parse_prefix_pairs(&pairs_result()).unwrap());

        assert_eq!(
            map.abbreviate("http://example.org/vocab/Person").as_deref(),
            Some("exv:Person")
        );
        assert_eq!(
            map.abbreviate("http://example.org/alice").as_deref(),
            Some("ex:alice")
        );
        assert_eq!(map.abbreviate("urn:isbn:123"), None);
        assert_eq!(map.prefix_for("http://example.org/").as_deref(), Some("ex"));
    }

    #[test]
    fn test_replace_all_drops_old_entries() {
        let map = NamespacePrefixMap::new();
        map.replace_all([("a".to_string(), "urn:a:".to_string())]);
        map.replace_all([("b".to_string(), "urn:b:".to_string())]);

        assert_eq!(map.len(), 1);
        assert_eq!(map.prefix_for("urn:a:"), None);
        assert_eq!(map.snapshot().get("urn:b:").map(String::as_str), Some("b"));
    }

    #[tokio::test]
    async fn test_refresh_once() {
        let client = Arc::new(ScriptedClient::new());
        client.reply_to("findall([P,U]", pairs_result());
        let dyn_client: Arc<dyn QueryClient> = client.clone();
        let map = NamespacePrefixMap::new();

        let count = refresh_once(&dyn_client, QUERY, &map, Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(count, 3);
        assert_eq!(client.last_handle().unwrap().mode(), Some(QueryMode::All));
        assert_eq!(client.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_refresh_once_timeout_releases_handle() {
        let client = Arc::new(ScriptedClient::new());
        let dyn_client: Arc<dyn QueryClient> = client.clone();
        let map = NamespacePrefixMap::new();

        let result = refresh_once(&dyn_client, QUERY, &map, Duration::from_millis(20)).await;

        assert!(matches!(result, Err(Error::Timeout(20))));
        assert_eq!(client.outstanding(), 0);
        assert!(map.is_empty());
    }

    #[tokio::test]
    async fn test_late_answer_after_timeout_does_not_release_again() {
        let client = Arc::new(ScriptedClient::new());
        client.retain_callbacks_on_release();
        let dyn_client: Arc<dyn QueryClient> = client.clone();
        let map = NamespacePrefixMap::new();

        let result = refresh_once(&dyn_client, QUERY, &map, Duration::from_millis(10)).await;
        assert!(matches!(result, Err(Error::Timeout(10))));

        let handle = client.last_handle().unwrap();
        assert_eq!(handle.release_count(), 1);
        assert!(handle.has_pending_callback());

        assert!(handle.deliver(QueryResult::Exhausted));
        assert_eq!(handle.release_count(), 1);
        assert!(map.is_empty());
    }

    #[tokio::test]
    async fn test_dropped_callback_releases_handle() {
        let client = Arc::new(ScriptedClient::new());
        let dyn_client: Arc<dyn QueryClient> = client.clone();
        let map = NamespacePrefixMap::new();

        let refresh = refresh_once(&dyn_client, QUERY, &map, Duration::from_secs(2));
        let drop_callback = async {
            loop {
                if let Some(callback) = client.last_handle().and_then(|h| h.detach_callback()) {
                    drop(callback);
                    break;
                }
                tokio::task::yield_now().await;
            }
        };
        let (result, ()) = tokio::join!(refresh, drop_callback);

        assert!(matches!(result, Err(Error::HandleReleased(_))));
        assert_eq!(client.last_handle().unwrap().release_count(), 1);
        assert_eq!(client.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_refresh_once_query_error() {
        let client = Arc::new(ScriptedClient::new());
        client.reply_to("findall([P,U]", QueryResult::error("existence_error"));
        let dyn_client: Arc<dyn QueryClient> = client.clone();

        let result =
            refresh_once(&dyn_client, QUERY, &NamespacePrefixMap::new(), Duration::from_secs(1))
                .await;
        assert!(matches!(result, Err(Error::QueryFailed { .. })));
    }

    #[tokio::test]
    async fn test_refresher_updates_map_until_stopped() {
        let client = Arc::new(ScriptedClient::new());
        client.reply_to("findall([P,U]", pairs_result());
        let map = Arc::new(NamespacePrefixMap::new());

        let mut refresher =
            NamespaceRefresher::start(client.clone(), map.clone(), &settings(10)).unwrap();
        assert!(refresher.is_running());

        tokio::time::timeout(Duration::from_secs(2), async {
            while client.created() < 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(map.len(), 3);

        refresher.stop().await.unwrap();
        assert!(!refresher.is_running());

        let created = client.created();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(client.created(), created);
        assert_eq!(client.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_refresher_skips_while_disconnected() {
        let client = Arc::new(ScriptedClient::disconnected());
        let map = Arc::new(NamespacePrefixMap::new());
        let mut refresher =
            NamespaceRefresher::start(client.clone(), map.clone(), &settings(10)).unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;
        refresher.stop().await.unwrap();

        assert_eq!(client.created(), 0);
        assert!(map.is_empty());
    }

    #[test]
    fn test_start_requires_runtime() {
        let client = Arc::new(ScriptedClient::new());
        let result =
            NamespaceRefresher::start(client, Arc::new(NamespacePrefixMap::new()), &settings(10));
        assert!(matches!(result, Err(Error::Other(_))));
    }

    #[tokio::test]
    async fn test_start_rejects_zero_interval() {
        let client = Arc::new(ScriptedClient::new());
        let result =
            NamespaceRefresher::start(client, Arc::new(NamespacePrefixMap::new()), &settings(0));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
