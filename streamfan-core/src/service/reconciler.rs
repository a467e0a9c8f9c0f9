//! Stream-set reconciliation
//!
//! The catalog's listing is authoritative: streams it no longer reports are
//! retired together with their state, new names start empty, and streams it
//! keeps reporting carry their shard and subscriber state forward untouched.

use std::sync::Arc;
use std::time::Duration;

use backon::ConstantBuilder;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::models::{Stream, StreamSet};
use crate::resilience::retry;
use crate::source::StreamCatalog;

/// Merge the authoritative name list into the known set.
///
/// Result order follows `authoritative`; duplicate names count once.
pub fn reconcile<I, S>(mut known: StreamSet, authoritative: I) -> StreamSet
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut next = StreamSet::new();
    for name in authoritative {
        let name = name.into();
        if next.contains(&name) {
            continue;
        }
        let stream = known.remove(&name).unwrap_or_else(|| Stream::new(name));
        next.insert(stream);
    }
    next
}

pub struct StreamReconciler {
    catalog: Arc<dyn StreamCatalog>,
    backoff: ConstantBuilder,
    retry_delay: Duration,
}

impl StreamReconciler {
    /// Reconciler retrying an unreachable catalog every `retry_delay`, forever
    #[must_use]
    pub fn new(catalog: Arc<dyn StreamCatalog>, retry_delay: Duration) -> Self {
        Self {
            catalog,
            backoff: retry::discovery_backoff(retry_delay),
            retry_delay,
        }
    }

    /// Replace the retry policy
    #[must_use]
    pub fn with_backoff(mut self, backoff: ConstantBuilder) -> Self {
        self.backoff = backoff;
        self
    }

    /// Fetch the authoritative stream names, retrying until the catalog answers.
    ///
    /// Returns `None` only when `shutdown` fires first.
    pub async fn fetch_names(&self, shutdown: &CancellationToken) -> Option<Vec<String>> {
        let mut backoff = retry::start(&self.backoff);
        let mut attempt: u64 = 0;

        loop {
            attempt += 1;
            let result = tokio::select! {
                () = shutdown.cancelled() => return None,
                result = self.catalog.list_streams() => result,
            };

            match result {
                Ok(names) => return Some(names),
                Err(e) => {
                    let delay = retry::next_delay(&mut backoff, self.retry_delay);
                    error!(
                        error = %e,
                        attempt,
                        retry_in = ?delay,
                        "Failed to retrieve streams information, retrying"
                    );
                    tokio::select! {
                        () = shutdown.cancelled() => return None,
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    /// Reconcile `streams` in place against the catalog.
    ///
    /// Blocks until the catalog answers. Returns `false` (leaving `streams`
    /// untouched) only when `shutdown` fires first.
    pub async fn discover(&self, streams: &mut StreamSet, shutdown: &CancellationToken) -> bool {
        let Some(names) = self.fetch_names(shutdown).await else {
            return false;
        };

        let known = std::mem::take(streams);
        let before: Vec<String> = known.names().map(str::to_string).collect();
        *streams = reconcile(known, names);

        let added = streams.names().filter(|n| !before.iter().any(|b| b == n)).count();
        let retired = before.iter().filter(|b| !streams.contains(b)).count();
        if added > 0 || retired > 0 {
            info!(
                streams = streams.len(),
                added,
                retired,
                "Stream set changed"
            );
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Shard;
    use crate::source::MockStreamCatalog;
    use crate::Error;

    fn known_set() -> StreamSet {
        vec![
            Stream::new("A")
                .with_shard(Shard::new("s1").with_sequence_number("7").with_cursor("c"))
                .with_subscriber("http://a.example"),
            Stream::new("B").with_shard(Shard::new("s9")),
            Stream::new("C"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_reconcile_merge_law() {
        let known = known_set();
        let carried_a = known.get("A").cloned().unwrap();

        let result = reconcile(known, ["A", "D"]);

        assert_eq!(result.names().collect::<Vec<_>>(), vec!["A", "D"]);
        assert_eq!(result.get("A"), Some(&carried_a));
        assert_eq!(result.get("D"), Some(&Stream::new("D")));
        assert!(!result.contains("B"));
        assert!(!result.contains("C"));
    }

    #[test]
    fn test_reconcile_duplicates_and_empty() {
        let result = reconcile(known_set(), ["A", "A", "E", "E"]);
        assert_eq!(result.len(), 2);
        assert_eq!(result.get("A").unwrap().shards.len(), 1);

        let result = reconcile(known_set(), Vec::<String>::new());
        assert!(result.is_empty());
    }

    #[test]
    fn test_retired_stream_state_is_not_resurrected() {
        let dropped = reconcile(known_set(), ["A"]);
        let back = reconcile(dropped, ["A", "B"]);

        assert_eq!(back.get("B"), Some(&Stream::new("B")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_discover_retries_with_fixed_delay() {
        let mut catalog = MockStreamCatalog::new();
        let mut calls = 0;
        catalog.expect_list_streams().times(3).returning(move || {
            calls += 1;
            if calls < 3 {
                Err(Error::DiscoveryUnavailable("connection refused".to_string()))
            } else {
                Ok(vec!["A".to_string(), "D".to_string()])
            }
        });

        let reconciler = StreamReconciler::new(Arc::new(catalog), Duration::from_secs(30));
        let mut streams = known_set();
        let started = tokio::time::Instant::now();

        let done = reconciler.discover(&mut streams, &CancellationToken::new()).await;

        assert!(done);
        assert_eq!(started.elapsed(), Duration::from_secs(60));
        assert_eq!(streams.names().collect::<Vec<_>>(), vec!["A", "D"]);
        assert_eq!(streams.get("A").unwrap().subscribers.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_discover_stops_on_shutdown() {
        let mut catalog = MockStreamCatalog::new();
        catalog
            .expect_list_streams()
            .returning(|| Err(Error::DiscoveryUnavailable("down".to_string())));

        let reconciler = StreamReconciler::new(Arc::new(catalog), Duration::from_secs(30));
        let shutdown = CancellationToken::new();
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(95)).await;
            trigger.cancel();
        });

        let mut streams = known_set();
        let done = reconciler.discover(&mut streams, &shutdown).await;

        assert!(!done);
        assert_eq!(streams, known_set());
    }
}
