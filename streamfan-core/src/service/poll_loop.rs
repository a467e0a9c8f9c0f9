//! Steady-state cycle
//!
//! reconcile → refresh shards → refresh subscribers → poll → dispatch →
//! checkpoint → sleep. Processing is sequential; only delivery retries run
//! outside the loop.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use super::{CheckpointStore, DeliveryDispatcher, RecordPoller, StreamReconciler, SubscriberDirectory};
use crate::models::StreamSet;
use crate::source::StreamCatalog;

/// What one cycle did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Streams processed this cycle
    pub streams: usize,
    /// Records read across all streams
    pub records: usize,
    pub deliveries_failed: usize,
    pub retries_scheduled: usize,
}

pub struct PollLoop {
    streams: StreamSet,
    catalog: Arc<dyn StreamCatalog>,
    reconciler: StreamReconciler,
    poller: RecordPoller,
    directory: SubscriberDirectory,
    dispatcher: DeliveryDispatcher,
    checkpoint: CheckpointStore,
    interval: Duration,
}

impl PollLoop {
    #[must_use]
    pub fn new(
        catalog: Arc<dyn StreamCatalog>,
        reconciler: StreamReconciler,
        poller: RecordPoller,
        directory: SubscriberDirectory,
        dispatcher: DeliveryDispatcher,
        checkpoint: CheckpointStore,
        interval: Duration,
    ) -> Self {
        Self {
            streams: StreamSet::new(),
            catalog,
            reconciler,
            poller,
            directory,
            dispatcher,
            checkpoint,
            interval,
        }
    }

    /// Start from the last checkpoint (or empty on a cold start)
    pub async fn restore(&mut self) {
        self.streams = self.checkpoint.load().await;
    }

    #[must_use]
    pub fn streams(&self) -> &StreamSet {
        &self.streams
    }

    #[must_use]
    pub fn dispatcher(&self) -> &DeliveryDispatcher {
        &self.dispatcher
    }

    /// Run one full cycle.
    ///
    /// Returns `None` if `shutdown` fired while waiting on discovery; the
    /// stream set is left as it was.
    #[instrument(name = "cycle", skip_all)]
    pub async fn run_cycle(&mut self, shutdown: &CancellationToken) -> Option<CycleReport> {
        if !self.reconciler.discover(&mut self.streams, shutdown).await {
            return None;
        }

        let active = self.refresh_shards().await;
        let mut report = CycleReport {
            streams: active.len(),
            ..CycleReport::default()
        };

        for name in &active {
            let Some(stream) = self.streams.get_mut(name) else {
                continue;
            };
            self.directory.refresh(stream).await;
        }

        for name in &active {
            let Some(stream) = self.streams.get_mut(name) else {
                continue;
            };
            let records = self.poller.poll(stream).await;
            if records.is_empty() {
                continue;
            }
            report.records += records.len();

            let subscribers: Vec<String> = stream.subscribers.iter().cloned().collect();
            for record in records {
                let fanout = self
                    .dispatcher
                    .dispatch(name, subscribers.iter().map(String::as_str), record.data)
                    .await;
                report.deliveries_failed += fanout.failed;
                report.retries_scheduled += fanout.retries_scheduled;
            }
        }

        self.checkpoint.save(&self.streams).await;

        debug!(
            streams = report.streams,
            records = report.records,
            deliveries_failed = report.deliveries_failed,
            "Cycle complete"
        );
        Some(report)
    }

    /// Merge current shard ids into every stream.
    ///
    /// Returns the names that refreshed successfully. A stream whose
    /// description fails is dropped from the set with all its state; the
    /// next reconciliation brings it back empty if it is still listed.
    async fn refresh_shards(&mut self) -> Vec<String> {
        let mut active = Vec::with_capacity(self.streams.len());
        let mut failed = Vec::new();

        for stream in self.streams.iter_mut() {
            match self.catalog.describe_stream(&stream.name).await {
                Ok(shard_ids) => {
                    let added = stream.merge_shard_ids(shard_ids);
                    if added > 0 {
                        info!(stream = %stream.name, added, "Discovered new shards");
                    }
                    active.push(stream.name.clone());
                }
                Err(e) => {
                    error!(
                        stream = %stream.name,
                        error = %e,
                        "Failed to describe stream, dropping it this cycle"
                    );
                    failed.push(stream.name.clone());
                }
            }
        }

        for name in &failed {
            self.streams.remove(name);
        }

        active
    }

    /// Cycle until `shutdown` fires, then save a final checkpoint.
    pub async fn run(mut self, shutdown: CancellationToken) -> StreamSet {
        info!(interval = ?self.interval, "Poll loop started");

        while !shutdown.is_cancelled() {
            if self.run_cycle(&shutdown).await.is_none() {
                break;
            }

            tokio::select! {
                () = shutdown.cancelled() => break,
                () = tokio::time::sleep(self.interval) => {}
            }
        }

        info!("Poll loop stopping, saving final checkpoint");
        self.checkpoint.save(&self.streams).await;
        self.streams
    }
}
