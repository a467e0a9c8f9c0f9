use std::sync::Arc;

use tracing::{error, info};

use crate::models::StreamSet;
use crate::repository::CheckpointBackend;
use crate::Result;

/// Persists the whole stream set as one JSON snapshot
#[derive(Clone)]
pub struct CheckpointStore {
    backend: Arc<dyn CheckpointBackend>,
}

impl CheckpointStore {
    #[must_use]
    pub fn new(backend: Arc<dyn CheckpointBackend>) -> Self {
        Self { backend }
    }

    /// Overwrite the snapshot with `streams`.
    ///
    /// Failures are logged and reported as `false`; in-memory state is the
    /// source of truth until the next successful save.
    pub async fn save(&self, streams: &StreamSet) -> bool {
        match self.try_save(streams).await {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, streams = streams.len(), "Failed to save checkpoint");
                false
            }
        }
    }

    async fn try_save(&self, streams: &StreamSet) -> Result<()> {
        let snapshot = serde_json::to_string(streams)?;
        self.backend.write(&snapshot).await
    }

    /// Load the last snapshot.
    ///
    /// Absent, malformed or unreachable state all mean a cold start with an
    /// empty set.
    pub async fn load(&self) -> StreamSet {
        let snapshot = match self.backend.read().await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                info!("No checkpoint found, starting fresh");
                return StreamSet::new();
            }
            Err(e) => {
                error!(error = %e, "Failed to read checkpoint, starting fresh");
                return StreamSet::new();
            }
        };

        match serde_json::from_str::<StreamSet>(&snapshot) {
            Ok(streams) => {
                info!(streams = streams.len(), "Restored checkpoint");
                streams
            }
            Err(e) => {
                error!(error = %e, "Checkpoint is malformed, starting fresh");
                StreamSet::new()
            }
        }
    }
}
