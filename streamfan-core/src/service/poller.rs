use tracing::info;

use super::cursor::{CursorTracker, ShardPoll};
use crate::models::Stream;
use crate::source::Record;

/// Reads new records from every shard of a stream
#[derive(Clone)]
pub struct RecordPoller {
    tracker: CursorTracker,
}

impl RecordPoller {
    #[must_use]
    pub fn new(tracker: CursorTracker) -> Self {
        Self { tracker }
    }

    /// Poll each shard once, in shard order, and return everything read.
    ///
    /// Records keep source order within a shard. Shards the source reports
    /// as gone are removed from `stream`.
    pub async fn poll(&self, stream: &mut Stream) -> Vec<Record> {
        let mut records = Vec::new();
        let mut retired = Vec::new();

        for shard in stream.shards.values_mut() {
            match self.tracker.poll(&stream.name, shard).await {
                ShardPoll::Records(batch) => records.extend(batch),
                ShardPoll::Idle => {}
                ShardPoll::Retired => retired.push(shard.id.clone()),
            }
        }

        for shard_id in retired {
            stream.remove_shard(&shard_id);
            info!(stream = %stream.name, shard = %shard_id, "Removed retired shard");
        }

        records
    }
}
