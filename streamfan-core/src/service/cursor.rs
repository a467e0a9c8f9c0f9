//! Per-shard cursor lifecycle
//!
//! A shard is in one of two resting states: no cursor held, or a cursor
//! held. Each poll walks it through
//!
//! ```text
//! NoCursor --acquire--> HasCursor --read ok--> HasCursor | NoCursor (no continuation)
//!    |                      |
//!    | not found            | expired: drop cursor, reacquire once
//!    v                      v
//! Retired               NoCursor (second expiry, wait for next cycle)
//! ```
//!
//! Reads resume strictly after the last recorded sequence number, or from
//! the start of the retained log when nothing has been read yet.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::error::SourceError;
use crate::models::Shard;
use crate::source::{Record, RecordBatch, RecordSource};

/// Re-acquisitions allowed after an expired cursor within one poll
const MAX_EXPIRY_FALLBACKS: usize = 1;

/// Outcome of polling one shard
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShardPoll {
    /// Records read this call, possibly empty
    Records(Vec<Record>),
    /// Nothing could be read this cycle; state is kept for the next one
    Idle,
    /// The source no longer knows this shard; the owner should drop it
    Retired,
}

impl ShardPoll {
    #[must_use]
    pub fn into_records(self) -> Vec<Record> {
        match self {
            Self::Records(records) => records,
            Self::Idle | Self::Retired => Vec::new(),
        }
    }
}

enum Acquired {
    Cursor(String),
    Retired,
    Failed,
}

#[derive(Clone)]
pub struct CursorTracker {
    source: Arc<dyn RecordSource>,
    batch_limit: u32,
}

impl CursorTracker {
    #[must_use]
    pub fn new(source: Arc<dyn RecordSource>, batch_limit: u32) -> Self {
        Self {
            source,
            batch_limit,
        }
    }

    /// Read the next batch for `shard`, updating its progress in place.
    ///
    /// Errors never escape: they leave the shard in a state the next cycle
    /// can pick up from.
    pub async fn poll(&self, stream: &str, shard: &mut Shard) -> ShardPoll {
        let mut fallbacks = 0;

        loop {
            let cursor = match shard.cursor.clone() {
                Some(cursor) => cursor,
                None => match self.acquire(stream, shard).await {
                    Acquired::Cursor(cursor) => {
                        shard.cursor = Some(cursor.clone());
                        cursor
                    }
                    Acquired::Retired => return ShardPoll::Retired,
                    Acquired::Failed => return ShardPoll::Idle,
                },
            };

            match self.source.read_records(&cursor, self.batch_limit).await {
                Ok(batch) => return ShardPoll::Records(apply_batch(shard, batch)),
                Err(SourceError::ExpiredCursor(message)) => {
                    shard.cursor = None;
                    if fallbacks < MAX_EXPIRY_FALLBACKS {
                        fallbacks += 1;
                        debug!(
                            stream = %stream,
                            shard = %shard.id,
                            reason = %message,
                            "Cursor expired, reacquiring"
                        );
                        continue;
                    }
                    warn!(
                        stream = %stream,
                        shard = %shard.id,
                        reason = %message,
                        "Cursor expired again after reacquiring, retrying next cycle"
                    );
                    return ShardPoll::Idle;
                }
                Err(e) => {
                    error!(
                        stream = %stream,
                        shard = %shard.id,
                        error = %e,
                        "Failed to read records"
                    );
                    return ShardPoll::Idle;
                }
            }
        }
    }

    async fn acquire(&self, stream: &str, shard: &Shard) -> Acquired {
        match self
            .source
            .acquire_cursor(stream, &shard.id, shard.start_position())
            .await
        {
            Ok(cursor) => Acquired::Cursor(cursor),
            Err(e) if e.names_missing_shard(&shard.id) => {
                warn!(
                    stream = %stream,
                    shard = %shard.id,
                    error = %e,
                    "Shard no longer exists"
                );
                Acquired::Retired
            }
            Err(e) => {
                error!(
                    stream = %stream,
                    shard = %shard.id,
                    error = %e,
                    "Failed to acquire cursor"
                );
                Acquired::Failed
            }
        }
    }
}

fn apply_batch(shard: &mut Shard, batch: RecordBatch) -> Vec<Record> {
    let last = batch
        .last_sequence_number
        .or_else(|| batch.records.last().map(|r| r.sequence_number.clone()));
    if last.is_some() {
        shard.sequence_number = last;
    }
    shard.cursor = batch.next_cursor;
    batch.records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StartPosition;
    use crate::source::MockRecordSource;
    use mockall::predicate::eq;
    use mockall::Sequence;

    fn tracker(source: MockRecordSource) -> CursorTracker {
        CursorTracker::new(Arc::new(source), 100)
    }

    fn batch(records: &[(&str, &str)], next: Option<&str>) -> RecordBatch {
        RecordBatch {
            records: records.iter().map(|(seq, data)| Record::new(*seq, data.to_string())).collect(),
            next_cursor: next.map(str::to_string),
            last_sequence_number: None,
        }
    }

    #[tokio::test]
    async fn test_fresh_shard_reads_from_start() {
        let mut source = MockRecordSource::new();
        source
            .expect_acquire_cursor()
            .with(eq("orders"), eq("s1"), eq(StartPosition::FromStart))
            .times(1)
            .returning(|_, _, _| Ok("c1".to_string()));
        source
            .expect_read_records()
            .with(eq("c1"), eq(100_u32))
            .times(1)
            .returning(|_, _| Ok(batch(&[("1", "a"), ("2", "b")], Some("c2"))));

        let mut shard = Shard::new("s1");
        let outcome = tracker(source).poll("orders", &mut shard).await;

        assert_eq!(
            outcome,
            ShardPoll::Records(vec![Record::new("1", "a"), Record::new("2", "b")])
        );
        assert_eq!(shard.sequence_number.as_deref(), Some("2"));
        assert_eq!(shard.cursor.as_deref(), Some("c2"));
    }

    #[tokio::test]
    async fn test_resumes_after_recorded_sequence_number() {
        let mut source = MockRecordSource::new();
        source
            .expect_acquire_cursor()
            .with(
                eq("orders"),
                eq("s1"),
                eq(StartPosition::AfterSequenceNumber("41".to_string())),
            )
            .times(1)
            .returning(|_, _, _| Ok("c".to_string()));
        source
            .expect_read_records()
            .returning(|_, _| Ok(batch(&[("42", "x")], Some("c-next"))));

        let mut shard = Shard::new("s1").with_sequence_number("41");
        let records = tracker(source).poll("orders", &mut shard).await.into_records();

        assert_eq!(records, vec![Record::new("42", "x")]);
        assert_eq!(shard.sequence_number.as_deref(), Some("42"));
    }

    #[tokio::test]
    async fn test_empty_batch_keeps_sequence_number() {
        let mut source = MockRecordSource::new();
        source.expect_acquire_cursor().never();
        source
            .expect_read_records()
            .returning(|_, _| Ok(batch(&[], Some("c2"))));

        let mut shard = Shard::new("s1").with_sequence_number("9").with_cursor("c1");
        let outcome = tracker(source).poll("orders", &mut shard).await;

        assert_eq!(outcome, ShardPoll::Records(Vec::new()));
        assert_eq!(shard.sequence_number.as_deref(), Some("9"));
        assert_eq!(shard.cursor.as_deref(), Some("c2"));
    }

    #[tokio::test]
    async fn test_dropped_records_still_advance_sequence_number() {
        let mut source = MockRecordSource::new();
        source.expect_read_records().times(1).returning(|_, _| {
            Ok(RecordBatch {
                last_sequence_number: Some("2".to_string()),
                ..batch(&[("1", "ok")], Some("c2"))
            })
        });

        let mut shard = Shard::new("s1").with_cursor("c1");
        let outcome = tracker(source).poll("orders", &mut shard).await;

        assert_eq!(outcome, ShardPoll::Records(vec![Record::new("1", "ok")]));
        assert_eq!(shard.sequence_number.as_deref(), Some("2"));
        assert_eq!(shard.cursor.as_deref(), Some("c2"));
    }

    #[tokio::test]
    async fn test_missing_continuation_clears_cursor() {
        let mut source = MockRecordSource::new();
        source
            .expect_read_records()
            .returning(|_, _| Ok(batch(&[("5", "x")], None)));

        let mut shard = Shard::new("s1").with_cursor("c1");
        tracker(source).poll("orders", &mut shard).await;

        assert_eq!(shard.sequence_number.as_deref(), Some("5"));
        assert_eq!(shard.cursor, None);
    }

    #[tokio::test]
    async fn test_expired_cursor_reacquires_once() {
        let mut seq = Sequence::new();
        let mut source = MockRecordSource::new();
        source
            .expect_read_records()
            .with(eq("stale"), eq(100_u32))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(SourceError::ExpiredCursor("expired".to_string())));
        source
            .expect_acquire_cursor()
            .with(
                eq("orders"),
                eq("s1"),
                eq(StartPosition::AfterSequenceNumber("7".to_string())),
            )
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok("fresh".to_string()));
        source
            .expect_read_records()
            .with(eq("fresh"), eq(100_u32))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(batch(&[("8", "y")], Some("after"))));

        let mut shard = Shard::new("s1").with_sequence_number("7").with_cursor("stale");
        let records = tracker(source).poll("orders", &mut shard).await.into_records();

        assert_eq!(records, vec![Record::new("8", "y")]);
        assert_eq!(shard.cursor.as_deref(), Some("after"));
    }

    #[tokio::test]
    async fn test_second_expiry_gives_up_for_this_cycle() {
        let mut source = MockRecordSource::new();
        source
            .expect_read_records()
            .times(2)
            .returning(|_, _| Err(SourceError::ExpiredCursor("expired".to_string())));
        source
            .expect_acquire_cursor()
            .times(1)
            .returning(|_, _, _| Ok("fresh".to_string()));

        let mut shard = Shard::new("s1").with_sequence_number("7").with_cursor("stale");
        let outcome = tracker(source).poll("orders", &mut shard).await;

        assert_eq!(outcome, ShardPoll::Idle);
        assert_eq!(shard.cursor, None);
        assert_eq!(shard.sequence_number.as_deref(), Some("7"));
    }

    #[tokio::test]
    async fn test_missing_shard_is_retired() {
        let mut source = MockRecordSource::new();
        source.expect_acquire_cursor().returning(|_, _, _| {
            Err(SourceError::ShardNotFound(
                "Shard s1 in stream orders under account 1 does not exist".to_string(),
            ))
        });
        source.expect_read_records().never();

        let mut shard = Shard::new("s1");
        let outcome = tracker(source).poll("orders", &mut shard).await;

        assert_eq!(outcome, ShardPoll::Retired);
    }

    #[tokio::test]
    async fn test_not_found_for_other_resource_is_not_retirement() {
        let mut source = MockRecordSource::new();
        source.expect_acquire_cursor().returning(|_, _, _| {
            Err(SourceError::ShardNotFound("Stream orders not found".to_string()))
        });

        let mut shard = Shard::new("s1");
        let outcome = tracker(source).poll("orders", &mut shard).await;

        assert_eq!(outcome, ShardPoll::Idle);
        assert_eq!(shard, Shard::new("s1"));
    }

    #[tokio::test]
    async fn test_read_failure_leaves_cursor() {
        let mut source = MockRecordSource::new();
        source
            .expect_read_records()
            .returning(|_, _| Err(SourceError::Other("throttled".to_string())));

        let mut shard = Shard::new("s1").with_sequence_number("3").with_cursor("c1");
        let outcome = tracker(source).poll("orders", &mut shard).await;

        assert_eq!(outcome, ShardPoll::Idle);
        assert_eq!(shard.cursor.as_deref(), Some("c1"));
        assert_eq!(shard.sequence_number.as_deref(), Some("3"));
    }
}
