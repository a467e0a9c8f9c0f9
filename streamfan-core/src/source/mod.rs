//! Interfaces to the services streamfan reads from
//!
//! - [`StreamCatalog`]: which streams exist and which shards they have
//! - [`RecordSource`]: cursor-based reads from one shard
//!
//! Services receive these as `Arc<dyn ...>` so tests can swap in fakes.

pub mod catalog;
pub mod kinesis;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
#[cfg(test)]
use mockall::automock;

use crate::error::SourceError;
use crate::models::StartPosition;
use crate::resilience::timeout::TimeoutConfig;
use crate::Result;

pub use catalog::HttpStreamCatalog;
pub use kinesis::KinesisRecordSource;

/// A record read from a shard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub sequence_number: String,
    pub data: Bytes,
}

impl Record {
    pub fn new(sequence_number: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            sequence_number: sequence_number.into(),
            data: data.into(),
        }
    }
}

/// Result of one read call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordBatch {
    /// In source order
    pub records: Vec<Record>,
    /// Continuation token; `None` when the source has nothing more right now
    pub next_cursor: Option<String>,
    /// Last sequence number the read covered, including records the adapter
    /// dropped. `None` means "the last entry of `records`".
    pub last_sequence_number: Option<String>,
}

/// Authoritative stream listing and shard descriptions
#[cfg_attr(test, automock)]
#[async_trait]
pub trait StreamCatalog: Send + Sync {
    /// Names of all streams that currently exist
    async fn list_streams(&self) -> Result<Vec<String>>;

    /// Shard ids of one stream
    async fn describe_stream(&self, name: &str) -> Result<Vec<String>>;
}

/// Partitioned append-log with cursor-based reads
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn acquire_cursor(
        &self,
        stream: &str,
        shard_id: &str,
        position: StartPosition,
    ) -> std::result::Result<String, SourceError>;

    async fn read_records(
        &self,
        cursor: &str,
        limit: u32,
    ) -> std::result::Result<RecordBatch, SourceError>;
}

/// Shared HTTP client for outbound calls (connection pooling, bounded timeouts)
pub fn build_http_client(timeouts: &TimeoutConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .connect_timeout(timeouts.http.min(Duration::from_secs(10)))
        .timeout(timeouts.http)
        .pool_max_idle_per_host(10)
        .build()?;
    Ok(client)
}
