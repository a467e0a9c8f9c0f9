//! Key-value persistence: subscriber registry and checkpoint snapshots

pub mod checkpoint;
pub mod registry;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::{Error, Result};

pub use checkpoint::{FileCheckpointBackend, RedisCheckpointBackend};
pub use registry::RedisSubscriberRegistry;

/// Registered delivery endpoints per stream
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SubscriberRegistry: Send + Sync {
    /// All subscriber URLs registered for a stream
    async fn subscribers(&self, stream: &str) -> Result<Vec<String>>;

    /// Upsert the entry keyed by `(stream, id)`
    async fn register(&self, stream: &str, id: &str, url: &str) -> Result<()>;
}

/// Storage for the single checkpoint snapshot
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CheckpointBackend: Send + Sync {
    /// The stored snapshot, or `None` if nothing was saved yet
    async fn read(&self) -> Result<Option<String>>;

    /// Overwrite the stored snapshot
    async fn write(&self, snapshot: &str) -> Result<()>;
}

/// Run a Redis call under a timeout
pub(crate) async fn with_timeout<T, F>(limit: Duration, what: &str, fut: F) -> Result<T>
where
    F: Future<Output = redis::RedisResult<T>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| Error::Timeout(format!("Redis {what} timed out")))?
        .map_err(Error::from)
}
