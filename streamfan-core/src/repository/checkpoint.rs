use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use redis::aio::ConnectionManager;

use super::{with_timeout, CheckpointBackend};
use crate::resilience::timeout::TimeoutConfig;
use crate::{Error, Result};

const SNAPSHOT_FIELD: &str = "streams_state";

/// Snapshot stored as one Redis hash
///
/// The hash carries `pk`/`sk` (both the state key) next to the JSON
/// snapshot, mirroring the item layout of the registry table.
#[derive(Clone)]
pub struct RedisCheckpointBackend {
    conn: ConnectionManager,
    key: String,
    state_key: String,
    timeouts: TimeoutConfig,
}

impl RedisCheckpointBackend {
    #[must_use]
    pub fn new(
        conn: ConnectionManager,
        key_prefix: &str,
        state_key: impl Into<String>,
        timeouts: TimeoutConfig,
    ) -> Self {
        let state_key = state_key.into();
        Self {
            conn,
            key: snapshot_key(key_prefix, &state_key),
            state_key,
            timeouts,
        }
    }
}

fn snapshot_key(prefix: &str, state_key: &str) -> String {
    format!("{prefix}{state_key}#{state_key}")
}

#[async_trait]
impl CheckpointBackend for RedisCheckpointBackend {
    async fn read(&self) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let snapshot: Option<String> = with_timeout(
            self.timeouts.redis,
            "HGET",
            redis::cmd("HGET")
                .arg(&self.key)
                .arg(SNAPSHOT_FIELD)
                .query_async(&mut conn),
        )
        .await?;
        Ok(snapshot)
    }

    async fn write(&self, snapshot: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: i64 = with_timeout(
            self.timeouts.redis,
            "HSET",
            redis::cmd("HSET")
                .arg(&self.key)
                .arg("pk")
                .arg(&self.state_key)
                .arg("sk")
                .arg(&self.state_key)
                .arg(SNAPSHOT_FIELD)
                .arg(snapshot)
                .query_async(&mut conn),
        )
        .await?;
        Ok(())
    }
}

/// Snapshot stored in a local JSON file
///
/// Writes go through a temp file in the same directory and a rename, so a
/// crash mid-write leaves the previous snapshot intact.
#[derive(Debug, Clone)]
pub struct FileCheckpointBackend {
    path: PathBuf,
}

impl FileCheckpointBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn write_atomically(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait]
impl CheckpointBackend for FileCheckpointBackend {
    async fn read(&self) -> Result<Option<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Persistence(format!(
                "failed to read {}: {e}",
                self.path.display()
            ))),
        }
    }

    async fn write(&self, snapshot: &str) -> Result<()> {
        let path = self.path.clone();
        let contents = snapshot.as_bytes().to_vec();

        tokio::task::spawn_blocking(move || write_atomically(&path, &contents))
            .await
            .map_err(|e| Error::Persistence(format!("checkpoint writer panicked: {e}")))?
            .map_err(|e| {
                Error::Persistence(format!("failed to write {}: {e}", self.path.display()))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_key() {
        assert_eq!(
            snapshot_key("streamfan:", "STREAMS_STATE"),
            "streamfan:STREAMS_STATE#STREAMS_STATE"
        );
    }

    #[tokio::test]
    async fn test_file_backend_missing_file_reads_none() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileCheckpointBackend::new(dir.path().join("streams.json"));

        assert_eq!(backend.read().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_backend_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileCheckpointBackend::new(dir.path().join("streams.json"));

        backend.write("[1]").await.unwrap();
        backend.write("[2]").await.unwrap();

        assert_eq!(backend.read().await.unwrap().as_deref(), Some("[2]"));
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }
}
