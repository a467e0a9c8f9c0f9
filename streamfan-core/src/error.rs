use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Stream discovery unavailable: {0}")]
    DiscoveryUnavailable(String),

    #[error("Stream metadata error for {stream}: {message}")]
    StreamMetadata { stream: String, message: String },

    #[error("Shard not found: {0}")]
    ShardNotFound(String),

    #[error("Cursor acquisition failed for {shard}: {message}")]
    CursorAcquisition { shard: String, message: String },

    #[error("Read error: {0}")]
    Read(String),

    #[error("Cursor expired: {0}")]
    CursorExpired(String),

    #[error("Delivery to {subscriber} failed: {message}")]
    Delivery { subscriber: String, message: String },

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Signals reported by the record source.
///
/// The cursor tracker drives its state machine off these variants, so
/// adapters must classify wire errors into them rather than flattening
/// everything into `Other`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The partition (or the stream owning it) no longer exists.
    /// The message is the source's own text, which names the missing resource.
    #[error("Resource not found: {0}")]
    ShardNotFound(String),

    /// The held cursor is expired or otherwise no longer valid.
    #[error("Cursor expired: {0}")]
    ExpiredCursor(String),

    #[error("Record source error: {0}")]
    Other(String),
}

impl SourceError {
    /// True when this is a not-found signal naming the given shard.
    #[must_use]
    pub fn names_missing_shard(&self, shard_id: &str) -> bool {
        matches!(self, Self::ShardNotFound(message) if message.contains(shard_id))
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        Self::Other(err.to_string())
    }
}

impl From<SourceError> for Error {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::ShardNotFound(msg) => Self::ShardNotFound(msg),
            SourceError::ExpiredCursor(msg) => Self::CursorExpired(msg),
            SourceError::Other(msg) => Self::Read(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_missing_shard() {
        let err = SourceError::ShardNotFound(
            "Shard shardId-000000000001 in stream orders under account 1 does not exist".to_string(),
        );
        assert!(err.names_missing_shard("shardId-000000000001"));
        assert!(!err.names_missing_shard("shardId-000000000002"));

        let expired = SourceError::ExpiredCursor("shardId-000000000001".to_string());
        assert!(!expired.names_missing_shard("shardId-000000000001"));
    }

    #[test]
    fn test_source_error_conversion() {
        let err: Error = SourceError::ExpiredCursor("stale".to_string()).into();
        assert!(matches!(err, Error::CursorExpired(_)));

        let err: Error = SourceError::Other("boom".to_string()).into();
        assert!(matches!(err, Error::Read(_)));
        assert!(err.to_string().contains("boom"));
    }
}
