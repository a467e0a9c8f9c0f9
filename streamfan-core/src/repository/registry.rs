use async_trait::async_trait;
use redis::aio::ConnectionManager;

use super::{with_timeout, SubscriberRegistry};
use crate::resilience::timeout::TimeoutConfig;
use crate::Result;

/// Subscriber registry in Redis
///
/// One hash per stream at `{prefix}{table}:{stream}`, field = subscriber id,
/// value = URL. Re-registering an id overwrites its URL.
#[derive(Clone)]
pub struct RedisSubscriberRegistry {
    conn: ConnectionManager,
    key_prefix: String,
    table: String,
    timeouts: TimeoutConfig,
}

impl RedisSubscriberRegistry {
    #[must_use]
    pub fn new(
        conn: ConnectionManager,
        key_prefix: impl Into<String>,
        table: impl Into<String>,
        timeouts: TimeoutConfig,
    ) -> Self {
        Self {
            conn,
            key_prefix: key_prefix.into(),
            table: table.into(),
            timeouts,
        }
    }

    fn stream_key(&self, stream: &str) -> String {
        subscriber_key(&self.key_prefix, &self.table, stream)
    }
}

fn subscriber_key(prefix: &str, table: &str, stream: &str) -> String {
    format!("{prefix}{table}:{stream}")
}

#[async_trait]
impl SubscriberRegistry for RedisSubscriberRegistry {
    async fn subscribers(&self, stream: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let key = self.stream_key(stream);

        let urls: Vec<String> = with_timeout(
            self.timeouts.redis,
            "HVALS",
            redis::cmd("HVALS").arg(&key).query_async(&mut conn),
        )
        .await?;

        Ok(urls)
    }

    async fn register(&self, stream: &str, id: &str, url: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let key = self.stream_key(stream);

        let _: i64 = with_timeout(
            self.timeouts.redis,
            "HSET",
            redis::cmd("HSET").arg(&key).arg(id).arg(url).query_async(&mut conn),
        )
        .await?;

        tracing::debug!(stream = %stream, id = %id, "Subscriber registered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscriber_key() {
        assert_eq!(
            subscriber_key("streamfan:", "webhooks", "orders"),
            "streamfan:webhooks:orders"
        );
    }
}
