use std::sync::Arc;

use tracing::{debug, error};

use crate::models::Stream;
use crate::repository::SubscriberRegistry;

/// Keeps each stream's subscriber set in step with the registry
///
/// Only ever adds: a URL removed from the registry keeps receiving
/// deliveries until the process restarts without it in the checkpoint.
#[derive(Clone)]
pub struct SubscriberDirectory {
    registry: Arc<dyn SubscriberRegistry>,
}

impl SubscriberDirectory {
    #[must_use]
    pub fn new(registry: Arc<dyn SubscriberRegistry>) -> Self {
        Self { registry }
    }

    /// Merge the registry's URLs for `stream` into it; returns how many were new.
    pub async fn refresh(&self, stream: &mut Stream) -> usize {
        match self.registry.subscribers(&stream.name).await {
            Ok(urls) => {
                let added = stream.merge_subscribers(urls);
                if added > 0 {
                    debug!(
                        stream = %stream.name,
                        added,
                        total = stream.subscribers.len(),
                        "Picked up new subscribers"
                    );
                }
                added
            }
            Err(e) => {
                error!(stream = %stream.name, error = %e, "Failed to query subscribers");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MockSubscriberRegistry;
    use crate::Error;
    use mockall::predicate::eq;

    #[tokio::test]
    async fn test_refresh_is_additive() {
        let mut registry = MockSubscriberRegistry::new();
        registry
            .expect_subscribers()
            .with(eq("orders"))
            .returning(|_| Ok(vec!["http://b".to_string(), "http://a".to_string()]));

        let directory = SubscriberDirectory::new(Arc::new(registry));
        let mut stream = Stream::new("orders")
            .with_subscriber("http://a")
            .with_subscriber("http://old");

        let added = directory.refresh(&mut stream).await;

        assert_eq!(added, 1);
        assert_eq!(
            stream.subscribers.iter().collect::<Vec<_>>(),
            vec!["http://a", "http://old", "http://b"]
        );
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_existing() {
        let mut registry = MockSubscriberRegistry::new();
        registry
            .expect_subscribers()
            .returning(|_| Err(Error::Timeout("Redis HVALS timed out".to_string())));

        let directory = SubscriberDirectory::new(Arc::new(registry));
        let mut stream = Stream::new("orders").with_subscriber("http://a");

        assert_eq!(directory.refresh(&mut stream).await, 0);
        assert_eq!(stream.subscribers.len(), 1);
    }
}
