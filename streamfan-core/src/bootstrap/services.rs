//! Client construction and dependency injection

use std::sync::Arc;

use anyhow::Context;
use redis::aio::ConnectionManager;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::CheckpointBackendKind;
use crate::repository::{
    CheckpointBackend, FileCheckpointBackend, RedisCheckpointBackend, RedisSubscriberRegistry,
    SubscriberRegistry,
};
use crate::resilience::retry;
use crate::resilience::timeout::TimeoutConfig;
use crate::service::{
    CheckpointStore, CursorTracker, DeliveryDispatcher, PollLoop, RecordPoller, StreamReconciler,
    SubscriberDirectory,
};
use crate::source::{
    build_http_client, HttpStreamCatalog, KinesisRecordSource, RecordSource, StreamCatalog,
};
use crate::Config;

/// External collaborators shared by the poll loop and the registration API
#[derive(Clone)]
pub struct Services {
    pub catalog: Arc<dyn StreamCatalog>,
    pub source: Arc<dyn RecordSource>,
    pub registry: Arc<dyn SubscriberRegistry>,
    pub checkpoint: Arc<dyn CheckpointBackend>,
    /// Client for webhook deliveries
    pub http_client: reqwest::Client,
}

impl Services {
    /// Wire the poll loop out of these collaborators
    #[must_use]
    pub fn poll_loop(&self, config: &Config) -> PollLoop {
        let reconciler =
            StreamReconciler::new(Arc::clone(&self.catalog), config.discovery_retry_delay());
        let poller = RecordPoller::new(CursorTracker::new(
            Arc::clone(&self.source),
            config.source.batch_limit,
        ));

        PollLoop::new(
            Arc::clone(&self.catalog),
            reconciler,
            poller,
            SubscriberDirectory::new(Arc::clone(&self.registry)),
            DeliveryDispatcher::new(
                self.http_client.clone(),
                config.delivery.max_concurrent_retries,
            ),
            CheckpointStore::new(Arc::clone(&self.checkpoint)),
            config.poll_interval(),
        )
    }
}

/// Build every external collaborator.
///
/// Redis is retried at the discovery delay until it answers; returns
/// `Ok(None)` if `shutdown` fires first.
pub async fn init_services(
    config: &Config,
    shutdown: &CancellationToken,
) -> anyhow::Result<Option<Services>> {
    info!("Initializing services...");

    let timeouts = TimeoutConfig::from(&config.timeouts);
    let http_client = build_http_client(&timeouts).context("Failed to build HTTP client")?;

    let catalog: Arc<dyn StreamCatalog> =
        Arc::new(HttpStreamCatalog::new(&config.catalog, http_client.clone()));
    let source: Arc<dyn RecordSource> =
        Arc::new(KinesisRecordSource::new(&config.source, http_client.clone()));

    let Some(conn) = connect_redis(config, shutdown).await? else {
        return Ok(None);
    };

    let registry: Arc<dyn SubscriberRegistry> = Arc::new(RedisSubscriberRegistry::new(
        conn.clone(),
        config.redis.key_prefix.clone(),
        config.registry.table.clone(),
        timeouts,
    ));

    let checkpoint: Arc<dyn CheckpointBackend> = match config.checkpoint.backend {
        CheckpointBackendKind::Redis => Arc::new(RedisCheckpointBackend::new(
            conn,
            &config.redis.key_prefix,
            config.checkpoint.state_key.clone(),
            timeouts,
        )),
        CheckpointBackendKind::File => {
            Arc::new(FileCheckpointBackend::new(&config.checkpoint.file_path))
        }
    };
    info!(backend = ?config.checkpoint.backend, "Checkpoint backend initialized");

    Ok(Some(Services {
        catalog,
        source,
        registry,
        checkpoint,
        http_client,
    }))
}

async fn connect_redis(
    config: &Config,
    shutdown: &CancellationToken,
) -> anyhow::Result<Option<ConnectionManager>> {
    let client = redis::Client::open(config.redis.url.clone())
        .with_context(|| format!("Invalid redis.url {}", config.redis.url))?;

    let delay = config.discovery_retry_delay();
    let policy = retry::discovery_backoff(delay);
    let mut backoff = retry::start(&policy);
    let mut attempt: u64 = 0;

    loop {
        attempt += 1;
        match ConnectionManager::new(client.clone()).await {
            Ok(conn) => {
                info!("Redis connection established");
                return Ok(Some(conn));
            }
            Err(e) => {
                let wait = retry::next_delay(&mut backoff, delay);
                error!(error = %e, attempt, retry_in = ?wait, "Failed to connect to Redis, retrying");
                tokio::select! {
                    () = shutdown.cancelled() => return Ok(None),
                    () = tokio::time::sleep(wait) => {}
                }
            }
        }
    }
}
