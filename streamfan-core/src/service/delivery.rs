//! Webhook fan-out
//!
//! Every payload goes to all subscribers of its stream at once, as a raw-bytes
//! POST each.
//! A failed delivery gets exactly one more attempt on a detached task; that
//! task owns its copy of the URL and payload and never touches stream state.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::future::join_all;
use reqwest::Client;
use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::{Error, Result};

/// Counts for one payload's fan-out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutReport {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
    pub retries_scheduled: usize,
}

impl std::ops::AddAssign for FanoutReport {
    fn add_assign(&mut self, rhs: Self) {
        self.attempted += rhs.attempted;
        self.delivered += rhs.delivered;
        self.failed += rhs.failed;
        self.retries_scheduled += rhs.retries_scheduled;
    }
}

#[derive(Clone)]
pub struct DeliveryDispatcher {
    client: Client,
    retries: TaskTracker,
    retry_permits: Arc<Semaphore>,
}

impl DeliveryDispatcher {
    /// `max_concurrent_retries` bounds how many retry POSTs run at once;
    /// further retries queue behind them.
    #[must_use]
    pub fn new(client: Client, max_concurrent_retries: usize) -> Self {
        Self {
            client,
            retries: TaskTracker::new(),
            retry_permits: Arc::new(Semaphore::new(max_concurrent_retries.max(1))),
        }
    }

    /// Deliver `payload` to every subscriber concurrently and wait for all.
    ///
    /// Empty payloads are skipped. Never fails: a subscriber that does not
    /// answer 2xx is logged and handed to the retry pool.
    pub async fn dispatch<'a, I>(&self, stream: &str, subscribers: I, payload: Bytes) -> FanoutReport
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut report = FanoutReport::default();
        if payload.is_empty() {
            debug!(stream = %stream, "Skipping empty payload");
            return report;
        }

        let attempts = subscribers.into_iter().map(|url| {
            let payload = payload.clone();
            async move { (url, deliver_once(&self.client, url, payload).await) }
        });

        for (url, outcome) in join_all(attempts).await {
            report.attempted += 1;
            match outcome {
                Ok(()) => {
                    report.delivered += 1;
                    debug!(stream = %stream, url = %url, "Delivered");
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(stream = %stream, url = %url, error = %e, "Delivery failed, scheduling retry");
                    self.schedule_retry(stream, url, payload.clone());
                    report.retries_scheduled += 1;
                }
            }
        }

        report
    }

    fn schedule_retry(&self, stream: &str, url: &str, payload: Bytes) {
        let client = self.client.clone();
        let permits = Arc::clone(&self.retry_permits);
        let stream = stream.to_string();
        let url = url.to_string();

        self.retries.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            match deliver_once(&client, &url, payload).await {
                Ok(()) => info!(stream = %stream, url = %url, "Delivered on retry"),
                Err(e) => error!(stream = %stream, url = %url, error = %e, "Retry failed, dropping payload"),
            }
        });
    }

    /// Retries scheduled and not finished yet
    #[must_use]
    pub fn pending_retries(&self) -> usize {
        self.retries.len()
    }

    /// Close the retry pool and wait for in-flight retries.
    ///
    /// Returns `false` if `grace` elapsed first; unfinished retries are dropped
    /// when the runtime shuts down.
    pub async fn drain(&self, grace: Duration) -> bool {
        self.retries.close();
        tokio::time::timeout(grace, self.retries.wait()).await.is_ok()
    }
}

async fn deliver_once(client: &Client, url: &str, payload: Bytes) -> Result<()> {
    let response = client
        .post(url)
        .body(payload)
        .send()
        .await
        .map_err(|e| Error::Delivery {
            subscriber: url.to_string(),
            message: e.to_string(),
        })?;

    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(Error::Delivery {
            subscriber: url.to_string(),
            message: format!("responded with {status}"),
        })
    }
}
