//! Timeouts and retry policies for external services
//!
//! Every outbound call carries a bound from [`timeout::TimeoutConfig`].
//! Retry delays come from `backon` builders so callers can inject a
//! shorter policy in tests.

pub mod timeout {
    //! Timeout configuration for external service calls

    use std::time::Duration;

    use crate::config::TimeoutsConfig;

    /// Default timeout for outbound HTTP requests
    pub const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    /// Default timeout for Redis operations
    pub const REDIS_OPERATION_TIMEOUT: Duration = Duration::from_secs(5);

    /// Timeout configuration
    #[derive(Debug, Clone, Copy)]
    pub struct TimeoutConfig {
        pub http: Duration,
        pub redis: Duration,
    }

    impl Default for TimeoutConfig {
        fn default() -> Self {
            Self {
                http: HTTP_REQUEST_TIMEOUT,
                redis: REDIS_OPERATION_TIMEOUT,
            }
        }
    }

    impl From<&TimeoutsConfig> for TimeoutConfig {
        fn from(config: &TimeoutsConfig) -> Self {
            Self {
                http: Duration::from_secs(config.http_seconds),
                redis: Duration::from_secs(config.redis_seconds),
            }
        }
    }

    impl TimeoutConfig {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Set HTTP request timeout
        #[must_use]
        pub const fn with_http_timeout(mut self, timeout: Duration) -> Self {
            self.http = timeout;
            self
        }

        /// Set Redis timeout
        #[must_use]
        pub const fn with_redis_timeout(mut self, timeout: Duration) -> Self {
            self.redis = timeout;
            self
        }
    }
}

pub mod retry {
    //! Retry policies
    //!
    //! Discovery never gives up: the policy yields the same delay forever
    //! and the caller decides when to stop (shutdown).

    use std::time::Duration;

    use backon::{BackoffBuilder, ConstantBuilder};

    /// Fixed-delay, unbounded policy used while the stream listing is unreachable
    #[must_use]
    pub fn discovery_backoff(delay: Duration) -> ConstantBuilder {
        ConstantBuilder::default()
            .with_delay(delay)
            .without_max_times()
    }

    /// Next delay from a backoff, falling back to `fallback` if it ran dry
    pub fn next_delay<B: Iterator<Item = Duration>>(backoff: &mut B, fallback: Duration) -> Duration {
        backoff.next().unwrap_or(fallback)
    }

    /// Materialize a builder into a fresh iterator
    pub fn start<B: BackoffBuilder + Clone>(builder: &B) -> B::Backoff {
        builder.clone().build()
    }
}
