//! Redis-backed metric store adapter satisfying the domain `MetricStore`
//! trait. Every fetch opens a short-lived connection from the connection
//! parameters of the current topology snapshot, so a reload of the store
//! settings takes effect on the next request.

mod builder;
mod errors;
mod metric_store;

use std::time::Duration;

pub use builder::StoreBuilder;

/// Upper bound for connecting and running one batched read.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared store handle used by the HTTP API.
#[derive(Debug, Clone)]
pub struct RedisMetricStore {
    request_timeout: Duration,
}

impl RedisMetricStore {
    pub fn new() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn builder() -> StoreBuilder {
        StoreBuilder::new()
    }

    pub(crate) fn with_timeout(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

impl Default for RedisMetricStore {
    fn default() -> Self {
        Self::new()
    }
}
