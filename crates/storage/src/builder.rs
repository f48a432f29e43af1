use std::time::Duration;

use crate::{RedisMetricStore, DEFAULT_REQUEST_TIMEOUT};

#[derive(Default)]
pub struct StoreBuilder {
    request_timeout: Option<Duration>,
}

impl StoreBuilder {
    pub fn new() -> Self {
        Self {
            request_timeout: None,
        }
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> RedisMetricStore {
        RedisMetricStore::with_timeout(self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT))
    }
}
