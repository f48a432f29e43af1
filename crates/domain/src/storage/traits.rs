use async_trait::async_trait;
use thiserror::Error;

/// Common result alias for metric store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Failures reported by a metric store adapter. Authentication and
/// connection problems are kept apart so callers can surface a specific
/// diagnostic.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store authentication failed: {0}")]
    Auth(String),
    #[error("store connection failed: {0}")]
    Connection(String),
    #[error("store error: {0}")]
    Other(String),
}

/// Parameters for one short-lived store connection.
#[derive(Clone, PartialEq, Eq)]
pub struct StoreConnection {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub database: i64,
}

impl std::fmt::Debug for StoreConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConnection")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("database", &self.database)
            .finish()
    }
}

/// The two batched reads issued for one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreRequest {
    /// Keys fetched with a single multi-key GET.
    pub flat_keys: Vec<String>,
    /// Hash bucket queried with a single multi-field GET.
    pub hash_key: String,
    pub hash_fields: Vec<String>,
}

impl StoreRequest {
    pub fn key_count(&self) -> usize {
        self.flat_keys.len() + self.hash_fields.len()
    }
}

/// Values positionally aligned with the keys of a [`StoreRequest`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreReply {
    pub flat: Vec<Option<String>>,
    pub hash: Vec<Option<String>>,
}

#[async_trait]
pub trait MetricStore: Send + Sync {
    /// Opens a connection, selects `connection.database`, runs both reads of
    /// `request` as one unit and releases the connection before returning.
    async fn fetch(
        &self,
        connection: &StoreConnection,
        request: &StoreRequest,
    ) -> StoreResult<StoreReply>;
}
