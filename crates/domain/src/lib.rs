//! Domain-level building blocks shared by the dashboard API and the config
//! watcher: the topology model and its reload rules, monitoring filters, the
//! store key schema and the snapshot aggregation engine.

pub mod config;
pub mod documents;
pub mod filters;
pub mod keys;
pub mod model;
pub mod services;
pub mod snapshot;
pub mod storage;
pub mod topology;

use hex::encode as hex_encode;
use sha3::{Digest, Sha3_256};

pub use config::*;
pub use documents::{ConfigDocument, ConfigKind, ConfigSource, DocumentError, IniConfigSource};
pub use model::*;
pub use services::*;
pub use snapshot::{build_snapshot, AggregationError, ChainSnapshot};
pub use storage::*;
pub use topology::{ReloadOutcome, TopologyLoader, TopologySnapshot, TopologyStore};

/// User-facing message constants shared by every error body.
pub mod messages {
    pub const CHAIN_NOT_FOUND: &str = "Chain not found";
    pub const STORE_NOT_SET_UP: &str = "Redis not set up";
    pub const STORE_AUTH_INCORRECT: &str = "Redis password missing or incorrect";
    pub const NO_CONNECTION: &str = "No connection";
    pub const STORE_ERROR: &str = "Redis error";
    pub const MISSING_ARGUMENTS: &str = "Missing arguments";
    pub const INVALID_ENDPOINT: &str = "Invalid endpoint";
    pub const PONG: &str = "pong";
}

/// Hex-encoded SHA3-256 digest of a config document's bytes, used to drop
/// change notifications that did not alter the content.
pub fn content_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha3_256::new();
    hasher.update(bytes);
    hex_encode(hasher.finalize())
}
