//! Topology records shared by the reload routines, the monitoring filters and
//! the snapshot engine.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use thiserror::Error;

/// Chain name -> node name -> node record.
pub type ChainNodeMap = BTreeMap<String, BTreeMap<String, Node>>;

/// Deduplicated set of configured repository names.
pub type RepoNames = BTreeSet<String>;

/// Truthiness rule used by every config document: `true`, `yes` and `y`
/// (any case) are true, everything else is false.
pub fn to_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "yes" | "y"
    )
}

/// A single node entry from the nodes document.
///
/// The raw record is kept so listing endpoints can return the node exactly as
/// configured; the flags the engine relies on are parsed once at load time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    #[serde(skip)]
    name: String,
    #[serde(skip)]
    chain_name: String,
    #[serde(skip)]
    monitor_node: bool,
    #[serde(skip)]
    use_as_data_source: bool,
    #[serde(skip)]
    node_is_validator: Option<String>,
    #[serde(flatten)]
    record: BTreeMap<String, String>,
}

impl Node {
    pub fn new(name: impl Into<String>, chain_name: impl Into<String>) -> Self {
        let name = name.into();
        let chain_name = chain_name.into();
        let mut record = BTreeMap::new();
        record.insert("node_name".to_string(), name.clone());
        record.insert("chain_name".to_string(), chain_name.clone());
        Self {
            name,
            chain_name,
            monitor_node: false,
            use_as_data_source: false,
            node_is_validator: None,
            record,
        }
    }

    /// Builds a node from a raw document section. Records without a
    /// non-empty `node_name` or `chain_name` are rejected as a whole.
    pub fn from_record(record: BTreeMap<String, String>) -> Result<Self, RecordError> {
        let name = non_empty(&record, "node_name").ok_or(RecordError::MissingField("node_name"))?;
        let chain_name =
            non_empty(&record, "chain_name").ok_or(RecordError::MissingField("chain_name"))?;

        Ok(Self {
            name: name.to_string(),
            chain_name: chain_name.to_string(),
            monitor_node: record.get("monitor_node").is_some_and(|v| to_bool(v)),
            use_as_data_source: record.get("use_as_data_source").is_some_and(|v| to_bool(v)),
            node_is_validator: non_empty(&record, "node_is_validator").map(str::to_string),
            record,
        })
    }

    pub fn with_monitor_node(mut self, enabled: bool) -> Self {
        self.monitor_node = enabled;
        self.record
            .insert("monitor_node".to_string(), enabled.to_string());
        self
    }

    pub fn with_data_source(mut self, enabled: bool) -> Self {
        self.use_as_data_source = enabled;
        self.record
            .insert("use_as_data_source".to_string(), enabled.to_string());
        self
    }

    pub fn with_validator_flag(mut self, value: impl Into<String>) -> Self {
        let value = value.into();
        self.record
            .insert("node_is_validator".to_string(), value.clone());
        self.node_is_validator = Some(value).filter(|v| !v.trim().is_empty());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn chain_name(&self) -> &str {
        &self.chain_name
    }

    pub fn monitor_node(&self) -> bool {
        self.monitor_node
    }

    pub fn use_as_data_source(&self) -> bool {
        self.use_as_data_source
    }

    /// The configured `node_is_validator` string, if any.
    pub fn node_is_validator(&self) -> Option<&str> {
        self.node_is_validator.as_deref()
    }

    pub fn record(&self) -> &BTreeMap<String, String> {
        &self.record
    }
}

/// Extracts the repository name from a repos document section.
pub fn repo_name_from_record(record: &BTreeMap<String, String>) -> Result<&str, RecordError> {
    non_empty(record, "repo_name").ok_or(RecordError::MissingField("repo_name"))
}

fn non_empty<'a>(record: &'a BTreeMap<String, String>, key: &str) -> Option<&'a str> {
    record
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("record is missing `{0}`")]
    MissingField(&'static str),
}

/// Connection parameters for the metric store, taken from the `[redis]`
/// section of the main user config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
}

/// Everything the main user config contributes to the topology.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MainSettings {
    pub alerter_id: Option<String>,
    pub store: Option<StoreSettings>,
}

/// Web UI credentials consumed by the external session layer.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthSettings {
    pub username: String,
    pub hashed_password: String,
    pub cookie_secret: String,
}

impl std::fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSettings")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn truthiness_matches_config_convention() {
        assert!(to_bool("true"));
        assert!(to_bool("Yes"));
        assert!(to_bool(" y "));
        assert!(!to_bool("1"));
        assert!(!to_bool("false"));
        assert!(!to_bool(""));
    }

    #[test]
    fn node_record_parses_flags() {
        let node = Node::from_record(record(&[
            ("node_name", "NodeA"),
            ("chain_name", "Polka"),
            ("monitor_node", "True"),
            ("use_as_data_source", "no"),
            ("node_is_validator", "true"),
        ]))
        .expect("record is complete");

        assert_eq!(node.name(), "NodeA");
        assert_eq!(node.chain_name(), "Polka");
        assert!(node.monitor_node());
        assert!(!node.use_as_data_source());
        assert_eq!(node.node_is_validator(), Some("true"));
    }

    #[test]
    fn node_record_without_identity_is_rejected() {
        let err = Node::from_record(record(&[("chain_name", "Polka")])).unwrap_err();
        assert_eq!(err, RecordError::MissingField("node_name"));

        let err = Node::from_record(record(&[("node_name", "NodeA"), ("chain_name", " ")]))
            .unwrap_err();
        assert_eq!(err, RecordError::MissingField("chain_name"));
    }

    #[test]
    fn empty_validator_flag_is_treated_as_absent() {
        let node = Node::new("NodeA", "Polka").with_validator_flag("");
        assert_eq!(node.node_is_validator(), None);
    }

    #[test]
    fn node_serializes_as_raw_record() {
        let node = Node::new("NodeA", "Polka").with_monitor_node(true);
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["node_name"], "NodeA");
        assert_eq!(json["chain_name"], "Polka");
        assert_eq!(json["monitor_node"], "true");
        assert!(json.get("name").is_none());
    }

    #[test]
    fn auth_debug_hides_secrets() {
        let auth = AuthSettings {
            username: "admin".into(),
            hashed_password: "abcd".into(),
            cookie_secret: "s3cret".into(),
        };
        let rendered = format!("{auth:?}");
        assert!(rendered.contains("admin"));
        assert!(!rendered.contains("s3cret"));
    }
}
