use std::collections::BTreeMap;

use metrics::{counter, histogram};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    keys::{KeyBuilder, KeyGroup, DUMMY_KEY},
    messages,
    model::Node,
    storage::{MetricStore, StoreError, StoreRequest},
    topology::TopologySnapshot,
};

use super::{ChainSnapshot, FetchedValues, FieldPlaceholders, Placeholder, SnapshotTemplate};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AggregationError {
    #[error("chain `{0}` is not monitored")]
    ChainNotFound(String),
    #[error("metric store is not configured")]
    StoreNotConfigured,
    #[error("metric store rejected credentials: {0}")]
    StoreAuth(String),
    #[error("metric store unreachable: {0}")]
    StoreConnection(String),
    #[error("metric store failure: {0}")]
    Store(String),
}

impl AggregationError {
    /// Stable, user-facing message constant.
    pub fn message(&self) -> &'static str {
        match self {
            AggregationError::ChainNotFound(_) => messages::CHAIN_NOT_FOUND,
            AggregationError::StoreNotConfigured => messages::STORE_NOT_SET_UP,
            AggregationError::StoreAuth(_) => messages::STORE_AUTH_INCORRECT,
            AggregationError::StoreConnection(_) => messages::NO_CONNECTION,
            AggregationError::Store(_) => messages::STORE_ERROR,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            AggregationError::ChainNotFound(_) => "chain_not_found",
            AggregationError::StoreNotConfigured => "store_not_configured",
            AggregationError::StoreAuth(_) => "store_auth",
            AggregationError::StoreConnection(_) => "store_connection",
            AggregationError::Store(_) => "store_error",
        }
    }
}

impl From<StoreError> for AggregationError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Auth(msg) => Self::StoreAuth(msg),
            StoreError::Connection(msg) => Self::StoreConnection(msg),
            StoreError::Other(msg) => Self::Store(msg),
        }
    }
}

/// Everything needed to query the store for one chain.
#[derive(Debug, Clone)]
pub struct SnapshotPlan {
    pub template: SnapshotTemplate,
    pub request: StoreRequest,
    /// Monitored nodes of the chain, for the validator flags.
    pub nodes: BTreeMap<String, Node>,
}

/// Builds the key template and the store request for `chain_name` without
/// touching the store.
pub fn plan_snapshot(
    chain_name: &str,
    topology: &TopologySnapshot,
    alerter_id: &str,
) -> Result<SnapshotPlan, AggregationError> {
    let mut monitored_nodes = topology.monitored_nodes();
    let nodes = monitored_nodes
        .remove(chain_name)
        .ok_or_else(|| AggregationError::ChainNotFound(chain_name.to_string()))?;
    let chain_is_monitored = topology
        .monitored_chains()
        .iter()
        .any(|chain| chain == chain_name);

    let keys = KeyBuilder::new(alerter_id);
    let mut template = SnapshotTemplate::default();

    // Chains without a data source have no blockchain state in the store;
    // every field points at the sentinel so the values come back empty.
    template.blockchain = keys
        .group_keys(KeyGroup::Blockchain, chain_name)
        .into_iter()
        .map(|(field, key)| {
            let key = if chain_is_monitored {
                key
            } else {
                DUMMY_KEY.to_string()
            };
            (field, placeholder(KeyGroup::Blockchain, key))
        })
        .collect();

    if chain_is_monitored {
        template.blockchain_monitors.insert(
            chain_name.to_string(),
            placeholders(&keys, KeyGroup::BlockchainMonitor, chain_name),
        );
    }

    for node_name in nodes.keys() {
        template.nodes.insert(
            node_name.clone(),
            placeholders(&keys, KeyGroup::Node, node_name),
        );
        template.node_monitors.insert(
            node_name.clone(),
            placeholders(&keys, KeyGroup::NodeMonitor, node_name),
        );
    }

    let request = template.request(keys.hash_bucket(chain_name));
    Ok(SnapshotPlan {
        template,
        request,
        nodes,
    })
}

/// Reconstructs the live snapshot of `chain_name` from the topology and one
/// pair of batched store reads.
pub async fn build_snapshot<S>(
    store: &S,
    chain_name: &str,
    topology: &TopologySnapshot,
) -> Result<ChainSnapshot, AggregationError>
where
    S: MetricStore + ?Sized,
{
    let result = assemble(store, chain_name, topology).await;
    let label = match &result {
        Ok(_) => "ok",
        Err(err) => err.label(),
    };
    counter!("dashboard_snapshot_requests_total", "result" => label).increment(1);
    result
}

async fn assemble<S>(
    store: &S,
    chain_name: &str,
    topology: &TopologySnapshot,
) -> Result<ChainSnapshot, AggregationError>
where
    S: MetricStore + ?Sized,
{
    let connection = topology
        .store_connection()
        .ok_or(AggregationError::StoreNotConfigured)?;
    let alerter_id = topology
        .alerter_id()
        .ok_or(AggregationError::StoreNotConfigured)?;

    let plan = plan_snapshot(chain_name, topology, alerter_id)?;
    histogram!("dashboard_store_keys_requested").record(plan.request.key_count() as f64);
    debug!(
        chain = chain_name,
        flat = plan.request.flat_keys.len(),
        hash = plan.request.hash_fields.len(),
        "fetching chain snapshot"
    );

    let reply = store.fetch(&connection, &plan.request).await?;
    let values = FetchedValues::zip(&plan.request, reply)?;
    let mut snapshot = plan.template.resolve(&values);
    attach_validator_flags(&mut snapshot, &plan.nodes);
    Ok(snapshot)
}

fn attach_validator_flags(snapshot: &mut ChainSnapshot, nodes: &BTreeMap<String, Node>) {
    for (name, node_snapshot) in snapshot.nodes.iter_mut() {
        node_snapshot.is_validator = match nodes.get(name).and_then(Node::node_is_validator) {
            Some(flag) => flag.to_string(),
            None => {
                warn!(node = %name, "missing node_is_validator, defaulting to false");
                false.to_string()
            }
        };
    }
}

fn placeholder(group: KeyGroup, key: String) -> Placeholder {
    Placeholder {
        lookup: group.lookup(),
        key,
    }
}

fn placeholders(keys: &KeyBuilder<'_>, group: KeyGroup, scope_name: &str) -> FieldPlaceholders {
    keys.group_keys(group, scope_name)
        .into_iter()
        .map(|(field, key)| (field, placeholder(group, key)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::{AuthSettings, ChainNodeMap, MainSettings, StoreSettings},
        storage::{StoreConnection, StoreReply, StoreResult},
        topology::TopologyStore,
    };
    use async_trait::async_trait;
    use std::{collections::HashMap, sync::Mutex};

    /// Store double answering from a key -> value table and recording the
    /// requests it receives.
    #[derive(Default)]
    struct MockStore {
        flat: HashMap<String, String>,
        hash: HashMap<String, String>,
        fail_with: Option<StoreError>,
        requests: Mutex<Vec<StoreRequest>>,
    }

    #[async_trait]
    impl MetricStore for MockStore {
        async fn fetch(
            &self,
            _connection: &StoreConnection,
            request: &StoreRequest,
        ) -> StoreResult<StoreReply> {
            self.requests.lock().unwrap().push(request.clone());
            if let Some(err) = &self.fail_with {
                return Err(err.clone());
            }
            Ok(StoreReply {
                flat: request
                    .flat_keys
                    .iter()
                    .map(|k| self.flat.get(k).cloned())
                    .collect(),
                hash: request
                    .hash_fields
                    .iter()
                    .map(|k| self.hash.get(k).cloned())
                    .collect(),
            })
        }
    }

    fn topology(nodes: Vec<Node>) -> TopologySnapshot {
        let store = TopologyStore::new();
        let mut map = ChainNodeMap::new();
        for node in nodes {
            map.entry(node.chain_name().to_string())
                .or_default()
                .insert(node.name().to_string(), node);
        }
        store.replace_chain_nodes(map);
        store.replace_main(MainSettings {
            alerter_id: Some("alerter".into()),
            store: Some(StoreSettings {
                enabled: true,
                host: "localhost".into(),
                port: 6379,
                password: None,
            }),
        });
        store.replace_store_index(Some(10));
        store.replace_auth(AuthSettings {
            username: "admin".into(),
            hashed_password: "00".into(),
            cookie_secret: "s".into(),
        });
        TopologySnapshot::clone(&store.load())
    }

    fn monitored_polka() -> TopologySnapshot {
        topology(vec![
            Node::new("NodeA", "Polka")
                .with_monitor_node(true)
                .with_data_source(true)
                .with_validator_flag("true"),
            Node::new("NodeB", "Polka").with_monitor_node(true),
        ])
    }

    #[tokio::test]
    async fn monitored_chain_snapshot_merges_both_reads() {
        let mut store = MockStore::default();
        store.hash.insert("bc4_Polka".into(), "297".into());
        store.hash.insert("n3_NodeA".into(), "False".into());
        store
            .flat
            .insert("alerter:nm1_Node monitor (NodeA)".into(), "True".into());
        store
            .flat
            .insert("alerter:bcm1_Blockchain monitor (Polka)".into(), "True".into());

        let snapshot = build_snapshot(&store, "Polka", &monitored_polka())
            .await
            .expect("snapshot builds");

        assert_eq!(snapshot.blockchain["validator_set_size"], Some("297".into()));
        assert_eq!(snapshot.blockchain["referendum_count"], None);
        assert_eq!(snapshot.nodes["NodeA"].fields["is_syncing"], Some("False".into()));
        assert_eq!(snapshot.nodes["NodeA"].fields.len(), 17);
        assert_eq!(snapshot.monitors.node["NodeA"]["alive"], Some("True".into()));
        assert_eq!(snapshot.monitors.node["NodeB"]["alive"], None);
        assert_eq!(
            snapshot.monitors.blockchain["Polka"]["alive"],
            Some("True".into())
        );

        let requests = store.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].hash_key, "alerter:hash_bc1_Polka");
        assert_eq!(requests[0].flat_keys.len(), 1 + 2 * 3);
        assert_eq!(requests[0].hash_fields.len(), 4 + 2 * 17);
    }

    #[tokio::test]
    async fn validator_flag_defaults_to_false_string() {
        let store = MockStore::default();
        let snapshot = build_snapshot(&store, "Polka", &monitored_polka())
            .await
            .unwrap();
        assert_eq!(snapshot.nodes["NodeA"].is_validator, "true");
        assert_eq!(snapshot.nodes["NodeB"].is_validator, "false");
    }

    #[tokio::test]
    async fn unmonitored_chain_uses_sentinel_and_skips_chain_monitor() {
        let mut store = MockStore::default();
        store.hash.insert("bc4_Kusama".into(), "100".into());
        let topology = topology(vec![Node::new("NodeK", "Kusama").with_monitor_node(true)]);

        let snapshot = build_snapshot(&store, "Kusama", &topology).await.unwrap();

        assert_eq!(snapshot.blockchain.len(), 4);
        assert!(snapshot.blockchain.values().all(Option::is_none));
        assert!(snapshot.monitors.blockchain.is_empty());

        let requests = store.requests.lock().unwrap();
        let request = &requests[0];
        assert!(!request.hash_fields.iter().any(|k| k.starts_with("bc")));
        assert_eq!(
            request.hash_fields.iter().filter(|k| *k == DUMMY_KEY).count(),
            1
        );
        assert!(!request.flat_keys.iter().any(|k| k.contains("bcm1")));
    }

    #[tokio::test]
    async fn chain_outside_monitored_view_is_not_found() {
        let store = MockStore::default();
        let topology = topology(vec![
            Node::new("NodeA", "Polka").with_monitor_node(true),
            Node::new("Idle", "Quiet"),
        ]);

        let err = build_snapshot(&store, "Quiet", &topology).await.unwrap_err();
        assert_eq!(err, AggregationError::ChainNotFound("Quiet".into()));
        assert_eq!(err.message(), messages::CHAIN_NOT_FOUND);
        assert!(store.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn chain_with_no_monitored_nodes_still_resolves() {
        let store = MockStore::default();
        let topology = topology(vec![Node::new("NodeB", "Polka").with_data_source(true)]);

        let snapshot = build_snapshot(&store, "Polka", &topology).await.unwrap();
        assert!(snapshot.nodes.is_empty());
        assert!(snapshot.monitors.node.is_empty());
        assert!(snapshot.monitors.blockchain.contains_key("Polka"));
    }

    #[tokio::test]
    async fn missing_store_settings_fail_before_planning() {
        let store = MockStore::default();
        let topology = TopologySnapshot::default();

        let err = build_snapshot(&store, "Polka", &topology).await.unwrap_err();
        assert_eq!(err, AggregationError::StoreNotConfigured);
        assert!(store.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn store_failures_map_to_distinct_errors() {
        for (failure, expected) in [
            (
                StoreError::Auth("NOAUTH".into()),
                messages::STORE_AUTH_INCORRECT,
            ),
            (
                StoreError::Connection("refused".into()),
                messages::NO_CONNECTION,
            ),
            (StoreError::Other("boom".into()), messages::STORE_ERROR),
        ] {
            let store = MockStore {
                fail_with: Some(failure),
                ..MockStore::default()
            };
            let err = build_snapshot(&store, "Polka", &monitored_polka())
                .await
                .unwrap_err();
            assert_eq!(err.message(), expected);
        }
    }

    #[test]
    fn plan_keys_follow_prefix_rules() {
        let plan = plan_snapshot("Polka", &monitored_polka(), "alerter").unwrap();
        assert!(plan
            .request
            .flat_keys
            .iter()
            .all(|k| k.starts_with("alerter:")));
        assert!(plan
            .request
            .hash_fields
            .iter()
            .all(|k| !k.contains(':')));
        assert_eq!(
            plan.template.nodes["NodeB"]["active"].key,
            "n5_NodeB".to_string()
        );
    }
}
