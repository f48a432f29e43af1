//! Process-wide topology model.
//!
//! Readers take an `Arc` to an immutable [`TopologySnapshot`]; every reload
//! builds a new snapshot and swaps it in, so a reader sees either the old or
//! the new state of a config domain and never a partially updated map.

mod reload;

use std::sync::Arc;

use arc_swap::ArcSwap;
use metrics::gauge;
use tracing::debug;

use crate::{
    filters,
    model::{AuthSettings, ChainNodeMap, MainSettings, RepoNames},
    storage::StoreConnection,
};

pub use reload::{ReloadOutcome, TopologyLoader};

#[derive(Debug, Clone, Default)]
pub struct TopologySnapshot {
    version: u64,
    chain_nodes: Arc<ChainNodeMap>,
    repo_names: Arc<RepoNames>,
    main: Arc<MainSettings>,
    auth: Option<Arc<AuthSettings>>,
    store_index: Option<i64>,
}

impl TopologySnapshot {
    /// Incremented on every swap.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn chain_nodes(&self) -> &ChainNodeMap {
        &self.chain_nodes
    }

    pub fn repo_names(&self) -> &RepoNames {
        &self.repo_names
    }

    pub fn main(&self) -> &MainSettings {
        &self.main
    }

    pub fn alerter_id(&self) -> Option<&str> {
        self.main.alerter_id.as_deref()
    }

    pub fn auth(&self) -> Option<&AuthSettings> {
        self.auth.as_deref()
    }

    pub fn store_index(&self) -> Option<i64> {
        self.store_index
    }

    pub fn monitored_chains(&self) -> Vec<String> {
        filters::monitored_chains(&self.chain_nodes)
    }

    pub fn monitored_chains_considering_nodes(&self) -> Vec<String> {
        filters::monitored_chains_considering_nodes(&self.chain_nodes)
    }

    pub fn monitored_nodes(&self) -> ChainNodeMap {
        filters::monitored_nodes(&self.chain_nodes)
    }

    /// Connection parameters for the metric store, or `None` when the store
    /// section is absent, disabled, or the database index is unknown.
    pub fn store_connection(&self) -> Option<StoreConnection> {
        let settings = self.main.store.as_ref().filter(|s| s.enabled)?;
        Some(StoreConnection {
            host: settings.host.clone(),
            port: settings.port,
            password: settings.password.clone(),
            database: self.store_index?,
        })
    }
}

/// Hot-swappable holder of the current [`TopologySnapshot`].
#[derive(Debug, Default)]
pub struct TopologyStore {
    current: ArcSwap<TopologySnapshot>,
}

impl TopologyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&self) -> Arc<TopologySnapshot> {
        self.current.load_full()
    }

    pub fn replace_chain_nodes(&self, map: ChainNodeMap) -> u64 {
        let map = Arc::new(map);
        self.swap(|snapshot| snapshot.chain_nodes = Arc::clone(&map))
    }

    pub fn replace_repo_names(&self, names: RepoNames) -> u64 {
        let names = Arc::new(names);
        self.swap(|snapshot| snapshot.repo_names = Arc::clone(&names))
    }

    pub fn replace_main(&self, main: MainSettings) -> u64 {
        let main = Arc::new(main);
        self.swap(|snapshot| snapshot.main = Arc::clone(&main))
    }

    pub fn replace_auth(&self, auth: AuthSettings) -> u64 {
        let auth = Arc::new(auth);
        self.swap(|snapshot| snapshot.auth = Some(Arc::clone(&auth)))
    }

    pub fn replace_store_index(&self, index: Option<i64>) -> u64 {
        self.swap(|snapshot| snapshot.store_index = index)
    }

    /// Applies `update` to a copy of the current snapshot and publishes it.
    /// Concurrent swaps of different domains retry instead of overwriting
    /// each other.
    fn swap(&self, update: impl Fn(&mut TopologySnapshot)) -> u64 {
        let previous = self.current.rcu(|current| {
            let mut next = TopologySnapshot::clone(current);
            update(&mut next);
            next.version = current.version + 1;
            next
        });
        let version = previous.version + 1;
        gauge!("dashboard_topology_version").set(version as f64);
        debug!(version, "topology snapshot swapped");
        version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Node, StoreSettings};
    use std::collections::BTreeMap;

    fn single_chain(chain: &str, node: &str) -> ChainNodeMap {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            node.to_string(),
            Node::new(node, chain).with_monitor_node(true),
        );
        let mut map = ChainNodeMap::new();
        map.insert(chain.to_string(), nodes);
        map
    }

    #[test]
    fn replacing_a_domain_keeps_the_others() {
        let store = TopologyStore::new();
        store.replace_repo_names(["panic".to_string()].into_iter().collect());
        store.replace_chain_nodes(single_chain("Polka", "NodeA"));

        let snapshot = store.load();
        assert_eq!(snapshot.version(), 2);
        assert!(snapshot.repo_names().contains("panic"));
        assert!(snapshot.chain_nodes().contains_key("Polka"));
    }

    #[test]
    fn readers_keep_their_snapshot_across_swaps() {
        let store = TopologyStore::new();
        store.replace_chain_nodes(single_chain("Polka", "NodeA"));
        let before = store.load();

        store.replace_chain_nodes(single_chain("Kusama", "NodeB"));
        let after = store.load();

        assert!(before.chain_nodes().contains_key("Polka"));
        assert!(!before.chain_nodes().contains_key("Kusama"));
        assert!(after.chain_nodes().contains_key("Kusama"));
        assert!(after.version() > before.version());
    }

    #[test]
    fn store_connection_requires_enabled_settings_and_index() {
        let store = TopologyStore::new();
        assert!(store.load().store_connection().is_none());

        store.replace_main(MainSettings {
            alerter_id: Some("alerter".into()),
            store: Some(StoreSettings {
                enabled: true,
                host: "localhost".into(),
                port: 6379,
                password: None,
            }),
        });
        assert!(store.load().store_connection().is_none());

        store.replace_store_index(Some(10));
        let connection = store.load().store_connection().expect("configured");
        assert_eq!(connection.database, 10);
        assert_eq!(connection.port, 6379);

        store.replace_main(MainSettings {
            alerter_id: Some("alerter".into()),
            store: Some(StoreSettings {
                enabled: false,
                host: "localhost".into(),
                port: 6379,
                password: None,
            }),
        });
        assert!(store.load().store_connection().is_none());
    }

    #[test]
    fn concurrent_swaps_of_different_domains_are_not_lost() {
        let store = Arc::new(TopologyStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    if i % 2 == 0 {
                        store.replace_repo_names([format!("repo-{i}")].into_iter().collect());
                    } else {
                        store.replace_store_index(Some(i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = store.load();
        assert_eq!(snapshot.version(), 8);
        assert_eq!(snapshot.repo_names().len(), 1);
        assert!(snapshot.store_index().is_some());
    }

    #[test]
    fn each_swap_returns_the_version_it_published() {
        let store = Arc::new(TopologyStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    (0..50)
                        .map(|_| {
                            if i % 2 == 0 {
                                store.replace_store_index(Some(i))
                            } else {
                                store.replace_repo_names(RepoNames::new())
                            }
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut versions: Vec<u64> = handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect();
        versions.sort_unstable();
        assert_eq!(versions, (1..=400).collect::<Vec<_>>());
    }
}
