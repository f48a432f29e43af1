//! Derived views over the chain -> node map.
//!
//! All views are recomputed on every call; the map they read can be swapped
//! by a reload between two calls.

use std::collections::BTreeMap;

use crate::model::{ChainNodeMap, Node};

/// Chains with at least one node used as a data source.
pub fn monitored_chains(map: &ChainNodeMap) -> Vec<String> {
    chains_matching(map, |node| node.use_as_data_source())
}

/// Chains with at least one node that is monitored or used as a data source.
/// Always a superset of [`monitored_chains`].
pub fn monitored_chains_considering_nodes(map: &ChainNodeMap) -> Vec<String> {
    chains_matching(map, |node| node.monitor_node() || node.use_as_data_source())
}

/// Restricts [`monitored_chains_considering_nodes`] to the monitored nodes of
/// each chain. A chain whose nodes are all filtered out is kept with an empty
/// node map.
pub fn monitored_nodes(map: &ChainNodeMap) -> ChainNodeMap {
    monitored_chains_considering_nodes(map)
        .into_iter()
        .map(|chain| {
            let nodes: BTreeMap<String, Node> = map
                .get(&chain)
                .into_iter()
                .flatten()
                .filter(|(_, node)| node.monitor_node())
                .map(|(name, node)| (name.clone(), node.clone()))
                .collect();
            (chain, nodes)
        })
        .collect()
}

fn chains_matching(map: &ChainNodeMap, filter: impl Fn(&Node) -> bool) -> Vec<String> {
    map.iter()
        .filter(|(_, nodes)| nodes.values().any(&filter))
        .map(|(chain, _)| chain.clone())
        .collect()
}
