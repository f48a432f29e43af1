//! Snapshot tree of everything known about one chain, and the key plan that
//! produces it.
//!
//! Building a snapshot is split in three steps that are testable on their
//! own: [`SnapshotTemplate`] holds one store key per output field,
//! [`SnapshotTemplate::request`] partitions those keys into the two store
//! reads, and [`SnapshotTemplate::resolve`] folds the fetched values back
//! into a [`ChainSnapshot`] in a single pass.

mod engine;

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;

use crate::{
    keys::Lookup,
    storage::{StoreError, StoreReply, StoreRequest},
};

pub use engine::{build_snapshot, plan_snapshot, AggregationError, SnapshotPlan};

/// Field name -> fetched value (`None` when the store has no value).
pub type FieldValues = BTreeMap<&'static str, Option<String>>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChainSnapshot {
    pub blockchain: FieldValues,
    pub nodes: BTreeMap<String, NodeSnapshot>,
    pub monitors: MonitorSnapshots,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NodeSnapshot {
    #[serde(flatten)]
    pub fields: FieldValues,
    pub is_validator: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MonitorSnapshots {
    pub blockchain: BTreeMap<String, FieldValues>,
    pub node: BTreeMap<String, FieldValues>,
}

/// The store key standing in for one output field until values arrive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub lookup: Lookup,
    pub key: String,
}

pub type FieldPlaceholders = BTreeMap<&'static str, Placeholder>;

/// Same shape as [`ChainSnapshot`], holding keys instead of values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotTemplate {
    pub blockchain: FieldPlaceholders,
    pub nodes: BTreeMap<String, FieldPlaceholders>,
    pub blockchain_monitors: BTreeMap<String, FieldPlaceholders>,
    pub node_monitors: BTreeMap<String, FieldPlaceholders>,
}

impl SnapshotTemplate {
    fn placeholders(&self) -> impl Iterator<Item = &Placeholder> {
        self.blockchain
            .values()
            .chain(self.nodes.values().flat_map(BTreeMap::values))
            .chain(self.blockchain_monitors.values().flat_map(BTreeMap::values))
            .chain(self.node_monitors.values().flat_map(BTreeMap::values))
    }

    /// Partitions every placeholder into the flat and hash reads. Each key is
    /// requested once even when several fields share it.
    pub fn request(&self, hash_key: impl Into<String>) -> StoreRequest {
        let mut request = StoreRequest {
            hash_key: hash_key.into(),
            ..StoreRequest::default()
        };
        let mut seen: HashSet<(Lookup, &str)> = HashSet::new();
        for placeholder in self.placeholders() {
            if !seen.insert((placeholder.lookup, placeholder.key.as_str())) {
                continue;
            }
            match placeholder.lookup {
                Lookup::Flat => request.flat_keys.push(placeholder.key.clone()),
                Lookup::Hash => request.hash_fields.push(placeholder.key.clone()),
            }
        }
        request
    }

    /// Replaces every placeholder with its fetched value. Keys absent from
    /// `values` resolve to `None`.
    pub fn resolve(&self, values: &FetchedValues) -> ChainSnapshot {
        let fill = |fields: &FieldPlaceholders| -> FieldValues {
            fields
                .iter()
                .map(|(field, placeholder)| (*field, values.get(placeholder)))
                .collect()
        };

        ChainSnapshot {
            blockchain: fill(&self.blockchain),
            nodes: self
                .nodes
                .iter()
                .map(|(name, fields)| {
                    (
                        name.clone(),
                        NodeSnapshot {
                            fields: fill(fields),
                            is_validator: String::new(),
                        },
                    )
                })
                .collect(),
            monitors: MonitorSnapshots {
                blockchain: self
                    .blockchain_monitors
                    .iter()
                    .map(|(name, fields)| (name.clone(), fill(fields)))
                    .collect(),
                node: self
                    .node_monitors
                    .iter()
                    .map(|(name, fields)| (name.clone(), fill(fields)))
                    .collect(),
            },
        }
    }
}

/// Values returned by the store, indexed by lookup kind and key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchedValues {
    flat: HashMap<String, Option<String>>,
    hash: HashMap<String, Option<String>>,
}

impl FetchedValues {
    /// Pairs each requested key with the value at the same position.
    pub fn zip(request: &StoreRequest, reply: StoreReply) -> Result<Self, StoreError> {
        if reply.flat.len() != request.flat_keys.len()
            || reply.hash.len() != request.hash_fields.len()
        {
            return Err(StoreError::Other(format!(
                "reply shape mismatch: expected {}+{} values, got {}+{}",
                request.flat_keys.len(),
                request.hash_fields.len(),
                reply.flat.len(),
                reply.hash.len()
            )));
        }

        Ok(Self {
            flat: request.flat_keys.iter().cloned().zip(reply.flat).collect(),
            hash: request.hash_fields.iter().cloned().zip(reply.hash).collect(),
        })
    }

    pub fn get(&self, placeholder: &Placeholder) -> Option<String> {
        let values = match placeholder.lookup {
            Lookup::Flat => &self.flat,
            Lookup::Hash => &self.hash,
        };
        values.get(&placeholder.key).cloned().flatten()
    }
}
