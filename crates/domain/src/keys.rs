//! Store key schema shared with the monitoring backend.
//!
//! Tokens are fixed constants. A store key is built as
//! `[<alerter_id>:]<token><suffix>` where the prefix is applied only to the
//! alerter-scoped groups listed in [`KeyGroup::is_alerter_scoped`].

use strum_macros::AsRefStr;

/// `nX_<node_name>`
pub const NODE_FIELDS: [(&str, &str); 17] = [
    ("went_down_at", "n1"),
    ("bonded_balance", "n2"),
    ("is_syncing", "n3"),
    ("no_of_peers", "n4"),
    ("active", "n5"),
    ("council_member", "n6"),
    ("elected", "n7"),
    ("disabled", "n8"),
    ("no_of_blocks_authored", "n9"),
    ("time_of_last_block", "n10"),
    ("is_authoring", "n11"),
    ("time_of_last_block_check_activity", "n12"),
    ("time_of_last_height_check_activity", "n13"),
    ("time_of_last_height_change", "n14"),
    ("finalized_block_height", "n15"),
    ("no_change_in_height_warning_sent", "n16"),
    ("auth_index", "n17"),
];

/// `nmX_Node monitor (<node_name>)`
pub const NODE_MONITOR_FIELDS: [(&str, &str); 3] = [
    ("alive", "nm1"),
    ("session_index", "nm2"),
    ("last_height_checked", "nm3"),
];

/// `bcX_<chain_name>`
pub const BLOCKCHAIN_FIELDS: [(&str, &str); 4] = [
    ("referendum_count", "bc1"),
    ("public_prop_count", "bc2"),
    ("council_prop_count", "bc3"),
    ("validator_set_size", "bc4"),
];

/// `bcmX_Blockchain monitor (<chain_name>)`
pub const BLOCKCHAIN_MONITOR_FIELDS: [(&str, &str); 1] = [("alive", "bcm1")];

/// Hash buckets grouping field keys. Only the blockchain bucket is in use.
pub const HASH_BUCKETS: [(&str, &str); 1] = [("blockchain", "hash_bc1")];

pub const BLOCKCHAIN_HASH_BUCKET: &str = HASH_BUCKETS[0].1;

/// Sentinel that never holds a value; requested in place of every blockchain
/// field of a chain that has no data source.
pub const DUMMY_KEY: &str = "_dummy_key_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum KeyGroup {
    Node,
    NodeMonitor,
    Blockchain,
    BlockchainMonitor,
}

/// How the values of a key group are fetched from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lookup {
    /// Plain keys, fetched with one multi-key GET.
    Flat,
    /// Fields of the chain's hash bucket, fetched with one multi-field GET.
    Hash,
}

impl KeyGroup {
    pub fn fields(self) -> &'static [(&'static str, &'static str)] {
        match self {
            KeyGroup::Node => &NODE_FIELDS,
            KeyGroup::NodeMonitor => &NODE_MONITOR_FIELDS,
            KeyGroup::Blockchain => &BLOCKCHAIN_FIELDS,
            KeyGroup::BlockchainMonitor => &BLOCKCHAIN_MONITOR_FIELDS,
        }
    }

    /// Monitor state is written per alerter and therefore namespaced; chain
    /// and node state is shared and never prefixed.
    pub fn is_alerter_scoped(self) -> bool {
        match self {
            KeyGroup::NodeMonitor | KeyGroup::BlockchainMonitor => true,
            KeyGroup::Node | KeyGroup::Blockchain => false,
        }
    }

    pub fn lookup(self) -> Lookup {
        if self.is_alerter_scoped() {
            Lookup::Flat
        } else {
            Lookup::Hash
        }
    }

    fn suffix(self, scope_name: &str) -> String {
        match self {
            KeyGroup::Node | KeyGroup::Blockchain => format!("_{scope_name}"),
            KeyGroup::NodeMonitor => format!("_Node monitor ({scope_name})"),
            KeyGroup::BlockchainMonitor => format!("_Blockchain monitor ({scope_name})"),
        }
    }
}

/// Builds canonical store keys for one alerter identity.
#[derive(Debug, Clone, Copy)]
pub struct KeyBuilder<'a> {
    alerter_id: &'a str,
}

impl<'a> KeyBuilder<'a> {
    pub fn new(alerter_id: &'a str) -> Self {
        Self { alerter_id }
    }

    pub fn key(&self, group: KeyGroup, token: &str, scope_name: &str) -> String {
        let suffix = group.suffix(scope_name);
        if group.is_alerter_scoped() {
            format!("{}:{token}{suffix}", self.alerter_id)
        } else {
            format!("{token}{suffix}")
        }
    }

    /// Every `(field, key)` pair of a group for one chain, node or monitor.
    pub fn group_keys(&self, group: KeyGroup, scope_name: &str) -> Vec<(&'static str, String)> {
        group
            .fields()
            .iter()
            .map(|(field, token)| (*field, self.key(group, token, scope_name)))
            .collect()
    }

    /// The hash bucket holding a chain's blockchain and node fields.
    pub fn hash_bucket(&self, chain_name: &str) -> String {
        format!("{}:{BLOCKCHAIN_HASH_BUCKET}_{chain_name}", self.alerter_id)
    }
}
