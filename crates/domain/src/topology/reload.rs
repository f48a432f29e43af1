use std::{collections::BTreeSet, sync::Arc};

use metrics::counter;
use tracing::{debug, error, info, warn};

use crate::{
    config::ConfigError,
    documents::{ConfigDocument, ConfigKind, ConfigSource, DocumentError},
    model::{repo_name_from_record, AuthSettings, ChainNodeMap, MainSettings, Node, StoreSettings},
};

use super::TopologyStore;

/// Result of a reload that read its document successfully or found it
/// missing. Hard read/parse failures are returned as `DocumentError`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadOutcome {
    Applied,
    /// The document does not exist; the previous state is kept.
    NotFound,
    /// Some required fields were absent; their previous values are kept.
    FieldMissing(Vec<&'static str>),
}

impl ReloadOutcome {
    fn label(&self) -> &'static str {
        match self {
            ReloadOutcome::Applied => "applied",
            ReloadOutcome::NotFound => "not_found",
            ReloadOutcome::FieldMissing(_) => "field_missing",
        }
    }
}

/// Rebuilds slices of a [`TopologyStore`] from config documents.
pub struct TopologyLoader<S> {
    store: Arc<TopologyStore>,
    source: S,
}

impl<S> TopologyLoader<S>
where
    S: ConfigSource,
{
    pub fn new(store: Arc<TopologyStore>, source: S) -> Self {
        Self { store, source }
    }

    pub fn store(&self) -> &Arc<TopologyStore> {
        &self.store
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// First load at startup. Every document is attempted; read failures are
    /// logged and tolerated, except that the process must not come up without
    /// UI credentials.
    pub fn load_initial(&self) -> Result<(), ConfigError> {
        for kind in [
            ConfigKind::UserMain,
            ConfigKind::UserNodes,
            ConfigKind::UserRepos,
            ConfigKind::InternalMain,
            ConfigKind::UserUi,
        ] {
            self.handle_change(kind);
        }

        if self.store.load().auth().is_none() {
            return Err(ConfigError::InvalidAuthSetup {
                path: self.source.path(ConfigKind::UserUi),
            });
        }
        Ok(())
    }

    /// Reload entry point for change events: never fails, only reports.
    pub fn handle_change(&self, kind: ConfigKind) {
        match self.reload(kind) {
            Ok(ReloadOutcome::Applied) => {
                info!(config = kind.as_ref(), "config reloaded");
            }
            Ok(ReloadOutcome::NotFound) => {
                error!(
                    config = kind.as_ref(),
                    path = %self.source.path(kind).display(),
                    "config not found, keeping previous values"
                );
            }
            Ok(ReloadOutcome::FieldMissing(fields)) => {
                error!(
                    config = kind.as_ref(),
                    ?fields,
                    "config is missing fields, keeping previous values for them"
                );
            }
            Err(err) => {
                counter!("dashboard_config_reloads_total", "config" => kind.as_ref().to_owned(), "result" => "error")
                    .increment(1);
                error!(config = kind.as_ref(), %err, "config reload failed");
            }
        }
    }

    pub fn reload(&self, kind: ConfigKind) -> Result<ReloadOutcome, DocumentError> {
        let document = match self.source.read(kind) {
            Ok(document) => document,
            Err(err) if err.is_not_found() => {
                record(kind, &ReloadOutcome::NotFound);
                return Ok(ReloadOutcome::NotFound);
            }
            Err(err) => return Err(err),
        };

        let outcome = match kind {
            ConfigKind::UserMain => self.apply_main(&document),
            ConfigKind::UserNodes => self.apply_nodes(&document),
            ConfigKind::UserRepos => self.apply_repos(&document),
            ConfigKind::InternalMain => self.apply_internal(&document),
            ConfigKind::UserUi => self.apply_auth(&document),
        };
        record(kind, &outcome);
        Ok(outcome)
    }

    /// Clears a domain after its file was deleted. UI credentials are kept:
    /// deleting the file must not switch authentication off.
    pub fn reset(&self, kind: ConfigKind) {
        match kind {
            ConfigKind::UserMain => {
                self.store.replace_main(MainSettings::default());
            }
            ConfigKind::UserNodes => {
                self.store.replace_chain_nodes(ChainNodeMap::new());
            }
            ConfigKind::UserRepos => {
                self.store.replace_repo_names(BTreeSet::new());
            }
            ConfigKind::InternalMain => {
                self.store.replace_store_index(None);
            }
            ConfigKind::UserUi => {
                warn!(
                    config = kind.as_ref(),
                    "config deleted, keeping previously loaded credentials"
                );
                return;
            }
        }
        counter!("dashboard_config_reloads_total", "config" => kind.as_ref().to_owned(), "result" => "reset")
            .increment(1);
        debug!(config = kind.as_ref(), "config values reset to defaults");
    }

    fn apply_main(&self, document: &ConfigDocument) -> ReloadOutcome {
        let previous = self.store.load();
        let mut next = previous.main().clone();
        let mut missing = Vec::new();

        match document.field("general", "unique_alerter_identifier") {
            Some(id) => next.alerter_id = Some(id.to_string()),
            None => missing.push("general.unique_alerter_identifier"),
        }

        match parse_store_settings(document) {
            Ok(settings) => next.store = Some(settings),
            Err(field) => missing.push(field),
        }

        self.store.replace_main(next);
        outcome_from(missing)
    }

    fn apply_nodes(&self, document: &ConfigDocument) -> ReloadOutcome {
        let mut map = ChainNodeMap::new();
        for (section, record) in document.sections() {
            match Node::from_record(record.clone()) {
                Ok(node) => {
                    map.entry(node.chain_name().to_string())
                        .or_default()
                        .insert(node.name().to_string(), node);
                }
                Err(err) => {
                    warn!(section, %err, "skipping node with no chain_name or node_name");
                }
            }
        }
        self.store.replace_chain_nodes(map);
        ReloadOutcome::Applied
    }

    fn apply_repos(&self, document: &ConfigDocument) -> ReloadOutcome {
        let mut names = BTreeSet::new();
        for (section, record) in document.sections() {
            match repo_name_from_record(record) {
                Ok(name) => {
                    names.insert(name.to_string());
                }
                Err(err) => warn!(section, %err, "skipping repo with no repo_name"),
            }
        }
        self.store.replace_repo_names(names);
        ReloadOutcome::Applied
    }

    fn apply_internal(&self, document: &ConfigDocument) -> ReloadOutcome {
        let index = document
            .field("redis", "redis_database")
            .and_then(|value| value.parse::<i64>().ok());
        match index {
            Some(index) => {
                self.store.replace_store_index(Some(index));
                ReloadOutcome::Applied
            }
            None => ReloadOutcome::FieldMissing(vec!["redis.redis_database"]),
        }
    }

    fn apply_auth(&self, document: &ConfigDocument) -> ReloadOutcome {
        let previous = self.store.load();
        let held = previous.auth();
        let pick = |key: &str, held: Option<&String>| {
            document
                .field("authentication", key)
                .map(str::to_string)
                .or_else(|| held.cloned())
        };

        let mut missing = Vec::new();
        for (key, label) in [
            ("username", "authentication.username"),
            ("hashed_password", "authentication.hashed_password"),
            ("cookie_secret", "authentication.cookie_secret"),
        ] {
            if document.field("authentication", key).is_none() {
                missing.push(label);
            }
        }

        let username = pick("username", held.map(|a| &a.username));
        let hashed_password = pick("hashed_password", held.map(|a| &a.hashed_password));
        let cookie_secret = pick("cookie_secret", held.map(|a| &a.cookie_secret));

        if let (Some(username), Some(hashed_password), Some(cookie_secret)) =
            (username, hashed_password, cookie_secret)
        {
            self.store.replace_auth(AuthSettings {
                username,
                hashed_password,
                cookie_secret,
            });
        }
        outcome_from(missing)
    }
}

fn parse_store_settings(document: &ConfigDocument) -> Result<StoreSettings, &'static str> {
    if document.section("redis").is_none() {
        return Err("redis");
    }
    let host = document.field("redis", "host").ok_or("redis.host")?;
    let port = document
        .field("redis", "port")
        .and_then(|value| value.parse::<u16>().ok())
        .ok_or("redis.port")?;
    let enabled = document
        .field("redis", "enabled")
        .map_or(true, crate::model::to_bool);

    Ok(StoreSettings {
        enabled,
        host: host.to_string(),
        port,
        password: document.field("redis", "password").map(str::to_string),
    })
}

fn outcome_from(missing: Vec<&'static str>) -> ReloadOutcome {
    if missing.is_empty() {
        ReloadOutcome::Applied
    } else {
        ReloadOutcome::FieldMissing(missing)
    }
}

fn record(kind: ConfigKind, outcome: &ReloadOutcome) {
    counter!("dashboard_config_reloads_total", "config" => kind.as_ref().to_owned(), "result" => outcome.label())
        .increment(1);
}
