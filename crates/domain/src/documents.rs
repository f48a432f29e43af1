//! Config documents as opaque section -> field -> value maps.
//!
//! The files themselves are INI documents written by the setup tooling. This
//! module only reads them; validation of the individual fields belongs to the
//! reload routines in [`crate::topology`].

use std::{
    collections::BTreeMap,
    io::ErrorKind,
    path::PathBuf,
};

use ini::Ini;
use strum_macros::{AsRefStr, EnumIter};
use thiserror::Error;

pub type ConfigSection = BTreeMap<String, String>;

/// The five documents the dashboard keeps in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum ConfigKind {
    UserMain,
    UserNodes,
    UserRepos,
    InternalMain,
    UserUi,
}

impl ConfigKind {
    pub fn file_name(self) -> &'static str {
        match self {
            ConfigKind::UserMain => "user_config_main.ini",
            ConfigKind::UserNodes => "user_config_nodes.ini",
            ConfigKind::UserRepos => "user_config_repos.ini",
            ConfigKind::InternalMain => "internal_config_main.ini",
            ConfigKind::UserUi => "user_config_ui.ini",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigDocument {
    sections: BTreeMap<String, ConfigSection>,
}

impl ConfigDocument {
    pub fn parse(text: &str) -> Result<Self, ini::ParseError> {
        let ini = Ini::load_from_str(text)?;
        let mut sections = BTreeMap::new();
        for (name, properties) in ini.iter() {
            // Keys outside any section are not part of any document layout.
            let Some(name) = name else { continue };
            let section: ConfigSection = properties
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect();
            sections.insert(name.to_string(), section);
        }
        Ok(Self { sections })
    }

    pub fn with_section<K, V>(
        mut self,
        name: impl Into<String>,
        fields: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let section = fields
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.sections.insert(name.into(), section);
        self
    }

    pub fn section(&self, name: &str) -> Option<&ConfigSection> {
        self.sections.get(name)
    }

    /// Returns a trimmed, non-empty field value.
    pub fn field(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)?
            .get(key)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    pub fn sections(&self) -> impl Iterator<Item = (&str, &ConfigSection)> {
        self.sections
            .iter()
            .map(|(name, section)| (name.as_str(), section))
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

/// Read access to config documents. `NotFound` must stay distinguishable from
/// every other failure so reloads can keep their last good state.
pub trait ConfigSource: Send + Sync {
    fn path(&self, kind: ConfigKind) -> PathBuf;

    fn read(&self, kind: ConfigKind) -> Result<ConfigDocument, DocumentError>;
}

/// Reads INI documents from a single config directory.
#[derive(Debug, Clone)]
pub struct IniConfigSource {
    dir: PathBuf,
}

impl IniConfigSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

}

impl ConfigSource for IniConfigSource {
    fn path(&self, kind: ConfigKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }

    fn read(&self, kind: ConfigKind) -> Result<ConfigDocument, DocumentError> {
        let path = self.path(kind);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(DocumentError::NotFound { path })
            }
            Err(source) => return Err(DocumentError::Read { path, source }),
        };
        ConfigDocument::parse(&text).map_err(|err| DocumentError::Parse {
            path,
            message: err.to_string(),
        })
    }
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("config `{}` not found", .path.display())]
    NotFound { path: PathBuf },
    #[error("failed to read config `{}`: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config `{}`: {message}", .path.display())]
    Parse { path: PathBuf, message: String },
}

impl DocumentError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, DocumentError::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NODES: &str = "\
[node_0]
node_name = NodeA
chain_name = Polka
monitor_node = true

[node_1]
node_name = NodeB
chain_name = Polka
use_as_data_source = true
";

    #[test]
    fn parses_sections_and_fields() {
        let doc = ConfigDocument::parse(NODES).expect("valid ini");
        assert_eq!(doc.sections().count(), 2);
        assert_eq!(doc.field("node_0", "node_name"), Some("NodeA"));
        assert_eq!(doc.field("node_1", "use_as_data_source"), Some("true"));
        assert_eq!(doc.field("node_1", "monitor_node"), None);
        assert_eq!(doc.field("missing", "node_name"), None);
    }

    #[test]
    fn empty_fields_are_reported_as_absent() {
        let doc = ConfigDocument::parse("[general]\nunique_alerter_identifier =\n").unwrap();
        assert!(doc.section("general").is_some());
        assert_eq!(doc.field("general", "unique_alerter_identifier"), None);
    }

    #[test]
    fn source_distinguishes_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let source = IniConfigSource::new(dir.path());

        let err = source.read(ConfigKind::UserNodes).unwrap_err();
        assert!(err.is_not_found());

        std::fs::write(source.path(ConfigKind::UserNodes), NODES).unwrap();
        let doc = source.read(ConfigKind::UserNodes).expect("document loads");
        assert_eq!(doc.field("node_0", "chain_name"), Some("Polka"));
    }

    #[test]
    fn kinds_map_to_stable_file_names() {
        assert_eq!(ConfigKind::UserMain.file_name(), "user_config_main.ini");
        assert_eq!(ConfigKind::InternalMain.file_name(), "internal_config_main.ini");
        assert_eq!(ConfigKind::UserNodes.as_ref(), "user_nodes");
    }
}
