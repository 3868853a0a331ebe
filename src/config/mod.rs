//! Configuration tree
//!
//! The config file has three levels that cascade:
//! 1. Top-level `defaults`
//! 2. `datastores.<name>.defaults`
//! 3. `datastores.<name>.destinations.<name>.defaults`
//!
//! Datastore and destination names come from their table keys. Each
//! destination records the key of its owning datastore, and the datastore's
//! parent is always the top-level `defaults` of the enclosing [`Config`].

mod defaults;
mod effective;
mod init;
mod merge;
mod restic;

pub use defaults::{Defaults, PasswordConfig};
pub use effective::{EffectiveDestination, EffectiveReport, PreviewError, PreviewFormat};
pub use init::{default_config_dir, init_config_dir, CONFIG_FILE_NAME, SECRETS_DIR_NAME};
pub use merge::Merge;
pub use restic::{
    ResticBackup, ResticCheck, ResticDefaults, ResticGlobal, ResticLs, ResticSnapshots,
    ResticStats,
};

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Config file is not valid UTF-8: {0}")]
    Encoding(PathBuf),

    #[error("Failed to parse TOML: {0}")]
    Parse(String),

    #[error("Could not determine the user configuration directory: {0}")]
    NoConfigDir(String),

    #[error("Path exists but is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Failed to prepare directory {path}: {source}")]
    Init {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// The parsed config file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Values inherited by every datastore
    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub datastores: BTreeMap<String, Datastore>,

    /// Where this config was loaded from (None when parsed from a string)
    #[serde(skip)]
    pub source: Option<ConfigSource>,
}

/// A loaded config file with provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSource {
    pub path: PathBuf,

    /// SHA-256 digest of the raw file bytes
    pub digest: String,
}

/// Source paths to back up and the restic repositories to back them up to
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Datastore {
    /// Implied by the datastore's key in the config file
    #[serde(skip)]
    pub name: String,

    /// Overrides for the top-level defaults
    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub sources: Vec<Source>,

    #[serde(default)]
    pub destinations: BTreeMap<String, Destination>,
}

/// A restic repository
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Destination {
    /// Implied by the destination's key in the config file
    #[serde(skip)]
    pub name: String,

    /// Key of the owning datastore; None for a destination built outside a
    /// config tree.
    #[serde(skip)]
    pub datastore: Option<String>,

    /// Overrides for the datastore's defaults
    #[serde(default)]
    pub defaults: Defaults,

    /// Restic repository path
    #[serde(default)]
    pub path: String,
}

/// Something to back up
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Source {
    /// Absolute path to a file or directory
    pub path: String,
}

impl Config {
    /// Load the config file at `path`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let bytes = fs::read(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let digest = hex::encode(hasher.finalize());

        let contents =
            String::from_utf8(bytes).map_err(|_| ConfigError::Encoding(path.to_path_buf()))?;

        let mut config = Self::parse(&contents)?;
        debug!(path = %path.display(), %digest, "loaded config");
        config.source = Some(ConfigSource {
            path: path.to_path_buf(),
            digest,
        });
        Ok(config)
    }

    /// Parse config from a TOML string. Unknown keys are rejected.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut config: Config =
            toml::from_str(content).map_err(|e| ConfigError::Parse(parse_message(content, &e)))?;
        config.assign_names();
        Ok(config)
    }

    /// Fill in names from table keys and point each destination at its
    /// datastore.
    fn assign_names(&mut self) {
        for (store_name, store) in &mut self.datastores {
            store.name = store_name.clone();

            for (dest_name, dest) in &mut store.destinations {
                dest.name = dest_name.clone();
                dest.datastore = Some(store_name.clone());
            }
        }
    }

    /// Look up the datastore a destination belongs to.
    pub fn parent_of(&self, dest: &Destination) -> Option<&Datastore> {
        dest.datastore
            .as_deref()
            .and_then(|name| self.datastores.get(name))
    }
}

/// One-line rendering of a TOML error: `line L, column C: message`.
fn parse_message(content: &str, err: &toml::de::Error) -> String {
    let message = err.message().split_whitespace().collect::<Vec<_>>().join(" ");

    match err.span() {
        Some(span) => {
            let before = content.get(..span.start).unwrap_or(content);
            let line = before.matches('\n').count() + 1;
            let column = before.rsplit('\n').next().map_or(0, |l| l.chars().count()) + 1;
            format!("line {}, column {}: {}", line, column, message)
        }
        None => message,
    }
}

impl Datastore {
    /// Source paths in configured order
    pub fn source_paths(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(|source| source.path.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"
[defaults.password-config]
template = 'cat {{ filenameArg 0 }}'
args = ['secrets/default']

[datastores.stuff]
sources = [{ path = '/srv/foo' }]

[datastores.stuff.destinations.alfa]
path = '/repos/alfa'

[datastores.stuff.destinations.bravo]
path = '/repos/bravo'

[datastores.things]
sources = [{ path = '/srv/bar' }, { path = '/srv/qux' }]

[datastores.things.destinations.charlie]
path = '/repos/charlie'
"#;

    #[test]
    fn test_parse_assigns_names() {
        let config = Config::parse(SAMPLE).unwrap();

        let stuff = &config.datastores["stuff"];
        assert_eq!(stuff.name, "stuff");
        assert_eq!(stuff.destinations["alfa"].name, "alfa");
        assert_eq!(stuff.destinations["alfa"].datastore.as_deref(), Some("stuff"));

        let things = &config.datastores["things"];
        assert_eq!(
            things.source_paths().collect::<Vec<_>>(),
            vec!["/srv/bar", "/srv/qux"]
        );
        assert_eq!(things.destinations["charlie"].path, "/repos/charlie");
    }

    #[test]
    fn test_parent_of() {
        let config = Config::parse(SAMPLE).unwrap();
        let charlie = &config.datastores["things"].destinations["charlie"];
        assert_eq!(config.parent_of(charlie).map(|s| s.name.as_str()), Some("things"));

        let orphan = Destination::default();
        assert!(config.parent_of(&orphan).is_none());
    }

    #[test]
    fn test_unknown_top_level_key() {
        let err = Config::parse("[settings]\nfoo = 1\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_parse_error_is_single_line() {
        let input = r#"
[datastores.stuff.destinations.alfa]
path = '/repos/alfa'
pathh = '/typo'
"#;
        let err = Config::parse(input).unwrap_err();
        let text = err.to_string();

        assert_eq!(text.lines().count(), 1, "{}", text);
        assert!(text.starts_with("Failed to parse TOML: line 4, column 1: "), "{}", text);
        assert!(text.contains("unknown field"), "{}", text);
        assert!(text.contains("pathh"), "{}", text);
    }

    #[test]
    fn test_syntax_error_reports_position() {
        let err = Config::parse("[defaults]\nfoo = = 1\n").unwrap_err();
        let text = err.to_string();
        assert_eq!(text.lines().count(), 1, "{}", text);
        assert!(text.contains("line 2, column"), "{}", text);
    }

    #[test]
    fn test_unknown_nested_key() {
        let input = r#"
[defaults]
[defaults.badkey]
file = 'secrets/defaultpassword'
"#;
        assert!(Config::parse(input).is_err());
    }

    #[test]
    fn test_empty_config() {
        let config = Config::parse("").unwrap();
        assert!(config.datastores.is_empty());
        assert!(config.defaults.is_empty());
    }

    #[test]
    fn test_load_records_digest() {
        let mut temp = NamedTempFile::new().unwrap();
        write!(temp, "{}", SAMPLE).unwrap();

        let config = Config::load(temp.path()).unwrap();
        let source = config.source.unwrap();

        assert_eq!(source.path, temp.path());
        assert_eq!(source.digest.len(), 64);
        assert_eq!(config.datastores.len(), 2);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Path::new("/nonexistent/wrestic/config.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }
}
