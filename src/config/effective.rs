//! Effective configuration preview
//!
//! Captures, for each selected destination, the merged defaults it resolves
//! to and the password command they render, along with where the config
//! was loaded from. Rendered as TOML or JSON by `config show`.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{Config, ConfigSource, Defaults};
use crate::destination::resolve_destination;
use crate::password::{password_command, PasswordError};
use crate::selection::SelectedDatastore;

/// Errors building or rendering a preview
#[derive(Debug, thiserror::Error)]
pub enum PreviewError {
    #[error("store={store:?}, destination={destination:?}: {source}")]
    Password {
        store: String,
        destination: String,
        #[source]
        source: PasswordError,
    },

    #[error("Failed to render TOML: {0}")]
    Toml(#[from] toml::ser::Error),

    #[error("Failed to render JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Output format for a preview
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreviewFormat {
    #[default]
    Toml,
    Json,
}

impl FromStr for PreviewFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "toml" => Ok(PreviewFormat::Toml),
            "json" => Ok(PreviewFormat::Json),
            other => Err(format!("unknown format {:?} (expected toml or json)", other)),
        }
    }
}

impl fmt::Display for PreviewFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreviewFormat::Toml => f.write_str("toml"),
            PreviewFormat::Json => f.write_str("json"),
        }
    }
}

/// Resolved settings for one destination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EffectiveDestination {
    pub store: String,
    pub destination: String,

    /// Restic repository path
    pub path: String,

    /// Rendered password command; empty when none is configured
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password_command: String,

    /// Merged defaults after inheritance
    #[serde(default, skip_serializing_if = "Defaults::is_empty")]
    pub defaults: Defaults,
}

/// The `config show` document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectiveReport {
    /// Loaded config file and its digest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ConfigSource>,

    #[serde(default)]
    pub destinations: Vec<EffectiveDestination>,
}

impl EffectiveReport {
    /// Resolve every selected destination.
    pub fn build(
        config: &Config,
        selected: &[SelectedDatastore<'_>],
        config_dir: &Path,
    ) -> Result<Self, PreviewError> {
        let mut destinations = Vec::new();

        for entry in selected {
            for &dest in &entry.destinations {
                let defaults = resolve_destination(config, dest);
                let password_command = password_command(config_dir, &defaults.password_config)
                    .map_err(|source| PreviewError::Password {
                        store: entry.datastore.name.clone(),
                        destination: dest.name.clone(),
                        source,
                    })?;

                destinations.push(EffectiveDestination {
                    store: entry.datastore.name.clone(),
                    destination: dest.name.clone(),
                    path: dest.path.clone(),
                    password_command,
                    defaults,
                });
            }
        }

        Ok(Self {
            source: config.source.clone(),
            destinations,
        })
    }

    pub fn render(&self, format: PreviewFormat) -> Result<String, PreviewError> {
        match format {
            PreviewFormat::Toml => Ok(toml::to_string_pretty(self)?),
            PreviewFormat::Json => Ok(serde_json::to_string_pretty(self)?),
        }
    }
}
