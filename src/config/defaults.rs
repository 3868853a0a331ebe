//! Inheritable configuration values
//!
//! `Defaults` appear at three levels of the config file: top-level,
//! per-datastore, and per-destination. Any field may be absent, in which case
//! it is inherited from the next level up.

use serde::{Deserialize, Serialize};

use super::merge::{merge_field, Merge};
use super::restic::ResticDefaults;

/// A bundle of inheritable configuration values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Defaults {
    /// Produces the restic `--password-command` flag
    #[serde(
        rename = "password-config",
        default,
        skip_serializing_if = "PasswordConfig::is_empty"
    )]
    pub password_config: PasswordConfig,

    /// Restic flag values, per subcommand
    #[serde(default, skip_serializing_if = "ResticDefaults::is_empty")]
    pub restic: ResticDefaults,
}

impl Defaults {
    pub fn is_empty(&self) -> bool {
        self.password_config.is_empty() && self.restic.is_empty()
    }
}

impl Merge for Defaults {
    fn merge_from(&mut self, fallback: &Self) {
        self.password_config.merge_from(&fallback.password_config);
        self.restic.merge_from(&fallback.restic);
    }
}

/// Template and arguments for building a password command.
///
/// The template may call `filename "path"` or `filenameArg i`, where `i`
/// indexes into `args`. Both resolve relative paths against the config
/// directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PasswordConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,

    /// Positional arguments referenced from the template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
}

impl PasswordConfig {
    pub fn is_empty(&self) -> bool {
        self.template.is_none() && self.args.is_none()
    }
}

impl Merge for PasswordConfig {
    fn merge_from(&mut self, fallback: &Self) {
        merge_field(&mut self.template, &fallback.template);
        merge_field(&mut self.args, &fallback.args);
    }
}
