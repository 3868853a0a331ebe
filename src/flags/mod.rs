//! Restic flag building
//!
//! Converts a destination's effective configuration into an ordered list of
//! `(key, value)` flags for one restic subcommand:
//! 1. `repo` (the destination path)
//! 2. `password-command`, when a password template is set
//! 3. Subcommand flags merged over global flags, sorted by key. Multi-valued
//!    flags keep their configured order.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{Defaults, Destination, ResticDefaults};
use crate::password::{password_command, PasswordError};

/// Flag key for the repository path
pub const REPO_FLAG: &str = "repo";

/// Flag key for the password command
pub const PASSWORD_COMMAND_FLAG: &str = "password-command";

/// One command-line flag; keys may repeat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flag {
    pub key: String,
    pub value: String,
}

impl Flag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "--{}={}", self.key, self.value)
    }
}

/// The closed set of value shapes a config field can hold
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Str(String),
    /// Repeated flag, one per element
    List(Vec<String>),
    /// Repeated flag, one `key=value` per inner pair
    Options(Vec<BTreeMap<String, String>>),
}

impl FieldValue {
    /// Text values for each flag this field expands to, in order.
    pub fn flag_values(&self) -> Vec<String> {
        match self {
            FieldValue::Bool(b) => vec![b.to_string()],
            FieldValue::Int(n) => vec![n.to_string()],
            FieldValue::Uint(n) => vec![n.to_string()],
            FieldValue::Str(s) => vec![s.clone()],
            FieldValue::List(items) => items.clone(),
            FieldValue::Options(options) => options
                .iter()
                .flat_map(|option| option.iter().map(|(k, v)| format!("{}={}", k, v)))
                .collect(),
        }
    }
}

/// Conversion of a config field into a [`FieldValue`]
pub trait ToFieldValue {
    fn to_field_value(&self) -> FieldValue;
}

impl ToFieldValue for bool {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::Bool(*self)
    }
}

impl ToFieldValue for i64 {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::Int(*self)
    }
}

impl ToFieldValue for u64 {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::Uint(*self)
    }
}

impl ToFieldValue for String {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::Str(self.clone())
    }
}

impl ToFieldValue for Vec<String> {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::List(self.clone())
    }
}

impl ToFieldValue for Vec<BTreeMap<String, String>> {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::Options(self.clone())
    }
}

/// A record whose set fields map onto restic flags
pub trait FlagFields {
    /// `(flag key, value)` for every set field
    fn flag_fields(&self) -> Vec<(&'static str, FieldValue)>;
}

/// Restic subcommands with their own flag bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subcommand {
    Backup,
    Check,
    /// `ls`, also accepted as `list`
    Ls,
    Snapshots,
    Stats,
    /// Anything else; only `repo` and `password-command` apply
    Other(String),
}

impl Subcommand {
    pub fn parse(token: &str) -> Self {
        match token {
            "backup" => Subcommand::Backup,
            "check" => Subcommand::Check,
            "ls" | "list" => Subcommand::Ls,
            "snapshots" => Subcommand::Snapshots,
            "stats" => Subcommand::Stats,
            other => Subcommand::Other(other.to_string()),
        }
    }

    /// Canonical token for the subcommand
    pub fn as_str(&self) -> &str {
        match self {
            Subcommand::Backup => "backup",
            Subcommand::Check => "check",
            Subcommand::Ls => "ls",
            Subcommand::Snapshots => "snapshots",
            Subcommand::Stats => "stats",
            Subcommand::Other(token) => token,
        }
    }

    /// Whether datastore sources are appended as positional arguments
    pub fn takes_sources(&self) -> bool {
        matches!(self, Subcommand::Backup)
    }

    /// The subcommand's own flag bundle, if it has one
    pub fn bundle<'a>(&self, restic: &'a ResticDefaults) -> Option<&'a dyn FlagFields> {
        match self {
            Subcommand::Backup => Some(&restic.backup),
            Subcommand::Check => Some(&restic.check),
            Subcommand::Ls => Some(&restic.ls),
            Subcommand::Snapshots => Some(&restic.snapshots),
            Subcommand::Stats => Some(&restic.stats),
            Subcommand::Other(_) => None,
        }
    }
}

impl fmt::Display for Subcommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the flags for `dest` running `subcommand`.
///
/// `effective` must already be merged with the destination's parents.
pub fn build_flags(
    dest: &Destination,
    effective: &Defaults,
    config_dir: &Path,
    subcommand: &Subcommand,
) -> Result<Vec<Flag>, PasswordError> {
    let mut out = vec![Flag::new(REPO_FLAG, dest.path.as_str())];

    let pwcmd = password_command(config_dir, &effective.password_config)?;
    if !pwcmd.is_empty() {
        out.push(Flag::new(PASSWORD_COMMAND_FLAG, pwcmd));
    }

    if let Some(bundle) = subcommand.bundle(&effective.restic) {
        out.extend(restic_flags(bundle, &effective.restic.global));
    }

    debug!(
        destination = %dest.name,
        %subcommand,
        count = out.len(),
        "built flags"
    );
    Ok(out)
}

/// Merge subcommand flags over global flags and expand them in key order.
pub fn restic_flags(command: &dyn FlagFields, global: &dyn FlagFields) -> Vec<Flag> {
    let mut merged: BTreeMap<&'static str, FieldValue> = command.flag_fields().into_iter().collect();
    for (key, value) in global.flag_fields() {
        merged.entry(key).or_insert(value);
    }

    merged
        .into_iter()
        .flat_map(|(key, value)| {
            value
                .flag_values()
                .into_iter()
                .map(move |v| Flag::new(key, v))
        })
        .collect()
}
