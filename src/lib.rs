//! wrestic - cascading configuration for restic
//!
//! Resolves a layered backup config (top-level defaults, then datastore,
//! then destination) into the flags and arguments for restic commands, and
//! optionally runs them.

pub mod config;
pub mod destination;
pub mod flags;
pub mod password;
pub mod run;
pub mod selection;

pub use config::{Config, ConfigError, Datastore, Defaults, Destination};
pub use flags::{build_flags, Flag, Subcommand};
pub use run::{ResticBatch, ResticRunner, Runner};
pub use selection::{select, SelectedDatastore};
