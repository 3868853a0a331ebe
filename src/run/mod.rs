//! Restic batch invocation
//!
//! Builds one restic command line per selected destination:
//!
//! `<subcommand> --<key>=<value>... <extra args>... <source paths>...`
//!
//! Source paths are appended for `backup` only. Each command line can be
//! previewed as a shell comment and, when running, is handed to a [`Runner`].
//! The batch stops at the first failure.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::{Command, ExitStatus};

use thiserror::Error;
use tracing::{debug, info};

use crate::config::{Config, Datastore, Destination};
use crate::destination::resolve_destination;
use crate::flags::{build_flags, Subcommand, PASSWORD_COMMAND_FLAG};
use crate::password::PasswordError;
use crate::selection::SelectedDatastore;

/// Environment variable naming an alternate restic binary
pub const RESTIC_BIN_ENV: &str = "RESTIC_BIN";

/// Binary used when `RESTIC_BIN` is unset
pub const DEFAULT_RESTIC_BIN: &str = "restic";

/// Errors from running an external command
#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to start {bin}: {source}")]
    Spawn {
        bin: String,
        #[source]
        source: io::Error,
    },

    #[error("{bin} exited with {status}")]
    Exit { bin: String, status: ExitStatus },
}

/// Why one destination in a batch failed
#[derive(Debug, Error)]
pub enum BatchErrorKind {
    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error(transparent)]
    Run(#[from] RunError),

    #[error("failed to write preview: {0}")]
    Preview(#[from] io::Error),
}

/// A batch failure, tagged with the destination it happened on
#[derive(Debug, Error)]
#[error("store={store:?}, destination={destination:?}: {kind}")]
pub struct BatchError {
    pub store: String,
    pub destination: String,
    #[source]
    pub kind: BatchErrorKind,
}

impl BatchError {
    fn new(store: &Datastore, dest: &Destination, kind: impl Into<BatchErrorKind>) -> Self {
        Self {
            store: store.name.clone(),
            destination: dest.name.clone(),
            kind: kind.into(),
        }
    }
}

/// Something that can execute a restic command line
pub trait Runner {
    /// Run restic with `args` (the subcommand first) and wait for it.
    fn run(&self, args: &[String]) -> Result<(), RunError>;
}

/// Runs the real restic binary with inherited stdio
#[derive(Debug, Clone)]
pub struct ResticRunner {
    bin: String,
}

impl ResticRunner {
    /// Use `$RESTIC_BIN` when set and non-empty, else `restic` from `PATH`.
    pub fn from_env() -> Self {
        let bin = std::env::var(RESTIC_BIN_ENV)
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_RESTIC_BIN.to_string());
        Self { bin }
    }

    pub fn with_bin(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    pub fn bin(&self) -> &str {
        &self.bin
    }
}

impl Runner for ResticRunner {
    fn run(&self, args: &[String]) -> Result<(), RunError> {
        debug!(bin = %self.bin, ?args, "running restic");

        let status = Command::new(&self.bin)
            .args(args)
            .status()
            .map_err(|source| RunError::Spawn {
                bin: self.bin.clone(),
                source,
            })?;

        if !status.success() {
            return Err(RunError::Exit {
                bin: self.bin.clone(),
                status,
            });
        }
        Ok(())
    }
}

/// One restic subcommand applied to a set of destinations
#[derive(Debug, Clone)]
pub struct ResticBatch {
    /// Base directory for resolving relative secret paths
    pub config_dir: PathBuf,

    /// Subcommand token as given by the user
    pub subcommand: String,

    /// Extra arguments passed through after the generated flags
    pub args: Vec<String>,

    /// Run restic; otherwise only preview
    pub run: bool,
}

impl ResticBatch {
    /// Build the restic argument list for one destination.
    pub fn build_args(
        &self,
        config: &Config,
        store: &Datastore,
        dest: &Destination,
    ) -> Result<Vec<String>, PasswordError> {
        let subcommand = Subcommand::parse(&self.subcommand);
        let effective = resolve_destination(config, dest);
        let flags = build_flags(dest, &effective, &self.config_dir, &subcommand)?;

        let mut out = Vec::with_capacity(1 + flags.len() + self.args.len());
        out.push(self.subcommand.clone());
        out.extend(flags.iter().map(|flag| flag.to_string()));
        out.extend(self.args.iter().cloned());

        if subcommand.takes_sources() {
            out.extend(store.source_paths().map(str::to_string));
        }
        Ok(out)
    }

    /// Preview and optionally run the subcommand for every selected
    /// destination, in order.
    ///
    /// Each command line is written to `sink` as a shell comment. Returns the
    /// number of destinations processed.
    pub fn execute(
        &self,
        config: &Config,
        selected: &[SelectedDatastore<'_>],
        sink: &mut dyn Write,
        runner: &dyn Runner,
    ) -> Result<usize, BatchError> {
        let mut count = 0;

        for entry in selected {
            let store = entry.datastore;
            for &dest in &entry.destinations {
                let args = self
                    .build_args(config, store, dest)
                    .map_err(|e| BatchError::new(store, dest, e))?;

                print_args(sink, &args).map_err(|e| BatchError::new(store, dest, e))?;

                if self.run {
                    info!(store = %store.name, destination = %dest.name, subcommand = %self.subcommand, "running restic");
                    runner
                        .run(&args)
                        .map_err(|e| BatchError::new(store, dest, e))?;
                }
                count += 1;
            }
        }

        info!(count, run = self.run, "batch finished");
        Ok(count)
    }
}

/// Write `args` as a shell comment line.
///
/// The password command value is single-quoted so the line can be pasted
/// into a shell; it may already contain double-quoted paths.
pub fn print_args(sink: &mut dyn Write, args: &[String]) -> io::Result<()> {
    let prefix = format!("--{}=", PASSWORD_COMMAND_FLAG);

    let mut line = String::from("#");
    for arg in args {
        line.push(' ');
        match arg.strip_prefix(&prefix) {
            Some(value) => {
                line.push_str(&prefix);
                line.push('\'');
                line.push_str(value);
                line.push('\'');
            }
            None => line.push_str(arg),
        }
    }

    writeln!(sink, "{}", line)
}
