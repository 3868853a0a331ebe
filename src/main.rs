//! wrestic CLI
//!
//! Entry point for the `wrestic` command-line tool.

use clap::{ArgAction, Args, Parser, Subcommand};
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use tracing::debug;
use wrestic::config::{
    default_config_dir, init_config_dir, EffectiveReport, PreviewFormat, CONFIG_FILE_NAME,
};
use wrestic::{select, Config, ResticBatch, ResticRunner, SelectedDatastore};

#[derive(Parser)]
#[command(name = "wrestic")]
#[command(about = "Manage restic backups from a cascading config file", version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build restic commands for the selected destinations, and optionally run them
    Restic {
        /// Restic subcommand (backup, check, ls, snapshots, stats, ...)
        subcommand: String,

        #[command(flatten)]
        target: TargetArgs,

        /// Run restic; otherwise only print the commands as shell comments
        #[arg(long)]
        run: bool,

        /// Extra arguments passed to restic after the generated flags (after --)
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Print version information
    Version,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Create the config directory and its secrets directory
    Init {
        /// Base config directory (default: $XDG_CONFIG_HOME/wrestic)
        #[arg(long = "config-dir", short = 'C')]
        config_dir: Option<PathBuf>,
    },

    /// Show the effective configuration of the selected destinations
    Show {
        #[command(flatten)]
        target: TargetArgs,

        /// Output format (toml or json)
        #[arg(long, default_value_t = PreviewFormat::Toml)]
        format: PreviewFormat,
    },
}

/// Where the config lives and which destinations to act on
#[derive(Args)]
struct TargetArgs {
    /// Base config directory (default: $XDG_CONFIG_HOME/wrestic)
    #[arg(long = "config-dir", short = 'C')]
    config_dir: Option<PathBuf>,

    /// Config file (default: <config-dir>/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Datastore names, comma-separated (default: all)
    #[arg(long = "stores", short = 's', value_delimiter = ',')]
    stores: Vec<String>,

    /// Destination names, comma-separated (default: all)
    #[arg(long = "destinations", short = 'd', value_delimiter = ',')]
    destinations: Vec<String>,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.verbose) {
        eprintln!("Error initializing logging: {}", e);
        process::exit(1);
    }

    match cli.command {
        Commands::Restic {
            subcommand,
            target,
            run,
            args,
        } => {
            run_restic(subcommand, target, run, args);
        }
        Commands::Config { action } => match action {
            ConfigCommands::Init { config_dir } => {
                run_config_init(config_dir);
            }
            ConfigCommands::Show { target, format } => {
                run_config_show(target, format);
            }
        },
        Commands::Version => {
            println!("wrestic {}", env!("CARGO_PKG_VERSION"));
        }
    }
}

/// Log to stderr. Without `-v`, `RUST_LOG` is honored and defaults to warn.
fn init_tracing(verbose: u8) -> Result<(), tracing_subscriber::util::TryInitError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init()
}

fn run_restic(subcommand: String, target: TargetArgs, run: bool, args: Vec<String>) {
    let config_dir = resolve_config_dir(target.config_dir.clone());
    let config = load_config(&config_dir, target.config.clone());
    let selected = select_or_exit(&config, &target);

    let batch = ResticBatch {
        config_dir,
        subcommand,
        args,
        run,
    };

    // Previews go to stderr so restic's own output on stdout stays clean.
    let mut sink = io::stderr();
    let runner = ResticRunner::from_env();
    debug!(bin = runner.bin(), "restic runner");

    if let Err(e) = batch.execute(&config, &selected, &mut sink, &runner) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run_config_init(config_dir: Option<PathBuf>) {
    let config_dir = resolve_config_dir(config_dir);

    match init_config_dir(&config_dir) {
        Ok(()) => {
            println!("Config directory ready: {}", config_dir.display());
            let config_file = config_dir.join(CONFIG_FILE_NAME);
            if !config_file.exists() {
                println!("  Create {} to define datastores", config_file.display());
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn run_config_show(target: TargetArgs, format: PreviewFormat) {
    let config_dir = resolve_config_dir(target.config_dir.clone());
    let config = load_config(&config_dir, target.config.clone());
    let selected = select_or_exit(&config, &target);

    let rendered = EffectiveReport::build(&config, &selected, &config_dir)
        .and_then(|report| report.render(format));

    match rendered {
        Ok(text) => print!("{}", text),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn resolve_config_dir(explicit: Option<PathBuf>) -> PathBuf {
    match explicit {
        Some(dir) => dir,
        None => match default_config_dir() {
            Ok(dir) => dir,
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        },
    }
}

fn load_config(config_dir: &Path, config_file: Option<PathBuf>) -> Config {
    let path = config_file.unwrap_or_else(|| config_dir.join(CONFIG_FILE_NAME));

    match Config::load(&path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            process::exit(1);
        }
    }
}

fn select_or_exit<'a>(config: &'a Config, target: &TargetArgs) -> Vec<SelectedDatastore<'a>> {
    let selected = select(&config.datastores, &target.stores, &target.destinations);

    if selected.is_empty() {
        eprintln!("Error: no destinations matched");
        process::exit(1);
    }
    selected
}
