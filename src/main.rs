//! statharvest: multilingual statistical metadata harvester
//!
//! Command line front end for the gather, fetch and import stages.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use statharvest::config::{Config, FailurePolicy, LogFormat, LoggingConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "statharvest")]
#[command(about = "Harvest multilingual statistical dataset metadata into a catalog")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "statharvest.toml")]
    config: PathBuf,

    /// Read the feed from a local file instead of the configured URL
    #[arg(long, global = true)]
    feed: Option<PathBuf>,

    /// Queue directory
    #[arg(long, global = true)]
    queue_dir: Option<PathBuf>,

    /// Suppress progress bars and summaries
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the feed and queue one record per package
    Gather {
        /// Treat every resource as reachable (no HEAD requests)
        #[arg(long)]
        skip_probe: bool,

        /// Maximum packages to queue
        #[arg(long)]
        max_packages: Option<usize>,
    },

    /// Validate gathered objects and mark them ready for import
    Fetch,

    /// Import fetched objects into the catalog
    Import {
        /// Stop at the first failing record
        #[arg(long)]
        abort_on_error: bool,
    },

    /// Run gather, fetch and import in one go
    Run {
        /// Treat every resource as reachable (no HEAD requests)
        #[arg(long)]
        skip_probe: bool,

        /// Maximum packages to queue
        #[arg(long)]
        max_packages: Option<usize>,

        /// Stop at the first failing record
        #[arg(long)]
        abort_on_error: bool,
    },

    /// List feed resources that do not answer 200
    Audit {
        /// Write the report to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show how many queued objects are in each state
    QueueStatus {
        /// List errored objects with their last error
        #[arg(long)]
        errors: bool,
    },

    /// Write a default configuration file
    Init {
        /// Output directory
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

fn init_logging(logging: &LoggingConfig, verbose: u8) -> Result<()> {
    let level = logging.level.raised_by(verbose);
    let filter = if verbose > 0 {
        EnvFilter::new(level.as_str())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()))
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match logging.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    }
    .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Init { path } = &cli.command {
        init_logging(&LoggingConfig::default(), cli.verbose)?;
        return commands::init::init_config(path);
    }

    let mut config = if cli.config.exists() {
        Config::load(&cli.config)?
    } else {
        Config::default()
    };

    init_logging(&config.logging, cli.verbose)?;

    if let Some(feed) = cli.feed {
        config.harvest.feed_path = Some(feed);
    }
    if let Some(queue_dir) = cli.queue_dir {
        config.harvest.queue_dir = queue_dir;
    }
    config.harvest.quiet |= cli.quiet;

    match cli.command {
        Commands::Gather {
            skip_probe,
            max_packages,
        } => {
            if max_packages.is_some() {
                config.harvest.max_packages = max_packages;
            }
            commands::harvest::gather(config, skip_probe)
        }
        Commands::Fetch => commands::harvest::fetch(config),
        Commands::Import { abort_on_error } => {
            if abort_on_error {
                config.harvest.failure_policy = FailurePolicy::Abort;
            }
            commands::harvest::import(config)
        }
        Commands::Run {
            skip_probe,
            max_packages,
            abort_on_error,
        } => {
            if max_packages.is_some() {
                config.harvest.max_packages = max_packages;
            }
            if abort_on_error {
                config.harvest.failure_policy = FailurePolicy::Abort;
            }
            commands::harvest::run(config, skip_probe)
        }
        Commands::Audit { output } => commands::audit::audit_resources(config, output),
        Commands::QueueStatus { errors } => commands::status::show_queue_status(config, errors),
        Commands::Init { .. } => Ok(()),
    }
}
