//! Tracklist Crawler CLI
//!
//! Local execution entry point.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracklist_crawler::{
    error::Result,
    frontier::checkpoint,
    models::{Config, EntityKind},
    pipeline,
    storage::{LocalStore, StoreMode, local::for_each_record},
};

/// tlcrawl - Resumable Tracklist Catalog Crawler
#[derive(Parser, Debug)]
#[command(
    name = "tlcrawl",
    version,
    about = "Resumable tracklist catalog crawler"
)]
struct Cli {
    /// Path to storage directory holding config, logs and checkpoint
    #[arg(short, long, default_value = "results")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl the catalog, resuming from the last checkpoint
    Crawl {
        /// Truncate the logs and ignore any checkpoint
        #[arg(long)]
        fresh: bool,

        /// Seed tracklist id (replaces the configured seed tracklists)
        #[arg(long = "seed-tracklist")]
        seed_tracklists: Vec<String>,

        /// Stop after this many stored entities
        #[arg(long)]
        max_fetches: Option<u64>,
    },

    /// Export the entity logs as Turtle
    Export {
        /// Output file (default: {storage_dir}/data.ttl)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Validate configuration file
    Validate,

    /// Show stored and pending counts
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Resolve once SIGINT or SIGTERM arrives.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => log::info!("Received Ctrl+C, stopping after checkpoint"),
        _ = terminate => log::info!("Received terminate signal, stopping after checkpoint"),
    }
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    log::info!("Tracklist crawler starting...");

    let config_path = cli.storage_dir.join("config.toml");
    let mut config = Config::load_or_default(&config_path);

    log::info!("Using storage directory {}", cli.storage_dir.display());

    match cli.command {
        Command::Crawl {
            fresh,
            seed_tracklists,
            max_fetches,
        } => {
            if !seed_tracklists.is_empty() {
                config.seed.tracklists = seed_tracklists;
            }
            if max_fetches.is_some() {
                config.crawler.max_fetches = max_fetches;
            }
            config.validate()?;

            let mode = if fresh {
                StoreMode::Fresh
            } else {
                StoreMode::Resume
            };

            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                shutdown_signal().await;
                on_signal.cancel();
            });

            let summary = pipeline::run_crawler(&config, &cli.storage_dir, mode, cancel).await?;
            log::info!(
                "Stored {} entities, {} still pending",
                summary.fetched,
                summary.pending.tracks
                    + summary.pending.artists
                    + summary.pending.labels
                    + summary.pending.tracklists
            );
        }

        Command::Export { output } => {
            config.validate()?;
            let output = output.unwrap_or_else(|| cli.storage_dir.join("data.ttl"));
            let summary = pipeline::run_export(&config.export, &cli.storage_dir, &output).await?;
            log::info!("Turtle written to {}", summary.output.display());
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");
        }

        Command::Info => {
            log::info!("Storage directory: {}", cli.storage_dir.display());

            for kind in EntityKind::ALL {
                let path = LocalStore::log_path(&cli.storage_dir, kind);
                let count = for_each_record(&path, kind, |_| Ok(())).await?;
                log::info!("Known {}: {}", kind.plural(), count);
            }

            let checkpoint_path = config.paths.checkpoint_path(&cli.storage_dir);
            match checkpoint::load(&checkpoint_path).await? {
                Some(state) => {
                    for kind in EntityKind::ALL {
                        log::info!("Pending {}: {}", kind.plural(), state.get(kind).len());
                    }
                }
                None => log::info!("No checkpoint found yet."),
            }
        }
    }

    log::info!("Done!");

    Ok(())
}
