//! # tape-runner
//!
//! Main entry point for the market-data recorder.
//!
//! Loads a JSON configuration file, claims the single-instance marker of
//! every configured pipeline, starts the recorder modules and runs until
//! SIGINT/SIGTERM.
//!
//! # Usage
//!
//! ```bash
//! tape-runner config.json --log-level info --pipeline depth
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use tape_core::error::RecorderError;
use tape_core::guard::{FsMarkerStore, InstanceGuard, MarkerStore};
use tape_md::registry::PipelineSelection;
use tracing::{error, info};

/// Market data recorder.
#[derive(Parser)]
#[command(name = "tape-runner", about = "Binance ticker and order book recorder")]
struct Cli {
    /// Configuration file path (JSON).
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Optional log directory for file output. Overrides `recorder.log_path`.
    #[arg(long)]
    log_dir: Option<String>,

    /// Which configured pipelines to run.
    #[arg(long, value_enum, default_value_t = Pipelines::All)]
    pipeline: Pipelines,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Pipelines {
    All,
    Ticker,
    Depth,
}

impl From<Pipelines> for PipelineSelection {
    fn from(p: Pipelines) -> Self {
        match p {
            Pipelines::All => PipelineSelection::All,
            Pipelines::Ticker => PipelineSelection::Ticker,
            Pipelines::Depth => PipelineSelection::Depth,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Load configuration (fatal on error)
    let config = tape_core::config::load_config(&cli.config)?;

    // 2. Initialize logging
    let module_name = config.module_name();
    let log_dir = cli.log_dir.clone().or_else(|| config.log_path());
    tape_core::logging::init_logging(
        &cli.log_level,
        log_dir.as_deref(),
        &module_name,
        config.log_format(),
    );
    info!(
        "tape-runner starting, config={}, log_level={}, pipeline={:?}",
        cli.config.display(),
        cli.log_level,
        cli.pipeline
    );

    // 3. Create modules
    let mut modules = tape_md::registry::create_modules(&config, cli.pipeline.into())?;

    // 4. Claim one marker per module before any work starts
    let store: Arc<dyn MarkerStore> = Arc::new(FsMarkerStore);
    let guards = match claim_markers(store, modules.iter().map(|m| m.lock_path())) {
        Ok(guards) => guards,
        Err(RecorderError::SingletonViolation { path }) => {
            eprintln!("{}", singleton_message(&path));
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    // 5. Start all modules
    for module in &mut modules {
        module.start().await?;
        info!("module '{}' started", module.name());
    }
    info!("all {} module(s) started, press Ctrl+C to stop", modules.len());

    // 6. Wait for shutdown signal
    wait_for_shutdown().await?;
    info!("shutdown signal received");

    // 7. Stop all modules, then release markers
    for module in &mut modules {
        info!("stopping module '{}'", module.name());
        if let Err(e) = module.stop().await {
            error!("error stopping '{}': {e}", module.name());
        }
    }
    drop(guards);

    info!("all modules stopped, goodbye");
    Ok(())
}

/// Claim every marker, or none: on failure the markers already claimed are
/// released before the error is returned.
fn claim_markers<'a>(
    store: Arc<dyn MarkerStore>,
    paths: impl IntoIterator<Item = &'a Path>,
) -> Result<Vec<InstanceGuard>, RecorderError> {
    let mut guards = Vec::new();
    for path in paths {
        guards.push(InstanceGuard::acquire(store.clone(), path)?);
    }
    Ok(guards)
}

fn singleton_message(path: &Path) -> String {
    format!(
        "Another instance is already running (marker: {}). If you are sure no other \
         instance is running, delete the marker file and restart.",
        path.display()
    )
}

#[cfg(unix)]
async fn wait_for_shutdown() -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut term = signal(SignalKind::terminate())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res?,
        _ = term.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
