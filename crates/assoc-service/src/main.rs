use anyhow::Result;
use assoc_core::paths;
use assoc_core::storage;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::info;

use assoc_service::engine::GuardEngine;
use assoc_service::monitor;
use assoc_service::notify::LogNotifier;
use assoc_service::registry::AssocRegistry;

#[derive(Parser, Debug)]
#[command(author, version, about = "File association guard service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the background monitor until interrupted
    Run {
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print one status row per guarded extension
    Status {
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Restore every guarded extension to its baseline now
    RestoreAll {
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Track the extensions whose default app the user chose, capturing
    /// the current handlers as baselines
    ImportDefaults {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Run { config } => run_command(config).await,
        Commands::Status { config } => status_command(config),
        Commands::RestoreAll { config } => restore_all_command(config),
        Commands::ImportDefaults { config } => import_defaults_command(config),
    }
}

fn build_engine(config_override: Option<PathBuf>) -> Result<Arc<GuardEngine>> {
    let registry = open_registry()?;
    let config_path = match config_override {
        Some(path) => path,
        None => paths::config_path()?,
    };
    let cfg = storage::load_config(&config_path);
    Ok(Arc::new(GuardEngine::from_config(
        registry,
        Arc::new(LogNotifier),
        cfg,
        Some(config_path),
    )))
}

#[cfg(windows)]
fn open_registry() -> Result<Arc<dyn AssocRegistry>> {
    Ok(Arc::new(assoc_service::registry::windows::WindowsRegistry))
}

#[cfg(not(windows))]
fn open_registry() -> Result<Arc<dyn AssocRegistry>> {
    anyhow::bail!("the association registry is only available on Windows")
}

async fn run_command(config_override: Option<PathBuf>) -> Result<()> {
    let engine = build_engine(config_override)?;
    let (task, handle) = monitor::spawn_monitor(engine.clone());

    info!("service started");
    signal::ctrl_c().await?;
    info!("service stopping");
    let _ = handle.shutdown_tx.send(true);
    let _ = task.await;
    Ok(())
}

fn status_command(config_override: Option<PathBuf>) -> Result<()> {
    let engine = build_engine(config_override)?;
    let rows = engine.status_rows();
    if rows.is_empty() {
        println!("no extensions are guarded");
        return Ok(());
    }
    for row in rows {
        println!("{:<12} {:<12} {}", row.ext, row.status.label(), row.baseline_label);
    }
    Ok(())
}

fn restore_all_command(config_override: Option<PathBuf>) -> Result<()> {
    let engine = build_engine(config_override)?;
    let summary = engine.restore_all();
    println!(
        "restored {} of {} extension(s)",
        summary.succeeded, summary.processed
    );
    Ok(())
}

fn import_defaults_command(config_override: Option<PathBuf>) -> Result<()> {
    let engine = build_engine(config_override)?;
    let summary = engine.import_current_defaults()?;
    println!(
        "found {}, imported {}, newly tracked {}, skipped {}",
        summary.found, summary.imported, summary.added, summary.skipped
    );
    for row in engine.status_rows() {
        println!("{:<12} {}", row.ext, row.baseline_label);
    }
    Ok(())
}
