//! dxflow - operator CLI for the DX-filtered post-processing workflow.
//!
//! Emits and handles run triggers, registers finished attempts into the
//! catalog and audits the conventional output files.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, warn};

mod commands;

use commands::{assert, poll, register, run_workflow, submit};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// dxflow - DX-filtered post-processing coordinator
#[derive(Parser)]
#[command(name = "dxflow")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Extra config file merged over the discovered layers
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Run record snapshot file
    #[arg(long, global = true, value_name = "FILE", env = "DXFLOW_STORE")]
    pub store: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Emit the trigger envelope for a run
    RunWorkflow(run_workflow::RunWorkflowArgs),

    /// Handle a trigger envelope: open an attempt and build its job graph
    Submit(submit::SubmitArgs),

    /// Register one attempt's artifacts into the catalog
    RegisterToCatalog(register::RegisterArgs),

    /// Register every done attempt of a workflow
    RegisterAllToCatalog(register::RegisterAllArgs),

    /// Report which conventional output files are missing on disk
    AssertExpectedOutputFilesExist(assert::AssertArgs),

    /// Report which conventional output files are missing in the catalog
    AssertExpectedOutputFilesExistInCatalog(assert::AssertArgs),

    /// Periodically register finished attempts until interrupted
    Poll(poll::PollArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = dxflow_config::load_config_with_options(None, None, cli.config.as_deref())
        .context("Failed to load configuration")?;

    // Initialize tracing: console (stderr) + rotating JSON file
    let filter = if cli.verbose {
        "dxflow=debug,dxflow_pipeline=debug,dxflow_exec=debug,dxflow_config=debug,dxflow_types=debug,info"
    } else {
        "dxflow=info,dxflow_pipeline=info,dxflow_exec=info,warn"
    };

    let log_dir = loaded
        .config
        .logging()
        .directory
        .or_else(|| dxflow_config::xdg_config_dir().map(|d| d.join("logs")))
        .unwrap_or_else(|| PathBuf::from("logs"));
    let file_appender = tracing_appender::rolling::daily(&log_dir, "dxflow.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "dxflow=trace,dxflow_pipeline=trace,dxflow_exec=trace,dxflow_config=trace,dxflow_types=trace,info",
                )),
        )
        .init();

    for warning in &loaded.warnings {
        warn!("{}", warning);
    }
    for source in loaded.loaded_from() {
        debug!(layer = %source.layer, path = %source.path.display(), "Configuration loaded");
    }

    let store_path = cli.store.unwrap_or_else(commands::default_store_path);

    // Create context for commands
    let ctx = commands::Context {
        config: loaded.config,
        store_path,
        json_output: cli.json,
        verbose: cli.verbose,
    };

    // Dispatch to command handlers
    match cli.command {
        Commands::RunWorkflow(args) => run_workflow::run(args, &ctx).await,
        Commands::Submit(args) => submit::run(args, &ctx).await,
        Commands::RegisterToCatalog(args) => register::run(args, &ctx).await,
        Commands::RegisterAllToCatalog(args) => register::run_all(args, &ctx).await,
        Commands::AssertExpectedOutputFilesExist(args) => assert::run_local(args, &ctx).await,
        Commands::AssertExpectedOutputFilesExistInCatalog(args) => {
            assert::run_catalog(args, &ctx).await
        }
        Commands::Poll(args) => poll::run(args, &ctx).await,
    }
}
