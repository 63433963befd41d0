//! Poll command - periodic registration sweep.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Args;
use console::Style;
use dxflow_pipeline::{ArtifactRegistrar, PeriodicPoller, RegistrationSweep};
use tracing::info;

use super::Context;

/// Arguments for the poll command.
#[derive(Args, Debug)]
pub struct PollArgs {
    /// Workflow to sweep (defaults to the configured workflow)
    #[arg(long)]
    pub workflow: Option<String>,

    /// Seconds between sweeps (overrides the configured period)
    #[arg(long)]
    pub period_secs: Option<u64>,
}

/// Run the poll command.
pub async fn run(args: PollArgs, ctx: &Context) -> Result<()> {
    let repo = ctx.repository()?;
    let registrar = Arc::new(
        ArtifactRegistrar::from_config(&ctx.config, repo)
            .context("Failed to set up catalog registration")?,
    );

    let mut scheduler = ctx.config.scheduler();
    if let Some(period) = args.period_secs {
        scheduler.period_secs = period;
    }
    let sweep = Arc::new(RegistrationSweep::new(
        ctx.workflow_name(args.workflow),
        registrar,
        &scheduler,
    ));

    let dim = Style::new().dim();
    eprintln!(
        "{} {} {}",
        dim.apply_to("Polling"),
        sweep.workflow_name(),
        dim.apply_to(format!(
            "every {}s after {}s; Ctrl-C to stop",
            scheduler.period_secs, scheduler.initial_delay_secs
        ))
    );

    let handle = PeriodicPoller::from_settings(&scheduler).start(sweep);
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    info!("Interrupt received, stopping poller");
    let ticks = handle.stop().await;
    eprintln!("{} {}", dim.apply_to("Sweeps run:"), ticks);
    Ok(())
}
