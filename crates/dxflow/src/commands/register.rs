//! Register commands - catalog registration for one or all attempts.

use std::sync::Arc;

use anyhow::{Context as _, Result, anyhow, bail};
use clap::Args;
use console::{Style, style};
use dxflow_pipeline::{
    ArtifactRegistrar, RegistrationReport, RegistrationSweep, SweepSummary, WorkerPool,
};
use dxflow_types::RunRepository;

use super::{Context, print_json};

/// Arguments for the register-to-catalog command.
#[derive(Args, Debug)]
pub struct RegisterArgs {
    /// Attempt whose artifacts to register
    #[arg(long)]
    pub attempt_id: i64,
}

/// Arguments for the register-all-to-catalog command.
#[derive(Args, Debug)]
pub struct RegisterAllArgs {
    /// Workflow to sweep (defaults to the configured workflow)
    #[arg(long)]
    pub workflow: Option<String>,
}

/// Run the register-to-catalog command.
pub async fn run(args: RegisterArgs, ctx: &Context) -> Result<()> {
    let repo = ctx.repository()?;
    let attempt = repo
        .find_attempt(args.attempt_id)?
        .ok_or_else(|| anyhow!("Attempt {} not found", args.attempt_id))?;
    let registrar = Arc::new(
        ArtifactRegistrar::from_config(&ctx.config, repo)
            .context("Failed to set up catalog registration")?,
    );

    let mut pool = WorkerPool::single();
    {
        let registrar = Arc::clone(&registrar);
        pool.submit(async move { registrar.register_attempt(&attempt).await });
    }
    let outcome = pool
        .join_with_deadline(ctx.config.scheduler().barrier_timeout())
        .await;

    let timed_out = outcome.timed_out();
    let Some(result) = outcome.completed.into_iter().next() else {
        if timed_out {
            eprintln!(
                "{}",
                Style::new()
                    .yellow()
                    .apply_to("Registration still running at the deadline; not waiting further")
            );
            return Ok(());
        }
        bail!("Registration task failed");
    };
    let report = result.context("Attempt could not be registered")?;

    if ctx.json_output {
        return print_json(&report);
    }
    print_report(&report, ctx.verbose);
    Ok(())
}

/// Run the register-all-to-catalog command.
pub async fn run_all(args: RegisterAllArgs, ctx: &Context) -> Result<()> {
    let repo = ctx.repository()?;
    let workflow = ctx.workflow_name(args.workflow);
    let registrar = Arc::new(
        ArtifactRegistrar::from_config(&ctx.config, repo)
            .context("Failed to set up catalog registration")?,
    );
    let sweep = RegistrationSweep::new(workflow, registrar, &ctx.config.scheduler());
    let summary = sweep.sweep_done().await?;

    if ctx.json_output {
        return print_json(&summary);
    }
    print_summary(sweep.workflow_name(), &summary, ctx.verbose);
    Ok(())
}

fn print_report(report: &RegistrationReport, verbose: bool) {
    let green = Style::new().green();
    let red = Style::new().red();
    let yellow = Style::new().yellow();
    let dim = Style::new().dim();

    println!();
    println!(
        "{} {}",
        style("Attempt").bold(),
        style(report.attempt_id).bold()
    );
    println!("{}", dim.apply_to("─".repeat(40)));
    for collection in &report.collections {
        println!("  {} {}", dim.apply_to("Collection:"), collection);
    }
    println!(
        "  {} {}",
        dim.apply_to("Registered:"),
        green.apply_to(report.registered.len())
    );
    if !report.skipped.is_empty() {
        println!(
            "  {} {}",
            dim.apply_to("Missing:"),
            yellow.apply_to(report.skipped.len())
        );
        if verbose {
            for path in &report.skipped {
                println!("      {}", path.display());
            }
        }
    }
    if !report.provenance_misses.is_empty() {
        println!(
            "  {} {}",
            dim.apply_to("No job found:"),
            yellow.apply_to(report.provenance_misses.len())
        );
    }

    let failures: Vec<_> = report.failures().collect();
    if failures.is_empty() {
        println!("  {} {}", dim.apply_to("Commands:"), green.apply_to("all succeeded"));
    } else {
        println!(
            "  {} {}",
            dim.apply_to("Failed commands:"),
            red.apply_to(failures.len())
        );
        for failure in failures {
            let code = failure
                .exit_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "not run".to_string());
            println!("      {} {}", failure.label, dim.apply_to(format!("({code})")));
            if verbose && !failure.stderr.is_empty() {
                println!("        {}", dim.apply_to(failure.stderr.trim()));
            }
        }
    }
    println!();
}

fn print_summary(workflow: &str, summary: &SweepSummary, verbose: bool) {
    let dim = Style::new().dim();
    let red = Style::new().red();

    println!();
    println!("{} {}", style("Registration sweep:").bold(), workflow);
    println!("{}", dim.apply_to("─".repeat(40)));
    println!("  {} {}", dim.apply_to("Attempts:"), summary.attempts);
    println!("  {} {}", dim.apply_to("Fully registered:"), summary.marked());
    if summary.detached > 0 {
        println!(
            "  {} {}",
            dim.apply_to("Still running:"),
            Style::new().yellow().apply_to(summary.detached)
        );
    }
    if !summary.in_flight.is_empty() {
        let ids: Vec<String> = summary.in_flight.iter().map(|id| id.to_string()).collect();
        println!(
            "  {} {}",
            dim.apply_to("Already registering:"),
            Style::new().yellow().apply_to(ids.join(", "))
        );
    }
    for entry in &summary.entries {
        if let Some(error) = &entry.error {
            println!("  {} {}", red.apply_to(entry.attempt_id), error);
        } else if verbose && let Some(report) = &entry.report {
            print_report(report, false);
        }
    }
    println!();
}
