//! Assert commands - audit a sample's conventional output files.

use std::collections::BTreeSet;

use anyhow::{Context as _, Result, anyhow};
use clap::Args;
use console::{Style, style};
use dxflow_pipeline::{CatalogAuditor, FileExistenceAsserter};
use dxflow_types::{RunRepository, Sample};
use serde::Serialize;

use super::{Context, print_json};

/// Arguments for both assert commands.
#[derive(Args, Debug)]
#[command(disable_version_flag = true)]
pub struct AssertArgs {
    /// Sample whose outputs to check
    #[arg(long)]
    pub sample_id: i64,

    /// Interval list version
    #[arg(long)]
    pub version: String,

    /// DX panel id
    #[arg(long)]
    pub panel: String,
}

#[derive(Debug, Serialize)]
struct AssertOutput<T: Serialize> {
    sample_id: i64,
    expected: usize,
    missing: BTreeSet<T>,
}

fn find_sample(ctx: &Context, sample_id: i64) -> Result<Sample> {
    ctx.repository()?
        .find_sample(sample_id)?
        .ok_or_else(|| anyhow!("Sample {sample_id} not found"))
}

/// Run the assert-expected-output-files-exist command.
pub async fn run_local(args: AssertArgs, ctx: &Context) -> Result<()> {
    let sample = find_sample(ctx, args.sample_id)?;
    let asserter = FileExistenceAsserter::from_settings(&ctx.config.pipeline())
        .context("Output audit could not start")?;

    let expected = asserter.expected_files(&sample, &args.version, &args.panel);
    let missing = asserter.audit(&sample, &args.version, &args.panel);

    let output = AssertOutput {
        sample_id: sample.id,
        expected: expected.len(),
        missing: missing
            .iter()
            .map(|p| p.display().to_string())
            .collect::<BTreeSet<String>>(),
    };
    render(&output, "on disk", ctx)
}

/// Run the assert-expected-output-files-exist-in-catalog command.
pub async fn run_catalog(args: AssertArgs, ctx: &Context) -> Result<()> {
    let repo = ctx.repository()?;
    let sample = repo
        .find_sample(args.sample_id)?
        .ok_or_else(|| anyhow!("Sample {} not found", args.sample_id))?;
    let workflow_name = ctx.workflow_name(None);
    let workflow = repo
        .find_workflow(&workflow_name)?
        .ok_or_else(|| anyhow!("Workflow {workflow_name} not found"))?;

    let auditor = CatalogAuditor::from_settings(ctx.config.catalog())
        .context("Catalog audit could not start")?;
    let missing = auditor
        .audit(&sample, &workflow, &args.version, &args.panel)
        .await;

    let output = AssertOutput {
        sample_id: sample.id,
        expected: dxflow_pipeline::OutputKind::ALL.len(),
        missing,
    };
    render(&output, "in the catalog", ctx)
}

fn render(output: &AssertOutput<String>, place: &str, ctx: &Context) -> Result<()> {
    if ctx.json_output {
        return print_json(output);
    }

    let dim = Style::new().dim();
    println!();
    println!(
        "{} {}",
        style("Sample").bold(),
        style(output.sample_id).bold()
    );
    println!("{}", dim.apply_to("─".repeat(40)));
    if output.missing.is_empty() {
        println!(
            "  {}",
            Style::new()
                .green()
                .apply_to(format!("All {} expected files present {place}", output.expected))
        );
    } else {
        println!(
            "  {}",
            Style::new().yellow().apply_to(format!(
                "{} of {} expected files missing {place}",
                output.missing.len(),
                output.expected
            ))
        );
        for path in &output.missing {
            println!("      {path}");
        }
    }
    println!();
    Ok(())
}
