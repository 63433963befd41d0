//! Run-workflow command - emits the trigger envelope for a run.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args;
use console::Style;
use dxflow_pipeline::TriggerEnvelope;
use dxflow_types::Attribute;

use super::Context;

/// Arguments for the run-workflow command.
#[derive(Args, Debug)]
#[command(disable_version_flag = true)]
pub struct RunWorkflowArgs {
    /// Run name, e.g. NCG_00009_V7_Dx5
    pub run_name: String,

    /// Sample id
    pub sample_id: i64,

    /// Interval list version recorded on the run
    #[arg(long)]
    pub version: Option<String>,

    /// DX panel id recorded on the run
    #[arg(long)]
    pub panel: Option<String>,

    /// Write the envelope to a file instead of stdout
    #[arg(long, value_name = "FILE")]
    pub out: Option<PathBuf>,
}

/// Run the run-workflow command.
pub async fn run(args: RunWorkflowArgs, _ctx: &Context) -> Result<()> {
    let mut overrides = Vec::new();
    if let Some(version) = args.version {
        overrides.push(Attribute::new("version", version));
    }
    if let Some(panel) = args.panel {
        overrides.push(Attribute::new("panel", panel));
    }

    let envelope = TriggerEnvelope::for_run(&args.run_name, args.sample_id, overrides);
    let json = serde_json::to_string_pretty(&envelope)?;

    match args.out {
        Some(path) => {
            std::fs::write(&path, &json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            let dim = Style::new().dim();
            eprintln!("{} {}", dim.apply_to("Envelope written to"), path.display());
        }
        None => println!("{json}"),
    }

    Ok(())
}
