//! Submit command - handles a trigger envelope.

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args;
use console::{Style, style};
use dxflow_pipeline::{JobGraph, RunTrigger, TriggerEnvelope, WorkflowGraphBuilder};
use serde::Serialize;

use super::{Context, print_json};

/// Arguments for the submit command.
#[derive(Args, Debug)]
pub struct SubmitArgs {
    /// Envelope file (reads stdin when omitted)
    #[arg(long, value_name = "FILE")]
    pub envelope: Option<PathBuf>,

    /// Print the job graph in Graphviz format
    #[arg(long)]
    pub dot: bool,
}

#[derive(Debug, Serialize)]
struct SubmitOutput<'a> {
    attempt_id: i64,
    run_name: &'a str,
    graph: &'a JobGraph,
}

/// Run the submit command.
pub async fn run(args: SubmitArgs, ctx: &Context) -> Result<()> {
    let raw = match &args.envelope {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read envelope {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read envelope from stdin")?;
            buf
        }
    };
    let envelope = TriggerEnvelope::from_json(&raw).context("Invalid trigger envelope")?;

    let repo = ctx.repository()?;
    let pipeline = ctx.config.pipeline();
    let trigger = RunTrigger::new(
        pipeline.workflow_name.clone(),
        repo.clone(),
        WorkflowGraphBuilder::new(pipeline, repo),
    );
    let triggered = trigger.handle(&envelope).context("Run could not be submitted")?;
    let graph = &triggered.graph;

    if args.dot {
        print!("{}", graph.to_dot());
        return Ok(());
    }

    if ctx.json_output {
        return print_json(&SubmitOutput {
            attempt_id: triggered.attempt.id,
            run_name: &triggered.attempt.run.name,
            graph,
        });
    }

    let dim = Style::new().dim();
    println!();
    println!(
        "{} {}",
        style("Attempt").bold(),
        style(triggered.attempt.id).bold()
    );
    println!("{}", dim.apply_to("─".repeat(40)));
    for node in graph.nodes() {
        let after: Vec<&str> = graph
            .predecessors(node.index)
            .into_iter()
            .filter_map(|i| graph.node(i))
            .map(|n| n.name.as_str())
            .collect();
        if after.is_empty() {
            println!("  {}", node.name);
        } else {
            println!(
                "  {} {}",
                node.name,
                dim.apply_to(format!("(after {})", after.join(", ")))
            );
        }
        if ctx.verbose {
            for arg in &node.args {
                match &arg.value {
                    Some(value) => println!("      {} {}", dim.apply_to(&arg.flag), value),
                    None => println!("      {}", dim.apply_to(&arg.flag)),
                }
            }
        }
    }
    println!();

    Ok(())
}
