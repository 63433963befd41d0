//! CLI command handlers.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use dxflow_config::DxflowConfig;
use dxflow_types::SnapshotRepository;

pub mod assert;
pub mod poll;
pub mod register;
pub mod run_workflow;
pub mod submit;

/// File name of the default run record snapshot.
const STORE_FILE: &str = "store.json";

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Merged configuration.
    pub config: DxflowConfig,
    /// Run record snapshot file.
    pub store_path: PathBuf,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// Open the run record store.
    pub fn repository(&self) -> Result<Arc<SnapshotRepository>> {
        let repo = SnapshotRepository::open(&self.store_path).with_context(|| {
            format!("Failed to open run store {}", self.store_path.display())
        })?;
        Ok(Arc::new(repo))
    }

    /// Workflow to act on, defaulting to the configured one.
    pub fn workflow_name(&self, requested: Option<String>) -> String {
        requested.unwrap_or_else(|| self.config.pipeline().workflow_name)
    }
}

/// `<data dir>/dxflow/store.json`, or `./store.json` without a data dir.
pub fn default_store_path() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("dxflow").join(STORE_FILE))
        .unwrap_or_else(|| PathBuf::from(STORE_FILE))
}

/// Print a value as pretty JSON.
pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
