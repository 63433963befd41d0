//! Catalog command execution.
//!
//! Catalog operations are expressed as structured [`CommandSpec`]s built by
//! [`CatalogClient`], grouped into [`QueuedCommand`]s and executed strictly
//! in order by a [`CommandRunner`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use dxflow_exec::{CatalogClient, CommandRunner, EnvironmentProfile, ProcessExecutor, QueuedCommand};
//!
//! # async fn demo() {
//! let client = CatalogClient::new("/usr/bin", "/tmp");
//! let runner = CommandRunner::new(Arc::new(ProcessExecutor::default()), EnvironmentProfile::empty());
//! let results = runner
//!     .run(&[QueuedCommand::single("list home", client.list("/MedGenZone/home"))])
//!     .await;
//! assert_eq!(results.len(), 1);
//! # }
//! ```

mod command;
mod error;
mod executor;
mod profile;
mod runner;

pub use command::{CatalogClient, CatalogOp, CommandPlan, CommandSpec, QueuedCommand};
pub use error::{ExecError, ExecResult};
pub use executor::{CommandExecutor, CommandOutput, ProcessExecutor};
pub use profile::EnvironmentProfile;
pub use runner::{CommandResult, CommandRunner};
