//! Process execution for catalog commands.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;

use crate::command::CommandSpec;
use crate::error::{ExecError, ExecResult};
use crate::profile::EnvironmentProfile;

/// Output from a single command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
    /// Exit code (0 = success). `-1` when the process was killed by a signal.
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>, exit_code: i32) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs one [`CommandSpec`] to completion.
///
/// `Err` means the command never produced an exit status (launch failure,
/// timeout). A non-zero exit is an `Ok` output.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(
        &self,
        spec: &CommandSpec,
        profile: &EnvironmentProfile,
    ) -> ExecResult<CommandOutput>;
}

/// Executes commands as child processes, without a shell.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    timeout: Duration,
}

impl ProcessExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        Self::new(Duration::from_secs(600))
    }
}

#[async_trait]
impl CommandExecutor for ProcessExecutor {
    async fn execute(
        &self,
        spec: &CommandSpec,
        profile: &EnvironmentProfile,
    ) -> ExecResult<CommandOutput> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args);
        cmd.current_dir(&spec.working_dir);
        for (key, value) in profile.vars() {
            cmd.env(key, value);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        tracing::debug!(command = %spec, dir = %spec.working_dir.display(), "Executing");

        match timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => Ok(CommandOutput::new(
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr),
                output.status.code().unwrap_or(-1),
            )),
            Ok(Err(source)) => Err(ExecError::Launch {
                program: spec.program.clone(),
                source,
            }),
            Err(_) => Err(ExecError::Timeout(self.timeout)),
        }
    }
}
