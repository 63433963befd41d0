//! Sequential command queue execution.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::command::{CommandPlan, CommandSpec, QueuedCommand};
use crate::executor::{CommandExecutor, CommandOutput};
use crate::profile::EnvironmentProfile;

/// Outcome of one queued entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandResult {
    pub label: String,
    /// First non-zero exit code of the entry, `Some(0)` when every step
    /// succeeded, `None` when a step never produced an exit status.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// Whether the recovery step of a retry plan ran.
    pub retried: bool,
}

impl CommandResult {
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Outcome of a single step.
struct StepOutcome {
    exit_code: Option<i32>,
    stdout: String,
    stderr: String,
}

impl StepOutcome {
    fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }
}

impl From<CommandOutput> for StepOutcome {
    fn from(output: CommandOutput) -> Self {
        Self {
            exit_code: Some(output.exit_code),
            stdout: output.stdout,
            stderr: output.stderr,
        }
    }
}

/// Runs queued commands one after another under a fixed environment profile.
///
/// Failures are logged and recorded; they never stop the queue.
pub struct CommandRunner {
    executor: Arc<dyn CommandExecutor>,
    profile: EnvironmentProfile,
}

impl CommandRunner {
    pub fn new(executor: Arc<dyn CommandExecutor>, profile: EnvironmentProfile) -> Self {
        Self { executor, profile }
    }

    pub fn profile(&self) -> &EnvironmentProfile {
        &self.profile
    }

    /// Execute every entry in order. Exactly one result per entry.
    pub async fn run(&self, commands: &[QueuedCommand]) -> Vec<CommandResult> {
        let mut results = Vec::with_capacity(commands.len());
        for command in commands {
            let result = self.run_entry(command).await;
            if !result.succeeded() {
                warn!(
                    label = %result.label,
                    exit_code = ?result.exit_code,
                    stderr = %result.stderr.trim(),
                    "Command failed"
                );
            }
            results.push(result);
        }
        results
    }

    async fn run_entry(&self, command: &QueuedCommand) -> CommandResult {
        let mut result = CommandResult {
            label: command.label.clone(),
            exit_code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
            retried: false,
        };

        match &command.plan {
            CommandPlan::Sequence(specs) => {
                let mut launch_failed = false;
                for spec in specs {
                    let step = self.run_step(spec).await;
                    match step.exit_code {
                        None => launch_failed = true,
                        Some(code) if code != 0 && result.exit_code == Some(0) => {
                            result.exit_code = Some(code);
                        }
                        Some(_) => {}
                    }
                    append(&mut result, step);
                }
                if launch_failed {
                    result.exit_code = None;
                }
            }
            CommandPlan::RetryAfterRecovery { primary, recovery } => {
                let first = self.run_step(primary).await;
                if first.succeeded() {
                    result.exit_code = first.exit_code;
                    append(&mut result, first);
                } else {
                    debug!(label = %command.label, "Primary step failed, running recovery");
                    append(&mut result, first);
                    result.retried = true;

                    let recovered = self.run_step(recovery).await;
                    append(&mut result, recovered);

                    let second = self.run_step(primary).await;
                    result.exit_code = second.exit_code;
                    append(&mut result, second);
                }
            }
        }

        result
    }

    async fn run_step(&self, spec: &CommandSpec) -> StepOutcome {
        if let Err(e) = spec.validate() {
            return StepOutcome {
                exit_code: None,
                stdout: String::new(),
                stderr: e.to_string(),
            };
        }
        match self.executor.execute(spec, &self.profile).await {
            Ok(output) => output.into(),
            Err(e) => StepOutcome {
                exit_code: None,
                stdout: String::new(),
                stderr: e.to_string(),
            },
        }
    }
}

fn append(result: &mut CommandResult, step: StepOutcome) {
    result.stdout.push_str(&step.stdout);
    result.stderr.push_str(&step.stderr);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CatalogClient, CatalogOp};
    use crate::error::{ExecError, ExecResult};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::path::Path;

    /// Records every spec and replays scripted exit codes (default 0).
    #[derive(Default)]
    struct ScriptedExecutor {
        calls: Mutex<Vec<CommandSpec>>,
        codes: Mutex<VecDeque<Option<i32>>>,
    }

    impl ScriptedExecutor {
        fn with_codes(codes: &[Option<i32>]) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                codes: Mutex::new(codes.iter().copied().collect()),
            }
        }

        fn ops(&self) -> Vec<CatalogOp> {
            self.calls.lock().iter().map(|s| s.op).collect()
        }
    }

    #[async_trait]
    impl CommandExecutor for ScriptedExecutor {
        async fn execute(
            &self,
            spec: &CommandSpec,
            _profile: &EnvironmentProfile,
        ) -> ExecResult<CommandOutput> {
            self.calls.lock().push(spec.clone());
            match self.codes.lock().pop_front().unwrap_or(Some(0)) {
                Some(code) => Ok(CommandOutput::new("", format!("exit {code}"), code)),
                None => Err(ExecError::Launch {
                    program: spec.program.clone(),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                }),
            }
        }
    }

    fn client() -> CatalogClient {
        CatalogClient::new("/opt/irods/bin", "/tmp")
    }

    fn runner(executor: Arc<ScriptedExecutor>) -> CommandRunner {
        CommandRunner::new(executor, EnvironmentProfile::empty())
    }

    #[tokio::test]
    async fn test_runs_in_order_and_continues_after_failure() {
        let executor = Arc::new(ScriptedExecutor::with_codes(&[Some(0), Some(4), Some(0)]));
        let c = client();
        let commands = vec![
            QueuedCommand::single("mkdir", c.make_collection("/Zone/a")),
            QueuedCommand::single("tag", c.tag_collection("/Zone/a", "Project", "P", None)),
            QueuedCommand::single("ls", c.list("/Zone/a")),
        ];

        let results = runner(executor.clone()).run(&commands).await;
        assert_eq!(results.len(), 3);
        assert!(results[0].succeeded());
        assert_eq!(results[1].exit_code, Some(4));
        assert!(results[2].succeeded());
        assert_eq!(
            executor.ops(),
            vec![CatalogOp::MkCollection, CatalogOp::SetTag, CatalogOp::List]
        );
    }

    #[tokio::test]
    async fn test_retry_runs_recovery_then_primary() {
        let executor = Arc::new(ScriptedExecutor::with_codes(&[Some(3), Some(0), Some(0)]));
        let c = client();
        let commands = vec![QueuedCommand::with_recovery(
            "register a",
            c.register(Path::new("/data/a"), "/Zone/a"),
            c.deregister("/Zone/a"),
        )];

        let results = runner(executor.clone()).run(&commands).await;
        assert_eq!(results.len(), 1);
        assert!(results[0].succeeded());
        assert!(results[0].retried);
        assert_eq!(
            executor.ops(),
            vec![CatalogOp::Register, CatalogOp::Deregister, CatalogOp::Register]
        );
    }

    #[tokio::test]
    async fn test_retry_skipped_on_success() {
        let executor = Arc::new(ScriptedExecutor::default());
        let c = client();
        let commands = vec![QueuedCommand::with_recovery(
            "register a",
            c.register(Path::new("/data/a"), "/Zone/a"),
            c.deregister("/Zone/a"),
        )];

        let results = runner(executor.clone()).run(&commands).await;
        assert!(!results[0].retried);
        assert_eq!(executor.ops(), vec![CatalogOp::Register]);
    }

    #[tokio::test]
    async fn test_second_attempt_failure_reported() {
        let executor = Arc::new(ScriptedExecutor::with_codes(&[Some(3), Some(0), Some(5)]));
        let c = client();
        let commands = vec![QueuedCommand::with_recovery(
            "register a",
            c.register(Path::new("/data/a"), "/Zone/a"),
            c.deregister("/Zone/a"),
        )];

        let results = runner(executor).run(&commands).await;
        assert_eq!(results[0].exit_code, Some(5));
    }

    #[tokio::test]
    async fn test_sequence_reports_first_nonzero() {
        let executor = Arc::new(ScriptedExecutor::with_codes(&[Some(0), Some(2), Some(7)]));
        let c = client();
        let commands = vec![QueuedCommand::sequence(
            "tags",
            vec![
                c.tag_object("/Zone/a", "K1", "V1", "U"),
                c.tag_object("/Zone/a", "K2", "V2", "U"),
                c.tag_object("/Zone/a", "K3", "V3", "U"),
            ],
        )];

        let results = runner(executor.clone()).run(&commands).await;
        assert_eq!(results[0].exit_code, Some(2));
        assert_eq!(executor.ops().len(), 3);
    }

    #[tokio::test]
    async fn test_launch_failure_has_no_exit_code() {
        let executor = Arc::new(ScriptedExecutor::with_codes(&[None, Some(0)]));
        let c = client();
        let commands = vec![
            QueuedCommand::single("ls a", c.list("/Zone/a")),
            QueuedCommand::single("ls b", c.list("/Zone/b")),
        ];

        let results = runner(executor).run(&commands).await;
        assert_eq!(results[0].exit_code, None);
        assert!(results[0].stderr.contains("Failed to launch"));
        assert!(results[1].succeeded());
    }

    #[tokio::test]
    async fn test_invalid_spec_never_reaches_executor() {
        let executor = Arc::new(ScriptedExecutor::default());
        let c = client();
        let commands = vec![QueuedCommand::single(
            "empty tag",
            c.tag_object("/Zone/a", "MaPSeqStudyName", "", "U"),
        )];

        let results = runner(executor.clone()).run(&commands).await;
        assert_eq!(results[0].exit_code, None);
        assert!(executor.ops().is_empty());
    }

    #[tokio::test]
    async fn test_empty_queue() {
        let results = runner(Arc::new(ScriptedExecutor::default())).run(&[]).await;
        assert!(results.is_empty());
    }
}
