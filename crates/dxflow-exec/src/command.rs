//! Structured catalog commands.
//!
//! Commands are never assembled as shell strings. A [`CommandSpec`] is a
//! program from the fixed catalog vocabulary, an argument vector and a
//! working directory; [`CatalogClient`] is the only place that builds them.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ExecError, ExecResult};

/// The operations the catalog client tools support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogOp {
    /// Create a collection (and its parents).
    MkCollection,
    /// Attach an attribute/value/unit triple to a collection or data object.
    SetTag,
    /// Register a local file at a catalog path.
    Register,
    /// Remove a registration without touching the local file.
    Deregister,
    /// List a catalog path.
    List,
}

impl CatalogOp {
    /// Every operation in the vocabulary.
    pub const ALL: [CatalogOp; 5] = [
        CatalogOp::MkCollection,
        CatalogOp::SetTag,
        CatalogOp::Register,
        CatalogOp::Deregister,
        CatalogOp::List,
    ];

    /// Vocabulary name of the operation.
    pub fn name(&self) -> &'static str {
        match self {
            CatalogOp::MkCollection => "mkcollection",
            CatalogOp::SetTag => "settag",
            CatalogOp::Register => "register",
            CatalogOp::Deregister => "deregister",
            CatalogOp::List => "list",
        }
    }

    /// Client tool implementing the operation.
    pub fn program(&self) -> &'static str {
        match self {
            CatalogOp::MkCollection => "imkdir",
            CatalogOp::SetTag => "imeta",
            CatalogOp::Register => "ireg",
            CatalogOp::Deregister => "irm",
            CatalogOp::List => "ils",
        }
    }

    /// Parse a vocabulary name.
    pub fn from_name(name: &str) -> Option<CatalogOp> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }
}

impl fmt::Display for CatalogOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One external command: program, arguments and working directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub op: CatalogOp,
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
}

impl CommandSpec {
    /// Check the spec against the operation vocabulary.
    ///
    /// The program must be the tool for `op` and no argument may be empty or
    /// carry control characters.
    pub fn validate(&self) -> ExecResult<()> {
        let file_name = self.program.file_name().and_then(|n| n.to_str());
        if file_name != Some(self.op.program()) {
            return Err(ExecError::InvalidCommand(format!(
                "program {} does not implement '{}'",
                self.program.display(),
                self.op
            )));
        }
        for arg in &self.args {
            if arg.is_empty() {
                return Err(ExecError::InvalidCommand(format!(
                    "empty argument in '{}' command",
                    self.op
                )));
            }
            if arg.chars().any(char::is_control) {
                return Err(ExecError::InvalidCommand(format!(
                    "control character in argument {:?}",
                    arg
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.op.program())?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// How the runner executes a queued entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandPlan {
    /// Run every step in order; a failing step does not stop the rest.
    Sequence(Vec<CommandSpec>),
    /// Run `primary`; on a non-zero exit run `recovery`, then `primary` once more.
    RetryAfterRecovery {
        primary: CommandSpec,
        recovery: CommandSpec,
    },
}

/// A labelled entry in a command queue. Each entry yields exactly one result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedCommand {
    pub label: String,
    pub plan: CommandPlan,
}

impl QueuedCommand {
    pub fn single(label: impl Into<String>, spec: CommandSpec) -> Self {
        Self::sequence(label, vec![spec])
    }

    pub fn sequence(label: impl Into<String>, specs: Vec<CommandSpec>) -> Self {
        Self {
            label: label.into(),
            plan: CommandPlan::Sequence(specs),
        }
    }

    pub fn with_recovery(
        label: impl Into<String>,
        primary: CommandSpec,
        recovery: CommandSpec,
    ) -> Self {
        Self {
            label: label.into(),
            plan: CommandPlan::RetryAfterRecovery { primary, recovery },
        }
    }

    /// Every spec the entry may run, in first-execution order.
    pub fn specs(&self) -> Vec<&CommandSpec> {
        match &self.plan {
            CommandPlan::Sequence(specs) => specs.iter().collect(),
            CommandPlan::RetryAfterRecovery { primary, recovery } => vec![primary, recovery],
        }
    }
}

/// Builds catalog commands rooted at the client tool directory.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    tools_home: PathBuf,
    working_dir: PathBuf,
}

impl CatalogClient {
    pub fn new(tools_home: impl Into<PathBuf>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            tools_home: tools_home.into(),
            working_dir: working_dir.into(),
        }
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    fn spec(&self, op: CatalogOp, args: Vec<String>) -> CommandSpec {
        CommandSpec {
            op,
            program: self.tools_home.join(op.program()),
            args,
            working_dir: self.working_dir.clone(),
        }
    }

    /// `imkdir -p <collection>`
    pub fn make_collection(&self, collection: &str) -> CommandSpec {
        self.spec(
            CatalogOp::MkCollection,
            vec!["-p".to_string(), collection.to_string()],
        )
    }

    /// `imeta add -C <collection> <name> <value> [<unit>]`
    pub fn tag_collection(
        &self,
        collection: &str,
        name: &str,
        value: &str,
        unit: Option<&str>,
    ) -> CommandSpec {
        let mut args = vec![
            "add".to_string(),
            "-C".to_string(),
            collection.to_string(),
            name.to_string(),
            value.to_string(),
        ];
        if let Some(unit) = unit {
            args.push(unit.to_string());
        }
        self.spec(CatalogOp::SetTag, args)
    }

    /// `imeta add -d <object> <name> <value> <unit>`
    pub fn tag_object(&self, object: &str, name: &str, value: &str, unit: &str) -> CommandSpec {
        self.spec(
            CatalogOp::SetTag,
            vec![
                "add".to_string(),
                "-d".to_string(),
                object.to_string(),
                name.to_string(),
                value.to_string(),
                unit.to_string(),
            ],
        )
    }

    /// `ireg -f <local file> <object>`
    pub fn register(&self, local: &Path, object: &str) -> CommandSpec {
        self.spec(
            CatalogOp::Register,
            vec![
                "-f".to_string(),
                local.display().to_string(),
                object.to_string(),
            ],
        )
    }

    /// `irm -U <object>`
    pub fn deregister(&self, object: &str) -> CommandSpec {
        self.spec(
            CatalogOp::Deregister,
            vec!["-U".to_string(), object.to_string()],
        )
    }

    /// `ils <path>`
    pub fn list(&self, path: &str) -> CommandSpec {
        self.spec(CatalogOp::List, vec![path.to_string()])
    }
}
