//! Records read from the persistence layer.
//!
//! Samples, workflows, runs and attempts are created and owned elsewhere;
//! the pipeline only reads them. Jobs are written by the external scheduler
//! as it executes graph nodes and are read back for provenance tagging.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Barcode carried by the control sample that collects unassigned reads.
pub const UNDETERMINED_BARCODE: &str = "Undetermined";

/// Sample attribute naming the participant a sample was taken from.
pub const SUBJECT_NAME_ATTRIBUTE: &str = "subjectName";

/// A named string key/value pair attached to a Sample or WorkflowRun.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Look up the first attribute with the given name.
pub fn find_attribute<'a>(attributes: &'a [Attribute], name: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|a| a.name == name)
        .map(|a| a.value.as_str())
}

/// The sequencer flowcell a sample was run on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flowcell {
    pub id: i64,
    pub name: String,
}

/// A sequenced specimen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub id: i64,
    pub name: String,
    pub flowcell: Flowcell,
    pub lane_index: u32,
    pub barcode: String,
    /// Study the sample belongs to, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub study_name: Option<String>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl Sample {
    /// Whether this is the control sample for reads that matched no barcode.
    pub fn is_undetermined(&self) -> bool {
        self.barcode == UNDETERMINED_BARCODE
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        find_attribute(&self.attributes, name)
    }

    pub fn subject_name(&self) -> Option<&str> {
        self.attribute(SUBJECT_NAME_ATTRIBUTE)
    }
}

/// A named pipeline definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: i64,
    pub name: String,
    /// System tag used when building catalog paths (e.g. `Prod`).
    pub system: String,
}

/// One logical invocation of a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: i64,
    pub name: String,
    pub workflow: Workflow,
    /// Samples the run was triggered for.
    #[serde(default)]
    pub sample_ids: Vec<i64>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl WorkflowRun {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        find_attribute(&self.attributes, name)
    }
}

/// Lifecycle of a single execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Queued,
    Running,
    Done,
    Failed,
}

impl AttemptStatus {
    /// Whether the attempt has finished, successfully or not.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AttemptStatus::Done | AttemptStatus::Failed)
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptStatus::Queued => write!(f, "queued"),
            AttemptStatus::Running => write!(f, "running"),
            AttemptStatus::Done => write!(f, "done"),
            AttemptStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One execution attempt of a workflow run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRunAttempt {
    pub id: i64,
    pub status: AttemptStatus,
    pub run: WorkflowRun,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl WorkflowRunAttempt {
    pub fn workflow(&self) -> &Workflow {
        &self.run.workflow
    }
}

/// A processing step executed by the external scheduler for an attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub attempt_id: i64,
    /// Logical operation the job performed (e.g. `SortSam`).
    pub kind: String,
    #[serde(default)]
    pub output_files: Vec<PathBuf>,
}

impl Job {
    pub fn produced(&self, path: &Path) -> bool {
        self.output_files.iter().any(|p| p == path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(barcode: &str, attributes: Vec<Attribute>) -> Sample {
        Sample {
            id: 1,
            name: "NCG_00009".into(),
            flowcell: Flowcell {
                id: 10,
                name: "HGKTJBGXY".into(),
            },
            lane_index: 1,
            barcode: barcode.into(),
            study_name: None,
            attributes,
        }
    }

    #[test]
    fn test_undetermined_sample() {
        assert!(sample("Undetermined", vec![]).is_undetermined());
        assert!(!sample("ACGTAC", vec![]).is_undetermined());
    }

    #[test]
    fn test_subject_name_lookup() {
        let s = sample("ACGTAC", vec![Attribute::new("subjectName", "NCG_00009")]);
        assert_eq!(s.subject_name(), Some("NCG_00009"));
        assert_eq!(sample("ACGTAC", vec![]).subject_name(), None);
    }

    #[test]
    fn test_find_attribute_returns_first_match() {
        let attrs = vec![Attribute::new("dx_id", "5"), Attribute::new("dx_id", "6")];
        assert_eq!(find_attribute(&attrs, "dx_id"), Some("5"));
        assert_eq!(find_attribute(&attrs, "list_version"), None);
    }

    #[test]
    fn test_attempt_status_terminal() {
        assert!(AttemptStatus::Done.is_terminal());
        assert!(AttemptStatus::Failed.is_terminal());
        assert!(!AttemptStatus::Queued.is_terminal());
        assert_eq!(AttemptStatus::Running.to_string(), "running");
    }

    #[test]
    fn test_status_serde_snake_case() {
        let json = serde_json::to_string(&AttemptStatus::Done).unwrap();
        assert_eq!(json, "\"done\"");
    }

    #[test]
    fn test_job_produced() {
        let job = Job {
            id: 7,
            attempt_id: 3,
            kind: "Zip".into(),
            output_files: vec![PathBuf::from("/data/out.zip")],
        };
        assert!(job.produced(Path::new("/data/out.zip")));
        assert!(!job.produced(Path::new("/data/other.zip")));
    }
}
