//! JSON snapshot implementation of [`RunRepository`].
//!
//! The snapshot is a single document holding every record the pipeline
//! reads:
//!
//! ```json
//! {
//!   "workflows": [{ "id": 1, "name": "NCNEXUS38DX", "system": "Prod" }],
//!   "samples":   [{ "id": 52422, "name": "...", "flowcell": {...}, ... }],
//!   "attempts":  [{ "id": 9, "status": "done", "run": {...}, ... }],
//!   "jobs":      [{ "id": 4, "attempt_id": 9, "kind": "Zip", ... }],
//!   "registered": [9]
//! }
//! ```
//!
//! A file-backed repository re-reads the file before every read and every
//! write, so changes made by other processes (the scheduler marking attempts
//! done, another `dxflow` invocation submitting runs) are picked up. Writes
//! apply to the freshly read document, go to a temporary file next to the
//! store and are renamed into place. The in-memory copy changes only after
//! the write succeeded.

use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{
    Attribute, AttemptStatus, Job, Sample, Workflow, WorkflowRun, WorkflowRunAttempt,
};
use crate::repository::RunRepository;

/// Serialized form of the snapshot file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub workflows: Vec<Workflow>,
    pub samples: Vec<Sample>,
    pub attempts: Vec<WorkflowRunAttempt>,
    pub jobs: Vec<Job>,
    pub registered: BTreeSet<i64>,
}

/// Run store held in memory, optionally backed by a JSON file.
pub struct SnapshotRepository {
    path: Option<PathBuf>,
    data: RwLock<Snapshot>,
}

impl SnapshotRepository {
    /// Wrap an in-memory snapshot (nothing is persisted).
    pub fn in_memory(snapshot: Snapshot) -> Self {
        Self {
            path: None,
            data: RwLock::new(snapshot),
        }
    }

    /// Open the snapshot at `path`, starting empty if the file does not exist.
    pub fn open(path: &Path) -> Result<Self> {
        let snapshot = match read_file(path)? {
            Some(snapshot) => snapshot,
            None => {
                debug!(path = %path.display(), "Snapshot file missing, starting empty");
                Snapshot::default()
            }
        };

        Ok(Self {
            path: Some(path.to_path_buf()),
            data: RwLock::new(snapshot),
        })
    }

    /// Copy of the current contents.
    pub fn snapshot(&self) -> Result<Snapshot> {
        self.refresh()?;
        Ok(self.data.read().clone())
    }

    /// Replace the cached copy with the file's current contents.
    fn refresh(&self) -> Result<()> {
        let Some(ref path) = self.path else {
            return Ok(());
        };
        if let Some(fresh) = read_file(path)? {
            *self.data.write() = fresh;
        }
        Ok(())
    }

    /// Read-modify-write. `apply` sees the latest document; the cached copy
    /// is replaced only once the result has been written.
    fn update<T>(&self, apply: impl FnOnce(&mut Snapshot) -> Result<T>) -> Result<T> {
        let mut data = self.data.write();
        let mut next = match self.path {
            Some(ref path) => read_file(path)?.unwrap_or_else(|| data.clone()),
            None => data.clone(),
        };
        let out = apply(&mut next)?;
        if let Some(ref path) = self.path {
            write_file(path, &next)?;
        }
        *data = next;
        Ok(out)
    }
}

fn read_file(path: &Path) -> Result<Option<Snapshot>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&content)?))
}

fn write_file(path: &Path, snapshot: &Snapshot) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let mut tmp = NamedTempFile::new_in(parent)?;
    serde_json::to_writer_pretty(&mut tmp, snapshot)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

impl RunRepository for SnapshotRepository {
    fn find_attempt(&self, attempt_id: i64) -> Result<Option<WorkflowRunAttempt>> {
        self.refresh()?;
        Ok(self
            .data
            .read()
            .attempts
            .iter()
            .find(|a| a.id == attempt_id)
            .cloned())
    }

    fn find_workflow(&self, name: &str) -> Result<Option<Workflow>> {
        self.refresh()?;
        Ok(self
            .data
            .read()
            .workflows
            .iter()
            .find(|w| w.name == name)
            .cloned())
    }

    fn find_sample(&self, sample_id: i64) -> Result<Option<Sample>> {
        self.refresh()?;
        Ok(self
            .data
            .read()
            .samples
            .iter()
            .find(|s| s.id == sample_id)
            .cloned())
    }

    fn aggregated_samples(&self, attempt: &WorkflowRunAttempt) -> Result<Vec<Sample>> {
        self.refresh()?;
        let data = self.data.read();
        let mut samples = Vec::with_capacity(attempt.run.sample_ids.len());
        for id in &attempt.run.sample_ids {
            match data.samples.iter().find(|s| s.id == *id) {
                Some(sample) => samples.push(sample.clone()),
                None => {
                    return Err(Error::NotFound(format!(
                        "sample {} referenced by attempt {}",
                        id, attempt.id
                    )));
                }
            }
        }
        Ok(samples)
    }

    fn attempts_for_workflow(&self, workflow_name: &str) -> Result<Vec<WorkflowRunAttempt>> {
        self.refresh()?;
        Ok(self
            .data
            .read()
            .attempts
            .iter()
            .filter(|a| a.workflow().name == workflow_name)
            .cloned()
            .collect())
    }

    fn find_job(&self, attempt_id: i64, job_kind: &str, output_file: &Path) -> Result<Option<Job>> {
        self.refresh()?;
        Ok(self
            .data
            .read()
            .jobs
            .iter()
            .find(|j| j.attempt_id == attempt_id && j.kind == job_kind && j.produced(output_file))
            .cloned())
    }

    fn create_attempt(
        &self,
        workflow_name: &str,
        run_name: &str,
        sample_ids: &[i64],
        attributes: Vec<Attribute>,
    ) -> Result<WorkflowRunAttempt> {
        self.update(|data| {
            let workflow = data
                .workflows
                .iter()
                .find(|w| w.name == workflow_name)
                .cloned()
                .ok_or_else(|| Error::NotFound(format!("workflow '{}'", workflow_name)))?;

            for id in sample_ids {
                if !data.samples.iter().any(|s| s.id == *id) {
                    return Err(Error::NotFound(format!("sample {}", id)));
                }
            }

            let next_run_id = data.attempts.iter().map(|a| a.run.id).max().unwrap_or(0) + 1;
            let next_attempt_id = data.attempts.iter().map(|a| a.id).max().unwrap_or(0) + 1;

            let attempt = WorkflowRunAttempt {
                id: next_attempt_id,
                status: AttemptStatus::Queued,
                run: WorkflowRun {
                    id: next_run_id,
                    name: run_name.to_string(),
                    workflow,
                    sample_ids: sample_ids.to_vec(),
                    attributes,
                },
                created_at: Utc::now(),
                finished_at: None,
            };

            data.attempts.push(attempt.clone());
            Ok(attempt)
        })
    }

    fn pending_registration(&self, workflow_name: &str) -> Result<Vec<WorkflowRunAttempt>> {
        self.refresh()?;
        let data = self.data.read();
        Ok(data
            .attempts
            .iter()
            .filter(|a| {
                a.workflow().name == workflow_name
                    && a.status == AttemptStatus::Done
                    && !data.registered.contains(&a.id)
            })
            .cloned()
            .collect())
    }

    fn mark_registered(&self, attempt_id: i64) -> Result<()> {
        self.update(|data| {
            if !data.attempts.iter().any(|a| a.id == attempt_id) {
                return Err(Error::NotFound(format!("attempt {}", attempt_id)));
            }
            data.registered.insert(attempt_id);
            Ok(())
        })
    }
}
