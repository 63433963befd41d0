//! Persistence seam for run records.

use std::path::Path;

use crate::error::Result;
use crate::model::{Attribute, Job, Sample, Workflow, WorkflowRunAttempt};

/// Read access to samples, attempts and jobs, plus the few writes the
/// trigger and the poller need.
///
/// All methods are blocking; callers run them on the worker that owns the
/// operation.
pub trait RunRepository: Send + Sync {
    /// Look up an attempt by id.
    fn find_attempt(&self, attempt_id: i64) -> Result<Option<WorkflowRunAttempt>>;

    /// Look up a workflow definition by name.
    fn find_workflow(&self, name: &str) -> Result<Option<Workflow>>;

    /// Look up a sample by id.
    fn find_sample(&self, sample_id: i64) -> Result<Option<Sample>>;

    /// Every sample the attempt's run was triggered for.
    fn aggregated_samples(&self, attempt: &WorkflowRunAttempt) -> Result<Vec<Sample>>;

    /// All attempts belonging to runs of the named workflow.
    fn attempts_for_workflow(&self, workflow_name: &str) -> Result<Vec<WorkflowRunAttempt>>;

    /// Find the job of the given kind that produced `output_file` within an attempt.
    fn find_job(&self, attempt_id: i64, job_kind: &str, output_file: &Path) -> Result<Option<Job>>;

    /// Open a new queued attempt for a run of the named workflow.
    fn create_attempt(
        &self,
        workflow_name: &str,
        run_name: &str,
        sample_ids: &[i64],
        attributes: Vec<Attribute>,
    ) -> Result<WorkflowRunAttempt>;

    /// Done attempts of the named workflow that have not been registered yet.
    fn pending_registration(&self, workflow_name: &str) -> Result<Vec<WorkflowRunAttempt>>;

    /// Record that an attempt's artifacts were handed to the catalog.
    fn mark_registered(&self, attempt_id: i64) -> Result<()>;
}
