//! Shared types for the dxflow pipeline coordinator.
//!
//! The records here mirror what the external persistence layer stores:
//! samples, workflows, runs, attempts and the jobs the scheduler executed.
//! [`RunRepository`] is the only way the rest of the workspace reaches them.

pub mod error;
pub mod model;
pub mod repository;
pub mod snapshot;

pub use error::{Error, Result};
pub use model::{
    Attribute, AttemptStatus, Flowcell, Job, SUBJECT_NAME_ATTRIBUTE, Sample,
    UNDETERMINED_BARCODE, Workflow, WorkflowRun, WorkflowRunAttempt, find_attribute,
};
pub use repository::RunRepository;
pub use snapshot::{Snapshot, SnapshotRepository};
