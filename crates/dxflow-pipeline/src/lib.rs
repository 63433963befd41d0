//! Run coordination for the DX-filtered post-processing workflow.
//!
//! This crate builds the job graph for a triggered run, registers a finished
//! attempt's artifacts into the catalog and audits the conventional output
//! files afterwards.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────────┐   ┌────────────────────┐
//! │  RunTrigger  │──▶│ WorkflowGraphBuilder │──▶│ external scheduler │
//! └──────────────┘   └──────────────────────┘   └─────────┬──────────┘
//!                                                         ▼
//! ┌────────────────┐  ┌───────────────────┐   ┌────────────────────┐
//! │ PeriodicPoller │─▶│ RegistrationSweep │──▶│ ArtifactRegistrar  │──▶ catalog
//! └────────────────┘  └───────────────────┘   └────────────────────┘
//! ```
//!
//! [`FileExistenceAsserter`] and [`CatalogAuditor`] run independently of
//! this flow, against the same naming convention.

pub mod asserter;
pub mod builder;
pub mod error;
pub mod graph;
pub mod naming;
pub mod params;
pub mod poller;
pub mod pool;
pub mod registrar;
pub mod trigger;

pub use asserter::{CatalogAuditor, FileExistenceAsserter};
pub use builder::WorkflowGraphBuilder;
pub use error::{PipelineError, Result, ValidationError};
pub use graph::{Edge, JobArg, JobGraph, JobKind, JobNode};
pub use naming::{
    OutputKind, ReferenceFiles, SubjectFiles, expected_outputs, sample_collection,
    sample_output_dir, sample_root_token, subject_merge_collection, subject_root_token,
};
pub use params::{RunContext, RunParameters, resolve_subject_name};
pub use poller::{PeriodicPoller, PollTask, PollerHandle, RegistrationSweep, SweepEntry, SweepSummary};
pub use pool::{PoolOutcome, WorkerPool};
pub use registrar::{
    ArtifactDescriptor, ArtifactRegistrar, RegistrationPlan, RegistrationReport, catalog_runner,
};
pub use trigger::{Entity, RunRequest, RunTrigger, TriggerEnvelope, TriggeredRun};
