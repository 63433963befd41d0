//! Run-scoped parameters shared by graph construction and registration.

use std::collections::BTreeSet;

use dxflow_types::{RunRepository, Sample, WorkflowRun, WorkflowRunAttempt};

use crate::error::{Result, ValidationError};

/// Run attribute holding the interval list version.
pub const VERSION_ATTRIBUTE: &str = "list_version";

/// Run attribute holding the diagnostic panel id.
pub const PANEL_ATTRIBUTE: &str = "dx_id";

/// Run attribute selecting the incidental-findings interval list.
pub const INCIDENTAL_ATTRIBUTE: &str = "incidental";

/// Version and panel a run is filtered by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunParameters {
    pub version: String,
    pub panel_id: String,
    pub incidental: bool,
}

impl RunParameters {
    pub fn new(version: impl Into<String>, panel_id: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            panel_id: panel_id.into(),
            incidental: false,
        }
    }

    /// Read the parameters from the run's attributes. Both version and panel
    /// id must be present and non-empty.
    pub fn from_run(run: &WorkflowRun) -> std::result::Result<Self, ValidationError> {
        let version = required(run, VERSION_ATTRIBUTE)?;
        let panel_id = required(run, PANEL_ATTRIBUTE)?;
        let incidental = run
            .attribute(INCIDENTAL_ATTRIBUTE)
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"));
        Ok(Self {
            version,
            panel_id,
            incidental,
        })
    }
}

fn required(run: &WorkflowRun, name: &str) -> std::result::Result<String, ValidationError> {
    match run.attribute(name).map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => Err(ValidationError::MissingRunAttribute {
            name: name.to_string(),
        }),
    }
}

/// Resolve the single subject name across a run's samples.
///
/// Undetermined-barcode samples are ignored. Zero or several distinct names
/// are fatal, as is a single empty name.
pub fn resolve_subject_name(samples: &[Sample]) -> std::result::Result<String, ValidationError> {
    let names: BTreeSet<&str> = samples
        .iter()
        .filter(|s| !s.is_undetermined())
        .filter_map(|s| s.subject_name())
        .collect();

    let mut iter = names.iter();
    match (iter.next(), iter.next()) {
        (None, _) => Err(ValidationError::NoSubjectName),
        (Some(_), Some(_)) => Err(ValidationError::MultipleSubjectNames(
            names.iter().map(|n| n.to_string()).collect(),
        )),
        (Some(name), None) if name.trim().is_empty() => Err(ValidationError::EmptySubjectName),
        (Some(name), None) => Ok(name.to_string()),
    }
}

/// Everything resolved from the store before a graph build or registration.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub attempt: WorkflowRunAttempt,
    pub samples: Vec<Sample>,
    pub subject_name: String,
    pub params: RunParameters,
}

impl RunContext {
    /// Aggregate samples, then check parameters and the subject name, in that order.
    pub fn resolve(repository: &dyn RunRepository, attempt: &WorkflowRunAttempt) -> Result<Self> {
        let samples = repository.aggregated_samples(attempt)?;
        if samples.is_empty() {
            return Err(ValidationError::NoSamples {
                attempt_id: attempt.id,
            }
            .into());
        }
        let params = RunParameters::from_run(&attempt.run)?;
        let subject_name = resolve_subject_name(&samples)?;

        Ok(Self {
            attempt: attempt.clone(),
            samples,
            subject_name,
            params,
        })
    }

    /// Samples other than the undetermined-barcode control.
    pub fn determined_samples(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter().filter(|s| !s.is_undetermined())
    }
}
