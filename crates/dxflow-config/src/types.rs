//! Configuration types mapping to the TOML schema.
//!
//! Top-level config:
//! ```toml
//! [pipeline]       # graph builder inputs (site, reference, data roots)
//! [catalog]        # external catalog naming and client tools
//! [registration]   # artifact layout and metadata keys
//! [scheduler]      # poller cadence and worker pools
//! [logging]        # log file location
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment variable overriding `pipeline.data_directory`.
pub const DATA_DIRECTORY_ENV: &str = "MAPSEQ_DATA_DIRECTORY";

/// Environment variable overriding `catalog.tools_home`.
pub const TOOLS_HOME_ENV: &str = "IRODS_HOME";

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g., project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DxflowConfig {
    pub pipeline: Option<PipelineSettings>,
    pub catalog: Option<CatalogSettings>,
    pub registration: Option<RegistrationSettings>,
    pub scheduler: Option<SchedulerSettings>,
    pub logging: Option<LoggingSettings>,
}

impl DxflowConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> crate::Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: DxflowConfig) {
        if other.pipeline.is_some() {
            self.pipeline = other.pipeline;
        }
        if other.catalog.is_some() {
            self.catalog = other.catalog;
        }
        if other.registration.is_some() {
            self.registration = other.registration;
        }
        if other.scheduler.is_some() {
            self.scheduler = other.scheduler;
        }
        if other.logging.is_some() {
            self.logging = other.logging;
        }
    }

    /// Effective pipeline settings with process environment overrides applied.
    pub fn pipeline(&self) -> PipelineSettings {
        let mut settings = self.pipeline.clone().unwrap_or_default();
        settings.apply_env(|key| std::env::var(key).ok());
        settings
    }

    /// Effective catalog settings with process environment overrides applied.
    pub fn catalog(&self) -> CatalogSettings {
        let mut settings = self.catalog.clone().unwrap_or_default();
        settings.apply_env(|key| std::env::var(key).ok());
        settings
    }

    pub fn registration(&self) -> RegistrationSettings {
        self.registration.clone().unwrap_or_default()
    }

    pub fn scheduler(&self) -> SchedulerSettings {
        self.scheduler.clone().unwrap_or_default()
    }

    pub fn logging(&self) -> LoggingSettings {
        self.logging.clone().unwrap_or_default()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Pipeline
// ─────────────────────────────────────────────────────────────────────────────

/// Inputs shared by the graph builder and the registrar.
///
/// ```toml
/// [pipeline]
/// workflow_name = "NCNEXUS38DX"
/// site_name = "Kure"
/// reference_sequence = "/data/reference/BUILD.38/GRCh38.fa"
/// subject_merge_home = "/projects/sequence_analysis/ncnexus38/subjectMerge"
/// output_home = "/projects/sequence_analysis/ncnexus38/analysis"
/// data_directory = "/projects/mapseq/data"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Workflow the operator commands and the poller act on.
    pub workflow_name: String,
    /// Scheduler site every job is pinned to.
    pub site_name: Option<String>,
    /// Reference sequence passed to metrics collection and recorded as metadata.
    pub reference_sequence: Option<String>,
    /// Root of the per-subject merged alignment directories.
    pub subject_merge_home: Option<PathBuf>,
    /// Root of the per-sample analysis output tree.
    pub output_home: Option<PathBuf>,
    /// Root holding the reference annotation resources.
    pub data_directory: PathBuf,
    /// Annotation subtree under `data_directory`.
    pub annotation_subdir: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            workflow_name: "NCNEXUS38DX".to_string(),
            site_name: None,
            reference_sequence: None,
            subject_merge_home: None,
            output_home: None,
            data_directory: PathBuf::from("/projects/mapseq/data"),
            annotation_subdir: "resources/annotation/abeast/NCNEXUS38".to_string(),
        }
    }
}

impl PipelineSettings {
    /// Apply environment overrides through the given lookup.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup(DATA_DIRECTORY_ENV)
            && !dir.is_empty()
        {
            self.data_directory = PathBuf::from(dir);
        }
    }

    /// Directory holding the versioned interval lists.
    pub fn annotation_dir(&self) -> PathBuf {
        self.data_directory.join(&self.annotation_subdir)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Catalog
// ─────────────────────────────────────────────────────────────────────────────

/// Naming and client settings for the external data catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    /// Top-level catalog zone.
    pub zone: String,
    /// Pipeline segment of catalog paths.
    pub pipeline: String,
    /// Project tag applied to collections.
    pub project: String,
    /// Unit recorded with every data-object tag.
    pub metadata_unit: String,
    /// Directory containing the catalog client tools.
    pub tools_home: PathBuf,
    /// Shell-style `KEY=VALUE` profile loaded into every command's environment.
    pub env_profile: Option<PathBuf>,
    /// Per-command timeout in seconds.
    pub command_timeout_secs: u64,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            zone: "MedGenZone".to_string(),
            pipeline: "ncnexus38".to_string(),
            project: "NCNEXUS38".to_string(),
            metadata_unit: "NCNEXUS38DX".to_string(),
            tools_home: PathBuf::from("/usr/bin"),
            env_profile: dirs::home_dir().map(|h| h.join(".mapseqrc")),
            command_timeout_secs: 600,
        }
    }
}

impl CatalogSettings {
    /// Apply environment overrides through the given lookup.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup(TOOLS_HOME_ENV)
            && !dir.is_empty()
        {
            self.tools_home = PathBuf::from(dir);
        }
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Registration
// ─────────────────────────────────────────────────────────────────────────────

/// Where registered artifacts live locally and in the catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationLayout {
    /// One collection per subject and version, fed by the merged alignment.
    #[default]
    SubjectMerge,
    /// One collection per sample under the flowcell/lane analysis tree.
    PerSample,
}

/// A metadata entry attached to every registered artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataField {
    ParticipantId,
    WorkflowVersion,
    WorkflowName,
    System,
    StudyName,
    SampleId,
    FlowcellId,
    PanelId,
    ListVersion,
}

impl MetadataField {
    /// Attribute name written to the catalog.
    pub fn attribute_name(&self) -> &'static str {
        match self {
            MetadataField::ParticipantId => "ParticipantId",
            MetadataField::WorkflowVersion => "MaPSeqWorkflowVersion",
            MetadataField::WorkflowName => "MaPSeqWorkflowName",
            MetadataField::System => "MaPSeqSystem",
            MetadataField::StudyName => "MaPSeqStudyName",
            MetadataField::SampleId => "MaPSeqSampleId",
            MetadataField::FlowcellId => "MaPSeqFlowcellId",
            MetadataField::PanelId => "DxId",
            MetadataField::ListVersion => "DxVersion",
        }
    }

    /// Default key set for a layout.
    ///
    /// Subject-merged artifacts span samples, so sample-scoped keys are left out.
    pub fn defaults_for(layout: RegistrationLayout) -> Vec<MetadataField> {
        let mut fields = vec![
            MetadataField::ParticipantId,
            MetadataField::WorkflowVersion,
            MetadataField::WorkflowName,
            MetadataField::System,
        ];
        if layout == RegistrationLayout::PerSample {
            fields.extend([
                MetadataField::StudyName,
                MetadataField::SampleId,
                MetadataField::FlowcellId,
            ]);
        }
        fields.extend([MetadataField::PanelId, MetadataField::ListVersion]);
        fields
    }
}

/// Artifact registration behaviour.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationSettings {
    pub layout: RegistrationLayout,
    /// Keys attached to every artifact; layout defaults when unset.
    pub common_metadata: Option<Vec<MetadataField>>,
}

impl RegistrationSettings {
    /// The effective common key list.
    pub fn common_metadata(&self) -> Vec<MetadataField> {
        self.common_metadata
            .clone()
            .unwrap_or_else(|| MetadataField::defaults_for(self.layout))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Scheduler
// ─────────────────────────────────────────────────────────────────────────────

/// Poller cadence and worker pool sizes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Delay before the first poll.
    pub initial_delay_secs: u64,
    /// Interval between polls.
    pub period_secs: u64,
    /// Workers used by bulk registration sweeps.
    pub bulk_workers: usize,
    /// Ceiling on how long a registration barrier waits.
    pub barrier_timeout_secs: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            initial_delay_secs: 60,
            period_secs: 300,
            bulk_workers: 2,
            barrier_timeout_secs: 3600,
        }
    }
}

impl SchedulerSettings {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_secs)
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }

    pub fn barrier_timeout(&self) -> Duration {
        Duration::from_secs(self.barrier_timeout_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging
// ─────────────────────────────────────────────────────────────────────────────

/// Log file configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Directory for the rolling JSON log. Defaults to `<config dir>/logs`.
    pub directory: Option<PathBuf>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
