//! Registers a finished attempt's artifacts into the catalog.
//!
//! Registration is not transactional. It is safe to repeat because
//! collection setup is idempotent and each file registration falls back to
//! deregister-then-register when the first attempt fails.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dxflow_config::{
    CatalogSettings, DxflowConfig, MetadataField, PipelineSettings, RegistrationLayout,
    RegistrationSettings,
};
use dxflow_exec::{
    CatalogClient, CommandResult, CommandRunner, EnvironmentProfile, ProcessExecutor,
    QueuedCommand,
};
use dxflow_types::{Attribute, RunRepository, Sample, WorkflowRunAttempt};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::builder::missing_setting;
use crate::error::Result;
use crate::graph::JobKind;
use crate::naming::{
    OutputKind, sample_collection, sample_output_dir, sample_root_token,
    subject_merge_collection, subject_root_token,
};
use crate::params::RunContext;

pub const JOB_NAME_ATTRIBUTE: &str = "MaPSeqJobName";
pub const JOB_ID_ATTRIBUTE: &str = "MaPSeqJobId";
pub const MIME_TYPE_ATTRIBUTE: &str = "MaPSeqMimeType";
pub const REFERENCE_SEQUENCE_ATTRIBUTE: &str = "MaPSeqReferenceSequenceFile";

/// Tag name and value applied to every collection.
const PROJECT_ATTRIBUTE: &str = "Project";
const PARTICIPANT_ATTRIBUTE: &str = "ParticipantId";

/// Job name recorded for per-sample coverage summaries, which are produced
/// upstream of this workflow's graph.
const COVERAGE_JOB_NAME: &str = "GATKDepthOfCoverage";

mod mime {
    pub const TEXT_PLAIN: &str = "text/plain";
    pub const BAM: &str = "application/bam";
    pub const BAM_INDEX: &str = "application/bam-index";
    pub const ZIP: &str = "application/zip";
    pub const VCF: &str = "text/vcf";
}

/// A file plus the metadata to attach once it is registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactDescriptor {
    pub file: PathBuf,
    pub collection: String,
    pub metadata: Vec<Attribute>,
}

impl ArtifactDescriptor {
    pub fn file_name(&self) -> String {
        self.file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Catalog path of the registered data object.
    pub fn object_path(&self) -> String {
        format!("{}/{}", self.collection, self.file_name())
    }

    pub fn metadata_value(&self, name: &str) -> Option<&str> {
        dxflow_types::find_attribute(&self.metadata, name)
    }
}

/// How one artifact is named and tagged.
struct ArtifactTemplate {
    file_name: String,
    job_name: &'static str,
    /// Job whose recorded outputs are searched for provenance.
    provenance: Option<JobKind>,
    mime_type: &'static str,
    with_reference_sequence: bool,
}

impl ArtifactTemplate {
    fn for_output(kind: OutputKind, root: &str, ctx: &RunContext) -> Self {
        let file_name = kind.file_name(root, &ctx.params);
        let (job, mime_type) = match kind {
            OutputKind::FilteredBam => (Some(JobKind::FilterByPanel), mime::BAM),
            OutputKind::SortedBam => (Some(JobKind::SortSam), mime::BAM),
            OutputKind::SortedBai => (Some(JobKind::SortSam), mime::BAM_INDEX),
            OutputKind::SortedZip => (Some(JobKind::Zip), mime::ZIP),
            OutputKind::FilteredVcf => (Some(JobKind::FilterVariant), mime::VCF),
            _ => (None, mime::TEXT_PLAIN),
        };
        Self {
            file_name,
            job_name: job.map(|j| j.name()).unwrap_or(COVERAGE_JOB_NAME),
            provenance: job,
            mime_type,
            with_reference_sequence: false,
        }
    }

    fn hs_metrics(file_name: String) -> Self {
        Self {
            file_name,
            job_name: JobKind::CollectHsMetrics.name(),
            provenance: Some(JobKind::CollectHsMetrics),
            mime_type: mime::TEXT_PLAIN,
            with_reference_sequence: true,
        }
    }
}

/// One catalog collection and the artifacts destined for it.
struct CollectionTarget<'a> {
    collection: String,
    local_dir: PathBuf,
    sample: Option<&'a Sample>,
    templates: Vec<ArtifactTemplate>,
}

/// Everything registration will do, computed before any command runs.
#[derive(Debug, Clone)]
pub struct RegistrationPlan {
    pub attempt_id: i64,
    pub collections: Vec<String>,
    /// Descriptors whose file exists, in queue order.
    pub descriptors: Vec<ArtifactDescriptor>,
    pub skipped: Vec<PathBuf>,
    pub provenance_misses: Vec<PathBuf>,
    pub commands: Vec<QueuedCommand>,
}

/// Outcome of registering one attempt.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationReport {
    pub attempt_id: i64,
    pub collections: Vec<String>,
    pub registered: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
    pub provenance_misses: Vec<PathBuf>,
    pub results: Vec<CommandResult>,
}

impl RegistrationReport {
    pub fn failures(&self) -> impl Iterator<Item = &CommandResult> {
        self.results.iter().filter(|r| !r.succeeded())
    }

    pub fn is_clean(&self) -> bool {
        self.failures().next().is_none() && self.skipped.is_empty()
    }
}

/// Runner that launches the catalog tools as child processes under the
/// configured environment profile.
pub fn catalog_runner(catalog: &CatalogSettings) -> Result<CommandRunner> {
    let profile = match &catalog.env_profile {
        Some(path) => EnvironmentProfile::load(path)?,
        None => EnvironmentProfile::empty(),
    };
    Ok(CommandRunner::new(
        Arc::new(ProcessExecutor::new(catalog.command_timeout())),
        profile,
    ))
}

/// Drives catalog registration for finished attempts.
pub struct ArtifactRegistrar {
    pipeline: PipelineSettings,
    catalog: CatalogSettings,
    registration: RegistrationSettings,
    repository: Arc<dyn RunRepository>,
    runner: CommandRunner,
    workflow_version: String,
}

impl ArtifactRegistrar {
    pub fn new(
        pipeline: PipelineSettings,
        catalog: CatalogSettings,
        registration: RegistrationSettings,
        repository: Arc<dyn RunRepository>,
        runner: CommandRunner,
    ) -> Self {
        Self {
            pipeline,
            catalog,
            registration,
            repository,
            runner,
            workflow_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Wire a registrar that runs the catalog tools as child processes.
    pub fn from_config(config: &DxflowConfig, repository: Arc<dyn RunRepository>) -> Result<Self> {
        let catalog = config.catalog();
        let runner = catalog_runner(&catalog)?;
        Ok(Self::new(
            config.pipeline(),
            catalog,
            config.registration(),
            repository,
            runner,
        ))
    }

    /// Override the version recorded as `MaPSeqWorkflowVersion`.
    pub fn with_workflow_version(mut self, version: impl Into<String>) -> Self {
        self.workflow_version = version.into();
        self
    }

    pub fn repository(&self) -> &Arc<dyn RunRepository> {
        &self.repository
    }

    /// Register every present artifact of the attempt.
    ///
    /// Only validation failures are errors; command failures, missing files
    /// and provenance misses are logged and reported.
    pub async fn register_attempt(&self, attempt: &WorkflowRunAttempt) -> Result<RegistrationReport> {
        let plan = self.plan(attempt)?;
        info!(
            attempt_id = attempt.id,
            commands = plan.commands.len(),
            skipped = plan.skipped.len(),
            "Registering artifacts"
        );

        let results = self.runner.run(&plan.commands).await;
        let failed = results.iter().filter(|r| !r.succeeded()).count();
        if failed > 0 {
            warn!(attempt_id = attempt.id, failed, "Some catalog commands failed");
        }
        info!(
            attempt_id = attempt.id,
            registered = plan.descriptors.len(),
            failed,
            "Registration finished"
        );

        Ok(RegistrationReport {
            attempt_id: plan.attempt_id,
            collections: plan.collections,
            registered: plan.descriptors.into_iter().map(|d| d.file).collect(),
            skipped: plan.skipped,
            provenance_misses: plan.provenance_misses,
            results,
        })
    }

    /// Validate the attempt and compute the command queue without running it.
    ///
    /// Creates the local `tmp` working directory of each collection that has
    /// at least one file to register.
    pub fn plan(&self, attempt: &WorkflowRunAttempt) -> Result<RegistrationPlan> {
        let ctx = RunContext::resolve(self.repository.as_ref(), attempt)?;
        let targets = self.targets(&ctx)?;

        let mut plan = RegistrationPlan {
            attempt_id: attempt.id,
            collections: Vec::new(),
            descriptors: Vec::new(),
            skipped: Vec::new(),
            provenance_misses: Vec::new(),
            commands: Vec::new(),
        };

        for target in targets {
            let mut present = Vec::with_capacity(target.templates.len());
            for template in &target.templates {
                let descriptor = self.describe(&ctx, &target, template, &mut plan.provenance_misses);
                if descriptor.file.exists() {
                    present.push(descriptor);
                } else {
                    warn!(path = %descriptor.file.display(), "File to register doesn't exist");
                    plan.skipped.push(descriptor.file);
                }
            }

            // Nothing to register locally: run the collection setup from the OS temp dir.
            let work_dir = if present.is_empty() {
                std::env::temp_dir()
            } else {
                let dir = target.local_dir.join("tmp");
                std::fs::create_dir_all(&dir)?;
                dir
            };
            let client = CatalogClient::new(&self.catalog.tools_home, &work_dir);

            plan.commands.push(self.collection_setup(&client, &target.collection, &ctx));
            plan.collections.push(target.collection.clone());
            for descriptor in present {
                plan.commands.extend(self.register_commands(&client, &descriptor));
                plan.descriptors.push(descriptor);
            }
        }

        Ok(plan)
    }

    fn targets<'a>(&self, ctx: &'a RunContext) -> Result<Vec<CollectionTarget<'a>>> {
        let workflow = ctx.attempt.workflow();
        let version = &ctx.params.version;

        match self.registration.layout {
            RegistrationLayout::SubjectMerge => {
                self.reference_sequence()?;
                let home = self
                    .pipeline
                    .subject_merge_home
                    .as_deref()
                    .filter(|p| !p.as_os_str().is_empty())
                    .ok_or_else(|| missing_setting("subject_merge_home"))?;

                let root = subject_root_token(&ctx.subject_name);
                let templates = vec![
                    ArtifactTemplate::hs_metrics(format!("{root}.hs.coverage")),
                    ArtifactTemplate::hs_metrics(format!("{root}.hs.metrics")),
                    ArtifactTemplate::for_output(OutputKind::SortedBam, &root, ctx),
                    ArtifactTemplate::for_output(OutputKind::SortedBai, &root, ctx),
                    ArtifactTemplate::for_output(OutputKind::SortedZip, &root, ctx),
                    ArtifactTemplate::for_output(OutputKind::FilteredVcf, &root, ctx),
                ];

                Ok(vec![CollectionTarget {
                    collection: subject_merge_collection(
                        &self.catalog,
                        &workflow.system,
                        &ctx.subject_name,
                        version,
                    ),
                    local_dir: home.join(&ctx.subject_name).join(version),
                    sample: None,
                    templates,
                }])
            }
            RegistrationLayout::PerSample => {
                let home = self
                    .pipeline
                    .output_home
                    .as_deref()
                    .filter(|p| !p.as_os_str().is_empty())
                    .ok_or_else(|| missing_setting("output_home"))?;

                Ok(ctx
                    .determined_samples()
                    .map(|sample| {
                        let root = sample_root_token(sample);
                        CollectionTarget {
                            collection: sample_collection(
                                &self.catalog,
                                &workflow.system,
                                sample,
                                &workflow.name,
                                version,
                            ),
                            local_dir: sample_output_dir(home, sample, &workflow.name),
                            sample: Some(sample),
                            templates: OutputKind::ALL
                                .iter()
                                .map(|kind| ArtifactTemplate::for_output(*kind, &root, ctx))
                                .collect(),
                        }
                    })
                    .collect())
            }
        }
    }

    fn reference_sequence(&self) -> Result<&str> {
        self.pipeline
            .reference_sequence
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| missing_setting("reference_sequence"))
    }

    fn collection_setup(
        &self,
        client: &CatalogClient,
        collection: &str,
        ctx: &RunContext,
    ) -> QueuedCommand {
        let project = self.catalog.project.as_str();
        QueuedCommand::sequence(
            format!("collection {collection}"),
            vec![
                client.make_collection(collection),
                client.tag_collection(collection, PROJECT_ATTRIBUTE, project, None),
                client.tag_collection(
                    collection,
                    PARTICIPANT_ATTRIBUTE,
                    &ctx.subject_name,
                    Some(project),
                ),
            ],
        )
    }

    fn describe(
        &self,
        ctx: &RunContext,
        target: &CollectionTarget<'_>,
        template: &ArtifactTemplate,
        provenance_misses: &mut Vec<PathBuf>,
    ) -> ArtifactDescriptor {
        let file = target.local_dir.join(&template.file_name);
        let mut metadata = self.common_metadata(ctx, target.sample);

        metadata.push(Attribute::new(JOB_NAME_ATTRIBUTE, template.job_name));
        if template.with_reference_sequence
            && let Some(reference) = self.pipeline.reference_sequence.as_deref()
        {
            metadata.push(Attribute::new(REFERENCE_SEQUENCE_ATTRIBUTE, reference));
        }
        metadata.push(Attribute::new(MIME_TYPE_ATTRIBUTE, template.mime_type));

        if let Some(kind) = template.provenance {
            match self.lookup_job(ctx.attempt.id, kind, &file) {
                Some(job_id) => metadata.push(Attribute::new(JOB_ID_ATTRIBUTE, job_id.to_string())),
                None => {
                    warn!(
                        attempt_id = ctx.attempt.id,
                        job = %kind,
                        path = %file.display(),
                        "Couldn't find job for artifact"
                    );
                    provenance_misses.push(file.clone());
                }
            }
        }

        ArtifactDescriptor {
            file,
            collection: target.collection.clone(),
            metadata,
        }
    }

    fn lookup_job(&self, attempt_id: i64, kind: JobKind, file: &Path) -> Option<i64> {
        match self.repository.find_job(attempt_id, kind.name(), file) {
            Ok(job) => job.map(|j| j.id),
            Err(e) => {
                warn!(attempt_id, job = %kind, error = %e, "Job lookup failed");
                None
            }
        }
    }

    fn common_metadata(&self, ctx: &RunContext, sample: Option<&Sample>) -> Vec<Attribute> {
        let workflow = ctx.attempt.workflow();
        self.registration
            .common_metadata()
            .into_iter()
            .filter_map(|field| {
                let value = match field {
                    MetadataField::ParticipantId => Some(ctx.subject_name.clone()),
                    MetadataField::WorkflowVersion => Some(self.workflow_version.clone()),
                    MetadataField::WorkflowName => Some(workflow.name.clone()),
                    MetadataField::System => Some(workflow.system.clone()),
                    MetadataField::StudyName => sample.and_then(|s| s.study_name.clone()),
                    MetadataField::SampleId => sample.map(|s| s.id.to_string()),
                    MetadataField::FlowcellId => sample.map(|s| s.flowcell.id.to_string()),
                    MetadataField::PanelId => Some(ctx.params.panel_id.clone()),
                    MetadataField::ListVersion => Some(ctx.params.version.clone()),
                };
                match value {
                    Some(v) if !v.is_empty() => Some(Attribute::new(field.attribute_name(), v)),
                    _ => {
                        debug!(field = field.attribute_name(), "No value for metadata field");
                        None
                    }
                }
            })
            .collect()
    }

    fn register_commands(
        &self,
        client: &CatalogClient,
        descriptor: &ArtifactDescriptor,
    ) -> [QueuedCommand; 2] {
        let object = descriptor.object_path();
        let name = descriptor.file_name();
        let unit = self.catalog.metadata_unit.as_str();
        [
            QueuedCommand::with_recovery(
                format!("register {name}"),
                client.register(&descriptor.file, &object),
                client.deregister(&object),
            ),
            QueuedCommand::sequence(
                format!("tag {name}"),
                descriptor
                    .metadata
                    .iter()
                    .map(|a| client.tag_object(&object, &a.name, &a.value, unit))
                    .collect(),
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PipelineError, ValidationError};
    use dxflow_exec::{CommandExecutor, CommandOutput, CommandSpec, ExecResult};
    use dxflow_types::{
        AttemptStatus, Flowcell, Job, Snapshot, SnapshotRepository, Workflow, WorkflowRun,
    };
    use parking_lot::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingExecutor {
        calls: Mutex<Vec<CommandSpec>>,
    }

    #[async_trait::async_trait]
    impl CommandExecutor for RecordingExecutor {
        async fn execute(
            &self,
            spec: &CommandSpec,
            _profile: &EnvironmentProfile,
        ) -> ExecResult<CommandOutput> {
            self.calls.lock().push(spec.clone());
            Ok(CommandOutput::new("", "", 0))
        }
    }

    fn sample(id: i64, barcode: &str) -> Sample {
        Sample {
            id,
            name: format!("sample-{id}"),
            flowcell: Flowcell {
                id: 40,
                name: "HGKTJBGXY".into(),
            },
            lane_index: 1,
            barcode: barcode.into(),
            study_name: Some("NCNEXUS38".into()),
            attributes: vec![Attribute::new("subjectName", "NCG_00009")],
        }
    }

    fn attempt() -> WorkflowRunAttempt {
        WorkflowRunAttempt {
            id: 12,
            status: AttemptStatus::Done,
            run: WorkflowRun {
                id: 3,
                name: "RUN_V7_P5".into(),
                workflow: Workflow {
                    id: 1,
                    name: "NCNEXUS38DX".into(),
                    system: "Prod".into(),
                },
                sample_ids: vec![1, 2],
                attributes: vec![
                    Attribute::new("list_version", "7"),
                    Attribute::new("dx_id", "5"),
                ],
            },
            created_at: chrono::Utc::now(),
            finished_at: None,
        }
    }

    struct Fixture {
        dir: TempDir,
        executor: Arc<RecordingExecutor>,
        registrar: ArtifactRegistrar,
    }

    fn fixture(layout: RegistrationLayout, jobs: Vec<Job>) -> Fixture {
        fixture_in(TempDir::new().unwrap(), layout, jobs)
    }

    fn fixture_in(dir: TempDir, layout: RegistrationLayout, jobs: Vec<Job>) -> Fixture {
        let pipeline = PipelineSettings {
            reference_sequence: Some("/ref/GRCh38.fa".into()),
            subject_merge_home: Some(dir.path().join("subjectMerge")),
            output_home: Some(dir.path().join("analysis")),
            ..Default::default()
        };
        let catalog = CatalogSettings {
            tools_home: PathBuf::from("/opt/irods/bin"),
            env_profile: None,
            ..Default::default()
        };
        let registration = RegistrationSettings {
            layout,
            common_metadata: None,
        };
        let repository = Arc::new(SnapshotRepository::in_memory(Snapshot {
            samples: vec![sample(1, "ACGTAC"), sample(2, "Undetermined")],
            jobs,
            ..Default::default()
        }));
        let executor = Arc::new(RecordingExecutor::default());
        let runner = CommandRunner::new(executor.clone(), EnvironmentProfile::empty());
        let registrar = ArtifactRegistrar::new(pipeline, catalog, registration, repository, runner)
            .with_workflow_version("0.3.0");
        Fixture {
            dir,
            executor,
            registrar,
        }
    }

    fn subject_dir(f: &Fixture) -> PathBuf {
        f.dir.path().join("subjectMerge/NCG_00009/7")
    }

    fn write_subject_outputs(f: &Fixture) {
        let dir = subject_dir(f);
        std::fs::create_dir_all(&dir).unwrap();
        for name in [
            "NCG_00009.merged.rg.deduped.hs.coverage",
            "NCG_00009.merged.rg.deduped.hs.metrics",
            "NCG_00009.merged.rg.deduped.filtered_by_dxid_5_v7.sorted.bam",
            "NCG_00009.merged.rg.deduped.filtered_by_dxid_5_v7.sorted.bai",
            "NCG_00009.merged.rg.deduped.filtered_by_dxid_5_v7.sorted.zip",
            "NCG_00009.merged.rg.deduped.filtered_by_dxid_5_v7.vcf",
        ] {
            std::fs::write(dir.join(name), "").unwrap();
        }
    }

    #[test]
    fn test_subject_merge_plan() {
        let f = fixture(RegistrationLayout::SubjectMerge, vec![]);
        write_subject_outputs(&f);
        let plan = f.registrar.plan(&attempt()).unwrap();

        assert_eq!(
            plan.collections,
            vec!["/MedGenZone/Prod/sequencing/ncnexus38/subjectMerge/NCG_00009/7"]
        );
        assert_eq!(plan.descriptors.len(), 6);
        assert_eq!(plan.commands.len(), 1 + 2 * 6);
        assert!(plan.skipped.is_empty());
        assert!(subject_dir(&f).join("tmp").is_dir());
    }

    #[test]
    fn test_missing_file_shrinks_queue_by_two() {
        let f = fixture(RegistrationLayout::SubjectMerge, vec![]);
        write_subject_outputs(&f);
        let zip = subject_dir(&f).join("NCG_00009.merged.rg.deduped.filtered_by_dxid_5_v7.sorted.zip");
        std::fs::remove_file(&zip).unwrap();

        let plan = f.registrar.plan(&attempt()).unwrap();
        assert_eq!(plan.commands.len(), 1 + 2 * 5);
        assert_eq!(plan.skipped, vec![zip]);
    }

    #[test]
    fn test_hs_metadata_and_provenance() {
        let dir = TempDir::new().unwrap();
        let bam = dir
            .path()
            .join("subjectMerge/NCG_00009/7/NCG_00009.merged.rg.deduped.filtered_by_dxid_5_v7.sorted.bam");
        let jobs = vec![Job {
            id: 901,
            attempt_id: 12,
            kind: "SortSam".into(),
            output_files: vec![bam.clone()],
        }];
        let f = fixture_in(dir, RegistrationLayout::SubjectMerge, jobs);
        write_subject_outputs(&f);

        let plan = f.registrar.plan(&attempt()).unwrap();
        let hs = &plan.descriptors[0];
        assert_eq!(hs.metadata_value("MaPSeqJobName"), Some("CollectHsMetrics"));
        assert_eq!(
            hs.metadata_value("MaPSeqReferenceSequenceFile"),
            Some("/ref/GRCh38.fa")
        );
        assert_eq!(hs.metadata_value("MaPSeqMimeType"), Some("text/plain"));
        assert_eq!(hs.metadata_value("ParticipantId"), Some("NCG_00009"));
        assert_eq!(hs.metadata_value("MaPSeqWorkflowVersion"), Some("0.3.0"));
        assert_eq!(hs.metadata_value("DxId"), Some("5"));
        assert_eq!(hs.metadata_value("DxVersion"), Some("7"));
        assert_eq!(hs.metadata_value("MaPSeqSampleId"), None);

        let sorted = plan.descriptors.iter().find(|d| d.file == bam).unwrap();
        assert_eq!(sorted.metadata_value("MaPSeqJobId"), Some("901"));
        assert!(!plan.provenance_misses.contains(&bam));
        assert_eq!(plan.provenance_misses.len(), 5);
    }

    #[test]
    fn test_per_sample_layout_skips_undetermined() {
        let f = fixture(RegistrationLayout::PerSample, vec![]);
        let plan = f.registrar.plan(&attempt()).unwrap();
        assert_eq!(
            plan.collections,
            vec!["/MedGenZone/Prod/sequencing/ncnexus38/analysis/HGKTJBGXY/L001_ACGTAC/NCNEXUS38DX/7"]
        );
        assert_eq!(plan.skipped.len(), 11);
        assert_eq!(plan.commands.len(), 1);
        assert!(!f.dir.path().join("analysis").exists());
    }

    #[test]
    fn test_no_present_files_creates_no_work_dir() {
        let f = fixture(RegistrationLayout::SubjectMerge, vec![]);
        let plan = f.registrar.plan(&attempt()).unwrap();

        assert_eq!(plan.skipped.len(), 6);
        assert_eq!(plan.commands.len(), 1);
        assert!(!f.dir.path().join("subjectMerge").exists());
        let setup = plan.commands[0].specs();
        assert!(setup.iter().all(|spec| spec.working_dir == std::env::temp_dir()));
    }

    #[test]
    fn test_per_sample_metadata_includes_sample_fields() {
        let f = fixture(RegistrationLayout::PerSample, vec![]);
        let dir = f.dir.path().join("analysis/HGKTJBGXY/L001_ACGTAC/NCNEXUS38DX");
        std::fs::create_dir_all(&dir).unwrap();
        let vcf = dir.join(
            "HGKTJBGXY_ACGTAC_L001.fixed-rg.deduped.realign.fixmate.recal.filtered_by_dxid_5_v7.vcf",
        );
        std::fs::write(&vcf, "").unwrap();

        let plan = f.registrar.plan(&attempt()).unwrap();
        assert_eq!(plan.descriptors.len(), 1);
        let d = &plan.descriptors[0];
        assert_eq!(d.metadata_value("MaPSeqSampleId"), Some("1"));
        assert_eq!(d.metadata_value("MaPSeqFlowcellId"), Some("40"));
        assert_eq!(d.metadata_value("MaPSeqStudyName"), Some("NCNEXUS38"));
        assert_eq!(d.metadata_value("MaPSeqJobName"), Some("FilterVariant"));
        assert_eq!(d.metadata_value("MaPSeqMimeType"), Some("text/vcf"));
    }

    #[tokio::test]
    async fn test_register_attempt_runs_queue_in_order() {
        let f = fixture(RegistrationLayout::SubjectMerge, vec![]);
        write_subject_outputs(&f);
        let report = f.registrar.register_attempt(&attempt()).await.unwrap();

        assert_eq!(report.results.len(), 13);
        assert_eq!(report.registered.len(), 6);
        assert_eq!(report.failures().count(), 0);

        let calls = f.executor.calls.lock();
        assert_eq!(calls[0].args, vec!["-p", "/MedGenZone/Prod/sequencing/ncnexus38/subjectMerge/NCG_00009/7"]);
        assert_eq!(calls[1].args[3..], ["Project".to_string(), "NCNEXUS38".to_string()]);
        assert_eq!(calls[2].args.last().map(String::as_str), Some("NCNEXUS38"));
        assert_eq!(calls[3].program, PathBuf::from("/opt/irods/bin/ireg"));
        assert!(calls[4..].iter().take_while(|c| c.op != dxflow_exec::CatalogOp::Register).all(|c| {
            c.args[1] == "-d" && c.args.last().map(String::as_str) == Some("NCNEXUS38DX")
        }));
        assert!(calls.iter().all(|c| c.working_dir == subject_dir(&f).join("tmp")));
    }

    #[tokio::test]
    async fn test_missing_parameter_has_no_side_effects() {
        let f = fixture(RegistrationLayout::SubjectMerge, vec![]);
        let mut attempt = attempt();
        attempt.run.attributes.retain(|a| a.name != "list_version");

        let err = f.registrar.register_attempt(&attempt).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Validation(ValidationError::MissingRunAttribute { .. })
        ));
        assert!(f.executor.calls.lock().is_empty());
        assert!(!f.dir.path().join("subjectMerge").exists());
    }

    #[test]
    fn test_missing_subject_merge_home() {
        let mut f = fixture(RegistrationLayout::SubjectMerge, vec![]);
        f.registrar.pipeline.subject_merge_home = None;
        let err = f.registrar.plan(&attempt()).unwrap_err();
        assert!(err.is_validation());
    }
}
