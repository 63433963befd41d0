//! Builds the job graph for one attempt.

use std::path::PathBuf;
use std::sync::Arc;

use dxflow_config::PipelineSettings;
use dxflow_types::{RunRepository, WorkflowRunAttempt};
use tracing::{debug, info};

use crate::error::{Result, ValidationError};
use crate::graph::{JobArg, JobGraph, JobKind};
use crate::naming::{
    MERGED_BAI_SUFFIX, MERGED_BAM_SUFFIX, ReferenceFiles, SubjectFiles, find_unique_input,
};
use crate::params::RunContext;

/// Processors requested for the depth conversion job.
const DEPTH_CONVERSION_PROCESSORS: u32 = 8;

/// Constructs the seven-job filtering graph.
///
/// Every precondition is checked before the first node is created; on
/// failure no graph is returned and nothing outside the output directory
/// is touched.
pub struct WorkflowGraphBuilder {
    settings: PipelineSettings,
    repository: Arc<dyn RunRepository>,
}

impl WorkflowGraphBuilder {
    pub fn new(settings: PipelineSettings, repository: Arc<dyn RunRepository>) -> Self {
        Self {
            settings,
            repository,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn build_graph(&self, attempt: &WorkflowRunAttempt) -> Result<JobGraph> {
        let ctx = RunContext::resolve(self.repository.as_ref(), attempt)?;
        let params = &ctx.params;
        info!(
            attempt_id = attempt.id,
            subject = %ctx.subject_name,
            version = %params.version,
            panel = %params.panel_id,
            samples = ctx.samples.len(),
            "Building workflow graph"
        );

        let subject_merge_home = self.subject_merge_home()?;
        let reference_sequence = self.reference_sequence()?;

        let refs = ReferenceFiles::locate(&self.settings, params);
        refs.check()?;

        let subject_dir = subject_merge_home.join(&ctx.subject_name);
        let bam = find_unique_input(&subject_dir, MERGED_BAM_SUFFIX)?;
        let bai = find_unique_input(&subject_dir, MERGED_BAI_SUFFIX)?;

        let output_dir = subject_dir.join(&params.version);
        let files = SubjectFiles::derive(bam, bai, &subject_dir, &output_dir, params);
        std::fs::create_dir_all(&output_dir)?;

        let site = self.settings.site_name.clone();
        let mut graph = JobGraph::new(attempt.id);

        graph.add_job(
            JobKind::CollectHsMetrics,
            site.clone(),
            1,
            vec![
                JobArg::path("--input", &files.bam),
                JobArg::path("--output", &files.hs_metrics),
                JobArg::value("--referenceSequence", reference_sequence),
                JobArg::path("--perTargetCoverage", &files.hs_coverage),
                JobArg::path("--baitIntervals", &refs.exon_interval_list),
                JobArg::path("--targetIntervals", &refs.exon_interval_list),
            ],
            vec![files.hs_metrics.clone(), files.hs_coverage.clone()],
        );

        graph.add_job(
            JobKind::DepthToDocFormat,
            site.clone(),
            DEPTH_CONVERSION_PROCESSORS,
            vec![
                JobArg::path("--input", &files.depth),
                JobArg::path("--output", &files.depth_converted),
                JobArg::path("--intervals", &refs.all_intervals),
            ],
            vec![files.depth_converted.clone()],
        );

        let filter = graph.add_job(
            JobKind::FilterByPanel,
            site.clone(),
            1,
            vec![
                JobArg::path("--output", &files.filtered_bam),
                JobArg::path("--intervalList", &refs.panel_interval_list),
                JobArg::path("--input", &files.bam),
            ],
            vec![files.filtered_bam.clone()],
        );

        let sort = graph.add_job(
            JobKind::SortSam,
            site.clone(),
            1,
            vec![
                JobArg::path("--input", &files.filtered_bam),
                JobArg::switch("--createIndex"),
                JobArg::path("--output", &files.sorted_bam),
                JobArg::value("--sortOrder", "coordinate"),
            ],
            vec![files.sorted_bam.clone(), files.sorted_bai.clone()],
        );
        graph.add_edge(filter, sort);

        let zip = graph.add_job(
            JobKind::Zip,
            site.clone(),
            1,
            vec![
                JobArg::path("--entry", &files.sorted_bam),
                JobArg::path("--workDir", &output_dir),
                JobArg::path("--entry", &files.sorted_bai),
                JobArg::path("--output", &files.sorted_zip),
            ],
            vec![files.sorted_zip.clone()],
        );
        graph.add_edge(sort, zip);

        let variants = graph.add_job(
            JobKind::FilterVariant,
            site.clone(),
            1,
            vec![
                JobArg::path("--intervalList", &refs.panel_interval_list),
                JobArg::path("--input", &files.variants),
                JobArg::path("--output", &files.filtered_vcf),
            ],
            vec![files.filtered_vcf.clone()],
        );

        let remove = graph.add_job(
            JobKind::Remove,
            site,
            1,
            vec![JobArg::path("--file", &files.filtered_bam)],
            vec![],
        );
        graph.add_edge(zip, remove);
        graph.add_edge(variants, remove);

        for node in graph.nodes() {
            debug!(job = %node.name, args = node.args.len(), "Job added");
        }
        info!(
            attempt_id = attempt.id,
            jobs = graph.len(),
            edges = graph.edges().len(),
            "Workflow graph built"
        );

        Ok(graph)
    }

    fn subject_merge_home(&self) -> Result<PathBuf> {
        self.settings
            .subject_merge_home
            .clone()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| missing_setting("subject_merge_home"))
    }

    fn reference_sequence(&self) -> Result<String> {
        self.settings
            .reference_sequence
            .clone()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| missing_setting("reference_sequence"))
    }
}

pub(crate) fn missing_setting(name: &str) -> crate::error::PipelineError {
    ValidationError::MissingSetting {
        name: name.to_string(),
    }
    .into()
}
