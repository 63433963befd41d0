//! File and catalog naming convention.
//!
//! Every name here must match what earlier runs stored in the catalog, so
//! the formats are fixed byte for byte.

use std::path::{Path, PathBuf};

use dxflow_config::{CatalogSettings, PipelineSettings};
use dxflow_types::Sample;

use crate::error::ValidationError;
use crate::params::RunParameters;

/// Suffix of the merged, de-duplicated alignment in a subject directory.
pub const MERGED_BAM_SUFFIX: &str = ".deduped.bam";

/// Suffix of the merged alignment's index.
pub const MERGED_BAI_SUFFIX: &str = ".deduped.bai";

/// Root token of every per-sample output file.
pub fn sample_root_token(sample: &Sample) -> String {
    format!(
        "{}_{}_L{:03}.fixed-rg.deduped.realign.fixmate.recal",
        sample.flowcell.name, sample.barcode, sample.lane_index
    )
}

/// Root token of every subject-merged output file.
pub fn subject_root_token(subject_name: &str) -> String {
    format!("{}.merged.rg.deduped", subject_name)
}

// ─────────────────────────────────────────────────────────────────────────────
// Conventional outputs
// ─────────────────────────────────────────────────────────────────────────────

/// The eleven conventional outputs of a filtered run, in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputKind {
    CumulativeCoverageCounts,
    CumulativeCoverageProportions,
    IntervalStatistics,
    IntervalSummary,
    SampleStatistics,
    SampleSummary,
    FilteredBam,
    SortedBam,
    SortedBai,
    SortedZip,
    FilteredVcf,
}

impl OutputKind {
    pub const ALL: [OutputKind; 11] = [
        OutputKind::CumulativeCoverageCounts,
        OutputKind::CumulativeCoverageProportions,
        OutputKind::IntervalStatistics,
        OutputKind::IntervalSummary,
        OutputKind::SampleStatistics,
        OutputKind::SampleSummary,
        OutputKind::FilteredBam,
        OutputKind::SortedBam,
        OutputKind::SortedBai,
        OutputKind::SortedZip,
        OutputKind::FilteredVcf,
    ];

    /// File name for the given root token and run parameters.
    pub fn file_name(&self, root: &str, params: &RunParameters) -> String {
        let v = &params.version;
        let p = &params.panel_id;
        match self {
            OutputKind::CumulativeCoverageCounts => {
                format!("{root}.coverage.v{v}.gene.sample_cumulative_coverage_counts")
            }
            OutputKind::CumulativeCoverageProportions => {
                format!("{root}.coverage.v{v}.gene.sample_cumulative_coverage_proportions")
            }
            OutputKind::IntervalStatistics => {
                format!("{root}.coverage.v{v}.gene.sample_interval_statistics")
            }
            OutputKind::IntervalSummary => {
                format!("{root}.coverage.v{v}.gene.sample_interval_summary")
            }
            OutputKind::SampleStatistics => format!("{root}.coverage.v{v}.gene.sample_statistics"),
            OutputKind::SampleSummary => format!("{root}.coverage.v{v}.gene.sample_summary"),
            OutputKind::FilteredBam => format!("{root}.filtered_by_dxid_{p}_v{v}.bam"),
            OutputKind::SortedBam => format!("{root}.filtered_by_dxid_{p}_v{v}.sorted.bam"),
            OutputKind::SortedBai => format!("{root}.filtered_by_dxid_{p}_v{v}.sorted.bai"),
            OutputKind::SortedZip => format!("{root}.filtered_by_dxid_{p}_v{v}.sorted.zip"),
            OutputKind::FilteredVcf => format!("{root}.filtered_by_dxid_{p}_v{v}.vcf"),
        }
    }

}

/// All eleven conventional file names for a root token.
pub fn expected_outputs(root: &str, params: &RunParameters) -> Vec<String> {
    OutputKind::ALL
        .iter()
        .map(|kind| kind.file_name(root, params))
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Directories and catalog collections
// ─────────────────────────────────────────────────────────────────────────────

/// Local analysis directory of one sample.
pub fn sample_output_dir(output_home: &Path, sample: &Sample, workflow_name: &str) -> PathBuf {
    output_home
        .join(&sample.flowcell.name)
        .join(format!("L{:03}_{}", sample.lane_index, sample.barcode))
        .join(workflow_name)
}

/// `/<zone>/<system>/sequencing/<pipeline>/subjectMerge/<subject>/<version>`
pub fn subject_merge_collection(
    catalog: &CatalogSettings,
    system: &str,
    subject_name: &str,
    version: &str,
) -> String {
    format!(
        "/{}/{}/sequencing/{}/subjectMerge/{}/{}",
        catalog.zone, system, catalog.pipeline, subject_name, version
    )
}

/// `/<zone>/<system>/sequencing/<pipeline>/analysis/<flowcell>/L<lane>_<barcode>/<workflow>/<version>`
pub fn sample_collection(
    catalog: &CatalogSettings,
    system: &str,
    sample: &Sample,
    workflow_name: &str,
    version: &str,
) -> String {
    format!(
        "/{}/{}/sequencing/{}/analysis/{}/L{:03}_{}/{}/{}",
        catalog.zone,
        system,
        catalog.pipeline,
        sample.flowcell.name,
        sample.lane_index,
        sample.barcode,
        workflow_name,
        version
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Reference files
// ─────────────────────────────────────────────────────────────────────────────

/// Annotation files a filtered run depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceFiles {
    pub all_intervals: PathBuf,
    pub exon_interval_list: PathBuf,
    pub exon_bed: PathBuf,
    pub panel_interval_list: PathBuf,
}

impl ReferenceFiles {
    pub fn locate(settings: &PipelineSettings, params: &RunParameters) -> Self {
        let root = settings.annotation_dir();
        let v = &params.version;
        let p = &params.panel_id;
        let panel_interval_list = if params.incidental {
            root.join("Incidental")
                .join(format!("incidental_{p}_{v}.interval_list"))
        } else {
            root.join(v).join(format!("genes_dxid_{p}_v_{v}.interval_list"))
        };
        Self {
            all_intervals: root.join("all").join(format!("allintervals.v{v}.txt")),
            exon_interval_list: root.join(v).join(format!("exons_pm_0_v{v}.interval_list")),
            exon_bed: root.join(v).join(format!("exons_pm_0_v{v}.bed")),
            panel_interval_list,
        }
    }

    fn entries(&self) -> [(&'static str, &Path); 4] {
        [
            ("interval master list", &self.all_intervals),
            ("exon interval list", &self.exon_interval_list),
            ("exon BED file", &self.exon_bed),
            ("panel interval list", &self.panel_interval_list),
        ]
    }

    /// Fail on the first file that does not exist.
    pub fn check(&self) -> Result<(), ValidationError> {
        for (kind, path) in self.entries() {
            if !path.is_file() {
                return Err(ValidationError::MissingReferenceFile {
                    kind: kind.to_string(),
                    path: path.to_path_buf(),
                });
            }
        }
        Ok(())
    }
}

/// Find the single file in `dir` whose name ends with `suffix`.
pub fn find_unique_input(dir: &Path, suffix: &str) -> Result<PathBuf, ValidationError> {
    let not_found = || ValidationError::InputNotFound {
        suffix: suffix.to_string(),
        dir: dir.to_path_buf(),
    };
    let entries = std::fs::read_dir(dir).map_err(|_| not_found())?;

    let mut matches: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(suffix))
        })
        .collect();
    matches.sort();

    match matches.len() {
        0 => Err(not_found()),
        1 => Ok(matches.remove(0)),
        _ => Err(ValidationError::AmbiguousInput {
            suffix: suffix.to_string(),
            matches,
        }),
    }
}

/// Files the graph reads and writes, derived from the merged alignment's stem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectFiles {
    pub bam: PathBuf,
    pub bai: PathBuf,
    pub depth: PathBuf,
    pub variants: PathBuf,
    pub hs_metrics: PathBuf,
    pub hs_coverage: PathBuf,
    pub depth_converted: PathBuf,
    pub filtered_bam: PathBuf,
    pub sorted_bam: PathBuf,
    pub sorted_bai: PathBuf,
    pub sorted_zip: PathBuf,
    pub filtered_vcf: PathBuf,
}

impl SubjectFiles {
    /// `subject_dir` holds the inputs; outputs go to `output_dir`.
    pub fn derive(
        bam: PathBuf,
        bai: PathBuf,
        subject_dir: &Path,
        output_dir: &Path,
        params: &RunParameters,
    ) -> Self {
        let name = bam
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let stem = name.strip_suffix(".bam").unwrap_or(name).to_string();
        let v = &params.version;
        let p = &params.panel_id;
        let filtered = format!("{stem}.filtered_by_dxid_{p}_v{v}");

        Self {
            depth: subject_dir.join(format!("{stem}.depth.txt")),
            variants: subject_dir.join(format!("{stem}.filtered.srd.ps.va.vcf")),
            hs_metrics: output_dir.join(format!("{stem}.hs.metrics")),
            hs_coverage: output_dir.join(format!("{stem}.hs.coverage")),
            depth_converted: output_dir.join(format!("{stem}.depth.v{v}.txt")),
            filtered_bam: output_dir.join(format!("{filtered}.bam")),
            sorted_bam: output_dir.join(format!("{filtered}.sorted.bam")),
            sorted_bai: output_dir.join(format!("{filtered}.sorted.bai")),
            sorted_zip: output_dir.join(format!("{filtered}.sorted.zip")),
            filtered_vcf: output_dir.join(format!("{filtered}.vcf")),
            bam,
            bai,
        }
    }
}
