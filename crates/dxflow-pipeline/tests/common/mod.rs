//! Shared fixtures: an on-disk workspace and a simulated catalog.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dxflow_config::{CatalogSettings, PipelineSettings, RegistrationLayout, RegistrationSettings};
use dxflow_exec::{
    CatalogOp, CommandExecutor, CommandOutput, CommandRunner, CommandSpec, EnvironmentProfile,
    ExecResult,
};
use dxflow_pipeline::ArtifactRegistrar;
use dxflow_types::{Attribute, Flowcell, Sample, Snapshot, SnapshotRepository, Workflow};
use parking_lot::Mutex;
use tempfile::TempDir;

pub const SAMPLE_ID: i64 = 52422;
pub const SUBJECT: &str = "NCG_00009";
pub const RUN_NAME: &str = "RUN_V7_P5";
pub const WORKFLOW: &str = "NCNEXUS38DX";

// ─────────────────────────────────────────────────────────────────────────────
// Simulated catalog
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogState {
    /// Collection path to its tags.
    pub collections: BTreeMap<String, BTreeSet<Vec<String>>>,
    /// Object path to its tags.
    pub objects: BTreeMap<String, BTreeSet<Vec<String>>>,
}

/// Behaves like the catalog client tools against an in-memory catalog.
///
/// Registering an existing object fails, as does tagging or removing a
/// path that does not exist. Re-adding an identical tag is accepted.
#[derive(Default)]
pub struct FakeCatalog {
    state: Mutex<CatalogState>,
    calls: Mutex<Vec<String>>,
    failing: Mutex<Option<CatalogOp>>,
    latency: Mutex<Option<Duration>>,
}

impl FakeCatalog {
    pub fn state(&self) -> CatalogState {
        self.state.lock().clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Make every command of `op` exit non-zero.
    pub fn fail(&self, op: Option<CatalogOp>) {
        *self.failing.lock() = op;
    }

    /// Make every command take `latency` before it completes.
    pub fn slow(&self, latency: Duration) {
        *self.latency.lock() = Some(latency);
    }

    fn apply(&self, spec: &CommandSpec) -> i32 {
        let mut state = self.state.lock();
        let args = &spec.args;
        match spec.op {
            CatalogOp::MkCollection => {
                state.collections.entry(args[1].clone()).or_default();
                0
            }
            CatalogOp::SetTag => {
                let target = &args[2];
                let tag = args[3..].to_vec();
                let tags = if args[1] == "-C" {
                    state.collections.get_mut(target)
                } else {
                    state.objects.get_mut(target)
                };
                match tags {
                    Some(tags) => {
                        tags.insert(tag);
                        0
                    }
                    None => 4,
                }
            }
            CatalogOp::Register => {
                let local = Path::new(&args[1]);
                let object = &args[2];
                let parent = object.rsplit_once('/').map(|(p, _)| p).unwrap_or("");
                if !local.is_file() || !state.collections.contains_key(parent) {
                    2
                } else if state.objects.contains_key(object) {
                    3
                } else {
                    state.objects.insert(object.clone(), BTreeSet::new());
                    0
                }
            }
            CatalogOp::Deregister => {
                if state.objects.remove(&args[1]).is_some() {
                    0
                } else {
                    4
                }
            }
            CatalogOp::List => {
                let path = &args[0];
                if state.objects.contains_key(path) || state.collections.contains_key(path) {
                    0
                } else {
                    4
                }
            }
        }
    }
}

#[async_trait]
impl CommandExecutor for FakeCatalog {
    async fn execute(
        &self,
        spec: &CommandSpec,
        _profile: &EnvironmentProfile,
    ) -> ExecResult<CommandOutput> {
        self.calls.lock().push(spec.to_string());
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if *self.failing.lock() == Some(spec.op) {
            return Ok(CommandOutput::new("", "simulated failure", 1));
        }
        let code = self.apply(spec);
        Ok(CommandOutput::new("", "", code))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Workspace
// ─────────────────────────────────────────────────────────────────────────────

/// Temporary directory laid out like the analysis file system.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    /// Reference files for version 7 / panel 5 and the subject's merged inputs.
    pub fn new() -> Self {
        let ws = Self {
            dir: TempDir::new().unwrap(),
        };
        let annotation = ws.settings().annotation_dir();
        for rel in [
            "all/allintervals.v7.txt",
            "7/exons_pm_0_v7.interval_list",
            "7/exons_pm_0_v7.bed",
            "7/genes_dxid_5_v_7.interval_list",
        ] {
            touch(&annotation.join(rel));
        }
        touch(&ws.subject_dir().join("NCG_00009.merged.rg.deduped.bam"));
        touch(&ws.subject_dir().join("NCG_00009.merged.rg.deduped.bai"));
        ws
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn subject_dir(&self) -> PathBuf {
        self.root().join("subjectMerge").join(SUBJECT)
    }

    pub fn settings(&self) -> PipelineSettings {
        PipelineSettings {
            workflow_name: WORKFLOW.to_string(),
            site_name: Some("Kure".to_string()),
            reference_sequence: Some("/data/reference/GRCh38.fa".to_string()),
            subject_merge_home: Some(self.root().join("subjectMerge")),
            output_home: Some(self.root().join("analysis")),
            data_directory: self.root().join("data"),
            ..Default::default()
        }
    }

    pub fn catalog_settings(&self) -> CatalogSettings {
        CatalogSettings {
            tools_home: PathBuf::from("/opt/irods/bin"),
            env_profile: None,
            ..Default::default()
        }
    }

    pub fn registrar(
        &self,
        layout: RegistrationLayout,
        repository: Arc<SnapshotRepository>,
        catalog: Arc<FakeCatalog>,
    ) -> ArtifactRegistrar {
        ArtifactRegistrar::new(
            self.settings(),
            self.catalog_settings(),
            RegistrationSettings {
                layout,
                common_metadata: None,
            },
            repository,
            CommandRunner::new(catalog, EnvironmentProfile::empty()),
        )
        .with_workflow_version("0.3.0")
    }
}

pub fn touch(path: &Path) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, "").unwrap();
}

pub fn workflow() -> Workflow {
    Workflow {
        id: 1,
        name: WORKFLOW.to_string(),
        system: "Prod".to_string(),
    }
}

pub fn sample() -> Sample {
    Sample {
        id: SAMPLE_ID,
        name: SUBJECT.to_string(),
        flowcell: Flowcell {
            id: 310,
            name: "HGKTJBGXY".to_string(),
        },
        lane_index: 1,
        barcode: "GATCAG".to_string(),
        study_name: Some("NCNEXUS38".to_string()),
        attributes: vec![Attribute::new("subjectName", SUBJECT)],
    }
}

pub fn repository() -> Arc<SnapshotRepository> {
    Arc::new(SnapshotRepository::in_memory(Snapshot {
        workflows: vec![workflow()],
        samples: vec![sample()],
        ..Default::default()
    }))
}

pub fn run_attributes() -> Vec<Attribute> {
    vec![Attribute::new("version", "7"), Attribute::new("panel", "5")]
}
