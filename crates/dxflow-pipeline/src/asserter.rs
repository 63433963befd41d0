//! Post-run audit of the conventional output files.

use std::collections::BTreeSet;
use std::path::PathBuf;

use dxflow_config::{CatalogSettings, PipelineSettings};
use dxflow_exec::{CatalogClient, CommandRunner, QueuedCommand};
use dxflow_types::{Sample, Workflow};
use tracing::{info, warn};

use crate::builder::missing_setting;
use crate::error::Result;
use crate::naming::{expected_outputs, sample_collection, sample_output_dir, sample_root_token};
use crate::params::RunParameters;
use crate::registrar::catalog_runner;

/// Reports which of a sample's eleven conventional outputs are absent on disk.
///
/// Read-only: nothing is created, moved or deleted.
#[derive(Debug, Clone)]
pub struct FileExistenceAsserter {
    output_home: PathBuf,
    workflow_name: String,
}

impl FileExistenceAsserter {
    pub fn new(output_home: impl Into<PathBuf>, workflow_name: impl Into<String>) -> Self {
        Self {
            output_home: output_home.into(),
            workflow_name: workflow_name.into(),
        }
    }

    pub fn from_settings(settings: &PipelineSettings) -> Result<Self> {
        let output_home = settings
            .output_home
            .clone()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| missing_setting("output_home"))?;
        Ok(Self::new(output_home, settings.workflow_name.clone()))
    }

    /// Paths of the eleven conventional outputs, in convention order.
    pub fn expected_files(&self, sample: &Sample, version: &str, panel_id: &str) -> Vec<PathBuf> {
        let dir = sample_output_dir(&self.output_home, sample, &self.workflow_name);
        let root = sample_root_token(sample);
        expected_outputs(&root, &RunParameters::new(version, panel_id))
            .into_iter()
            .map(|name| dir.join(name))
            .collect()
    }

    /// The expected files that do not exist.
    pub fn audit(&self, sample: &Sample, version: &str, panel_id: &str) -> BTreeSet<PathBuf> {
        let missing: BTreeSet<PathBuf> = self
            .expected_files(sample, version, panel_id)
            .into_iter()
            .filter(|path| !path.exists())
            .collect();

        for path in &missing {
            warn!(sample_id = sample.id, path = %path.display(), "Expected output file missing");
        }
        info!(sample_id = sample.id, missing = missing.len(), "Output audit finished");
        missing
    }
}

/// Lists a sample's conventional outputs in the catalog.
pub struct CatalogAuditor {
    catalog: CatalogSettings,
    runner: CommandRunner,
}

impl CatalogAuditor {
    pub fn new(catalog: CatalogSettings, runner: CommandRunner) -> Self {
        Self { catalog, runner }
    }

    /// Auditor that runs the catalog tools as child processes.
    pub fn from_settings(catalog: CatalogSettings) -> Result<Self> {
        let runner = catalog_runner(&catalog)?;
        Ok(Self::new(catalog, runner))
    }

    /// Catalog paths whose listing exited non-zero or could not be launched.
    pub async fn audit(
        &self,
        sample: &Sample,
        workflow: &Workflow,
        version: &str,
        panel_id: &str,
    ) -> BTreeSet<String> {
        let collection = sample_collection(&self.catalog, &workflow.system, sample, &workflow.name, version);
        let client = CatalogClient::new(&self.catalog.tools_home, std::env::temp_dir());
        let root = sample_root_token(sample);

        let commands: Vec<QueuedCommand> = expected_outputs(&root, &RunParameters::new(version, panel_id))
            .into_iter()
            .map(|name| {
                let object = format!("{collection}/{name}");
                let spec = client.list(&object);
                QueuedCommand::single(object, spec)
            })
            .collect();

        let missing: BTreeSet<String> = self
            .runner
            .run(&commands)
            .await
            .into_iter()
            .filter(|r| !r.succeeded())
            .map(|r| r.label)
            .collect();

        for object in &missing {
            warn!(sample_id = sample.id, object = %object, "Expected catalog object missing");
        }
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dxflow_exec::{
        CommandExecutor, CommandOutput, CommandSpec, EnvironmentProfile, ExecError, ExecResult,
    };
    use dxflow_types::Flowcell;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn sample() -> Sample {
        Sample {
            id: 52422,
            name: "NCG_00009".into(),
            flowcell: Flowcell {
                id: 1,
                name: "HGKTJBGXY".into(),
            },
            lane_index: 3,
            barcode: "GATCAG".into(),
            study_name: None,
            attributes: vec![],
        }
    }

    #[test]
    fn test_all_missing() {
        let dir = TempDir::new().unwrap();
        let asserter = FileExistenceAsserter::new(dir.path(), "NCNEXUS38DX");
        let missing = asserter.audit(&sample(), "7", "5");
        assert_eq!(missing.len(), 11);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_none_missing() {
        let dir = TempDir::new().unwrap();
        let asserter = FileExistenceAsserter::new(dir.path(), "NCNEXUS38DX");
        let files = asserter.expected_files(&sample(), "7", "5");
        std::fs::create_dir_all(files[0].parent().unwrap()).unwrap();
        for file in &files {
            std::fs::write(file, "").unwrap();
        }
        assert!(asserter.audit(&sample(), "7", "5").is_empty());

        std::fs::remove_file(&files[9]).unwrap();
        let missing = asserter.audit(&sample(), "7", "5");
        assert_eq!(missing.into_iter().collect::<Vec<_>>(), vec![files[9].clone()]);
    }

    #[test]
    fn test_expected_paths() {
        let asserter = FileExistenceAsserter::new("/analysis", "NCNEXUS38DX");
        let files = asserter.expected_files(&sample(), "7", "5");
        assert_eq!(
            files[10],
            PathBuf::from(
                "/analysis/HGKTJBGXY/L003_GATCAG/NCNEXUS38DX/HGKTJBGXY_GATCAG_L003.fixed-rg.deduped.realign.fixmate.recal.filtered_by_dxid_5_v7.vcf"
            )
        );
    }

    #[test]
    fn test_from_settings_requires_output_home() {
        let err = FileExistenceAsserter::from_settings(&PipelineSettings::default()).unwrap_err();
        assert!(err.is_validation());
    }

    /// Reports every `.zip` object as absent and fails to launch for `.vcf`.
    struct PartialCatalog;

    #[async_trait::async_trait]
    impl CommandExecutor for PartialCatalog {
        async fn execute(
            &self,
            spec: &CommandSpec,
            _profile: &EnvironmentProfile,
        ) -> ExecResult<CommandOutput> {
            let target = &spec.args[0];
            if target.ends_with(".vcf") {
                return Err(ExecError::Timeout(std::time::Duration::from_secs(1)));
            }
            let code = if target.ends_with(".zip") { 4 } else { 0 };
            Ok(CommandOutput::new("", "", code))
        }
    }

    #[tokio::test]
    async fn test_catalog_audit() {
        let auditor = CatalogAuditor::new(
            CatalogSettings::default(),
            CommandRunner::new(Arc::new(PartialCatalog), EnvironmentProfile::empty()),
        );
        let workflow = Workflow {
            id: 1,
            name: "NCNEXUS38DX".into(),
            system: "Prod".into(),
        };
        let missing = auditor.audit(&sample(), &workflow, "7", "5").await;
        assert_eq!(missing.len(), 2);
        let prefix = "/MedGenZone/Prod/sequencing/ncnexus38/analysis/HGKTJBGXY/L003_GATCAG/NCNEXUS38DX/7/";
        assert!(missing.iter().all(|m| m.starts_with(prefix)));
        assert!(missing.iter().any(|m| m.ends_with(".sorted.zip")));
    }
}
