//! Run trigger envelopes.
//!
//! ```json
//! { "entities": [
//!     { "entityType": "Sample", "id": "52422" },
//!     { "entityType": "WorkflowRun", "name": "RUN_V7_P5" }
//! ] }
//! ```

use std::sync::Arc;

use dxflow_types::{Attribute, RunRepository, WorkflowRunAttempt};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::builder::WorkflowGraphBuilder;
use crate::error::{Result, ValidationError};
use crate::graph::JobGraph;
use crate::params::{INCIDENTAL_ATTRIBUTE, PANEL_ATTRIBUTE, VERSION_ATTRIBUTE};

const VERSION_ALIASES: [&str; 3] = [
    "GATKDepthOfCoverage.interval_list.version",
    "version",
    VERSION_ATTRIBUTE,
];
const PANEL_ALIASES: [&str; 3] = ["SAMToolsView.dx.id", "panel", PANEL_ATTRIBUTE];

/// One entity of a trigger envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "entityType")]
pub enum Entity {
    Sample {
        id: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        attributes: Vec<Attribute>,
    },
    WorkflowRun {
        name: String,
    },
}

/// Inbound request to run the workflow for some samples.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerEnvelope {
    pub entities: Vec<Entity>,
}

impl TriggerEnvelope {
    /// Envelope for one sample, with optional run attribute overrides.
    pub fn for_run(run_name: &str, sample_id: i64, overrides: Vec<Attribute>) -> Self {
        Self {
            entities: vec![
                Entity::Sample {
                    id: sample_id.to_string(),
                    attributes: overrides,
                },
                Entity::WorkflowRun {
                    name: run_name.to_string(),
                },
            ],
        }
    }

    pub fn from_json(json: &str) -> std::result::Result<Self, ValidationError> {
        serde_json::from_str(json).map_err(|e| ValidationError::InvalidEnvelope(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Check the envelope shape and extract the request.
    pub fn parse(&self) -> std::result::Result<RunRequest, ValidationError> {
        let mut sample_ids = Vec::new();
        let mut attributes: Vec<Attribute> = Vec::new();
        let mut run_names = Vec::new();

        for entity in &self.entities {
            match entity {
                Entity::Sample {
                    id,
                    attributes: overrides,
                } => {
                    let id = id.trim().parse::<i64>().map_err(|_| {
                        ValidationError::InvalidEnvelope(format!("sample id '{id}' is not numeric"))
                    })?;
                    if !sample_ids.contains(&id) {
                        sample_ids.push(id);
                    }
                    for attr in overrides {
                        let name = normalize_attribute(&attr.name);
                        attributes.retain(|a| a.name != name);
                        attributes.push(Attribute::new(name, attr.value.trim()));
                    }
                }
                Entity::WorkflowRun { name } => run_names.push(name.trim().to_string()),
            }
        }

        if sample_ids.is_empty() {
            return Err(ValidationError::InvalidEnvelope(
                "no Sample entity".to_string(),
            ));
        }
        let run_name = match run_names.as_slice() {
            [name] if !name.is_empty() => name.clone(),
            [_] => {
                return Err(ValidationError::InvalidEnvelope(
                    "empty WorkflowRun name".to_string(),
                ));
            }
            _ => {
                return Err(ValidationError::InvalidEnvelope(format!(
                    "expected exactly one WorkflowRun entity, found {}",
                    run_names.len()
                )));
            }
        };

        Ok(RunRequest {
            run_name,
            sample_ids,
            attributes,
        })
    }
}

/// Map an override name to the stored run attribute name.
pub fn normalize_attribute(name: &str) -> String {
    if VERSION_ALIASES.contains(&name) {
        VERSION_ATTRIBUTE.to_string()
    } else if PANEL_ALIASES.contains(&name) {
        PANEL_ATTRIBUTE.to_string()
    } else if name.eq_ignore_ascii_case(INCIDENTAL_ATTRIBUTE) {
        INCIDENTAL_ATTRIBUTE.to_string()
    } else {
        name.to_string()
    }
}

/// A validated trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub run_name: String,
    pub sample_ids: Vec<i64>,
    pub attributes: Vec<Attribute>,
}

/// Attempt opened for a trigger and the graph built for it.
#[derive(Debug, Clone)]
pub struct TriggeredRun {
    pub attempt: WorkflowRunAttempt,
    pub graph: JobGraph,
}

/// Turns trigger envelopes into attempts and job graphs.
pub struct RunTrigger {
    workflow_name: String,
    repository: Arc<dyn RunRepository>,
    builder: WorkflowGraphBuilder,
}

impl RunTrigger {
    pub fn new(
        workflow_name: impl Into<String>,
        repository: Arc<dyn RunRepository>,
        builder: WorkflowGraphBuilder,
    ) -> Self {
        Self {
            workflow_name: workflow_name.into(),
            repository,
            builder,
        }
    }

    pub fn handle(&self, envelope: &TriggerEnvelope) -> Result<TriggeredRun> {
        let request = envelope.parse()?;
        for id in &request.sample_ids {
            if self.repository.find_sample(*id)?.is_none() {
                return Err(ValidationError::SampleNotFound(*id).into());
            }
        }

        let attempt = self.repository.create_attempt(
            &self.workflow_name,
            &request.run_name,
            &request.sample_ids,
            request.attributes,
        )?;
        info!(
            attempt_id = attempt.id,
            run = %request.run_name,
            samples = request.sample_ids.len(),
            "Attempt created from trigger"
        );

        let graph = self.builder.build_graph(&attempt)?;
        Ok(TriggeredRun { attempt, graph })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_run_json_shape() {
        let envelope = TriggerEnvelope::for_run("NCG_00009_V7_Dx5", 52422, vec![]);
        let json: serde_json::Value = serde_json::from_str(&envelope.to_json().unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "entities": [
                    { "entityType": "Sample", "id": "52422" },
                    { "entityType": "WorkflowRun", "name": "NCG_00009_V7_Dx5" }
                ]
            })
        );
    }

    #[test]
    fn test_parse_with_aliases() {
        let envelope = TriggerEnvelope::from_json(
            r#"{"entities":[
                {"entityType":"Sample","id":"52422","attributes":[
                    {"name":"GATKDepthOfCoverage.interval_list.version","value":"7"},
                    {"name":"SAMToolsView.dx.id","value":"5"}
                ]},
                {"entityType":"WorkflowRun","name":"NCG_00009_V7_Dx5"}
            ]}"#,
        )
        .unwrap();
        let request = envelope.parse().unwrap();
        assert_eq!(request.run_name, "NCG_00009_V7_Dx5");
        assert_eq!(request.sample_ids, vec![52422]);
        assert_eq!(
            request.attributes,
            vec![Attribute::new("list_version", "7"), Attribute::new("dx_id", "5")]
        );
    }

    #[test]
    fn test_later_override_wins() {
        let envelope = TriggerEnvelope::for_run(
            "run",
            1,
            vec![Attribute::new("version", "6"), Attribute::new("list_version", "7")],
        );
        let request = envelope.parse().unwrap();
        assert_eq!(request.attributes, vec![Attribute::new("list_version", "7")]);
    }

    #[test]
    fn test_invalid_envelopes() {
        let no_sample = TriggerEnvelope {
            entities: vec![Entity::WorkflowRun { name: "r".into() }],
        };
        assert!(matches!(
            no_sample.parse(),
            Err(ValidationError::InvalidEnvelope(_))
        ));

        let two_runs = TriggerEnvelope {
            entities: vec![
                Entity::Sample {
                    id: "1".into(),
                    attributes: vec![],
                },
                Entity::WorkflowRun { name: "a".into() },
                Entity::WorkflowRun { name: "b".into() },
            ],
        };
        assert!(two_runs.parse().is_err());

        let mut bad_id = TriggerEnvelope::for_run("r", 1, vec![]);
        bad_id.entities[0] = Entity::Sample {
            id: "abc".into(),
            attributes: vec![],
        };
        assert!(bad_id.parse().is_err());

        assert!(TriggerEnvelope::from_json(r#"{"entities":[{"entityType":"Flowcell"}]}"#).is_err());
    }

    #[test]
    fn test_normalize_attribute() {
        assert_eq!(normalize_attribute("panel"), "dx_id");
        assert_eq!(normalize_attribute("version"), "list_version");
        assert_eq!(normalize_attribute("Incidental"), "incidental");
        assert_eq!(normalize_attribute("custom"), "custom");
    }
}
