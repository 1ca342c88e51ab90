//! Published pipeline DTOs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::pipeline::Recurrence;
use crate::error::{Result, ValidationError};

/// Request to publish the pipeline behind a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishPipeline {
    pub name: String,
    pub description: Option<String>,
    pub version: String,
}

/// Request to schedule a published pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSchedule {
    pub name: String,
    pub description: Option<String>,
    pub pipeline_id: Uuid,
    pub experiment: String,
    pub recurrence: Recurrence,
}

impl CreateSchedule {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyField("schedule name"));
        }
        if self.experiment.trim().is_empty() {
            return Err(ValidationError::EmptyField("experiment"));
        }
        self.recurrence.validate()
    }
}

/// Body posted to a published pipeline's REST endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerPipeline {
    #[serde(rename = "ExperimentName")]
    pub experiment_name: String,
}

/// Response of a published pipeline's REST endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerResponse {
    #[serde(rename = "Id")]
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_wire_format() {
        let body = TriggerPipeline {
            experiment_name: "mslearn-diabetes-pipeline".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({ "ExperimentName": "mslearn-diabetes-pipeline" })
        );

        let response: TriggerResponse =
            serde_json::from_str(r#"{"Id": "run-42", "Status": "NotStarted"}"#).unwrap();
        assert_eq!(response.id, "run-42");
    }
}
