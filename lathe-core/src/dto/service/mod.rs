//! Web service DTOs

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::domain::service::ModelReference;

/// How the scoring container runs the entry script
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    pub source_directory: PathBuf,
    pub entry_script: String,
    pub environment: String,
}

/// Resources reserved for the scoring container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentConfig {
    pub cpu_cores: f64,
    pub memory_gb: f64,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            cpu_cores: 1.0,
            memory_gb: 1.0,
        }
    }
}

/// Request to deploy models behind a web service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployService {
    pub name: String,
    pub models: Vec<ModelReference>,
    pub inference: InferenceConfig,
    pub deployment: DeploymentConfig,
    /// Replace a service with the same name
    #[serde(default)]
    pub overwrite: bool,
}

/// Body posted to a scoring endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringRequest {
    pub data: Vec<Vec<f64>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoring_wire_format() {
        let request = ScoringRequest {
            data: vec![vec![0.1, 2.3], vec![0.2, 1.8]],
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({ "data": [[0.1, 2.3], [0.2, 1.8]] })
        );
    }
}
