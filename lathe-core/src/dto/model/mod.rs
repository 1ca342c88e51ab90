//! Model DTOs

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Request to register a run artifact as a model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterModel {
    pub run_id: Uuid,
    pub name: String,
    /// Artifact path inside the run outputs
    pub path: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}
