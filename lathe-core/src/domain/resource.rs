//! Registered resource types: datastores, datasets and compute targets

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A registered reference to a blob storage container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Datastore {
    pub name: String,
    pub account_name: String,
    pub container_name: String,
    pub is_default: bool,
}

/// Shape of the data a dataset points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatasetKind {
    /// Delimited files parsed into rows and columns
    Tabular,
    /// Raw files mounted or downloaded as-is
    File,
}

/// A versioned, named reference to data inside a datastore
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    pub name: String,
    /// Monotonic per name, starting at 1
    pub version: u32,
    pub kind: DatasetKind,
    pub datastore: String,
    /// Path or glob inside the datastore (e.g. `diabetes-data/*.csv`)
    pub path: String,
    pub description: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    pub registered_at: DateTime<Utc>,
}

impl Dataset {
    /// Reference this dataset as a named input of a run
    pub fn as_named_input(&self, alias: impl Into<String>) -> DatasetInput {
        DatasetInput {
            dataset: self.name.clone(),
            version: Some(self.version),
            alias: alias.into(),
        }
    }
}

/// A dataset consumed by a run under a local alias
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetInput {
    pub dataset: String,
    /// Pinned version, latest when absent
    pub version: Option<u32>,
    pub alias: String,
}

/// Provisioning state of a compute target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProvisioningState {
    Provisioning,
    Succeeded,
    Failed,
}

impl ProvisioningState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ProvisioningState::Provisioning)
    }
}

impl std::fmt::Display for ProvisioningState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProvisioningState::Provisioning => write!(f, "Provisioning"),
            ProvisioningState::Succeeded => write!(f, "Succeeded"),
            ProvisioningState::Failed => write!(f, "Failed"),
        }
    }
}

/// Scheduling priority of cluster nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VmPriority {
    #[default]
    Dedicated,
    LowPriority,
}

/// A named, autoscaling node pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeTarget {
    pub name: String,
    pub vm_size: String,
    pub min_nodes: u32,
    pub max_nodes: u32,
    pub vm_priority: VmPriority,
    pub state: ProvisioningState,
}
