//! Registry DTOs: datastores, datasets, compute targets

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::resource::{DatasetKind, VmPriority};

/// Request to register a blob container as a datastore
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterDatastore {
    pub name: String,
    pub account_name: String,
    pub container_name: String,
    /// Replace an existing registration with the same name
    #[serde(default)]
    pub overwrite: bool,
}

impl RegisterDatastore {
    /// Name under which the platform serves the workspace default datastore
    pub const RESERVED_NAME: &'static str = "default";

    pub fn validate(&self) -> crate::error::Result<()> {
        if self.name.trim().is_empty() {
            return Err(crate::ValidationError::EmptyField("datastore name"));
        }
        if self.name.eq_ignore_ascii_case(Self::RESERVED_NAME) {
            return Err(crate::ValidationError::InvalidData(format!(
                "datastore name '{}' is reserved",
                self.name
            )));
        }
        Ok(())
    }
}

/// Request to register a dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterDataset {
    pub name: String,
    pub kind: DatasetKind,
    pub datastore: String,
    pub path: String,
    pub description: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    /// Register as `latest + 1` when the name already exists
    #[serde(default)]
    pub create_new_version: bool,
}

impl RegisterDataset {
    /// Tabular dataset over delimited files at `path` in `datastore`
    pub fn tabular(
        name: impl Into<String>,
        datastore: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self::new(name, DatasetKind::Tabular, datastore, path)
    }

    /// File dataset over the files at `path` in `datastore`
    pub fn files(
        name: impl Into<String>,
        datastore: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self::new(name, DatasetKind::File, datastore, path)
    }

    fn new(
        name: impl Into<String>,
        kind: DatasetKind,
        datastore: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            datastore: datastore.into(),
            path: path.into(),
            description: None,
            tags: BTreeMap::new(),
            create_new_version: false,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn create_new_version(mut self, enabled: bool) -> Self {
        self.create_new_version = enabled;
        self
    }
}

/// Node pool settings for a new compute target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningConfig {
    pub vm_size: String,
    pub min_nodes: u32,
    pub max_nodes: u32,
    #[serde(default)]
    pub vm_priority: VmPriority,
}

impl ProvisioningConfig {
    /// Autoscaling from zero up to `max_nodes`
    pub fn new(vm_size: impl Into<String>, max_nodes: u32) -> Self {
        Self {
            vm_size: vm_size.into(),
            min_nodes: 0,
            max_nodes,
            vm_priority: VmPriority::Dedicated,
        }
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        if self.vm_size.trim().is_empty() {
            return Err(crate::ValidationError::EmptyField("vm size"));
        }
        if self.max_nodes == 0 || self.min_nodes > self.max_nodes {
            return Err(crate::ValidationError::InvalidData(format!(
                "node range {}..={} is invalid",
                self.min_nodes, self.max_nodes
            )));
        }
        Ok(())
    }
}

/// Request to create a compute target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCompute {
    pub name: String,
    pub config: ProvisioningConfig,
}

/// Query of a datastore file upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadQuery {
    pub overwrite: bool,
}
