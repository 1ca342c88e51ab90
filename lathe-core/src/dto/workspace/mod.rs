//! Workspace DTOs

use serde::{Deserialize, Serialize};

use crate::domain::workspace::WorkspaceIdentity;

/// Request to create a workspace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWorkspace {
    pub name: String,
    pub subscription_id: String,
    pub resource_group: String,
    pub location: String,
    /// Create the resource group too when it does not exist
    pub create_resource_group: bool,
}

impl CreateWorkspace {
    pub fn new(identity: &WorkspaceIdentity, location: impl Into<String>) -> Self {
        Self {
            name: identity.name.clone(),
            subscription_id: identity.subscription_id.clone(),
            resource_group: identity.resource_group.clone(),
            location: location.into(),
            create_resource_group: true,
        }
    }
}
