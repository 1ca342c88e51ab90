//! Workspace domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifies a workspace before it has been resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceIdentity {
    pub name: String,
    pub subscription_id: String,
    pub resource_group: String,
    #[serde(default)]
    pub location: Option<String>,
}

impl WorkspaceIdentity {
    pub fn new(
        name: impl Into<String>,
        subscription_id: impl Into<String>,
        resource_group: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
            location: None,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Path segments locating the workspace below the platform base URL
    pub fn scope_segments(&self) -> [&str; 6] {
        [
            "subscriptions",
            &self.subscription_id,
            "resourceGroups",
            &self.resource_group,
            "workspaces",
            &self.name,
        ]
    }
}

/// A resolved workspace
///
/// Every registry, tracking and consumer call takes one of these explicitly.
/// It is never mutated after resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub name: String,
    pub subscription_id: String,
    pub resource_group: String,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Workspace {
    /// The identity this workspace was resolved from
    pub fn identity(&self) -> WorkspaceIdentity {
        WorkspaceIdentity {
            name: self.name.clone(),
            subscription_id: self.subscription_id.clone(),
            resource_group: self.resource_group.clone(),
            location: self.location.clone(),
        }
    }

    /// Path segments locating this workspace below the platform base URL
    pub fn scope_segments(&self) -> [&str; 6] {
        [
            "subscriptions",
            &self.subscription_id,
            "resourceGroups",
            &self.resource_group,
            "workspaces",
            &self.name,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_round_trips_through_workspace() {
        let workspace = Workspace {
            name: "aml-workspace".to_string(),
            subscription_id: "sub".to_string(),
            resource_group: "aml-resources".to_string(),
            location: Some("eastus".to_string()),
            created_at: Utc::now(),
        };

        let identity = workspace.identity();
        assert_eq!(identity.scope_segments(), workspace.scope_segments());
        assert_eq!(identity.location.as_deref(), Some("eastus"));
    }
}
