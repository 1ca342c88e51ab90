//! Session resolution
//!
//! Turns a [`WorkspaceIdentity`] into a live [`Workspace`] handle, creating
//! the workspace first when the caller allows it.

use lathe_core::domain::workspace::{Workspace, WorkspaceIdentity};
use lathe_core::dto::workspace::CreateWorkspace;
use tracing::{info, warn};

use crate::error::{ClientError, Result};
use crate::platform::Platform;

/// What to do when the workspace does not exist yet
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum WorkspaceCreation {
    /// Fail with `NotFound`
    #[default]
    Never,
    /// Create it in `location`
    IfMissing {
        location: String,
        create_resource_group: bool,
    },
}

/// Resolves workspace identities against a platform
pub struct SessionResolver<'a> {
    platform: &'a dyn Platform,
}

impl<'a> SessionResolver<'a> {
    pub fn new(platform: &'a dyn Platform) -> Self {
        Self { platform }
    }

    /// Look up the workspace, creating it if `creation` allows
    ///
    /// # Errors
    /// - `Authentication` when the platform rejects the credential
    /// - `NotFound` when the workspace is absent and `creation` is `Never`
    pub async fn resolve(
        &self,
        identity: &WorkspaceIdentity,
        creation: WorkspaceCreation,
    ) -> Result<Workspace> {
        require_identity(identity)?;

        match self.platform.get_workspace(identity).await {
            Ok(workspace) => {
                info!(
                    "Resolved workspace '{}' in resource group '{}'",
                    workspace.name, workspace.resource_group
                );
                Ok(workspace)
            }
            Err(e) if e.is_not_found() => match creation {
                WorkspaceCreation::Never => Err(e),
                WorkspaceCreation::IfMissing {
                    location,
                    create_resource_group,
                } => {
                    let location = identity.location.clone().unwrap_or(location);
                    info!("Creating workspace '{}' in {}", identity.name, location);

                    let mut req = CreateWorkspace::new(identity, location);
                    req.create_resource_group = create_resource_group;
                    self.create_or_get(identity, req).await
                }
            },
            Err(e) => Err(e),
        }
    }

    /// Create the workspace, or fetch it if another client created it first
    async fn create_or_get(
        &self,
        identity: &WorkspaceIdentity,
        req: CreateWorkspace,
    ) -> Result<Workspace> {
        match self.platform.create_workspace(req).await {
            Err(e) if e.is_already_exists() => {
                warn!(
                    "Workspace '{}' was created concurrently, using it",
                    identity.name
                );
                self.platform.get_workspace(identity).await
            }
            result => result,
        }
    }

    /// Resolve an identity that must already exist
    pub async fn existing(&self, identity: &WorkspaceIdentity) -> Result<Workspace> {
        self.resolve(identity, WorkspaceCreation::Never).await
    }
}

impl std::fmt::Debug for SessionResolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionResolver").finish_non_exhaustive()
    }
}

fn require_identity(identity: &WorkspaceIdentity) -> Result<()> {
    if identity.name.trim().is_empty()
        || identity.subscription_id.trim().is_empty()
        || identity.resource_group.trim().is_empty()
    {
        return Err(ClientError::Config(
            "workspace identity needs a name, subscription and resource group".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryPlatform;

    fn identity() -> WorkspaceIdentity {
        WorkspaceIdentity::new("aml-workspace", "sub-1", "aml-resources")
    }

    #[tokio::test]
    async fn test_resolves_existing_workspace() {
        let platform = InMemoryPlatform::new();
        let created = platform.add_workspace(&identity());

        let resolved = SessionResolver::new(&platform)
            .existing(&identity())
            .await
            .unwrap();

        assert_eq!(resolved, created);
    }

    #[tokio::test]
    async fn test_missing_workspace_is_not_found() {
        let platform = InMemoryPlatform::new();

        let err = SessionResolver::new(&platform)
            .resolve(&identity(), WorkspaceCreation::Never)
            .await
            .unwrap_err();

        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_creates_missing_workspace() {
        let platform = InMemoryPlatform::new();
        let creation = WorkspaceCreation::IfMissing {
            location: "eastus".to_string(),
            create_resource_group: true,
        };

        let workspace = SessionResolver::new(&platform)
            .resolve(&identity(), creation.clone())
            .await
            .unwrap();
        assert_eq!(workspace.location.as_deref(), Some("eastus"));

        // Second resolution finds the workspace instead of creating it again
        let again = SessionResolver::new(&platform)
            .resolve(&identity(), creation)
            .await
            .unwrap();
        assert_eq!(again, workspace);
    }

    #[tokio::test]
    async fn test_workspace_created_concurrently_is_reused() {
        let platform = InMemoryPlatform::new();
        let resolver = SessionResolver::new(&platform);
        let req = CreateWorkspace::new(&identity(), "eastus");

        // Another client wins the race between the lookup and the create
        let winner = platform.create_workspace(req.clone()).await.unwrap();
        let workspace = resolver.create_or_get(&identity(), req).await.unwrap();

        assert_eq!(workspace, winner);
    }

    #[tokio::test]
    async fn test_incomplete_identity_rejected_locally() {
        let platform = InMemoryPlatform::new();

        let err = SessionResolver::new(&platform)
            .existing(&WorkspaceIdentity::new("aml-workspace", "", "aml-resources"))
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Config(_)));
    }

    #[tokio::test]
    async fn test_expired_credential_is_authentication_error() {
        let platform = InMemoryPlatform::new();
        platform.add_workspace(&identity());
        platform.revoke_credential();

        let err = SessionResolver::new(&platform)
            .existing(&identity())
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Authentication(_)));
    }
}
