//! Resource registry lookup
//!
//! Finds and registers the named, workspace-scoped resources runs depend on:
//! datastores, datasets, compute targets and environments. Registrations are
//! idempotent under [`DuplicatePolicy::Tolerate`].

use lathe_core::ValidationError;
use lathe_core::domain::environment::Environment;
use lathe_core::domain::resource::{ComputeTarget, Dataset, Datastore, ProvisioningState};
use lathe_core::domain::workspace::Workspace;
use lathe_core::dto::resource::{CreateCompute, ProvisioningConfig, RegisterDataset, RegisterDatastore};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::{ClientError, Result};
use crate::platform::Platform;
use crate::wait::{WaitOptions, poll_until};

/// How to treat a registration whose name is already taken
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Log a warning and return the resource already registered
    #[default]
    Tolerate,
    /// Return the `AlreadyExists` error
    Fail,
}

/// Registry of one workspace's named resources
pub struct ResourceRegistry<'a> {
    platform: &'a dyn Platform,
    workspace: &'a Workspace,
    policy: DuplicatePolicy,
}

impl<'a> ResourceRegistry<'a> {
    pub fn new(platform: &'a dyn Platform, workspace: &'a Workspace) -> Self {
        Self {
            platform,
            workspace,
            policy: DuplicatePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    fn tolerates(&self, err: &ClientError) -> bool {
        self.policy == DuplicatePolicy::Tolerate && err.is_already_exists()
    }

    // =============================================================================
    // Datastores
    // =============================================================================

    pub async fn datastore(&self, name: &str) -> Result<Datastore> {
        self.platform.get_datastore(self.workspace, name).await
    }

    pub async fn default_datastore(&self) -> Result<Datastore> {
        self.platform.get_default_datastore(self.workspace).await
    }

    pub async fn set_default_datastore(&self, name: &str) -> Result<Datastore> {
        let datastore = self.platform.set_default_datastore(self.workspace, name).await?;
        info!("Default datastore is now '{}'", datastore.name);
        Ok(datastore)
    }

    pub async fn list_datastores(&self) -> Result<Vec<Datastore>> {
        self.platform.list_datastores(self.workspace).await
    }

    pub async fn register_datastore(&self, req: RegisterDatastore) -> Result<Datastore> {
        req.validate()?;
        let name = req.name.clone();
        match self.platform.register_datastore(self.workspace, req).await {
            Ok(datastore) => {
                info!("Registered datastore '{}'", datastore.name);
                Ok(datastore)
            }
            Err(e) if self.tolerates(&e) => {
                warn!("Datastore '{}' is already registered, using it", name);
                self.datastore(&name).await
            }
            Err(e) => Err(e),
        }
    }

    /// Upload local files into `target_path` of a datastore
    ///
    /// Each file keeps its file name. Returns the datastore paths written.
    pub async fn upload(
        &self,
        datastore: &str,
        target_path: &str,
        files: &[impl AsRef<Path>],
        overwrite: bool,
    ) -> Result<Vec<String>> {
        let prefix = target_path.trim_matches('/');
        let mut uploaded = Vec::with_capacity(files.len());

        for file in files {
            let file = file.as_ref();
            let file_name = file
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| {
                    ClientError::Config(format!("{} has no usable file name", file.display()))
                })?;
            let path = if prefix.is_empty() {
                file_name.to_string()
            } else {
                format!("{prefix}/{file_name}")
            };

            let contents = tokio::fs::read(file).await?;
            debug!("Uploading {} to {}:{}", file.display(), datastore, path);
            self.platform
                .upload_file(self.workspace, datastore, &path, contents, overwrite)
                .await?;
            uploaded.push(path);
        }

        info!("Uploaded {} file(s) to datastore '{}'", uploaded.len(), datastore);
        Ok(uploaded)
    }

    // =============================================================================
    // Datasets
    // =============================================================================

    /// A dataset by name; the latest version when `version` is `None`
    pub async fn dataset(&self, name: &str, version: Option<u32>) -> Result<Dataset> {
        self.platform.get_dataset(self.workspace, name, version).await
    }

    pub async fn list_datasets(&self) -> Result<Vec<Dataset>> {
        self.platform.list_datasets(self.workspace).await
    }

    /// Register a dataset
    ///
    /// With `create_new_version` an existing name gets its next version.
    /// Without it an existing name is a duplicate, handled per policy.
    pub async fn register_dataset(&self, req: RegisterDataset) -> Result<Dataset> {
        let name = req.name.clone();
        match self.platform.register_dataset(self.workspace, req).await {
            Ok(dataset) => {
                info!("Registered dataset '{}' version {}", dataset.name, dataset.version);
                Ok(dataset)
            }
            Err(e) if self.tolerates(&e) => {
                warn!("Dataset '{}' is already registered, using the latest version", name);
                self.dataset(&name, None).await
            }
            Err(e) => Err(e),
        }
    }

    // =============================================================================
    // Compute Targets
    // =============================================================================

    pub async fn compute(&self, name: &str) -> Result<ComputeTarget> {
        self.platform.get_compute(self.workspace, name).await
    }

    pub async fn list_computes(&self) -> Result<Vec<ComputeTarget>> {
        self.platform.list_computes(self.workspace).await
    }

    /// Return the named compute target, creating it when absent
    ///
    /// A newly created target is returned while still `Provisioning`; use
    /// [`ResourceRegistry::wait_for_compute`] to block until it settles.
    /// Without a `config` an absent target is `NotFound`.
    pub async fn ensure_compute(
        &self,
        name: &str,
        config: Option<ProvisioningConfig>,
    ) -> Result<ComputeTarget> {
        match self.compute(name).await {
            Ok(compute) => {
                info!("Found existing compute target '{}', using it", name);
                Ok(compute)
            }
            Err(e) if e.is_not_found() => {
                let Some(config) = config else {
                    return Err(e);
                };
                config.validate()?;

                let req = CreateCompute {
                    name: name.to_string(),
                    config,
                };
                match self.platform.create_compute(self.workspace, req).await {
                    Ok(compute) => {
                        info!("Provisioning compute target '{}' ({})", name, compute.vm_size);
                        Ok(compute)
                    }
                    Err(e) if self.tolerates(&e) => {
                        warn!("Compute target '{}' appeared concurrently, using it", name);
                        self.compute(name).await
                    }
                    Err(e) => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Block until the compute target leaves `Provisioning`
    ///
    /// A target that fails to provision is returned with state `Failed`.
    pub async fn wait_for_compute(
        &self,
        name: &str,
        options: &WaitOptions,
    ) -> Result<ComputeTarget> {
        let compute = poll_until(options, move || async move {
            let compute = self.compute(name).await?;
            debug!("Compute target '{}' is {}", name, compute.state);
            Ok(compute.state.is_terminal().then_some(compute))
        })
        .await?;

        match compute.state {
            ProvisioningState::Failed => warn!("Compute target '{}' failed to provision", name),
            _ => info!("Compute target '{}' is ready", name),
        }
        Ok(compute)
    }

    // =============================================================================
    // Environments
    // =============================================================================

    /// An environment by name; the latest version when `version` is `None`
    pub async fn environment(&self, name: &str, version: Option<u32>) -> Result<Environment> {
        self.platform
            .get_environment(self.workspace, name, version)
            .await
    }

    /// Register an environment definition
    ///
    /// A changed definition becomes the next version. Re-registering the
    /// latest definition unchanged is a duplicate, handled per policy.
    pub async fn register_environment(&self, environment: Environment) -> Result<Environment> {
        if environment.name.trim().is_empty() {
            return Err(ValidationError::EmptyField("environment name").into());
        }

        let name = environment.name.clone();
        match self
            .platform
            .register_environment(self.workspace, environment)
            .await
        {
            Ok(environment) => {
                info!(
                    "Environment '{}' is at version {}",
                    environment.name, environment.version
                );
                Ok(environment)
            }
            Err(e) if self.tolerates(&e) => {
                warn!("Environment '{}' is already registered, using the latest version", name);
                self.environment(&name, None).await
            }
            Err(e) => Err(e),
        }
    }
}
