//! The narrow interface to the remote platform
//!
//! Everything the workflow components need from the platform is one method
//! on [`Platform`]. Each call is a single attempt; nothing here retries.

use async_trait::async_trait;
use lathe_core::domain::environment::Environment;
use lathe_core::domain::model::Model;
use lathe_core::domain::pipeline::{PublishedPipeline, Schedule};
use lathe_core::domain::resource::{ComputeTarget, Dataset, Datastore};
use lathe_core::domain::run::{Metrics, Run};
use lathe_core::domain::service::Service;
use lathe_core::domain::workspace::{Workspace, WorkspaceIdentity};
use lathe_core::dto::model::RegisterModel;
use lathe_core::dto::pipeline::{CreateSchedule, PublishPipeline};
use lathe_core::dto::resource::{CreateCompute, RegisterDataset, RegisterDatastore};
use lathe_core::dto::run::{SubmitPipeline, SubmitRun, SubmitSweep};
use lathe_core::dto::service::DeployService;
use lathe_core::dto::workspace::CreateWorkspace;
use uuid::Uuid;

use crate::error::Result;

/// Remote platform operations
///
/// All operations except workspace lookup and creation are scoped to an
/// explicit workspace.
#[async_trait]
pub trait Platform: Send + Sync {
    // =============================================================================
    // Workspaces
    // =============================================================================

    /// Look up an existing workspace
    async fn get_workspace(&self, identity: &WorkspaceIdentity) -> Result<Workspace>;

    /// Create a workspace
    async fn create_workspace(&self, req: CreateWorkspace) -> Result<Workspace>;

    // =============================================================================
    // Datastores
    // =============================================================================

    async fn list_datastores(&self, workspace: &Workspace) -> Result<Vec<Datastore>>;

    async fn get_datastore(&self, workspace: &Workspace, name: &str) -> Result<Datastore>;

    async fn get_default_datastore(&self, workspace: &Workspace) -> Result<Datastore>;

    /// Make `name` the default datastore of the workspace
    async fn set_default_datastore(&self, workspace: &Workspace, name: &str)
    -> Result<Datastore>;

    async fn register_datastore(
        &self,
        workspace: &Workspace,
        req: RegisterDatastore,
    ) -> Result<Datastore>;

    /// Store `contents` at `target_path` inside a datastore
    async fn upload_file(
        &self,
        workspace: &Workspace,
        datastore: &str,
        target_path: &str,
        contents: Vec<u8>,
        overwrite: bool,
    ) -> Result<()>;

    // =============================================================================
    // Datasets
    // =============================================================================

    /// Latest version of every registered dataset
    async fn list_datasets(&self, workspace: &Workspace) -> Result<Vec<Dataset>>;

    /// A specific version of a dataset, or the latest when `version` is `None`
    async fn get_dataset(
        &self,
        workspace: &Workspace,
        name: &str,
        version: Option<u32>,
    ) -> Result<Dataset>;

    async fn register_dataset(
        &self,
        workspace: &Workspace,
        req: RegisterDataset,
    ) -> Result<Dataset>;

    // =============================================================================
    // Compute Targets
    // =============================================================================

    async fn list_computes(&self, workspace: &Workspace) -> Result<Vec<ComputeTarget>>;

    async fn get_compute(&self, workspace: &Workspace, name: &str) -> Result<ComputeTarget>;

    /// Start provisioning a compute target; returns while still `Provisioning`
    async fn create_compute(
        &self,
        workspace: &Workspace,
        req: CreateCompute,
    ) -> Result<ComputeTarget>;

    // =============================================================================
    // Environments
    // =============================================================================

    async fn get_environment(
        &self,
        workspace: &Workspace,
        name: &str,
        version: Option<u32>,
    ) -> Result<Environment>;

    /// Register a definition; an identical definition keeps its version
    async fn register_environment(
        &self,
        workspace: &Workspace,
        environment: Environment,
    ) -> Result<Environment>;

    // =============================================================================
    // Runs
    // =============================================================================

    async fn submit_run(
        &self,
        workspace: &Workspace,
        experiment: &str,
        req: SubmitRun,
    ) -> Result<Run>;

    async fn submit_sweep(
        &self,
        workspace: &Workspace,
        experiment: &str,
        req: SubmitSweep,
    ) -> Result<Run>;

    async fn submit_pipeline(
        &self,
        workspace: &Workspace,
        experiment: &str,
        req: SubmitPipeline,
    ) -> Result<Run>;

    async fn get_run(&self, workspace: &Workspace, run_id: Uuid) -> Result<Run>;

    /// Top-level runs of an experiment, newest first
    async fn list_runs(&self, workspace: &Workspace, experiment: &str) -> Result<Vec<Run>>;

    /// Child runs in submission order
    async fn list_children(&self, workspace: &Workspace, run_id: Uuid) -> Result<Vec<Run>>;

    /// Latest metric snapshot
    async fn get_metrics(&self, workspace: &Workspace, run_id: Uuid) -> Result<Metrics>;

    /// Ask the platform to cancel a run
    async fn cancel_run(&self, workspace: &Workspace, run_id: Uuid) -> Result<Run>;

    // =============================================================================
    // Models
    // =============================================================================

    async fn register_model(&self, workspace: &Workspace, req: RegisterModel) -> Result<Model>;

    async fn list_models(&self, workspace: &Workspace) -> Result<Vec<Model>>;

    async fn get_model(
        &self,
        workspace: &Workspace,
        name: &str,
        version: Option<u32>,
    ) -> Result<Model>;

    // =============================================================================
    // Published Pipelines
    // =============================================================================

    async fn publish_pipeline(
        &self,
        workspace: &Workspace,
        run_id: Uuid,
        req: PublishPipeline,
    ) -> Result<PublishedPipeline>;

    async fn create_schedule(&self, workspace: &Workspace, req: CreateSchedule)
    -> Result<Schedule>;

    // =============================================================================
    // Services
    // =============================================================================

    /// Start deploying a service; returns while still `Transitioning`
    async fn deploy_service(&self, workspace: &Workspace, req: DeployService) -> Result<Service>;

    async fn get_service(&self, workspace: &Workspace, name: &str) -> Result<Service>;

    async fn delete_service(&self, workspace: &Workspace, name: &str) -> Result<()>;
}
