//! In-memory platform
//!
//! A deterministic, process-local [`Platform`] used by tests and dry runs.
//! It keeps the same bookkeeping rules as the remote platform (dataset and
//! model versioning, duplicate detection, run lifecycles) but never executes
//! anything. Whatever the remote executor would do is driven explicitly
//! through the executor hooks: [`InMemoryPlatform::start_run`],
//! [`InMemoryPlatform::log_metric`], [`InMemoryPlatform::add_output`],
//! [`InMemoryPlatform::finish_run`], [`InMemoryPlatform::finish_compute`] and
//! [`InMemoryPlatform::finish_deployment`].

use async_trait::async_trait;
use chrono::Utc;
use lathe_core::domain::ResourceKind;
use lathe_core::domain::environment::Environment;
use lathe_core::domain::model::Model;
use lathe_core::domain::pipeline::{PublishedPipeline, Schedule};
use lathe_core::domain::resource::{ComputeTarget, Dataset, Datastore, ProvisioningState};
use lathe_core::domain::run::{Metrics, Run, RunKind, RunStatus};
use lathe_core::domain::service::{Service, ServiceState};
use lathe_core::domain::workspace::{Workspace, WorkspaceIdentity};
use lathe_core::dto::model::RegisterModel;
use lathe_core::dto::pipeline::{CreateSchedule, PublishPipeline};
use lathe_core::dto::resource::{CreateCompute, RegisterDataset, RegisterDatastore};
use lathe_core::dto::run::{SubmitPipeline, SubmitRun, SubmitSweep};
use lathe_core::dto::service::DeployService;
use lathe_core::dto::workspace::CreateWorkspace;
use lathe_core::run_spec::{ArgValue, RunSpec};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;
use uuid::Uuid;

use crate::error::{ClientError, Result};
use crate::platform::Platform;

/// Datastores every new workspace starts with; the first is the default
const BUILTIN_DATASTORES: [&str; 2] = ["workspaceblobstore", "workspacefilestore"];

#[derive(Default)]
struct State {
    credential_revoked: bool,
    resource_groups: HashSet<(String, String)>,
    workspaces: HashMap<String, WorkspaceState>,
}

struct WorkspaceState {
    workspace: Workspace,
    datastores: BTreeMap<String, Datastore>,
    files: BTreeMap<(String, String), Vec<u8>>,
    datasets: BTreeMap<String, Vec<Dataset>>,
    computes: BTreeMap<String, ComputeTarget>,
    environments: BTreeMap<String, Vec<Environment>>,
    /// Every run in submission order
    runs: Vec<Run>,
    models: BTreeMap<String, Vec<Model>>,
    pipelines: Vec<PublishedPipeline>,
    schedules: Vec<Schedule>,
    services: BTreeMap<String, Service>,
}

fn scope_key(subscription_id: &str, resource_group: &str, name: &str) -> String {
    format!("{subscription_id}/{resource_group}/{name}")
}

impl State {
    fn workspace_mut(&mut self, workspace: &Workspace) -> Result<&mut WorkspaceState> {
        self.workspaces
            .get_mut(&scope_key(
                &workspace.subscription_id,
                &workspace.resource_group,
                &workspace.name,
            ))
            .ok_or_else(|| ClientError::not_found(ResourceKind::Workspace, &workspace.name))
    }
}

impl WorkspaceState {
    fn new(workspace: Workspace) -> Self {
        let datastores = BUILTIN_DATASTORES
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let datastore = Datastore {
                    name: name.to_string(),
                    account_name: format!("{}storage", workspace.name.replace('-', "")),
                    container_name: format!("azureml-{name}"),
                    is_default: i == 0,
                };
                (name.to_string(), datastore)
            })
            .collect();

        Self {
            workspace,
            datastores,
            files: BTreeMap::new(),
            datasets: BTreeMap::new(),
            computes: BTreeMap::new(),
            environments: BTreeMap::new(),
            runs: Vec::new(),
            models: BTreeMap::new(),
            pipelines: Vec::new(),
            schedules: Vec::new(),
            services: BTreeMap::new(),
        }
    }

    fn run(&self, run_id: Uuid) -> Result<&Run> {
        self.runs
            .iter()
            .find(|run| run.id == run_id)
            .ok_or_else(|| ClientError::not_found(ResourceKind::Run, run_id.to_string()))
    }

    fn run_mut(&mut self, run_id: Uuid) -> Result<&mut Run> {
        self.runs
            .iter_mut()
            .find(|run| run.id == run_id)
            .ok_or_else(|| ClientError::not_found(ResourceKind::Run, run_id.to_string()))
    }

    fn dataset(&self, name: &str, version: Option<u32>) -> Result<&Dataset> {
        let versions = self
            .datasets
            .get(name)
            .ok_or_else(|| ClientError::not_found(ResourceKind::Dataset, name))?;

        match version {
            Some(version) => versions.iter().find(|d| d.version == version),
            None => versions.last(),
        }
        .ok_or_else(|| ClientError::not_found(ResourceKind::Dataset, name))
    }

    /// Check the named resources a specification refers to
    fn check_spec(&self, spec: &RunSpec) -> Result<()> {
        if !self.computes.contains_key(spec.compute_target()) {
            return Err(ClientError::not_found(
                ResourceKind::Compute,
                spec.compute_target(),
            ));
        }

        if !self.environments.contains_key(spec.environment()) {
            return Err(ClientError::not_found(
                ResourceKind::Environment,
                spec.environment(),
            ));
        }

        for argument in spec.arguments() {
            if let ArgValue::Dataset(input) = &argument.value {
                self.dataset(&input.dataset, input.version)?;
            }
        }

        Ok(())
    }

    fn queue(
        &mut self,
        experiment: &str,
        kind: RunKind,
        parent_id: Option<Uuid>,
        arguments: Vec<String>,
    ) -> Run {
        let run = Run {
            id: Uuid::new_v4(),
            experiment: experiment.to_string(),
            kind,
            parent_id,
            status: RunStatus::Queued,
            submitted_at: Utc::now(),
            started_at: None,
            completed_at: None,
            arguments,
            metrics: Metrics::new(),
            outputs: Vec::new(),
            error: None,
        };
        debug!("Queued {:?} run {} in '{}'", kind, run.id, experiment);
        self.runs.push(run.clone());
        run
    }
}

/// Process-local [`Platform`]
///
/// Clones share the same state.
#[derive(Clone, Default)]
pub struct InMemoryPlatform {
    state: Arc<Mutex<State>>,
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock the state on behalf of an authenticated caller
    fn state(&self) -> Result<MutexGuard<'_, State>> {
        let state = self.lock();
        if state.credential_revoked {
            return Err(ClientError::Authentication(
                "credential has expired".to_string(),
            ));
        }
        Ok(state)
    }

    fn with_workspace<T>(
        &self,
        workspace: &Workspace,
        f: impl FnOnce(&mut WorkspaceState) -> Result<T>,
    ) -> Result<T> {
        let mut state = self.state()?;
        f(state.workspace_mut(workspace)?)
    }

    // =============================================================================
    // Fixtures
    // =============================================================================

    /// Create a workspace directly, bypassing credential checks
    pub fn add_workspace(&self, identity: &WorkspaceIdentity) -> Workspace {
        let mut state = self.lock();
        state
            .resource_groups
            .insert((identity.subscription_id.clone(), identity.resource_group.clone()));

        let key = scope_key(
            &identity.subscription_id,
            &identity.resource_group,
            &identity.name,
        );
        let workspace = Workspace {
            name: identity.name.clone(),
            subscription_id: identity.subscription_id.clone(),
            resource_group: identity.resource_group.clone(),
            location: identity.location.clone(),
            created_at: Utc::now(),
        };
        state
            .workspaces
            .entry(key)
            .or_insert_with(|| WorkspaceState::new(workspace))
            .workspace
            .clone()
    }

    /// Register a resource group that workspaces may be created in
    pub fn add_resource_group(&self, subscription_id: &str, resource_group: &str) {
        self.lock()
            .resource_groups
            .insert((subscription_id.to_string(), resource_group.to_string()));
    }

    /// Make every subsequent call fail with `Authentication`
    pub fn revoke_credential(&self) {
        self.lock().credential_revoked = true;
    }

    /// Contents of a file previously uploaded to a datastore
    pub fn file(&self, workspace: &Workspace, datastore: &str, path: &str) -> Option<Vec<u8>> {
        let mut state = self.lock();
        let ws = state.workspace_mut(workspace).ok()?;
        ws.files
            .get(&(datastore.to_string(), path.to_string()))
            .cloned()
    }

    // =============================================================================
    // Executor Hooks
    // =============================================================================

    /// Move a queued run to `Running`
    pub fn start_run(&self, workspace: &Workspace, run_id: Uuid) -> Result<Run> {
        let mut state = self.lock();
        let run = state.workspace_mut(workspace)?.run_mut(run_id)?;
        if run.status == RunStatus::Queued {
            run.status = RunStatus::Running;
            run.started_at = Some(Utc::now());
        }
        Ok(run.clone())
    }

    /// Record a metric value; the last write for a name wins
    pub fn log_metric(
        &self,
        workspace: &Workspace,
        run_id: Uuid,
        name: &str,
        value: f64,
    ) -> Result<()> {
        let mut state = self.lock();
        let run = state.workspace_mut(workspace)?.run_mut(run_id)?;
        run.metrics.record(name, value);
        Ok(())
    }

    /// Record an artifact the run wrote
    pub fn add_output(&self, workspace: &Workspace, run_id: Uuid, path: &str) -> Result<()> {
        let mut state = self.lock();
        let run = state.workspace_mut(workspace)?.run_mut(run_id)?;
        if !run.has_output(path) {
            run.outputs.push(path.to_string());
        }
        Ok(())
    }

    /// Move a run to a terminal status
    pub fn finish_run(
        &self,
        workspace: &Workspace,
        run_id: Uuid,
        status: RunStatus,
        error: Option<String>,
    ) -> Result<Run> {
        let mut state = self.lock();
        let run = state.workspace_mut(workspace)?.run_mut(run_id)?;
        let now = Utc::now();
        run.started_at.get_or_insert(now);
        run.completed_at = Some(now);
        run.status = status;
        run.error = error;
        Ok(run.clone())
    }

    /// Settle a provisioning compute target
    pub fn finish_compute(
        &self,
        workspace: &Workspace,
        name: &str,
        outcome: ProvisioningState,
    ) -> Result<ComputeTarget> {
        let mut state = self.lock();
        let compute = state
            .workspace_mut(workspace)?
            .computes
            .get_mut(name)
            .ok_or_else(|| ClientError::not_found(ResourceKind::Compute, name))?;
        compute.state = outcome;
        Ok(compute.clone())
    }

    /// Settle a transitioning service; healthy services get a scoring URI
    pub fn finish_deployment(
        &self,
        workspace: &Workspace,
        name: &str,
        outcome: ServiceState,
    ) -> Result<Service> {
        let mut state = self.lock();
        let service = state
            .workspace_mut(workspace)?
            .services
            .get_mut(name)
            .ok_or_else(|| ClientError::not_found(ResourceKind::Service, name))?;
        service.state = outcome;
        service.scoring_uri =
            (outcome == ServiceState::Healthy).then(|| format!("http://localhost/{name}/score"));
        Ok(service.clone())
    }
}

#[async_trait]
impl Platform for InMemoryPlatform {
    // =============================================================================
    // Workspaces
    // =============================================================================

    async fn get_workspace(&self, identity: &WorkspaceIdentity) -> Result<Workspace> {
        let state = self.state()?;
        state
            .workspaces
            .get(&scope_key(
                &identity.subscription_id,
                &identity.resource_group,
                &identity.name,
            ))
            .map(|ws| ws.workspace.clone())
            .ok_or_else(|| ClientError::not_found(ResourceKind::Workspace, &identity.name))
    }

    async fn create_workspace(&self, req: CreateWorkspace) -> Result<Workspace> {
        let mut state = self.state()?;
        let key = scope_key(&req.subscription_id, &req.resource_group, &req.name);
        if state.workspaces.contains_key(&key) {
            return Err(ClientError::already_exists(ResourceKind::Workspace, &req.name));
        }

        let group = (req.subscription_id.clone(), req.resource_group.clone());
        if !state.resource_groups.contains(&group) {
            if !req.create_resource_group {
                return Err(ClientError::api_error(
                    400,
                    format!("resource group '{}' does not exist", req.resource_group),
                ));
            }
            state.resource_groups.insert(group);
        }

        let workspace = Workspace {
            name: req.name,
            subscription_id: req.subscription_id,
            resource_group: req.resource_group,
            location: Some(req.location),
            created_at: Utc::now(),
        };
        state
            .workspaces
            .insert(key, WorkspaceState::new(workspace.clone()));
        Ok(workspace)
    }

    // =============================================================================
    // Datastores
    // =============================================================================

    async fn list_datastores(&self, workspace: &Workspace) -> Result<Vec<Datastore>> {
        self.with_workspace(workspace, |ws| Ok(ws.datastores.values().cloned().collect()))
    }

    async fn get_datastore(&self, workspace: &Workspace, name: &str) -> Result<Datastore> {
        self.with_workspace(workspace, |ws| {
            ws.datastores
                .get(name)
                .cloned()
                .ok_or_else(|| ClientError::not_found(ResourceKind::Datastore, name))
        })
    }

    async fn get_default_datastore(&self, workspace: &Workspace) -> Result<Datastore> {
        self.with_workspace(workspace, |ws| {
            ws.datastores
                .values()
                .find(|d| d.is_default)
                .cloned()
                .ok_or_else(|| ClientError::not_found(ResourceKind::Datastore, "default"))
        })
    }

    async fn set_default_datastore(
        &self,
        workspace: &Workspace,
        name: &str,
    ) -> Result<Datastore> {
        self.with_workspace(workspace, |ws| {
            if !ws.datastores.contains_key(name) {
                return Err(ClientError::not_found(ResourceKind::Datastore, name));
            }
            for datastore in ws.datastores.values_mut() {
                datastore.is_default = datastore.name == name;
            }
            Ok(ws.datastores[name].clone())
        })
    }

    async fn register_datastore(
        &self,
        workspace: &Workspace,
        req: RegisterDatastore,
    ) -> Result<Datastore> {
        req.validate()?;
        self.with_workspace(workspace, |ws| {
            let is_default = match ws.datastores.get(&req.name) {
                Some(_) if !req.overwrite => {
                    return Err(ClientError::already_exists(
                        ResourceKind::Datastore,
                        &req.name,
                    ));
                }
                Some(existing) => existing.is_default,
                None => false,
            };

            let datastore = Datastore {
                name: req.name.clone(),
                account_name: req.account_name,
                container_name: req.container_name,
                is_default,
            };
            ws.datastores.insert(req.name, datastore.clone());
            Ok(datastore)
        })
    }

    async fn upload_file(
        &self,
        workspace: &Workspace,
        datastore: &str,
        target_path: &str,
        contents: Vec<u8>,
        overwrite: bool,
    ) -> Result<()> {
        self.with_workspace(workspace, |ws| {
            if !ws.datastores.contains_key(datastore) {
                return Err(ClientError::not_found(ResourceKind::Datastore, datastore));
            }

            let key = (datastore.to_string(), target_path.to_string());
            if ws.files.contains_key(&key) && !overwrite {
                return Err(ClientError::api_error(
                    409,
                    format!("{target_path} already exists in {datastore}"),
                ));
            }
            ws.files.insert(key, contents);
            Ok(())
        })
    }

    // =============================================================================
    // Datasets
    // =============================================================================

    async fn list_datasets(&self, workspace: &Workspace) -> Result<Vec<Dataset>> {
        self.with_workspace(workspace, |ws| {
            Ok(ws
                .datasets
                .values()
                .filter_map(|versions| versions.last().cloned())
                .collect())
        })
    }

    async fn get_dataset(
        &self,
        workspace: &Workspace,
        name: &str,
        version: Option<u32>,
    ) -> Result<Dataset> {
        self.with_workspace(workspace, |ws| ws.dataset(name, version).cloned())
    }

    async fn register_dataset(
        &self,
        workspace: &Workspace,
        req: RegisterDataset,
    ) -> Result<Dataset> {
        self.with_workspace(workspace, |ws| {
            if !ws.datastores.contains_key(&req.datastore) {
                return Err(ClientError::not_found(
                    ResourceKind::Datastore,
                    &req.datastore,
                ));
            }

            let versions = ws.datasets.entry(req.name.clone()).or_default();
            let latest = versions.last().map_or(0, |d| d.version);
            if latest > 0 && !req.create_new_version {
                return Err(ClientError::already_exists(ResourceKind::Dataset, &req.name));
            }

            let dataset = Dataset {
                name: req.name,
                version: latest + 1,
                kind: req.kind,
                datastore: req.datastore,
                path: req.path,
                description: req.description,
                tags: req.tags,
                registered_at: Utc::now(),
            };
            versions.push(dataset.clone());
            Ok(dataset)
        })
    }

    // =============================================================================
    // Compute Targets
    // =============================================================================

    async fn list_computes(&self, workspace: &Workspace) -> Result<Vec<ComputeTarget>> {
        self.with_workspace(workspace, |ws| Ok(ws.computes.values().cloned().collect()))
    }

    async fn get_compute(&self, workspace: &Workspace, name: &str) -> Result<ComputeTarget> {
        self.with_workspace(workspace, |ws| {
            ws.computes
                .get(name)
                .cloned()
                .ok_or_else(|| ClientError::not_found(ResourceKind::Compute, name))
        })
    }

    async fn create_compute(
        &self,
        workspace: &Workspace,
        req: CreateCompute,
    ) -> Result<ComputeTarget> {
        req.config.validate()?;

        self.with_workspace(workspace, |ws| {
            if ws.computes.contains_key(&req.name) {
                return Err(ClientError::already_exists(ResourceKind::Compute, &req.name));
            }

            let compute = ComputeTarget {
                name: req.name.clone(),
                vm_size: req.config.vm_size,
                min_nodes: req.config.min_nodes,
                max_nodes: req.config.max_nodes,
                vm_priority: req.config.vm_priority,
                state: ProvisioningState::Provisioning,
            };
            ws.computes.insert(req.name, compute.clone());
            Ok(compute)
        })
    }

    // =============================================================================
    // Environments
    // =============================================================================

    async fn get_environment(
        &self,
        workspace: &Workspace,
        name: &str,
        version: Option<u32>,
    ) -> Result<Environment> {
        self.with_workspace(workspace, |ws| {
            let versions = ws.environments.get(name);
            match (versions, version) {
                (Some(versions), Some(version)) => {
                    versions.iter().find(|e| e.version == version).cloned()
                }
                (Some(versions), None) => versions.last().cloned(),
                (None, _) => None,
            }
            .ok_or_else(|| ClientError::not_found(ResourceKind::Environment, name))
        })
    }

    async fn register_environment(
        &self,
        workspace: &Workspace,
        mut environment: Environment,
    ) -> Result<Environment> {
        self.with_workspace(workspace, |ws| {
            let versions = ws.environments.entry(environment.name.clone()).or_default();
            if let Some(latest) = versions.last() {
                if latest.same_definition(&environment) {
                    return Err(ClientError::already_exists(
                        ResourceKind::Environment,
                        &environment.name,
                    ));
                }
            }

            environment.version = versions.last().map_or(1, |e| e.version + 1);
            versions.push(environment.clone());
            Ok(environment)
        })
    }

    // =============================================================================
    // Runs
    // =============================================================================

    async fn submit_run(
        &self,
        workspace: &Workspace,
        experiment: &str,
        req: SubmitRun,
    ) -> Result<Run> {
        self.with_workspace(workspace, |ws| {
            ws.check_spec(&req.spec)?;
            Ok(ws.queue(experiment, RunKind::Script, None, req.arguments))
        })
    }

    async fn submit_sweep(
        &self,
        workspace: &Workspace,
        experiment: &str,
        req: SubmitSweep,
    ) -> Result<Run> {
        let children = req.sweep.child_specs()?;

        self.with_workspace(workspace, |ws| {
            ws.check_spec(&req.sweep.run_spec)?;

            let parent = ws.queue(
                experiment,
                RunKind::Sweep,
                None,
                req.sweep.run_spec.rendered_arguments(),
            );
            for child in &children {
                ws.queue(
                    experiment,
                    RunKind::Script,
                    Some(parent.id),
                    child.rendered_arguments(),
                );
            }
            Ok(parent)
        })
    }

    async fn submit_pipeline(
        &self,
        workspace: &Workspace,
        experiment: &str,
        req: SubmitPipeline,
    ) -> Result<Run> {
        self.with_workspace(workspace, |ws| {
            for step in req.pipeline.steps() {
                ws.check_spec(&step.spec)?;
            }

            let parent = ws.queue(experiment, RunKind::Pipeline, None, Vec::new());
            for step in req.pipeline.steps() {
                ws.queue(
                    experiment,
                    RunKind::Step,
                    Some(parent.id),
                    step.spec.rendered_arguments(),
                );
            }
            Ok(parent)
        })
    }

    async fn get_run(&self, workspace: &Workspace, run_id: Uuid) -> Result<Run> {
        self.with_workspace(workspace, |ws| ws.run(run_id).cloned())
    }

    async fn list_runs(&self, workspace: &Workspace, experiment: &str) -> Result<Vec<Run>> {
        self.with_workspace(workspace, |ws| {
            Ok(ws
                .runs
                .iter()
                .rev()
                .filter(|run| run.experiment == experiment && run.parent_id.is_none())
                .cloned()
                .collect())
        })
    }

    async fn list_children(&self, workspace: &Workspace, run_id: Uuid) -> Result<Vec<Run>> {
        self.with_workspace(workspace, |ws| {
            ws.run(run_id)?;
            Ok(ws
                .runs
                .iter()
                .filter(|run| run.parent_id == Some(run_id))
                .cloned()
                .collect())
        })
    }

    async fn get_metrics(&self, workspace: &Workspace, run_id: Uuid) -> Result<Metrics> {
        self.with_workspace(workspace, |ws| Ok(ws.run(run_id)?.metrics.clone()))
    }

    async fn cancel_run(&self, workspace: &Workspace, run_id: Uuid) -> Result<Run> {
        self.with_workspace(workspace, |ws| {
            ws.run(run_id)?;
            let now = Utc::now();
            for run in ws
                .runs
                .iter_mut()
                .filter(|run| run.id == run_id || run.parent_id == Some(run_id))
            {
                if !run.is_terminal() {
                    run.status = RunStatus::Canceled;
                    run.completed_at = Some(now);
                }
            }
            ws.run(run_id).cloned()
        })
    }

    // =============================================================================
    // Models
    // =============================================================================

    async fn register_model(&self, workspace: &Workspace, req: RegisterModel) -> Result<Model> {
        self.with_workspace(workspace, |ws| {
            ws.run(req.run_id)?;

            let versions = ws.models.entry(req.name.clone()).or_default();
            let model = Model {
                name: req.name,
                version: versions.last().map_or(1, |m| m.version + 1),
                run_id: req.run_id,
                path: req.path,
                tags: req.tags,
                properties: req.properties,
                registered_at: Utc::now(),
            };
            versions.push(model.clone());
            Ok(model)
        })
    }

    async fn list_models(&self, workspace: &Workspace) -> Result<Vec<Model>> {
        self.with_workspace(workspace, |ws| {
            Ok(ws.models.values().flatten().cloned().collect())
        })
    }

    async fn get_model(
        &self,
        workspace: &Workspace,
        name: &str,
        version: Option<u32>,
    ) -> Result<Model> {
        self.with_workspace(workspace, |ws| {
            let versions = ws.models.get(name);
            match (versions, version) {
                (Some(versions), Some(version)) => {
                    versions.iter().find(|m| m.version == version).cloned()
                }
                (Some(versions), None) => versions.last().cloned(),
                (None, _) => None,
            }
            .ok_or_else(|| ClientError::not_found(ResourceKind::Model, name))
        })
    }

    // =============================================================================
    // Published Pipelines
    // =============================================================================

    async fn publish_pipeline(
        &self,
        workspace: &Workspace,
        run_id: Uuid,
        req: PublishPipeline,
    ) -> Result<PublishedPipeline> {
        self.with_workspace(workspace, |ws| {
            if ws.run(run_id)?.kind != RunKind::Pipeline {
                return Err(ClientError::api_error(
                    400,
                    format!("run {run_id} is not a pipeline run"),
                ));
            }

            let id = Uuid::new_v4();
            let published = PublishedPipeline {
                id,
                name: req.name,
                description: req.description,
                version: req.version,
                endpoint: format!("http://localhost/pipelines/{id}"),
                published_at: Utc::now(),
            };
            ws.pipelines.push(published.clone());
            Ok(published)
        })
    }

    async fn create_schedule(
        &self,
        workspace: &Workspace,
        req: CreateSchedule,
    ) -> Result<Schedule> {
        req.validate()?;

        self.with_workspace(workspace, |ws| {
            if !ws.pipelines.iter().any(|p| p.id == req.pipeline_id) {
                return Err(ClientError::not_found(
                    ResourceKind::Pipeline,
                    req.pipeline_id.to_string(),
                ));
            }

            let schedule = Schedule {
                id: Uuid::new_v4(),
                name: req.name,
                description: req.description,
                pipeline_id: req.pipeline_id,
                experiment: req.experiment,
                recurrence: req.recurrence,
            };
            ws.schedules.push(schedule.clone());
            Ok(schedule)
        })
    }

    // =============================================================================
    // Services
    // =============================================================================

    async fn deploy_service(&self, workspace: &Workspace, req: DeployService) -> Result<Service> {
        self.with_workspace(workspace, |ws| {
            for model in &req.models {
                let registered = ws
                    .models
                    .get(&model.name)
                    .is_some_and(|versions| versions.iter().any(|m| m.version == model.version));
                if !registered {
                    return Err(ClientError::not_found(ResourceKind::Model, &model.name));
                }
            }

            if ws.services.contains_key(&req.name) && !req.overwrite {
                return Err(ClientError::already_exists(ResourceKind::Service, &req.name));
            }

            let service = Service {
                name: req.name.clone(),
                models: req.models,
                state: ServiceState::Transitioning,
                scoring_uri: None,
            };
            ws.services.insert(req.name, service.clone());
            Ok(service)
        })
    }

    async fn get_service(&self, workspace: &Workspace, name: &str) -> Result<Service> {
        self.with_workspace(workspace, |ws| {
            ws.services
                .get(name)
                .cloned()
                .ok_or_else(|| ClientError::not_found(ResourceKind::Service, name))
        })
    }

    async fn delete_service(&self, workspace: &Workspace, name: &str) -> Result<()> {
        self.with_workspace(workspace, |ws| {
            ws.services
                .remove(name)
                .map(|_| ())
                .ok_or_else(|| ClientError::not_found(ResourceKind::Service, name))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (InMemoryPlatform, Workspace) {
        let platform = InMemoryPlatform::new();
        let workspace =
            platform.add_workspace(&WorkspaceIdentity::new("aml-workspace", "sub-1", "aml-resources"));
        (platform, workspace)
    }

    #[tokio::test]
    async fn test_new_workspace_has_default_datastore() {
        let (platform, workspace) = setup();

        let default = platform.get_default_datastore(&workspace).await.unwrap();
        assert_eq!(default.name, "workspaceblobstore");
        assert_eq!(platform.list_datastores(&workspace).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_dataset_versions_increase() {
        let (platform, workspace) = setup();
        let req = RegisterDataset::tabular("diabetes dataset", "workspaceblobstore", "diabetes-data/*.csv");

        let v1 = platform
            .register_dataset(&workspace, req.clone().create_new_version(true))
            .await
            .unwrap();
        let v2 = platform
            .register_dataset(&workspace, req.clone().create_new_version(true))
            .await
            .unwrap();

        assert_eq!((v1.version, v2.version), (1, 2));
        assert_eq!(
            platform
                .get_dataset(&workspace, "diabetes dataset", Some(1))
                .await
                .unwrap()
                .version,
            1
        );
        assert_eq!(
            platform
                .get_dataset(&workspace, "diabetes dataset", None)
                .await
                .unwrap()
                .version,
            2
        );

        let err = platform.register_dataset(&workspace, req).await.unwrap_err();
        assert!(err.is_already_exists());
    }

    #[tokio::test]
    async fn test_identical_environment_is_a_duplicate() {
        let (platform, workspace) = setup();
        let env = Environment::new("experiment_env").with_pip_package("scikit-learn");

        let first = platform
            .register_environment(&workspace, env.clone())
            .await
            .unwrap();
        let err = platform
            .register_environment(&workspace, env.clone())
            .await
            .unwrap_err();
        let changed = platform
            .register_environment(&workspace, env.with_pip_package("pandas"))
            .await
            .unwrap();

        assert_eq!(first.version, 1);
        assert!(err.is_already_exists());
        assert_eq!(changed.version, 2);
    }

    #[tokio::test]
    async fn test_run_lifecycle_through_hooks() {
        let (platform, workspace) = setup();
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("train.py"), "").unwrap();

        platform
            .create_compute(
                &workspace,
                CreateCompute {
                    name: "cpu-cluster".to_string(),
                    config: lathe_core::dto::resource::ProvisioningConfig::new("STANDARD_DS11_V2", 2),
                },
            )
            .await
            .unwrap();
        platform
            .register_environment(&workspace, Environment::new("experiment_env"))
            .await
            .unwrap();

        let spec = RunSpec::builder(dir.path(), "train.py")
            .argument("reg_rate", 0.01)
            .environment("experiment_env")
            .compute_target("cpu-cluster")
            .build()
            .unwrap();

        let run = platform
            .submit_run(&workspace, "diabetes-training", SubmitRun::from(&spec))
            .await
            .unwrap();
        assert_eq!(run.status, RunStatus::Queued);
        assert_eq!(run.arguments, vec!["--reg_rate", "0.01"]);

        platform.start_run(&workspace, run.id).unwrap();
        platform.log_metric(&workspace, run.id, "Accuracy", 0.77).unwrap();
        platform.log_metric(&workspace, run.id, "Accuracy", 0.79).unwrap();
        platform
            .finish_run(&workspace, run.id, RunStatus::Completed, None)
            .unwrap();

        let run = platform.get_run(&workspace, run.id).await.unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.metric("Accuracy"), Some(0.79));
        assert!(run.started_at.is_some() && run.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_submit_requires_known_compute() {
        let (platform, workspace) = setup();
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("train.py"), "").unwrap();

        let spec = RunSpec::builder(dir.path(), "train.py")
            .environment("experiment_env")
            .compute_target("missing-cluster")
            .build()
            .unwrap();

        let err = platform
            .submit_run(&workspace, "exp", SubmitRun::from(&spec))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::NotFound { kind: ResourceKind::Compute, .. }
        ));
    }

    #[tokio::test]
    async fn test_revoked_credential_fails_every_call() {
        let (platform, workspace) = setup();
        platform.revoke_credential();

        let err = platform.list_computes(&workspace).await.unwrap_err();
        assert!(matches!(err, ClientError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_finish_deployment_of_unknown_service() {
        let (platform, workspace) = setup();
        let err = platform
            .finish_deployment(&workspace, "missing", ServiceState::Healthy)
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
