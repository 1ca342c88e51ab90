//! Submission and tracking
//!
//! Submits runs, sweeps and pipelines to an experiment and follows them to
//! completion. A run that fails remotely is reported through its status,
//! never as an `Err`: only transport, authentication and local problems
//! surface as errors.

use lathe_core::ValidationError;
use lathe_core::domain::pipeline::{PublishedPipeline, Schedule};
use lathe_core::domain::run::{Metrics, Run, RunStatus};
use lathe_core::domain::service::{Service, ServiceState};
use lathe_core::domain::workspace::Workspace;
use lathe_core::dto::pipeline::{CreateSchedule, PublishPipeline};
use lathe_core::dto::run::{SubmitPipeline, SubmitRun, SubmitSweep};
use lathe_core::dto::service::DeployService;
use lathe_core::pipeline::CompiledPipeline;
use lathe_core::run_spec::RunSpec;
use lathe_core::sweep::SweepConfig;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::platform::Platform;
use crate::wait::{WaitOptions, poll_until};

/// Submits and follows runs within one workspace
pub struct Tracker<'a> {
    platform: &'a dyn Platform,
    workspace: &'a Workspace,
}

fn require_experiment(experiment: &str) -> Result<()> {
    if experiment.trim().is_empty() {
        return Err(ValidationError::EmptyField("experiment name").into());
    }
    Ok(())
}

impl<'a> Tracker<'a> {
    pub fn new(platform: &'a dyn Platform, workspace: &'a Workspace) -> Self {
        Self {
            platform,
            workspace,
        }
    }

    // =============================================================================
    // Submission
    // =============================================================================

    /// Submit a script run; returns as soon as the platform has queued it
    pub async fn submit(&self, experiment: &str, spec: &RunSpec) -> Result<Run> {
        require_experiment(experiment)?;

        let run = self
            .platform
            .submit_run(self.workspace, experiment, SubmitRun::from(spec))
            .await?;
        info!(
            "Submitted run {} of {} to experiment '{}'",
            run.id,
            spec.entry_script(),
            experiment
        );
        Ok(run)
    }

    /// Submit a hyperparameter sweep; returns the parent run
    pub async fn submit_sweep(&self, experiment: &str, sweep: &SweepConfig) -> Result<Run> {
        require_experiment(experiment)?;
        // Surface child argument clashes before anything is sent
        let children = sweep.child_specs()?;

        let run = self
            .platform
            .submit_sweep(
                self.workspace,
                experiment,
                SubmitSweep {
                    sweep: sweep.clone(),
                },
            )
            .await?;
        info!(
            "Submitted sweep {} with {} child run(s) to experiment '{}'",
            run.id,
            children.len(),
            experiment
        );
        Ok(run)
    }

    /// Submit a compiled pipeline; returns the pipeline run
    ///
    /// With `regenerate_outputs` every step runs again even when the
    /// platform could reuse an earlier result.
    pub async fn submit_pipeline(
        &self,
        experiment: &str,
        pipeline: &CompiledPipeline,
        regenerate_outputs: bool,
    ) -> Result<Run> {
        require_experiment(experiment)?;

        let run = self
            .platform
            .submit_pipeline(
                self.workspace,
                experiment,
                SubmitPipeline {
                    pipeline: pipeline.clone(),
                    regenerate_outputs,
                },
            )
            .await?;
        info!(
            "Submitted pipeline '{}' ({} steps) as run {}",
            pipeline.name(),
            pipeline.steps().len(),
            run.id
        );
        Ok(run)
    }

    // =============================================================================
    // Queries
    // =============================================================================

    pub async fn run(&self, run_id: Uuid) -> Result<Run> {
        self.platform.get_run(self.workspace, run_id).await
    }

    pub async fn status(&self, run_id: Uuid) -> Result<RunStatus> {
        Ok(self.run(run_id).await?.status)
    }

    /// Latest metric snapshot of a run
    pub async fn metrics(&self, run_id: Uuid) -> Result<Metrics> {
        self.platform.get_metrics(self.workspace, run_id).await
    }

    /// Child runs in submission order
    pub async fn children(&self, run_id: Uuid) -> Result<Vec<Run>> {
        self.platform.list_children(self.workspace, run_id).await
    }

    /// Top-level runs of an experiment, newest first
    pub async fn runs(&self, experiment: &str) -> Result<Vec<Run>> {
        self.platform.list_runs(self.workspace, experiment).await
    }

    /// Most recently submitted top-level run of an experiment
    pub async fn latest_run(&self, experiment: &str) -> Result<Option<Run>> {
        Ok(self.runs(experiment).await?.into_iter().next())
    }

    /// Ask the platform to cancel a run and its children
    pub async fn cancel(&self, run_id: Uuid) -> Result<Run> {
        let run = self.platform.cancel_run(self.workspace, run_id).await?;
        info!("Requested cancellation of run {} (now {})", run.id, run.status);
        Ok(run)
    }

    /// Block until the run reaches a terminal status
    ///
    /// A remote failure is returned as a run with status `Failed`. Ending
    /// the wait through the timeout or the cancellation token leaves the
    /// remote run untouched.
    pub async fn wait_for_completion(&self, run_id: Uuid, options: &WaitOptions) -> Result<Run> {
        let run = poll_until(options, move || async move {
            let run = self.run(run_id).await?;
            debug!("Run {} is {}", run_id, run.status);
            Ok(run.is_terminal().then_some(run))
        })
        .await?;

        match run.status {
            RunStatus::Failed => warn!(
                "Run {} failed: {}",
                run.id,
                run.error.as_deref().unwrap_or("no error reported")
            ),
            status => info!("Run {} finished with status {}", run.id, status),
        }
        Ok(run)
    }

    // =============================================================================
    // Published Pipelines
    // =============================================================================

    /// Publish a submitted pipeline run as a REST-triggerable pipeline
    pub async fn publish_pipeline(
        &self,
        run_id: Uuid,
        name: &str,
        description: Option<&str>,
        version: &str,
    ) -> Result<PublishedPipeline> {
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyField("pipeline name").into());
        }

        let req = PublishPipeline {
            name: name.to_string(),
            description: description.map(str::to_string),
            version: version.to_string(),
        };
        let published = self
            .platform
            .publish_pipeline(self.workspace, run_id, req)
            .await?;
        info!(
            "Published pipeline '{}' at {}",
            published.name, published.endpoint
        );
        Ok(published)
    }

    /// Run a published pipeline on a recurrence
    pub async fn create_schedule(&self, req: CreateSchedule) -> Result<Schedule> {
        req.validate()?;

        let schedule = self.platform.create_schedule(self.workspace, req).await?;
        info!(
            "Scheduled pipeline {} as '{}'",
            schedule.pipeline_id, schedule.name
        );
        Ok(schedule)
    }

    // =============================================================================
    // Services
    // =============================================================================

    /// Start deploying registered models as a web service
    ///
    /// Returns while the service is still transitioning; see
    /// [`Tracker::wait_for_deployment`].
    pub async fn deploy_service(&self, req: DeployService) -> Result<Service> {
        if req.name.trim().is_empty() {
            return Err(ValidationError::EmptyField("service name").into());
        }
        if req.models.is_empty() {
            return Err(ValidationError::EmptyField("service models").into());
        }

        let source = &req.inference.source_directory;
        if !source.is_dir() {
            return Err(ValidationError::SourceDirectoryMissing(source.clone()).into());
        }
        if !source.join(&req.inference.entry_script).is_file() {
            return Err(ValidationError::EntryScriptMissing {
                directory: source.clone(),
                script: req.inference.entry_script.clone(),
            }
            .into());
        }

        let service = self.platform.deploy_service(self.workspace, req).await?;
        info!("Deploying service '{}'", service.name);
        Ok(service)
    }

    pub async fn service(&self, name: &str) -> Result<Service> {
        self.platform.get_service(self.workspace, name).await
    }

    /// Block until the service leaves `Transitioning`
    pub async fn wait_for_deployment(&self, name: &str, options: &WaitOptions) -> Result<Service> {
        let service = poll_until(options, move || async move {
            let service = self.service(name).await?;
            debug!("Service '{}' is {}", name, service.state);
            Ok(service.state.is_terminal().then_some(service))
        })
        .await?;

        match service.state {
            ServiceState::Healthy => info!("Service '{}' is healthy", name),
            state => warn!("Service '{}' settled as {}", name, state),
        }
        Ok(service)
    }

    pub async fn delete_service(&self, name: &str) -> Result<()> {
        self.platform.delete_service(self.workspace, name).await?;
        info!("Deleted service '{}'", name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use crate::memory::InMemoryPlatform;
    use crate::registry::ResourceRegistry;
    use lathe_core::domain::environment::Environment;
    use lathe_core::domain::pipeline::Recurrence;
    use lathe_core::domain::resource::ProvisioningState;
    use lathe_core::domain::run::{PrimaryMetric, RunKind};
    use lathe_core::domain::service::ModelReference;
    use lathe_core::domain::workspace::WorkspaceIdentity;
    use lathe_core::dto::model::RegisterModel;
    use lathe_core::dto::resource::ProvisioningConfig;
    use lathe_core::dto::service::{DeploymentConfig, InferenceConfig};
    use lathe_core::pipeline::{Pipeline, PipelineStep};
    use lathe_core::run_spec::OutputRef;
    use lathe_core::sweep::GridSampling;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    struct Fixture {
        platform: InMemoryPlatform,
        workspace: Workspace,
        dir: TempDir,
    }

    async fn fixture() -> Fixture {
        let platform = InMemoryPlatform::new();
        let workspace =
            platform.add_workspace(&WorkspaceIdentity::new("aml-workspace", "sub-1", "aml-resources"));

        let registry = ResourceRegistry::new(&platform, &workspace);
        registry
            .ensure_compute("cpu-cluster", Some(ProvisioningConfig::new("STANDARD_DS11_V2", 2)))
            .await
            .unwrap();
        platform
            .finish_compute(&workspace, "cpu-cluster", ProvisioningState::Succeeded)
            .unwrap();
        registry
            .register_environment(Environment::new("experiment_env"))
            .await
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        for script in ["train.py", "prep.py", "score.py"] {
            std::fs::write(dir.path().join(script), "").unwrap();
        }

        Fixture {
            platform,
            workspace,
            dir,
        }
    }

    fn spec(dir: &TempDir, script: &str) -> RunSpec {
        RunSpec::builder(dir.path(), script)
            .environment("experiment_env")
            .compute_target("cpu-cluster")
            .build()
            .unwrap()
    }

    fn fast(timeout: Duration) -> WaitOptions {
        WaitOptions::new(timeout).with_poll_interval(Duration::from_millis(5))
    }

    #[tokio::test]
    async fn test_submitted_run_is_queued_until_executor_finishes() {
        let f = fixture().await;
        let tracker = Tracker::new(&f.platform, &f.workspace);

        let run = tracker
            .submit("diabetes-training", &spec(&f.dir, "train.py"))
            .await
            .unwrap();
        assert_eq!(tracker.status(run.id).await.unwrap(), RunStatus::Queued);

        f.platform.start_run(&f.workspace, run.id).unwrap();
        assert_eq!(tracker.status(run.id).await.unwrap(), RunStatus::Running);

        f.platform
            .finish_run(&f.workspace, run.id, RunStatus::Completed, None)
            .unwrap();
        let done = tracker
            .wait_for_completion(run.id, &fast(Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(done.status, RunStatus::Completed);
    }

    #[tokio::test]
    async fn test_remote_failure_is_data_not_error() {
        let f = fixture().await;
        let tracker = Tracker::new(&f.platform, &f.workspace);
        let run = tracker
            .submit("diabetes-training", &spec(&f.dir, "train.py"))
            .await
            .unwrap();

        f.platform
            .finish_run(
                &f.workspace,
                run.id,
                RunStatus::Failed,
                Some("ModuleNotFoundError: sklearn".to_string()),
            )
            .unwrap();

        let run = tracker
            .wait_for_completion(run.id, &fast(Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert!(run.error.unwrap().contains("sklearn"));
    }

    #[tokio::test]
    async fn test_wait_times_out_and_cancels_locally() {
        let f = fixture().await;
        let tracker = Tracker::new(&f.platform, &f.workspace);
        let run = tracker
            .submit("diabetes-training", &spec(&f.dir, "train.py"))
            .await
            .unwrap();

        let err = tracker
            .wait_for_completion(run.id, &fast(Duration::from_millis(30)))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Timeout(_)));

        let token = CancellationToken::new();
        token.cancel();
        let err = tracker
            .wait_for_completion(run.id, &WaitOptions::unbounded().with_cancellation(token))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Cancelled));

        // Neither ending touched the remote run
        assert_eq!(tracker.status(run.id).await.unwrap(), RunStatus::Queued);
    }

    #[tokio::test]
    async fn test_cancel_requests_remote_cancellation() {
        let f = fixture().await;
        let tracker = Tracker::new(&f.platform, &f.workspace);
        let run = tracker
            .submit("diabetes-training", &spec(&f.dir, "train.py"))
            .await
            .unwrap();

        let canceled = tracker.cancel(run.id).await.unwrap();
        assert_eq!(canceled.status, RunStatus::Canceled);
    }

    #[tokio::test]
    async fn test_runs_newest_first() {
        let f = fixture().await;
        let tracker = Tracker::new(&f.platform, &f.workspace);

        let first = tracker.submit("exp", &spec(&f.dir, "train.py")).await.unwrap();
        let second = tracker.submit("exp", &spec(&f.dir, "train.py")).await.unwrap();

        let runs = tracker.runs("exp").await.unwrap();
        assert_eq!(runs.iter().map(|r| r.id).collect::<Vec<_>>(), vec![second.id, first.id]);
        assert_eq!(tracker.latest_run("exp").await.unwrap().unwrap().id, second.id);
        assert!(tracker.latest_run("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_experiment_name_rejected() {
        let f = fixture().await;
        let tracker = Tracker::new(&f.platform, &f.workspace);

        let err = tracker.submit(" ", &spec(&f.dir, "train.py")).await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
    }

    #[tokio::test]
    async fn test_sweep_creates_one_child_per_grid_point() {
        let f = fixture().await;
        let tracker = Tracker::new(&f.platform, &f.workspace);

        let sampling = GridSampling::new()
            .choice("learning_rate", [0.01, 0.1])
            .choice("n_estimators", [10i64, 100]);
        let sweep = SweepConfig::new(
            spec(&f.dir, "train.py"),
            sampling,
            PrimaryMetric::maximize("AUC"),
            6,
            2,
        )
        .unwrap();

        let parent = tracker.submit_sweep("diabetes-sweep", &sweep).await.unwrap();
        assert_eq!(parent.kind, RunKind::Sweep);

        let children = tracker.children(parent.id).await.unwrap();
        assert_eq!(children.len(), 4);
        assert_eq!(
            children[0].arguments,
            vec!["--learning_rate", "0.01", "--n_estimators", "10"]
        );
        assert!(children.iter().all(|c| c.parent_id == Some(parent.id)));
    }

    #[tokio::test]
    async fn test_pipeline_run_has_a_step_per_stage() {
        let f = fixture().await;
        let tracker = Tracker::new(&f.platform, &f.workspace);
        let prepped = OutputRef::new("prepped_data");

        let prep = RunSpec::builder(f.dir.path(), "prep.py")
            .argument("prepped-data", prepped.clone())
            .environment("experiment_env")
            .compute_target("cpu-cluster")
            .build()
            .unwrap();
        let train = RunSpec::builder(f.dir.path(), "train.py")
            .argument("training-data", prepped)
            .environment("experiment_env")
            .compute_target("cpu-cluster")
            .build()
            .unwrap();
        let pipeline = Pipeline::builder("diabetes-training")
            .step(PipelineStep::new("Prepare Data", prep).output("prepped_data"))
            .step(PipelineStep::new("Train Model", train))
            .compile()
            .unwrap();

        let run = tracker
            .submit_pipeline("mslearn-diabetes-pipeline", &pipeline, true)
            .await
            .unwrap();
        let steps = tracker.children(run.id).await.unwrap();

        assert_eq!(run.kind, RunKind::Pipeline);
        assert_eq!(steps.len(), 2);
        assert!(steps.iter().all(|s| s.kind == RunKind::Step));
        assert_eq!(steps[1].arguments, vec!["--training-data", "${{outputs.prepped_data}}"]);

        let published = tracker
            .publish_pipeline(run.id, "diabetes-training-pipeline", Some("Trains a model"), "1.0")
            .await
            .unwrap();
        let schedule = tracker
            .create_schedule(CreateSchedule {
                name: "weekly-retrain".to_string(),
                description: None,
                pipeline_id: published.id,
                experiment: "mslearn-diabetes-pipeline".to_string(),
                recurrence: Recurrence::weekly(1, &["Monday"], "00:00"),
            })
            .await
            .unwrap();
        assert_eq!(schedule.pipeline_id, published.id);
    }

    #[tokio::test]
    async fn test_service_deployment_lifecycle() {
        let f = fixture().await;
        let tracker = Tracker::new(&f.platform, &f.workspace);
        let run = tracker.submit("exp", &spec(&f.dir, "train.py")).await.unwrap();
        f.platform
            .register_model(
                &f.workspace,
                RegisterModel {
                    run_id: run.id,
                    name: "diabetes_model".to_string(),
                    path: "outputs/diabetes_model.pkl".to_string(),
                    tags: Default::default(),
                    properties: Default::default(),
                },
            )
            .await
            .unwrap();

        let req = DeployService {
            name: "diabetes-service".to_string(),
            models: vec![ModelReference {
                name: "diabetes_model".to_string(),
                version: 1,
            }],
            inference: InferenceConfig {
                source_directory: f.dir.path().to_path_buf(),
                entry_script: "score.py".to_string(),
                environment: "experiment_env".to_string(),
            },
            deployment: DeploymentConfig::default(),
            overwrite: false,
        };

        let service = tracker.deploy_service(req).await.unwrap();
        assert_eq!(service.state, ServiceState::Transitioning);

        f.platform
            .finish_deployment(&f.workspace, "diabetes-service", ServiceState::Healthy)
            .unwrap();
        let service = tracker
            .wait_for_deployment("diabetes-service", &fast(Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(service.state, ServiceState::Healthy);
        assert!(service.scoring_uri.is_some());

        tracker.delete_service("diabetes-service").await.unwrap();
        assert!(tracker.service("diabetes-service").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_deploy_checks_entry_script_locally() {
        let f = fixture().await;
        let tracker = Tracker::new(&f.platform, &f.workspace);
        let req = DeployService {
            name: "diabetes-service".to_string(),
            models: vec![ModelReference {
                name: "diabetes_model".to_string(),
                version: 1,
            }],
            inference: InferenceConfig {
                source_directory: f.dir.path().to_path_buf(),
                entry_script: "missing.py".to_string(),
                environment: "experiment_env".to_string(),
            },
            deployment: DeploymentConfig::default(),
            overwrite: false,
        };

        let err = tracker.deploy_service(req).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Validation(ValidationError::EntryScriptMissing { .. })
        ));
    }
}
