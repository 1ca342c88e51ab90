//! Post-run consumption
//!
//! Reads the results of finished runs: picks the best child of a sweep and
//! registers run artifacts as versioned models.

use lathe_core::ValidationError;
use lathe_core::domain::model::Model;
use lathe_core::domain::run::{PrimaryMetric, Run, RunStatus};
use lathe_core::domain::workspace::Workspace;
use lathe_core::dto::model::RegisterModel;
use lathe_core::selection::{TieBreak, select_best, sort_by_primary_metric};
use std::collections::BTreeMap;
use tracing::info;
use uuid::Uuid;

use crate::error::Result;
use crate::platform::Platform;

/// What to register as a model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRegistration {
    pub name: String,
    /// Artifact path as listed in the run's outputs
    pub path: String,
    pub tags: BTreeMap<String, String>,
    pub properties: BTreeMap<String, String>,
}

impl ModelRegistration {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            tags: BTreeMap::new(),
            properties: BTreeMap::new(),
        }
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn properties(mut self, properties: BTreeMap<String, String>) -> Self {
        self.properties.extend(properties);
        self
    }
}

/// Consumes finished runs in one workspace
pub struct Consumer<'a> {
    platform: &'a dyn Platform,
    workspace: &'a Workspace,
}

impl<'a> Consumer<'a> {
    pub fn new(platform: &'a dyn Platform, workspace: &'a Workspace) -> Self {
        Self {
            platform,
            workspace,
        }
    }

    /// Best completed child of `parent_id` by the primary metric
    ///
    /// `None` when no child has completed with a value for the metric.
    pub async fn best_child(
        &self,
        parent_id: Uuid,
        metric: &PrimaryMetric,
        tie_break: TieBreak,
    ) -> Result<Option<Run>> {
        let children = self.platform.list_children(self.workspace, parent_id).await?;
        let best = select_best(&children, metric, tie_break).cloned();

        if let Some(run) = &best {
            info!(
                "Best child of {} is {} ({} = {:?})",
                parent_id,
                run.id,
                metric.name,
                run.metric(&metric.name)
            );
        }
        Ok(best)
    }

    /// Children of `parent_id`, best first
    pub async fn children_by_primary_metric(
        &self,
        parent_id: Uuid,
        metric: &PrimaryMetric,
    ) -> Result<Vec<Run>> {
        let children = self.platform.list_children(self.workspace, parent_id).await?;
        Ok(sort_by_primary_metric(&children, metric)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Register an artifact of a completed run as the next version of a model
    ///
    /// # Errors
    /// `Validation` when the run has not completed or did not write `path`.
    pub async fn register_model(&self, run: &Run, registration: ModelRegistration) -> Result<Model> {
        if registration.name.trim().is_empty() {
            return Err(ValidationError::EmptyField("model name").into());
        }

        if run.status != RunStatus::Completed {
            return Err(ValidationError::InvalidArtifact(format!(
                "run {} is {}, only completed runs can register models",
                run.id, run.status
            ))
            .into());
        }

        if !run.has_output(&registration.path) {
            return Err(ValidationError::InvalidArtifact(format!(
                "run {} has no output '{}'",
                run.id, registration.path
            ))
            .into());
        }

        let req = RegisterModel {
            run_id: run.id,
            name: registration.name,
            path: registration.path,
            tags: registration.tags,
            properties: registration.properties,
        };
        let model = self.platform.register_model(self.workspace, req).await?;
        info!("Registered model '{}' version {}", model.name, model.version);
        Ok(model)
    }

    /// Every version of every registered model
    pub async fn models(&self) -> Result<Vec<Model>> {
        self.platform.list_models(self.workspace).await
    }

    /// A model by name; the latest version when `version` is `None`
    pub async fn model(&self, name: &str, version: Option<u32>) -> Result<Model> {
        self.platform.get_model(self.workspace, name, version).await
    }

    /// Selected metrics of a run as model properties
    ///
    /// Metrics the run did not log are skipped.
    pub fn metric_properties(run: &Run, names: &[&str]) -> BTreeMap<String, String> {
        names
            .iter()
            .filter_map(|name| {
                run.metric(name)
                    .map(|value| (name.to_string(), value.to_string()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use crate::memory::InMemoryPlatform;
    use crate::registry::ResourceRegistry;
    use crate::tracking::Tracker;
    use lathe_core::domain::environment::Environment;
    use lathe_core::domain::workspace::WorkspaceIdentity;
    use lathe_core::dto::resource::ProvisioningConfig;
    use lathe_core::run_spec::RunSpec;
    use lathe_core::sweep::{GridSampling, SweepConfig};

    async fn sweep_fixture() -> (InMemoryPlatform, Workspace, Run, tempfile::TempDir) {
        let platform = InMemoryPlatform::new();
        let workspace =
            platform.add_workspace(&WorkspaceIdentity::new("aml-workspace", "sub-1", "aml-resources"));
        let registry = ResourceRegistry::new(&platform, &workspace);
        registry
            .ensure_compute("cpu-cluster", Some(ProvisioningConfig::new("STANDARD_DS11_V2", 2)))
            .await
            .unwrap();
        registry
            .register_environment(Environment::new("experiment_env"))
            .await
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("train.py"), "").unwrap();
        let spec = RunSpec::builder(dir.path(), "train.py")
            .environment("experiment_env")
            .compute_target("cpu-cluster")
            .build()
            .unwrap();
        let sweep = SweepConfig::new(
            spec,
            GridSampling::new().choice("learning_rate", [0.01, 0.1, 1.0]),
            PrimaryMetric::maximize("AUC"),
            3,
            3,
        )
        .unwrap();

        let parent = Tracker::new(&platform, &workspace)
            .submit_sweep("diabetes-sweep", &sweep)
            .await
            .unwrap();
        (platform, workspace, parent, dir)
    }

    fn complete(platform: &InMemoryPlatform, workspace: &Workspace, run: &Run, auc: f64) {
        platform.log_metric(workspace, run.id, "AUC", auc).unwrap();
        platform.log_metric(workspace, run.id, "Accuracy", 0.9).unwrap();
        platform
            .add_output(workspace, run.id, "outputs/diabetes_model.pkl")
            .unwrap();
        platform
            .finish_run(workspace, run.id, RunStatus::Completed, None)
            .unwrap();
    }

    #[tokio::test]
    async fn test_best_child_maximizes_and_breaks_ties_by_submission() {
        let (platform, workspace, parent, _dir) = sweep_fixture().await;
        let consumer = Consumer::new(&platform, &workspace);
        let children = platform.list_children(&workspace, parent.id).await.unwrap();

        complete(&platform, &workspace, &children[0], 0.91);
        complete(&platform, &workspace, &children[1], 0.85);
        complete(&platform, &workspace, &children[2], 0.91);

        let metric = PrimaryMetric::maximize("AUC");
        let earliest = consumer
            .best_child(parent.id, &metric, TieBreak::EarliestSubmitted)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(earliest.id, children[0].id);

        let latest = consumer
            .best_child(parent.id, &metric, TieBreak::LatestSubmitted)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.id, children[2].id);

        let ranked = consumer
            .children_by_primary_metric(parent.id, &metric)
            .await
            .unwrap();
        assert_eq!(ranked.last().unwrap().id, children[1].id);
    }

    #[tokio::test]
    async fn test_no_best_child_before_completion() {
        let (platform, workspace, parent, _dir) = sweep_fixture().await;
        let consumer = Consumer::new(&platform, &workspace);

        let best = consumer
            .best_child(parent.id, &PrimaryMetric::maximize("AUC"), TieBreak::default())
            .await
            .unwrap();
        assert!(best.is_none());
    }

    #[tokio::test]
    async fn test_register_model_versions_and_properties() {
        let (platform, workspace, parent, _dir) = sweep_fixture().await;
        let consumer = Consumer::new(&platform, &workspace);
        let children = platform.list_children(&workspace, parent.id).await.unwrap();
        complete(&platform, &workspace, &children[0], 0.88);
        let run = platform.get_run(&workspace, children[0].id).await.unwrap();

        let properties = Consumer::metric_properties(&run, &["AUC", "Accuracy", "Missing"]);
        assert_eq!(properties.len(), 2);
        assert_eq!(properties["AUC"], "0.88");

        let registration = ModelRegistration::new("diabetes_model", "outputs/diabetes_model.pkl")
            .tag("Training context", "Hyperdrive")
            .properties(properties);

        let v1 = consumer.register_model(&run, registration.clone()).await.unwrap();
        let v2 = consumer.register_model(&run, registration).await.unwrap();

        assert_eq!((v1.version, v2.version), (1, 2));
        assert_eq!(v2.run_id, run.id);
        assert_eq!(consumer.model("diabetes_model", None).await.unwrap().version, 2);
        assert_eq!(consumer.model("diabetes_model", Some(1)).await.unwrap().version, 1);
        assert_eq!(consumer.models().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_register_model_requires_completed_run_with_output() {
        let (platform, workspace, parent, _dir) = sweep_fixture().await;
        let consumer = Consumer::new(&platform, &workspace);
        let children = platform.list_children(&workspace, parent.id).await.unwrap();

        let queued = &children[0];
        let err = consumer
            .register_model(queued, ModelRegistration::new("diabetes_model", "outputs/diabetes_model.pkl"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Validation(ValidationError::InvalidArtifact(_))));

        complete(&platform, &workspace, &children[1], 0.8);
        let done = platform.get_run(&workspace, children[1].id).await.unwrap();
        let err = consumer
            .register_model(&done, ModelRegistration::new("diabetes_model", "outputs/other.pkl"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Validation(ValidationError::InvalidArtifact(_))));
        assert!(consumer.models().await.unwrap().is_empty());
    }
}
