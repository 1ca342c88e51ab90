//! REST implementation of [`Platform`] for [`PlatformClient`]

use async_trait::async_trait;
use lathe_core::domain::ResourceKind;
use lathe_core::domain::environment::Environment;
use lathe_core::domain::model::Model;
use lathe_core::domain::pipeline::{PublishedPipeline, Schedule};
use lathe_core::domain::resource::{ComputeTarget, Dataset, Datastore};
use lathe_core::domain::run::{Metrics, Run};
use lathe_core::domain::service::Service;
use lathe_core::domain::workspace::{Workspace, WorkspaceIdentity};
use lathe_core::dto::model::RegisterModel;
use lathe_core::dto::pipeline::{CreateSchedule, PublishPipeline};
use lathe_core::dto::resource::{CreateCompute, RegisterDataset, RegisterDatastore, UploadQuery};
use lathe_core::dto::run::{SubmitPipeline, SubmitRun, SubmitSweep};
use lathe_core::dto::service::DeployService;
use lathe_core::dto::workspace::CreateWorkspace;
use reqwest::Method;
use tracing::debug;
use uuid::Uuid;

use crate::PlatformClient;
use crate::error::Result;
use crate::platform::Platform;

/// Path segment selecting a version, `latest` when unpinned
fn version_segment(version: Option<u32>) -> String {
    version.map_or_else(|| "latest".to_string(), |v| v.to_string())
}

#[async_trait]
impl Platform for PlatformClient {
    // =============================================================================
    // Workspaces
    // =============================================================================

    async fn get_workspace(&self, identity: &WorkspaceIdentity) -> Result<Workspace> {
        let url = self.identity_url(identity)?;
        let response = self.request(Method::GET, url).send().await?;

        self.handle_response(response, ResourceKind::Workspace, &identity.name)
            .await
    }

    async fn create_workspace(&self, req: CreateWorkspace) -> Result<Workspace> {
        let identity = WorkspaceIdentity::new(&req.name, &req.subscription_id, &req.resource_group);
        let url = self.identity_url(&identity)?;
        let response = self.request(Method::PUT, url).json(&req).send().await?;

        self.handle_response(response, ResourceKind::Workspace, &req.name)
            .await
    }

    // =============================================================================
    // Datastores
    // =============================================================================

    async fn list_datastores(&self, workspace: &Workspace) -> Result<Vec<Datastore>> {
        let url = self.workspace_url(workspace, &["datastores"])?;
        let response = self.request(Method::GET, url).send().await?;

        self.handle_response(response, ResourceKind::Workspace, &workspace.name)
            .await
    }

    async fn get_datastore(&self, workspace: &Workspace, name: &str) -> Result<Datastore> {
        let url = self.workspace_url(workspace, &["datastores", name])?;
        let response = self.request(Method::GET, url).send().await?;

        self.handle_response(response, ResourceKind::Datastore, name)
            .await
    }

    async fn get_default_datastore(&self, workspace: &Workspace) -> Result<Datastore> {
        let url = self.workspace_url(workspace, &["datastores", "default"])?;
        let response = self.request(Method::GET, url).send().await?;

        self.handle_response(response, ResourceKind::Datastore, "default")
            .await
    }

    async fn set_default_datastore(
        &self,
        workspace: &Workspace,
        name: &str,
    ) -> Result<Datastore> {
        let url = self.workspace_url(workspace, &["datastores", name, "default"])?;
        let response = self.request(Method::PUT, url).send().await?;

        self.handle_response(response, ResourceKind::Datastore, name)
            .await
    }

    async fn register_datastore(
        &self,
        workspace: &Workspace,
        req: RegisterDatastore,
    ) -> Result<Datastore> {
        req.validate()?;
        let url = self.workspace_url(workspace, &["datastores"])?;
        let response = self.request(Method::POST, url).json(&req).send().await?;

        self.handle_response(response, ResourceKind::Datastore, &req.name)
            .await
    }

    async fn upload_file(
        &self,
        workspace: &Workspace,
        datastore: &str,
        target_path: &str,
        contents: Vec<u8>,
        overwrite: bool,
    ) -> Result<()> {
        let mut route = vec!["datastores", datastore, "files"];
        route.extend(target_path.split('/').filter(|s| !s.is_empty()));
        let url = self.workspace_url(workspace, &route)?;

        debug!("Uploading {} bytes to {}:{}", contents.len(), datastore, target_path);

        let response = self
            .request(Method::PUT, url)
            .query(&UploadQuery { overwrite })
            .body(contents)
            .send()
            .await?;

        self.handle_empty_response(response, ResourceKind::Datastore, target_path)
            .await
    }

    // =============================================================================
    // Datasets
    // =============================================================================

    async fn list_datasets(&self, workspace: &Workspace) -> Result<Vec<Dataset>> {
        let url = self.workspace_url(workspace, &["datasets"])?;
        let response = self.request(Method::GET, url).send().await?;

        self.handle_response(response, ResourceKind::Workspace, &workspace.name)
            .await
    }

    async fn get_dataset(
        &self,
        workspace: &Workspace,
        name: &str,
        version: Option<u32>,
    ) -> Result<Dataset> {
        let version = version_segment(version);
        let url = self.workspace_url(workspace, &["datasets", name, "versions", &version])?;
        let response = self.request(Method::GET, url).send().await?;

        self.handle_response(response, ResourceKind::Dataset, name)
            .await
    }

    async fn register_dataset(
        &self,
        workspace: &Workspace,
        req: RegisterDataset,
    ) -> Result<Dataset> {
        let url = self.workspace_url(workspace, &["datasets"])?;
        let response = self.request(Method::POST, url).json(&req).send().await?;

        self.handle_response(response, ResourceKind::Dataset, &req.name)
            .await
    }

    // =============================================================================
    // Compute Targets
    // =============================================================================

    async fn list_computes(&self, workspace: &Workspace) -> Result<Vec<ComputeTarget>> {
        let url = self.workspace_url(workspace, &["computes"])?;
        let response = self.request(Method::GET, url).send().await?;

        self.handle_response(response, ResourceKind::Workspace, &workspace.name)
            .await
    }

    async fn get_compute(&self, workspace: &Workspace, name: &str) -> Result<ComputeTarget> {
        let url = self.workspace_url(workspace, &["computes", name])?;
        let response = self.request(Method::GET, url).send().await?;

        self.handle_response(response, ResourceKind::Compute, name)
            .await
    }

    async fn create_compute(
        &self,
        workspace: &Workspace,
        req: CreateCompute,
    ) -> Result<ComputeTarget> {
        let url = self.workspace_url(workspace, &["computes"])?;
        let response = self.request(Method::POST, url).json(&req).send().await?;

        self.handle_response(response, ResourceKind::Compute, &req.name)
            .await
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
        let version = version_segment(version);
        let url =
            self.workspace_url(workspace, &["environments", name, "versions", &version])?;
        let response = self.request(Method::GET, url).send().await?;

        self.handle_response(response, ResourceKind::Environment, name)
            .await
    }

    async fn register_environment(
        &self,
        workspace: &Workspace,
        environment: Environment,
    ) -> Result<Environment> {
        let url = self.workspace_url(workspace, &["environments"])?;
        let response = self
            .request(Method::POST, url)
            .json(&environment)
            .send()
            .await?;

        self.handle_response(response, ResourceKind::Environment, &environment.name)
            .await
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
        let url = self.workspace_url(workspace, &["experiments", experiment, "runs"])?;
        let response = self.request(Method::POST, url).json(&req).send().await?;

        self.handle_response(response, ResourceKind::Run, experiment)
            .await
    }

    async fn submit_sweep(
        &self,
        workspace: &Workspace,
        experiment: &str,
        req: SubmitSweep,
    ) -> Result<Run> {
        let url = self.workspace_url(workspace, &["experiments", experiment, "sweeps"])?;
        let response = self.request(Method::POST, url).json(&req).send().await?;

        self.handle_response(response, ResourceKind::Run, experiment)
            .await
    }

    async fn submit_pipeline(
        &self,
        workspace: &Workspace,
        experiment: &str,
        req: SubmitPipeline,
    ) -> Result<Run> {
        let url = self.workspace_url(workspace, &["experiments", experiment, "pipelines"])?;
        let response = self.request(Method::POST, url).json(&req).send().await?;

        self.handle_response(response, ResourceKind::Run, experiment)
            .await
    }

    async fn get_run(&self, workspace: &Workspace, run_id: Uuid) -> Result<Run> {
        let id = run_id.to_string();
        let url = self.workspace_url(workspace, &["runs", &id])?;
        let response = self.request(Method::GET, url).send().await?;

        self.handle_response(response, ResourceKind::Run, &id).await
    }

    async fn list_runs(&self, workspace: &Workspace, experiment: &str) -> Result<Vec<Run>> {
        let url = self.workspace_url(workspace, &["experiments", experiment, "runs"])?;
        let response = self.request(Method::GET, url).send().await?;

        self.handle_response(response, ResourceKind::Run, experiment)
            .await
    }

    async fn list_children(&self, workspace: &Workspace, run_id: Uuid) -> Result<Vec<Run>> {
        let id = run_id.to_string();
        let url = self.workspace_url(workspace, &["runs", &id, "children"])?;
        let response = self.request(Method::GET, url).send().await?;

        self.handle_response(response, ResourceKind::Run, &id).await
    }

    async fn get_metrics(&self, workspace: &Workspace, run_id: Uuid) -> Result<Metrics> {
        let id = run_id.to_string();
        let url = self.workspace_url(workspace, &["runs", &id, "metrics"])?;
        let response = self.request(Method::GET, url).send().await?;

        self.handle_response(response, ResourceKind::Run, &id).await
    }

    async fn cancel_run(&self, workspace: &Workspace, run_id: Uuid) -> Result<Run> {
        let id = run_id.to_string();
        let url = self.workspace_url(workspace, &["runs", &id, "cancel"])?;
        let response = self.request(Method::POST, url).send().await?;

        self.handle_response(response, ResourceKind::Run, &id).await
    }

    // =============================================================================
    // Models
    // =============================================================================

    async fn register_model(&self, workspace: &Workspace, req: RegisterModel) -> Result<Model> {
        let url = self.workspace_url(workspace, &["models"])?;
        let response = self.request(Method::POST, url).json(&req).send().await?;

        self.handle_response(response, ResourceKind::Model, &req.name)
            .await
    }

    async fn list_models(&self, workspace: &Workspace) -> Result<Vec<Model>> {
        let url = self.workspace_url(workspace, &["models"])?;
        let response = self.request(Method::GET, url).send().await?;

        self.handle_response(response, ResourceKind::Workspace, &workspace.name)
            .await
    }

    async fn get_model(
        &self,
        workspace: &Workspace,
        name: &str,
        version: Option<u32>,
    ) -> Result<Model> {
        let version = version_segment(version);
        let url = self.workspace_url(workspace, &["models", name, "versions", &version])?;
        let response = self.request(Method::GET, url).send().await?;

        self.handle_response(response, ResourceKind::Model, name)
            .await
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
        let id = run_id.to_string();
        let url = self.workspace_url(workspace, &["runs", &id, "publish"])?;
        let response = self.request(Method::POST, url).json(&req).send().await?;

        self.handle_response(response, ResourceKind::Run, &id).await
    }

    async fn create_schedule(
        &self,
        workspace: &Workspace,
        req: CreateSchedule,
    ) -> Result<Schedule> {
        let url = self.workspace_url(workspace, &["schedules"])?;
        let response = self.request(Method::POST, url).json(&req).send().await?;

        self.handle_response(response, ResourceKind::Schedule, &req.name)
            .await
    }

    // =============================================================================
    // Services
    // =============================================================================

    async fn deploy_service(&self, workspace: &Workspace, req: DeployService) -> Result<Service> {
        let url = self.workspace_url(workspace, &["services"])?;
        let response = self.request(Method::POST, url).json(&req).send().await?;

        self.handle_response(response, ResourceKind::Service, &req.name)
            .await
    }

    async fn get_service(&self, workspace: &Workspace, name: &str) -> Result<Service> {
        let url = self.workspace_url(workspace, &["services", name])?;
        let response = self.request(Method::GET, url).send().await?;

        self.handle_response(response, ResourceKind::Service, name)
            .await
    }

    async fn delete_service(&self, workspace: &Workspace, name: &str) -> Result<()> {
        let url = self.workspace_url(workspace, &["services", name])?;
        let response = self.request(Method::DELETE, url).send().await?;

        self.handle_empty_response(response, ResourceKind::Service, name)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Credential;
    use crate::error::ClientError;
    use chrono::Utc;
    use mockito::{Matcher, Server};

    const SCOPE: &str = "/subscriptions/sub-1/resourceGroups/aml-resources/workspaces/aml-workspace";

    fn workspace() -> Workspace {
        Workspace {
            name: "aml-workspace".to_string(),
            subscription_id: "sub-1".to_string(),
            resource_group: "aml-resources".to_string(),
            location: Some("eastus".to_string()),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_get_workspace_sends_bearer_token() {
        let mut server = Server::new_async().await;
        let body = serde_json::to_string(&workspace()).unwrap();
        let mock = server
            .mock("GET", SCOPE)
            .match_header("authorization", "Bearer token-1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await;

        let client = PlatformClient::new(server.url()).with_credential(Credential::bearer("token-1"));
        let resolved = client
            .get_workspace(&workspace().identity())
            .await
            .unwrap();

        assert_eq!(resolved.name, "aml-workspace");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_status_codes_map_to_error_taxonomy() {
        let mut server = Server::new_async().await;
        let _unauthorized = server
            .mock("GET", format!("{SCOPE}/computes/cpu-cluster").as_str())
            .with_status(401)
            .with_body("token expired")
            .create_async()
            .await;
        let _missing = server
            .mock("GET", format!("{SCOPE}/datasets/diabetes%20dataset/versions/latest").as_str())
            .with_status(404)
            .create_async()
            .await;
        let _conflict = server
            .mock("POST", format!("{SCOPE}/datastores").as_str())
            .with_status(409)
            .create_async()
            .await;
        let _broken = server
            .mock("GET", format!("{SCOPE}/models").as_str())
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let client = PlatformClient::new(server.url());
        let ws = workspace();

        let err = client.get_compute(&ws, "cpu-cluster").await.unwrap_err();
        assert!(matches!(err, ClientError::Authentication(ref msg) if msg == "token expired"));

        let err = client
            .get_dataset(&ws, "diabetes dataset", None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::NotFound { kind: ResourceKind::Dataset, ref name } if name == "diabetes dataset"
        ));

        let err = client
            .register_datastore(
                &ws,
                RegisterDatastore {
                    name: "blob_data".to_string(),
                    account_name: "acct".to_string(),
                    container_name: "data".to_string(),
                    overwrite: false,
                },
            )
            .await
            .unwrap_err();
        assert!(err.is_already_exists());

        let err = client.list_models(&ws).await.unwrap_err();
        assert!(err.is_server_error());
    }

    #[tokio::test]
    async fn test_upload_file_puts_bytes_with_overwrite_query() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock(
                "PUT",
                format!("{SCOPE}/datastores/workspaceblobstore/files/batch-data/1.csv").as_str(),
            )
            .match_query(Matcher::UrlEncoded("overwrite".to_string(), "true".to_string()))
            .match_body("1,2,3")
            .with_status(204)
            .create_async()
            .await;

        let client = PlatformClient::new(server.url());
        client
            .upload_file(
                &workspace(),
                "workspaceblobstore",
                "batch-data/1.csv",
                b"1,2,3".to_vec(),
                true,
            )
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_metrics_parses_plain_map() {
        let mut server = Server::new_async().await;
        let run_id = Uuid::new_v4();
        let _mock = server
            .mock("GET", format!("{SCOPE}/runs/{run_id}/metrics").as_str())
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"AUC": 0.85, "Accuracy": 0.79}"#)
            .create_async()
            .await;

        let client = PlatformClient::new(server.url());
        let metrics = client.get_metrics(&workspace(), run_id).await.unwrap();

        assert_eq!(metrics.get("AUC"), Some(0.85));
        assert_eq!(metrics.get("Accuracy"), Some(0.79));
    }

    #[tokio::test]
    async fn test_unparseable_body_is_parse_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", format!("{SCOPE}/services/diabetes-service").as_str())
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let client = PlatformClient::new(server.url());
        let err = client
            .get_service(&workspace(), "diabetes-service")
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Parse(_)));
    }
}
