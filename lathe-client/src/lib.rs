//! Lathe Client
//!
//! A type-safe client for driving a managed machine-learning platform:
//! resolving a workspace, looking up or registering datastores, datasets,
//! compute targets and environments, submitting runs, sweeps and pipelines,
//! waiting for them, and registering the resulting models.
//!
//! Every remote operation goes through the [`Platform`] trait. Two
//! implementations are provided:
//! - [`PlatformClient`]: JSON over HTTP against the platform's REST API
//! - [`InMemoryPlatform`]: a local, deterministic stand-in used by tests and dry runs
//!
//! The workflow components take a `&dyn Platform` and a resolved
//! [`Workspace`](lathe_core::domain::workspace::Workspace) explicitly; there
//! is no ambient workspace.
//!
//! # Example
//!
//! ```no_run
//! use lathe_client::{PlatformClient, SessionResolver, Tracker, WaitOptions, WorkspaceCreation};
//! use lathe_client::config::WorkspaceConfig;
//! use lathe_core::run_spec::RunSpec;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let platform = PlatformClient::new("https://ml.example.com");
//!     let identity = WorkspaceConfig::from_file(".lathe/config.json")?.identity();
//!     let workspace = SessionResolver::new(&platform)
//!         .resolve(&identity, WorkspaceCreation::Never)
//!         .await?;
//!
//!     let spec = RunSpec::builder("./src", "train.py")
//!         .argument("reg_rate", 0.01)
//!         .environment("experiment_env")
//!         .compute_target("cpu-cluster")
//!         .build()?;
//!
//!     let tracker = Tracker::new(&platform, &workspace);
//!     let run = tracker.submit("training-experiment", &spec).await?;
//!     let run = tracker
//!         .wait_for_completion(run.id, &WaitOptions::new(Duration::from_secs(3600)))
//!         .await?;
//!
//!     println!("{} finished: {}", run.id, run.status);
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod batch;
pub mod config;
pub mod consumer;
pub mod endpoints;
pub mod error;
mod http;
pub mod memory;
pub mod platform;
pub mod registry;
pub mod session;
pub mod tracking;
pub mod wait;

// Re-export commonly used types
pub use auth::Credential;
pub use consumer::{Consumer, ModelRegistration};
pub use error::{ClientError, Result};
pub use memory::InMemoryPlatform;
pub use platform::Platform;
pub use registry::{DuplicatePolicy, ResourceRegistry};
pub use session::{SessionResolver, WorkspaceCreation};
pub use tracking::Tracker;
pub use wait::WaitOptions;

use lathe_core::domain::ResourceKind;
use lathe_core::domain::workspace::{Workspace, WorkspaceIdentity};
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;

/// HTTP client for the platform REST API
///
/// Routes are scoped below
/// `{base}/subscriptions/{sub}/resourceGroups/{rg}/workspaces/{name}`.
/// A [`Credential`] attached with [`PlatformClient::with_credential`] is sent
/// as a bearer token on every request.
#[derive(Debug, Clone)]
pub struct PlatformClient {
    /// Base URL of the platform (e.g., "https://ml.example.com")
    base_url: String,
    /// HTTP client instance
    client: Client,
    credential: Option<Credential>,
}

impl PlatformClient {
    /// Create a new platform client
    ///
    /// # Example
    /// ```
    /// use lathe_client::PlatformClient;
    ///
    /// let client = PlatformClient::new("http://localhost:8080");
    /// ```
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new platform client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    ///
    /// # Example
    /// ```
    /// use lathe_client::PlatformClient;
    /// use reqwest::Client;
    /// use std::time::Duration;
    ///
    /// let http_client = Client::builder()
    ///     .timeout(Duration::from_secs(30))
    ///     .build()
    ///     .unwrap();
    ///
    /// let client = PlatformClient::with_client("http://localhost:8080", http_client);
    /// ```
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            credential: None,
        }
    }

    /// Build a client from a validated [`config::ClientConfig`]
    pub fn from_config(config: &config::ClientConfig) -> Result<Self> {
        config.validate()?;
        let client = Client::builder().timeout(config.request_timeout).build()?;
        let platform = Self::with_client(&config.platform_url, client);
        Ok(match &config.token {
            Some(token) => platform.with_credential(Credential::bearer(token)),
            None => platform,
        })
    }

    /// Attach a credential sent with every request
    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Get the base URL of the platform
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // =============================================================================
    // Request Builders
    // =============================================================================

    /// URL made of the base URL followed by `segments`, each percent-encoded
    fn url<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ClientError::Config(format!("invalid platform URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| ClientError::Config("platform URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// URL of a workspace-scoped route
    fn workspace_url(&self, workspace: &Workspace, route: &[&str]) -> Result<Url> {
        self.url(workspace.scope_segments().into_iter().chain(route.iter().copied()))
    }

    /// URL of a workspace itself
    fn identity_url(&self, identity: &WorkspaceIdentity) -> Result<Url> {
        self.url(identity.scope_segments())
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.credential {
            Some(credential) => credential.apply(builder),
            None => builder,
        }
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    ///
    /// `kind` and `name` describe the addressed resource and end up in
    /// `NotFound` / `AlreadyExists` errors.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
        kind: ResourceKind,
        name: &str,
    ) -> Result<T> {
        let response = self.check_status(response, kind, name).await?;

        response
            .json()
            .await
            .map_err(|e| ClientError::Parse(format!("Failed to parse JSON response: {}", e)))
    }

    /// Handle an API response that returns no content (e.g., DELETE operations)
    async fn handle_empty_response(
        &self,
        response: reqwest::Response,
        kind: ResourceKind,
        name: &str,
    ) -> Result<()> {
        self.check_status(response, kind, name).await.map(|_| ())
    }

    async fn check_status(
        &self,
        response: reqwest::Response,
        kind: ResourceKind,
        name: &str,
    ) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                ClientError::Authentication(error_text)
            }
            StatusCode::NOT_FOUND => ClientError::not_found(kind, name),
            StatusCode::CONFLICT => ClientError::already_exists(kind, name),
            _ => ClientError::api_error(status.as_u16(), error_text),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn workspace() -> Workspace {
        Workspace {
            name: "aml-workspace".to_string(),
            subscription_id: "sub-1".to_string(),
            resource_group: "aml-resources".to_string(),
            location: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_client_creation() {
        let client = PlatformClient::new("http://localhost:8080");
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = PlatformClient::new("http://localhost:8080/");
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_client_with_custom_client() {
        let http_client = Client::new();
        let client = PlatformClient::with_client("http://localhost:8080", http_client);
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_workspace_url_encodes_segments() {
        let client = PlatformClient::new("http://localhost:8080/api");
        let url = client
            .workspace_url(&workspace(), &["datasets", "diabetes dataset", "versions", "latest"])
            .unwrap();

        assert_eq!(
            url.as_str(),
            "http://localhost:8080/api/subscriptions/sub-1/resourceGroups/aml-resources/workspaces/aml-workspace/datasets/diabetes%20dataset/versions/latest"
        );
    }
}
