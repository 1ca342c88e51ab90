//! Configuration module
//!
//! Handles CLI configuration: how to reach the platform and which
//! workspace to act on.

use anyhow::{Context, Result};
use lathe_client::config::{ClientConfig, WorkspaceConfig};
use lathe_client::{
    Consumer, PlatformClient, ResourceRegistry, SessionResolver, Tracker, WaitOptions,
};
use lathe_core::domain::workspace::{Workspace, WorkspaceIdentity};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Platform connection settings
    pub client: ClientConfig,
    /// Explicit workspace config file
    pub workspace_config: Option<PathBuf>,
}

impl Config {
    /// HTTP client for the configured platform
    pub fn platform(&self) -> Result<PlatformClient> {
        PlatformClient::from_config(&self.client).context("Invalid platform configuration")
    }

    /// Workspace identity from `--config` or the nearest config file
    pub fn workspace_identity(&self) -> Result<WorkspaceIdentity> {
        let config = match &self.workspace_config {
            Some(path) => WorkspaceConfig::from_file(path)
                .with_context(|| format!("Failed to load workspace config {}", path.display()))?,
            None => {
                let cwd = std::env::current_dir().context("Failed to read current directory")?;
                let (path, config) = WorkspaceConfig::discover(&cwd)
                    .context("No workspace config found; pass --config")?;
                debug!("Using workspace config {}", path.display());
                config
            }
        };
        Ok(config.identity())
    }

    /// Connect to the platform and resolve the configured workspace
    pub async fn connect(&self) -> Result<Session> {
        let platform = self.platform()?;
        let identity = self.workspace_identity()?;
        let workspace = SessionResolver::new(&platform)
            .existing(&identity)
            .await
            .with_context(|| format!("Failed to resolve workspace '{}'", identity.name))?;

        Ok(Session {
            platform,
            workspace,
        })
    }

    /// Wait options for a blocking command
    ///
    /// Without a timeout the wait lasts until the awaited object settles or
    /// the user presses Ctrl-C.
    pub fn wait_options(&self, timeout_secs: Option<u64>) -> WaitOptions {
        let options = match timeout_secs {
            Some(secs) => WaitOptions::new(Duration::from_secs(secs)),
            None => WaitOptions::unbounded(),
        };

        let token = CancellationToken::new();
        let interrupted = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                interrupted.cancel();
            }
        });

        options
            .with_poll_interval(self.client.poll_interval)
            .with_cancellation(token)
    }
}

/// A platform client bound to a resolved workspace
pub struct Session {
    pub platform: PlatformClient,
    pub workspace: Workspace,
}

impl Session {
    pub fn registry(&self) -> ResourceRegistry<'_> {
        ResourceRegistry::new(&self.platform, &self.workspace)
    }

    pub fn tracker(&self) -> Tracker<'_> {
        Tracker::new(&self.platform, &self.workspace)
    }

    pub fn consumer(&self) -> Consumer<'_> {
        Consumer::new(&self.platform, &self.workspace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(path: Option<PathBuf>) -> Config {
        Config {
            client: ClientConfig::default(),
            workspace_config: path,
        }
    }

    #[test]
    fn test_workspace_identity_from_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ws.json");
        std::fs::write(
            &path,
            r#"{"subscription_id": "sub-1", "resource_group": "aml-resources", "workspace_name": "aml-workspace"}"#,
        )
        .unwrap();

        let identity = config_with(Some(path)).workspace_identity().unwrap();

        assert_eq!(identity.name, "aml-workspace");
        assert_eq!(identity.resource_group, "aml-resources");
        assert!(identity.location.is_none());
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = config_with(Some(dir.path().join("absent.json"))).workspace_identity();
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_platform_url_rejected() {
        let config = Config {
            client: ClientConfig::new("ftp://ml.example.com"),
            workspace_config: None,
        };
        assert!(config.platform().is_err());
    }

    #[tokio::test]
    async fn test_wait_options_use_configured_poll_interval() {
        let mut config = config_with(None);
        config.client.poll_interval = Duration::from_secs(2);

        let options = config.wait_options(Some(60));

        assert_eq!(options.poll_interval, Duration::from_secs(2));
        assert_eq!(options.timeout, Some(Duration::from_secs(60)));
        assert!(options.cancellation.is_some());
        assert!(config.wait_options(None).timeout.is_none());
    }
}
