//! Client configuration
//!
//! Two independent pieces:
//! - [`WorkspaceConfig`]: which workspace to use, read once from a JSON file
//! - [`ClientConfig`]: how to reach the platform (URL, credential, timings)

use lathe_core::domain::workspace::WorkspaceIdentity;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::{ClientError, Result};

/// File names searched by [`WorkspaceConfig::discover`], relative to each directory
const CONFIG_CANDIDATES: [&str; 2] = ["config.json", ".lathe/config.json"];

/// Workspace configuration file
///
/// ```json
/// {
///   "subscription_id": "0000-1111",
///   "resource_group": "aml-resources",
///   "workspace_name": "aml-workspace",
///   "location": "eastus"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    pub subscription_id: String,
    pub resource_group: String,
    pub workspace_name: String,
    #[serde(default)]
    pub location: Option<String>,
}

impl WorkspaceConfig {
    /// Load and validate a configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ClientError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;

        let config: WorkspaceConfig = serde_json::from_str(&contents).map_err(|e| {
            ClientError::Config(format!("cannot parse {}: {}", path.display(), e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Find a configuration file in `start_dir` or any of its ancestors
    ///
    /// Returns the path that was used together with the configuration.
    pub fn discover(start_dir: impl AsRef<Path>) -> Result<(PathBuf, Self)> {
        for dir in start_dir.as_ref().ancestors() {
            for candidate in CONFIG_CANDIDATES {
                let path = dir.join(candidate);
                if path.is_file() {
                    debug!("Using workspace config {}", path.display());
                    let config = Self::from_file(&path)?;
                    return Ok((path, config));
                }
            }
        }

        Err(ClientError::Config(format!(
            "no workspace config found in {} or its parents",
            start_dir.as_ref().display()
        )))
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.subscription_id.trim().is_empty() {
            return Err(ClientError::Config("subscription_id cannot be empty".to_string()));
        }

        if self.resource_group.trim().is_empty() {
            return Err(ClientError::Config("resource_group cannot be empty".to_string()));
        }

        if self.workspace_name.trim().is_empty() {
            return Err(ClientError::Config("workspace_name cannot be empty".to_string()));
        }

        Ok(())
    }

    pub fn identity(&self) -> WorkspaceIdentity {
        WorkspaceIdentity {
            name: self.workspace_name.clone(),
            subscription_id: self.subscription_id.clone(),
            resource_group: self.resource_group.clone(),
            location: self.location.clone(),
        }
    }
}

/// Connection settings for [`PlatformClient`](crate::PlatformClient)
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Platform base URL (e.g., "https://ml.example.com")
    pub platform_url: String,

    /// Bearer token sent with every request
    pub token: Option<String>,

    /// Upper bound on a single HTTP request
    pub request_timeout: Duration,

    /// Default interval between status polls during blocking waits
    pub poll_interval: Duration,
}

impl ClientConfig {
    /// Creates a new configuration with defaults
    pub fn new(platform_url: impl Into<String>) -> Self {
        Self {
            platform_url: platform_url.into(),
            token: None,
            request_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(5),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - LATHE_PLATFORM_URL (required)
    /// - LATHE_TOKEN (optional)
    /// - LATHE_REQUEST_TIMEOUT (optional, seconds, default: 30)
    /// - LATHE_POLL_INTERVAL (optional, seconds, default: 5)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let platform_url = lookup("LATHE_PLATFORM_URL").ok_or_else(|| {
            ClientError::Config("LATHE_PLATFORM_URL environment variable not set".to_string())
        })?;

        let seconds = |key: &str| {
            lookup(key)
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs)
        };

        let defaults = Self::new(platform_url);
        Ok(Self {
            token: lookup("LATHE_TOKEN").filter(|t| !t.trim().is_empty()),
            request_timeout: seconds("LATHE_REQUEST_TIMEOUT").unwrap_or(defaults.request_timeout),
            poll_interval: seconds("LATHE_POLL_INTERVAL").unwrap_or(defaults.poll_interval),
            ..defaults
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.platform_url.is_empty() {
            return Err(ClientError::Config("platform_url cannot be empty".to_string()));
        }

        if !self.platform_url.starts_with("http://") && !self.platform_url.starts_with("https://")
        {
            return Err(ClientError::Config(
                "platform_url must start with http:// or https://".to_string(),
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(ClientError::Config(
                "request_timeout must be greater than 0".to_string(),
            ));
        }

        if self.poll_interval.is_zero() {
            return Err(ClientError::Config(
                "poll_interval must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new("http://localhost:8080")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const CONFIG: &str = r#"{
        "subscription_id": "sub-1",
        "resource_group": "aml-resources",
        "workspace_name": "aml-workspace"
    }"#;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert!(config.token.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = ClientConfig::default();

        config.platform_url = "not-a-url".to_string();
        assert!(config.validate().is_err());

        config.platform_url = "https://ml.example.com".to_string();
        assert!(config.validate().is_ok());

        config.poll_interval = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("LATHE_PLATFORM_URL", "https://ml.example.com"),
            ("LATHE_TOKEN", "abc"),
            ("LATHE_POLL_INTERVAL", "2"),
            ("LATHE_REQUEST_TIMEOUT", "not-a-number"),
        ]);

        let config = ClientConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();

        assert_eq!(config.platform_url, "https://ml.example.com");
        assert_eq!(config.token.as_deref(), Some("abc"));
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_from_lookup_requires_url() {
        let result = ClientConfig::from_lookup(|_| None);
        assert!(matches!(result, Err(ClientError::Config(_))));
    }

    #[test]
    fn test_workspace_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, CONFIG).unwrap();

        let config = WorkspaceConfig::from_file(&path).unwrap();
        let identity = config.identity();

        assert_eq!(identity.name, "aml-workspace");
        assert_eq!(identity.resource_group, "aml-resources");
        assert!(identity.location.is_none());
    }

    #[test]
    fn test_workspace_config_rejects_blank_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"subscription_id": "", "resource_group": "rg", "workspace_name": "ws"}"#,
        )
        .unwrap();

        assert!(matches!(
            WorkspaceConfig::from_file(&path),
            Err(ClientError::Config(_))
        ));
    }

    #[test]
    fn test_discover_walks_up_to_dot_lathe() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".lathe")).unwrap();
        std::fs::write(dir.path().join(".lathe/config.json"), CONFIG).unwrap();

        let nested = dir.path().join("src/steps");
        std::fs::create_dir_all(&nested).unwrap();

        let (path, config) = WorkspaceConfig::discover(&nested).unwrap();
        assert_eq!(path, dir.path().join(".lathe/config.json"));
        assert_eq!(config.workspace_name, "aml-workspace");
    }
}
