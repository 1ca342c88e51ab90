//! Environment domain types
//!
//! An environment is the named, versioned dependency manifest the platform
//! builds an execution container from. Locally it is usually loaded from a
//! conda-style YAML file:
//!
//! ```yaml
//! name: experiment_env
//! dependencies:
//!   - python=3.8
//!   - scikit-learn
//!   - pip:
//!       - azureml-defaults
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, ValidationError};

/// A software environment definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub name: String,
    /// Assigned by the platform on registration; 0 for unregistered definitions
    #[serde(default)]
    pub version: u32,
    pub python_version: Option<String>,
    #[serde(default)]
    pub conda_packages: Vec<String>,
    #[serde(default)]
    pub pip_packages: Vec<String>,
    #[serde(default)]
    pub docker_enabled: bool,
}

impl Environment {
    /// Create an empty environment definition
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: 0,
            python_version: None,
            conda_packages: Vec::new(),
            pip_packages: Vec::new(),
            docker_enabled: false,
        }
    }

    pub fn with_pip_package(mut self, package: impl Into<String>) -> Self {
        self.pip_packages.push(package.into());
        self
    }

    pub fn with_conda_package(mut self, package: impl Into<String>) -> Self {
        self.conda_packages.push(package.into());
        self
    }

    pub fn with_docker(mut self, enabled: bool) -> Self {
        self.docker_enabled = enabled;
        self
    }

    /// Whether two definitions describe the same dependencies
    ///
    /// Versions are ignored; registering an identical definition is a no-op.
    pub fn same_definition(&self, other: &Environment) -> bool {
        self.name == other.name
            && self.python_version == other.python_version
            && self.conda_packages == other.conda_packages
            && self.pip_packages == other.pip_packages
            && self.docker_enabled == other.docker_enabled
    }

    /// Load a definition from a conda specification file
    ///
    /// The environment is named `name`, not after the `name:` key of the file.
    pub fn from_conda_file(name: impl Into<String>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents =
            std::fs::read_to_string(path).map_err(|e| ValidationError::InvalidManifest {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        Self::from_conda_yaml(name, &contents).map_err(|message| {
            ValidationError::InvalidManifest {
                path: path.to_path_buf(),
                message,
            }
        })
    }

    /// Parse a conda specification from YAML text
    pub fn from_conda_yaml(
        name: impl Into<String>,
        yaml: &str,
    ) -> std::result::Result<Self, String> {
        let spec: CondaSpec = serde_yaml::from_str(yaml).map_err(|e| e.to_string())?;

        let mut environment = Environment::new(name);
        for dependency in spec.dependencies {
            match dependency {
                CondaDependency::Package(package) => {
                    if let Some(version) = package.strip_prefix("python=") {
                        environment.python_version = Some(version.to_string());
                    } else {
                        environment.conda_packages.push(package);
                    }
                }
                CondaDependency::Pip { pip } => environment.pip_packages.extend(pip),
            }
        }

        Ok(environment)
    }
}

#[derive(Debug, Deserialize)]
struct CondaSpec {
    #[serde(default)]
    dependencies: Vec<CondaDependency>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CondaDependency {
    Package(String),
    Pip { pip: Vec<String> },
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONDA_SPEC: &str = r#"
name: experiment_env
dependencies:
  - python=3.8
  - scikit-learn
  - pandas
  - pip:
      - azureml-defaults
      - azureml-mlflow
"#;

    #[test]
    fn test_parse_conda_yaml() {
        let env = Environment::from_conda_yaml("aml-env", CONDA_SPEC).unwrap();

        assert_eq!(env.name, "aml-env");
        assert_eq!(env.python_version.as_deref(), Some("3.8"));
        assert_eq!(env.conda_packages, vec!["scikit-learn", "pandas"]);
        assert_eq!(env.pip_packages, vec!["azureml-defaults", "azureml-mlflow"]);
        assert_eq!(env.version, 0);
    }

    #[test]
    fn test_conda_file_missing() {
        let result = Environment::from_conda_file("env", "/definitely/not/here.yml");
        assert!(matches!(
            result,
            Err(ValidationError::InvalidManifest { .. })
        ));
    }

    #[test]
    fn test_same_definition_ignores_version() {
        let a = Environment::new("env").with_pip_package("scikit-learn");
        let mut b = a.clone();
        b.version = 3;
        assert!(a.same_definition(&b));

        let c = a.clone().with_pip_package("pandas");
        assert!(!a.same_definition(&c));
    }
}
