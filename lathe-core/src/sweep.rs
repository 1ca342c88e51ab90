//! Hyperparameter sweeps
//!
//! A sweep runs the same [`RunSpec`] once per point of a parameter grid and
//! ranks the child runs by a primary metric. Parallelism is only forwarded to
//! the platform; nothing here schedules work.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::domain::run::PrimaryMetric;
use crate::error::{Result, ValidationError};
use crate::pipeline::ManifestValue;
use crate::run_spec::{ArgValue, RunSpec, ScriptArgument, normalize_name};

/// Discrete set of values for one hyperparameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub name: String,
    pub values: Vec<ArgValue>,
}

/// Exhaustive grid over discrete choices
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GridSampling {
    parameters: Vec<Choice>,
}

impl GridSampling {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter and the values to try for it
    pub fn choice<V: Into<ArgValue>>(
        mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.parameters.push(Choice {
            name: normalize_name(&name.into()),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn parameters(&self) -> &[Choice] {
        &self.parameters
    }

    /// Number of grid points
    pub fn len(&self) -> usize {
        if self.parameters.is_empty() {
            return 0;
        }
        self.parameters.iter().map(|p| p.values.len()).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every combination, first parameter varying slowest
    pub fn combinations(&self) -> Vec<Vec<ScriptArgument>> {
        if self.is_empty() {
            return Vec::new();
        }

        let mut combinations: Vec<Vec<ScriptArgument>> = vec![Vec::new()];
        for parameter in &self.parameters {
            combinations = combinations
                .into_iter()
                .flat_map(|prefix| {
                    parameter.values.iter().map(move |value| {
                        let mut next = prefix.clone();
                        next.push(ScriptArgument {
                            name: parameter.name.clone(),
                            value: value.clone(),
                        });
                        next
                    })
                })
                .collect();
        }
        combinations
    }
}

/// Complete description of a sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    pub run_spec: RunSpec,
    pub sampling: GridSampling,
    pub primary_metric: PrimaryMetric,
    pub max_total_runs: u32,
    pub max_concurrent_runs: u32,
}

impl SweepConfig {
    /// Validate and assemble a sweep
    ///
    /// # Errors
    /// Returns a [`ValidationError`] if the metric name is empty, the grid is
    /// empty, a swept parameter collides with a fixed argument, or the run
    /// limits are not `1 <= max_concurrent_runs <= max_total_runs`.
    pub fn new(
        run_spec: RunSpec,
        sampling: GridSampling,
        primary_metric: PrimaryMetric,
        max_total_runs: u32,
        max_concurrent_runs: u32,
    ) -> Result<Self> {
        if primary_metric.name.trim().is_empty() {
            return Err(ValidationError::EmptyField("primary metric"));
        }

        if sampling.is_empty() {
            return Err(ValidationError::InvalidSweep(
                "parameter grid is empty".to_string(),
            ));
        }

        if let Some(clash) = sampling
            .parameters()
            .iter()
            .find(|p| run_spec.arguments().iter().any(|a| a.name == p.name))
        {
            return Err(ValidationError::InvalidSweep(format!(
                "'--{}' is both fixed and swept",
                clash.name
            )));
        }

        if max_total_runs == 0 {
            return Err(ValidationError::InvalidSweep(
                "max_total_runs must be at least 1".to_string(),
            ));
        }

        if max_concurrent_runs == 0 || max_concurrent_runs > max_total_runs {
            return Err(ValidationError::InvalidSweep(format!(
                "max_concurrent_runs must be between 1 and {max_total_runs}"
            )));
        }

        Ok(Self {
            run_spec,
            sampling,
            primary_metric,
            max_total_runs,
            max_concurrent_runs,
        })
    }

    /// Specifications of the child runs, in submission order
    ///
    /// Truncated to `max_total_runs` grid points.
    pub fn child_specs(&self) -> Result<Vec<RunSpec>> {
        self.sampling
            .combinations()
            .into_iter()
            .take(self.max_total_runs as usize)
            .map(|sampled| self.run_spec.with_extra_arguments(sampled))
            .collect()
    }
}

// =============================================================================
// Manifests
// =============================================================================

/// YAML description of a sweep, as accepted by the CLI
///
/// ```yaml
/// source_directory: ./diabetes-training
/// script: diabetes_training.py
/// environment: experiment_env
/// compute_target: cpu-cluster
/// arguments:
///   - [training-data, { dataset: diabetes dataset, alias: training_data }]
/// parameters:
///   learning_rate: [0.01, 0.1, 1.0]
///   n_estimators: [10, 100]
/// primary_metric:
///   name: AUC
///   goal: Maximize
/// max_total_runs: 6
/// max_concurrent_runs: 2
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct SweepManifest {
    pub source_directory: PathBuf,
    pub script: String,
    pub environment: String,
    pub compute_target: String,
    #[serde(default)]
    pub use_docker: bool,
    #[serde(default)]
    pub arguments: Vec<(String, ManifestValue)>,
    /// Swept parameters; map order is the grid order
    pub parameters: IndexedChoices,
    pub primary_metric: PrimaryMetric,
    pub max_total_runs: u32,
    pub max_concurrent_runs: u32,
}

/// Swept parameters in the order they were written
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "serde_yaml::Mapping")]
pub struct IndexedChoices(Vec<(String, Vec<ManifestValue>)>);

impl TryFrom<serde_yaml::Mapping> for IndexedChoices {
    type Error = String;

    fn try_from(mapping: serde_yaml::Mapping) -> std::result::Result<Self, Self::Error> {
        mapping
            .into_iter()
            .map(|(key, values)| {
                let name = key
                    .as_str()
                    .ok_or_else(|| "parameter names must be strings".to_string())?
                    .to_string();
                let values = serde_yaml::from_value(values)
                    .map_err(|e| format!("parameter '{name}': {e}"))?;
                Ok((name, values))
            })
            .collect::<std::result::Result<Vec<_>, String>>()
            .map(Self)
    }
}

impl SweepManifest {
    /// Read a manifest from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let invalid = |message: String| ValidationError::InvalidManifest {
            path: path.to_path_buf(),
            message,
        };
        let contents = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
        serde_yaml::from_str(&contents).map_err(|e| invalid(e.to_string()))
    }

    /// Build and validate the described sweep
    ///
    /// Relative source directories are resolved against `base_dir`.
    pub fn build(self, base_dir: &Path) -> Result<SweepConfig> {
        let mut spec = RunSpec::builder(base_dir.join(&self.source_directory), self.script)
            .environment(&self.environment)
            .compute_target(&self.compute_target)
            .use_docker(self.use_docker);
        for (name, value) in self.arguments {
            if let Some(value) = value.into_argument() {
                spec = spec.argument(name, value);
            }
        }

        let mut sampling = GridSampling::new();
        for (name, values) in self.parameters.0 {
            sampling = sampling.choice(name, values.into_iter().map(ArgValue::from));
        }

        SweepConfig::new(
            spec.build()?,
            sampling,
            self.primary_metric,
            self.max_total_runs,
            self.max_concurrent_runs,
        )
    }
}
