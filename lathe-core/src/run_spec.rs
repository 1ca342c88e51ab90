//! Run specifications
//!
//! A [`RunSpec`] describes one unit of work: which script to run from which
//! source directory, with which arguments, in which environment, on which
//! compute target. It is assembled locally with [`RunSpecBuilder`], validated
//! once, and never changes afterwards.
//!
//! Arguments are typed and named rather than a positional list of mixed
//! values. They are rendered to `--name value` pairs only when the run is
//! described to the platform.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::domain::resource::DatasetInput;
use crate::error::{Result, ValidationError};

/// Named output produced by one pipeline step and consumed by a later one
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutputRef {
    pub name: String,
}

impl OutputRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Value of a script argument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArgValue {
    Text(String),
    Integer(i64),
    Float(f64),
    /// Bare switch, rendered without a value
    Flag,
    /// Registered dataset mounted for the run
    Dataset(DatasetInput),
    /// Output of an earlier pipeline step, resolved when the pipeline compiles
    StepOutput(OutputRef),
}

impl ArgValue {
    fn render(&self) -> Option<String> {
        match self {
            ArgValue::Text(text) => Some(text.clone()),
            ArgValue::Integer(value) => Some(value.to_string()),
            ArgValue::Float(value) => Some(value.to_string()),
            ArgValue::Flag => None,
            ArgValue::Dataset(input) => Some(format!("${{{{inputs.{}}}}}", input.alias)),
            ArgValue::StepOutput(output) => Some(format!("${{{{outputs.{}}}}}", output.name)),
        }
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        ArgValue::Text(value.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(value: String) -> Self {
        ArgValue::Text(value)
    }
}

impl From<i64> for ArgValue {
    fn from(value: i64) -> Self {
        ArgValue::Integer(value)
    }
}

impl From<f64> for ArgValue {
    fn from(value: f64) -> Self {
        ArgValue::Float(value)
    }
}

impl From<DatasetInput> for ArgValue {
    fn from(value: DatasetInput) -> Self {
        ArgValue::Dataset(value)
    }
}

impl From<OutputRef> for ArgValue {
    fn from(value: OutputRef) -> Self {
        ArgValue::StepOutput(value)
    }
}

/// A named script argument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptArgument {
    /// Name without leading dashes (`reg_rate` for `--reg_rate`)
    pub name: String,
    pub value: ArgValue,
}

impl ScriptArgument {
    pub fn new(name: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        Self {
            name: normalize_name(&name.into()),
            value: value.into(),
        }
    }

    /// Render as command-line tokens
    pub fn render(&self) -> Vec<String> {
        let mut tokens = vec![format!("--{}", self.name)];
        if let Some(value) = self.value.render() {
            tokens.push(value);
        }
        tokens
    }
}

/// Strip leading dashes so `--reg_rate` and `reg_rate` name the same argument
pub(crate) fn normalize_name(name: &str) -> String {
    name.trim_start_matches('-').to_string()
}

/// Check a list of arguments for bad or repeated names
pub(crate) fn validate_arguments<'a>(
    arguments: impl IntoIterator<Item = &'a ScriptArgument>,
) -> Result<()> {
    let mut seen = std::collections::HashSet::new();
    for argument in arguments {
        if argument.name.is_empty() || argument.name.chars().any(char::is_whitespace) {
            return Err(ValidationError::InvalidArgumentName(argument.name.clone()));
        }
        if !seen.insert(argument.name.as_str()) {
            return Err(ValidationError::DuplicateArgument(argument.name.clone()));
        }
    }
    Ok(())
}

/// Execution switches
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOptions {
    /// Run inside a container built from the environment
    pub use_docker: bool,
}

/// Immutable description of a script run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSpec {
    source_directory: PathBuf,
    entry_script: String,
    arguments: Vec<ScriptArgument>,
    environment: String,
    compute_target: String,
    options: ExecutionOptions,
}

impl RunSpec {
    /// Start building a specification for `entry_script` inside `source_directory`
    pub fn builder(
        source_directory: impl Into<PathBuf>,
        entry_script: impl Into<String>,
    ) -> RunSpecBuilder {
        RunSpecBuilder {
            source_directory: source_directory.into(),
            entry_script: entry_script.into(),
            arguments: Vec::new(),
            environment: String::new(),
            compute_target: String::new(),
            options: ExecutionOptions::default(),
        }
    }

    pub fn source_directory(&self) -> &Path {
        &self.source_directory
    }

    pub fn entry_script(&self) -> &str {
        &self.entry_script
    }

    pub fn arguments(&self) -> &[ScriptArgument] {
        &self.arguments
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn compute_target(&self) -> &str {
        &self.compute_target
    }

    pub fn options(&self) -> &ExecutionOptions {
        &self.options
    }

    /// Arguments rendered as the entry script will receive them
    pub fn rendered_arguments(&self) -> Vec<String> {
        self.arguments.iter().flat_map(ScriptArgument::render).collect()
    }

    /// Outputs of earlier pipeline steps this specification consumes
    pub fn consumed_outputs(&self) -> impl Iterator<Item = &OutputRef> {
        self.arguments.iter().filter_map(|argument| match &argument.value {
            ArgValue::StepOutput(output) => Some(output),
            _ => None,
        })
    }

    /// A copy of this specification with extra arguments appended
    ///
    /// Used to derive sweep children; the result is validated again.
    pub fn with_extra_arguments(&self, extra: Vec<ScriptArgument>) -> Result<RunSpec> {
        let mut spec = self.clone();
        spec.arguments.extend(extra);
        validate_arguments(&spec.arguments)?;
        Ok(spec)
    }
}

/// Builder for [`RunSpec`]
#[derive(Debug, Clone)]
pub struct RunSpecBuilder {
    source_directory: PathBuf,
    entry_script: String,
    arguments: Vec<ScriptArgument>,
    environment: String,
    compute_target: String,
    options: ExecutionOptions,
}

impl RunSpecBuilder {
    /// Add a named argument (`--name value`)
    pub fn argument(mut self, name: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.arguments.push(ScriptArgument::new(name, value));
        self
    }

    /// Add a bare switch (`--name`)
    pub fn flag(mut self, name: impl Into<String>) -> Self {
        self.arguments.push(ScriptArgument::new(name, ArgValue::Flag));
        self
    }

    pub fn environment(mut self, name: impl Into<String>) -> Self {
        self.environment = name.into();
        self
    }

    pub fn compute_target(mut self, name: impl Into<String>) -> Self {
        self.compute_target = name.into();
        self
    }

    pub fn use_docker(mut self, enabled: bool) -> Self {
        self.options.use_docker = enabled;
        self
    }

    /// Validate and freeze the specification
    ///
    /// # Errors
    /// Returns a [`ValidationError`] if:
    /// - the source directory does not exist or is not a directory
    /// - the entry script is not a file inside it
    /// - environment or compute target are empty
    /// - an argument name is malformed or repeated
    pub fn build(self) -> Result<RunSpec> {
        if !self.source_directory.is_dir() {
            return Err(ValidationError::SourceDirectoryMissing(
                self.source_directory,
            ));
        }

        if self.entry_script.trim().is_empty() {
            return Err(ValidationError::EmptyField("entry script"));
        }

        if !self.source_directory.join(&self.entry_script).is_file() {
            return Err(ValidationError::EntryScriptMissing {
                directory: self.source_directory,
                script: self.entry_script,
            });
        }

        if self.environment.trim().is_empty() {
            return Err(ValidationError::EmptyField("environment"));
        }

        if self.compute_target.trim().is_empty() {
            return Err(ValidationError::EmptyField("compute target"));
        }

        validate_arguments(&self.arguments)?;

        Ok(RunSpec {
            source_directory: self.source_directory,
            entry_script: self.entry_script,
            arguments: self.arguments,
            environment: self.environment,
            compute_target: self.compute_target,
            options: self.options,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn source_dir() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("train.py"), "print('training')").unwrap();
        dir
    }

    #[test]
    fn test_build_valid_spec() {
        let dir = source_dir();
        let spec = RunSpec::builder(dir.path(), "train.py")
            .argument("--reg_rate", 0.01)
            .environment("experiment_env")
            .compute_target("cpu-cluster")
            .use_docker(true)
            .build()
            .unwrap();

        assert_eq!(spec.entry_script(), "train.py");
        assert_eq!(spec.rendered_arguments(), vec!["--reg_rate", "0.01"]);
        assert!(spec.options().use_docker);
    }

    #[test]
    fn test_missing_source_directory() {
        let result = RunSpec::builder("/no/such/source", "train.py")
            .environment("env")
            .compute_target("cpu-cluster")
            .build();

        assert!(matches!(
            result,
            Err(ValidationError::SourceDirectoryMissing(_))
        ));
    }

    #[test]
    fn test_missing_entry_script() {
        let dir = source_dir();
        let result = RunSpec::builder(dir.path(), "score.py")
            .environment("env")
            .compute_target("cpu-cluster")
            .build();

        assert!(matches!(
            result,
            Err(ValidationError::EntryScriptMissing { .. })
        ));
    }

    #[test]
    fn test_missing_environment_and_compute() {
        let dir = source_dir();
        let result = RunSpec::builder(dir.path(), "train.py")
            .compute_target("cpu-cluster")
            .build();
        assert_eq!(result.unwrap_err(), ValidationError::EmptyField("environment"));

        let result = RunSpec::builder(dir.path(), "train.py")
            .environment("env")
            .build();
        assert_eq!(
            result.unwrap_err(),
            ValidationError::EmptyField("compute target")
        );
    }

    #[test]
    fn test_duplicate_argument_rejected() {
        let dir = source_dir();
        let result = RunSpec::builder(dir.path(), "train.py")
            .argument("reg_rate", 0.01)
            .argument("--reg_rate", 0.1)
            .environment("env")
            .compute_target("cpu-cluster")
            .build();

        assert_eq!(
            result.unwrap_err(),
            ValidationError::DuplicateArgument("reg_rate".to_string())
        );
    }

    #[test]
    fn test_invalid_argument_name_rejected() {
        let dir = source_dir();
        let result = RunSpec::builder(dir.path(), "train.py")
            .argument("reg rate", 0.01)
            .environment("env")
            .compute_target("cpu-cluster")
            .build();

        assert!(matches!(
            result,
            Err(ValidationError::InvalidArgumentName(_))
        ));
    }

    #[test]
    fn test_render_mixed_arguments() {
        let dir = source_dir();
        let input = DatasetInput {
            dataset: "diabetes dataset".to_string(),
            version: Some(1),
            alias: "training_data".to_string(),
        };
        let spec = RunSpec::builder(dir.path(), "train.py")
            .argument("input-data", input)
            .argument("n_estimators", 100i64)
            .flag("verbose")
            .argument("prepped-data", OutputRef::new("prepped_data"))
            .environment("env")
            .compute_target("cpu-cluster")
            .build()
            .unwrap();

        assert_eq!(
            spec.rendered_arguments(),
            vec![
                "--input-data",
                "${{inputs.training_data}}",
                "--n_estimators",
                "100",
                "--verbose",
                "--prepped-data",
                "${{outputs.prepped_data}}",
            ]
        );
        assert_eq!(
            spec.consumed_outputs().collect::<Vec<_>>(),
            vec![&OutputRef::new("prepped_data")]
        );
    }
}
