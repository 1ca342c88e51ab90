//! Pipeline construction
//!
//! A pipeline is an ordered chain of steps. Each step is a [`RunSpec`] plus
//! the outputs it declares. A later step consumes an earlier step's output
//! by passing the [`OutputRef`] as an argument; the link is only checked
//! when the pipeline is compiled.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::error::{Result, ValidationError};
use crate::run_spec::{ArgValue, OutputRef, RunSpec};

/// One step of a pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineStep {
    pub name: String,
    pub spec: RunSpec,
    pub outputs: Vec<OutputRef>,
    /// Reuse a previous result when inputs and source are unchanged
    pub allow_reuse: bool,
}

impl PipelineStep {
    pub fn new(name: impl Into<String>, spec: RunSpec) -> Self {
        Self {
            name: name.into(),
            spec,
            outputs: Vec::new(),
            allow_reuse: true,
        }
    }

    /// Declare an output this step writes
    pub fn output(mut self, name: impl Into<String>) -> Self {
        self.outputs.push(OutputRef::new(name));
        self
    }

    pub fn allow_reuse(mut self, allow: bool) -> Self {
        self.allow_reuse = allow;
        self
    }

    fn declares(&self, output: &OutputRef) -> bool {
        self.outputs.contains(output)
    }
}

/// Data dependency between two steps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepLink {
    pub from_step: String,
    pub to_step: String,
    pub output: OutputRef,
}

/// Pipeline under construction
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    name: String,
    steps: Vec<PipelineStep>,
}

/// Entry point for building pipelines
pub struct Pipeline;

impl Pipeline {
    pub fn builder(name: impl Into<String>) -> PipelineBuilder {
        PipelineBuilder {
            name: name.into(),
            steps: Vec::new(),
        }
    }
}

impl PipelineBuilder {
    /// Append a step; steps run in the order they are added
    pub fn step(mut self, step: PipelineStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Check step ordering and resolve every output reference
    ///
    /// # Errors
    /// Returns a [`ValidationError`] if:
    /// - the pipeline has no steps
    /// - two steps share a name or declare the same output
    /// - a step consumes an output no earlier step declares
    pub fn compile(self) -> Result<CompiledPipeline> {
        if self.steps.is_empty() {
            return Err(ValidationError::EmptyPipeline(self.name));
        }

        let mut step_names = HashSet::new();
        let mut producers: HashMap<&OutputRef, &str> = HashMap::new();
        let mut links = Vec::new();

        for step in &self.steps {
            if step.name.trim().is_empty() {
                return Err(ValidationError::EmptyField("step name"));
            }
            if !step_names.insert(step.name.as_str()) {
                return Err(ValidationError::DuplicateStep(step.name.clone()));
            }

            for output in step.spec.consumed_outputs() {
                // A step binds its own declared outputs as write locations
                if step.declares(output) {
                    continue;
                }
                let producer = producers.get(output).ok_or_else(|| {
                    ValidationError::UnresolvedOutput {
                        step: step.name.clone(),
                        output: output.name.clone(),
                    }
                })?;
                links.push(StepLink {
                    from_step: producer.to_string(),
                    to_step: step.name.clone(),
                    output: output.clone(),
                });
            }

            for output in &step.outputs {
                if producers.insert(output, &step.name).is_some() {
                    return Err(ValidationError::DuplicateOutput(output.name.clone()));
                }
            }
        }

        Ok(CompiledPipeline {
            name: self.name,
            steps: self.steps,
            links,
        })
    }
}

/// A pipeline whose data references are all resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledPipeline {
    name: String,
    steps: Vec<PipelineStep>,
    links: Vec<StepLink>,
}

impl CompiledPipeline {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[PipelineStep] {
        &self.steps
    }

    pub fn links(&self) -> &[StepLink] {
        &self.links
    }

    /// Inputs of `step` that come from earlier steps
    pub fn inputs_of(&self, step: &str) -> Vec<&OutputRef> {
        self.links
            .iter()
            .filter(|link| link.to_step == step)
            .map(|link| &link.output)
            .collect()
    }
}

// =============================================================================
// Manifests
// =============================================================================

/// YAML description of a pipeline, as accepted by the CLI
///
/// ```yaml
/// name: diabetes-training
/// environment: aml-env
/// compute_target: cpu-cluster
/// steps:
///   - name: Prepare Data
///     source_directory: ./src
///     script: prep_diabetes.py
///     outputs: [prepped_data]
///     arguments:
///       - [input-data, { dataset: diabetes dataset, alias: raw_data }]
///       - [prepped-data, { output: prepped_data }]
///   - name: Train and Register Model
///     source_directory: ./src
///     script: train_diabetes.py
///     arguments:
///       - [training-data, { output: prepped_data }]
/// ```
///
/// Arguments are a list of `[name, value]` pairs so their order is kept.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineManifest {
    pub name: String,
    pub environment: String,
    pub compute_target: String,
    #[serde(default)]
    pub use_docker: bool,
    pub steps: Vec<StepManifest>,
}

/// One step of a [`PipelineManifest`]
#[derive(Debug, Clone, Deserialize)]
pub struct StepManifest {
    pub name: String,
    pub source_directory: PathBuf,
    pub script: String,
    #[serde(default)]
    pub arguments: Vec<(String, ManifestValue)>,
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default = "default_allow_reuse")]
    pub allow_reuse: bool,
}

fn default_allow_reuse() -> bool {
    true
}

/// Argument value as written in a manifest
///
/// `[verbose, true]` passes `--verbose` as a bare flag and
/// `[verbose, false]` leaves the argument out.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ManifestValue {
    Output { output: String },
    Dataset {
        dataset: String,
        alias: String,
        #[serde(default)]
        version: Option<u32>,
    },
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl ManifestValue {
    /// Value for a fixed script argument, `None` when it is switched off
    pub fn into_argument(self) -> Option<ArgValue> {
        match self {
            ManifestValue::Bool(true) => Some(ArgValue::Flag),
            ManifestValue::Bool(false) => None,
            value => Some(value.into()),
        }
    }
}

/// Booleans convert to their text form, since a swept choice always needs a value.
impl From<ManifestValue> for ArgValue {
    fn from(value: ManifestValue) -> Self {
        match value {
            ManifestValue::Output { output } => ArgValue::StepOutput(OutputRef::new(output)),
            ManifestValue::Dataset {
                dataset,
                alias,
                version,
            } => ArgValue::Dataset(crate::domain::resource::DatasetInput {
                dataset,
                version,
                alias,
            }),
            ManifestValue::Bool(value) => ArgValue::Text(value.to_string()),
            ManifestValue::Integer(value) => ArgValue::Integer(value),
            ManifestValue::Float(value) => ArgValue::Float(value),
            ManifestValue::Text(value) => ArgValue::Text(value),
        }
    }
}

impl PipelineManifest {
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

    /// Build and compile the described pipeline
    ///
    /// Relative source directories are resolved against `base_dir`.
    pub fn compile(self, base_dir: &Path) -> Result<CompiledPipeline> {
        let mut builder = Pipeline::builder(self.name);

        for step in self.steps {
            let mut spec = RunSpec::builder(base_dir.join(&step.source_directory), step.script)
                .environment(&self.environment)
                .compute_target(&self.compute_target)
                .use_docker(self.use_docker);
            for (name, value) in step.arguments {
                if let Some(value) = value.into_argument() {
                    spec = spec.argument(name, value);
                }
            }

            let mut pipeline_step =
                PipelineStep::new(step.name, spec.build()?).allow_reuse(step.allow_reuse);
            for output in step.outputs {
                pipeline_step = pipeline_step.output(output);
            }
            builder = builder.step(pipeline_step);
        }

        builder.compile()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn source_dir() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("prep.py"), "").unwrap();
        std::fs::write(dir.path().join("train.py"), "").unwrap();
        dir
    }

    fn spec(dir: &Path, script: &str, args: Vec<(&str, ArgValue)>) -> RunSpec {
        let mut builder = RunSpec::builder(dir, script)
            .environment("aml-env")
            .compute_target("cpu-cluster");
        for (name, value) in args {
            builder = builder.argument(name, value);
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_chain_links_output_to_next_input() {
        let dir = source_dir();
        let prepped = OutputRef::new("prepped_data");

        let pipeline = Pipeline::builder("diabetes-training")
            .step(
                PipelineStep::new(
                    "Prepare Data",
                    spec(
                        dir.path(),
                        "prep.py",
                        vec![("prepped-data", prepped.clone().into())],
                    ),
                )
                .output("prepped_data"),
            )
            .step(PipelineStep::new(
                "Train",
                spec(
                    dir.path(),
                    "train.py",
                    vec![("training-data", prepped.clone().into())],
                ),
            ))
            .compile()
            .unwrap();

        assert_eq!(pipeline.steps().len(), 2);
        assert_eq!(
            pipeline.links(),
            &[StepLink {
                from_step: "Prepare Data".to_string(),
                to_step: "Train".to_string(),
                output: prepped.clone(),
            }]
        );
        assert_eq!(pipeline.inputs_of("Train"), vec![&prepped]);
        assert!(pipeline.inputs_of("Prepare Data").is_empty());
    }

    #[test]
    fn test_unresolved_output_fails() {
        let dir = source_dir();
        let result = Pipeline::builder("broken")
            .step(PipelineStep::new("Prepare Data", spec(dir.path(), "prep.py", vec![])))
            .step(PipelineStep::new(
                "Train",
                spec(
                    dir.path(),
                    "train.py",
                    vec![("training-data", OutputRef::new("prepped_data").into())],
                ),
            ))
            .compile();

        assert_eq!(
            result.unwrap_err(),
            ValidationError::UnresolvedOutput {
                step: "Train".to_string(),
                output: "prepped_data".to_string(),
            }
        );
    }

    #[test]
    fn test_output_from_later_step_fails() {
        let dir = source_dir();
        let result = Pipeline::builder("backwards")
            .step(PipelineStep::new(
                "Train",
                spec(
                    dir.path(),
                    "train.py",
                    vec![("training-data", OutputRef::new("prepped_data").into())],
                ),
            ))
            .step(
                PipelineStep::new("Prepare Data", spec(dir.path(), "prep.py", vec![]))
                    .output("prepped_data"),
            )
            .compile();

        assert!(matches!(
            result,
            Err(ValidationError::UnresolvedOutput { .. })
        ));
    }

    #[test]
    fn test_empty_and_duplicate_steps_fail() {
        assert!(matches!(
            Pipeline::builder("empty").compile(),
            Err(ValidationError::EmptyPipeline(_))
        ));

        let dir = source_dir();
        let result = Pipeline::builder("dupes")
            .step(PipelineStep::new("Train", spec(dir.path(), "train.py", vec![])))
            .step(PipelineStep::new("Train", spec(dir.path(), "train.py", vec![])))
            .compile();
        assert_eq!(
            result.unwrap_err(),
            ValidationError::DuplicateStep("Train".to_string())
        );
    }

    #[test]
    fn test_manifest_compiles_relative_to_base_dir() {
        let dir = source_dir();
        let yaml = r#"
name: diabetes-training
environment: aml-env
compute_target: cpu-cluster
steps:
  - name: Prepare Data
    source_directory: .
    script: prep.py
    outputs: [prepped_data]
    arguments:
      - [input-data, { dataset: diabetes dataset, alias: raw_data }]
      - [prepped-data, { output: prepped_data }]
  - name: Train
    source_directory: .
    script: train.py
    arguments:
      - [training-data, { output: prepped_data }]
      - [reg_rate, 0.01]
"#;
        let manifest_path = dir.path().join("pipeline.yml");
        std::fs::write(&manifest_path, yaml).unwrap();

        let manifest = PipelineManifest::from_file(&manifest_path).unwrap();
        let pipeline = manifest.compile(dir.path()).unwrap();

        assert_eq!(pipeline.name(), "diabetes-training");
        assert_eq!(pipeline.links().len(), 1);
        assert_eq!(
            pipeline.steps()[1].spec.rendered_arguments(),
            vec!["--training-data", "${{outputs.prepped_data}}", "--reg_rate", "0.01"]
        );
    }

    #[test]
    fn test_manifest_boolean_arguments_toggle_flags() {
        let dir = source_dir();
        let yaml = r#"
name: flags
environment: aml-env
compute_target: cpu-cluster
steps:
  - name: Train
    source_directory: .
    script: train.py
    arguments:
      - [verbose, true]
      - [dry-run, false]
      - [reg_rate, 0.01]
"#;
        let manifest_path = dir.path().join("pipeline.yml");
        std::fs::write(&manifest_path, yaml).unwrap();

        let pipeline = PipelineManifest::from_file(&manifest_path)
            .unwrap()
            .compile(dir.path())
            .unwrap();

        assert_eq!(
            pipeline.steps()[0].spec.rendered_arguments(),
            vec!["--verbose", "--reg_rate", "0.01"]
        );
    }
}
