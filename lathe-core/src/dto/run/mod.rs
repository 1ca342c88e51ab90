//! Run submission DTOs

use serde::{Deserialize, Serialize};

use crate::pipeline::CompiledPipeline;
use crate::run_spec::RunSpec;
use crate::sweep::SweepConfig;

/// Request to submit a single script run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRun {
    pub spec: RunSpec,
    /// Arguments as the entry script will receive them
    pub arguments: Vec<String>,
}

impl From<&RunSpec> for SubmitRun {
    fn from(spec: &RunSpec) -> Self {
        Self {
            spec: spec.clone(),
            arguments: spec.rendered_arguments(),
        }
    }
}

/// Request to submit a hyperparameter sweep
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitSweep {
    pub sweep: SweepConfig,
}

/// Request to submit a compiled pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitPipeline {
    pub pipeline: CompiledPipeline,
    /// Ignore reusable step results and run every step again
    pub regenerate_outputs: bool,
}
