//! Run domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// One execution instance of a script, sweep or pipeline on the platform
///
/// The client only ever reads runs. Status, metrics and outputs are written
/// by the remote executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: Uuid,
    pub experiment: String,
    pub kind: RunKind,
    pub parent_id: Option<Uuid>,
    pub status: RunStatus,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Arguments as passed to the entry script
    #[serde(default)]
    pub arguments: Vec<String>,
    /// Latest value per metric name
    #[serde(default)]
    pub metrics: Metrics,
    /// Artifact paths produced by the run (e.g. `outputs/model.pkl`)
    #[serde(default)]
    pub outputs: Vec<String>,
    pub error: Option<String>,
}

impl Run {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Value of a metric, if the run logged it
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name)
    }

    /// Whether the run produced the given artifact
    pub fn has_output(&self, path: &str) -> bool {
        self.outputs.iter().any(|output| output == path)
    }
}

/// What a run executes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunKind {
    /// A single entry script
    Script,
    /// Parent of a hyperparameter sweep
    Sweep,
    /// Parent of a pipeline
    Pipeline,
    /// One step of a pipeline
    Step,
}

/// Run lifecycle status
///
/// `Queued → Running → Completed | Failed | Canceled`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Canceled,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Canceled
        )
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Queued => write!(f, "Queued"),
            RunStatus::Running => write!(f, "Running"),
            RunStatus::Completed => write!(f, "Completed"),
            RunStatus::Failed => write!(f, "Failed"),
            RunStatus::Canceled => write!(f, "Canceled"),
        }
    }
}

/// Scalar metrics logged by a run, last write wins
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metrics(BTreeMap<String, f64>);

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    /// Record a value, replacing any earlier one
    pub fn record(&mut self, name: impl Into<String>, value: f64) {
        self.0.insert(name.into(), value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(name, value)| (name.as_str(), *value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, f64)> for Metrics {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Direction in which a primary metric improves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricGoal {
    Maximize,
    Minimize,
}

/// The scalar metric used to rank child runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryMetric {
    pub name: String,
    pub goal: MetricGoal,
}

impl PrimaryMetric {
    pub fn maximize(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            goal: MetricGoal::Maximize,
        }
    }

    pub fn minimize(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            goal: MetricGoal::Minimize,
        }
    }
}
