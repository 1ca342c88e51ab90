//! Deployed web service types

use serde::{Deserialize, Serialize};

/// Deployment state of a model web service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceState {
    Transitioning,
    Healthy,
    Unhealthy,
    Failed,
}

impl ServiceState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ServiceState::Transitioning)
    }
}

impl std::fmt::Display for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceState::Transitioning => write!(f, "Transitioning"),
            ServiceState::Healthy => write!(f, "Healthy"),
            ServiceState::Unhealthy => write!(f, "Unhealthy"),
            ServiceState::Failed => write!(f, "Failed"),
        }
    }
}

/// Model reference deployed behind a service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelReference {
    pub name: String,
    pub version: u32,
}

/// A model deployed as a real-time scoring web service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    pub models: Vec<ModelReference>,
    pub state: ServiceState,
    /// Set once the deployment is reachable
    pub scoring_uri: Option<String>,
}
