//! Core domain types
//!
//! This module contains the structures the platform hands back to the client.
//! They are shared between the HTTP client (which deserializes them), the
//! in-memory platform (which stores them) and the CLI (which prints them).

pub mod environment;
pub mod model;
pub mod pipeline;
pub mod resource;
pub mod run;
pub mod service;
pub mod workspace;

/// Kind of named resource, used when reporting lookups and duplicates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Workspace,
    Datastore,
    Dataset,
    Compute,
    Environment,
    Run,
    Model,
    Pipeline,
    Schedule,
    Service,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ResourceKind::Workspace => "workspace",
            ResourceKind::Datastore => "datastore",
            ResourceKind::Dataset => "dataset",
            ResourceKind::Compute => "compute target",
            ResourceKind::Environment => "environment",
            ResourceKind::Run => "run",
            ResourceKind::Model => "model",
            ResourceKind::Pipeline => "published pipeline",
            ResourceKind::Schedule => "schedule",
            ResourceKind::Service => "service",
        };
        f.write_str(name)
    }
}
