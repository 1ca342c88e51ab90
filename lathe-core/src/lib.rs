//! Lathe Core
//!
//! Core types and abstractions for driving a managed machine-learning platform.
//!
//! This crate contains:
//! - Domain types: workspace, registered resources, runs, models, services
//! - DTOs: request and response bodies exchanged with the platform
//! - Pure builders: run specifications, pipelines and hyperparameter sweeps
//! - Best-run selection over completed child runs
//!
//! Nothing here talks to the network; that lives in `lathe-client`.

pub mod domain;
pub mod dto;
pub mod error;
pub mod pipeline;
pub mod run_spec;
pub mod selection;
pub mod sweep;

pub use error::ValidationError;
