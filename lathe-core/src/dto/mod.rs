//! Data Transfer Objects for talking to the platform
//!
//! Request and response bodies sent over the wire. Domain types that are
//! returned unchanged (runs, datasets, models, ...) live in [`crate::domain`].

pub mod model;
pub mod pipeline;
pub mod resource;
pub mod run;
pub mod service;
pub mod workspace;
