//! Hierarchical bandwidth shaping planner.
//!
//! Turns a nested network topology plus a flat subscriber device list into an ordered plan of
//! HTB class / qdisc operations and CPU flow bindings, then renders and (optionally) applies it.
//!
//! Layering follows the data flow:
//! - [`input`]: loaders for the device CSV and the topology JSON
//! - [`config`]: run configuration
//! - [`model`]: the pure topology-to-plan compiler
//! - [`render`]: plan -> shell commands / JSON
//! - [`exec`]: command executors (dry-run and shell)
//! - [`host`]: hardware queue probing

pub mod config;
pub mod exec;
pub mod host;
pub mod input;
pub mod model;
pub mod render;

pub type Result<T> = anyhow::Result<T>;
