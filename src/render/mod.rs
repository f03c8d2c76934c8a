//! Renderers for a compiled plan.
//!
//! - `tc`: shell command lines for `tc` and the flow-steering helper
//! - `json`: machine-readable dump of the plan and assignments

pub mod json;
pub mod tc;

pub use json::render_json;
pub use tc::{clear_prior_settings, flow_steering_setup, render_operation, render_plan};
