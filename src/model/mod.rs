//! Compiler model: topology + devices -> ordered shaping plan.
//!
//! Everything here is pure. Loading happens in [`crate::input`], execution in [`crate::exec`].

pub mod clamp;
pub mod class_id;
pub mod compile;
pub mod error;
pub mod plan;
pub mod queue;
pub mod reconcile;

pub use clamp::{RateBounds, clamp};
pub use class_id::{ClassId, ClassIdAllocator};
pub use compile::{Capacity, Compilation, DeviceAssignment, NodeAssignment, ShapingParams, compile};
pub use error::CompileError;
pub use plan::{Direction, Operation, ShapingPlan};
pub use queue::QueueAssigner;
pub use reconcile::find_unshaped;
