//! The shaping plan: an ordered list of operations for an external executor.
//!
//! Operations must be applied in emitted order. Parents are always emitted before their
//! children and a node's class before the classes of devices attached to it.

use crate::model::class_id::ClassId;
use serde::Serialize;
use std::fmt;
use std::net::Ipv4Addr;

/// Priority given to the per-queue default class.
pub const DEFAULT_CLASS_PRIORITY: u32 = 5;
/// Priority given to node and device classes.
pub const SHAPED_CLASS_PRIORITY: u32 = 3;

/// Traffic direction. Download classes live on interface A, upload classes on interface B.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Download,
    Upload,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Download => f.write_str("download"),
            Self::Upload => f.write_str("upload"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Multi-queue root group holding one HTB per hardware queue.
    CreateRootQueueGroup { interface: String, queues: u16 },
    /// Per-queue HTB and its root class `q:1`.
    CreateQueueRoot {
        interface: String,
        queue: u16,
        capacity_mbps: u32,
    },
    /// Per-queue default class `q:2` for unclassified traffic.
    CreateDefaultClass {
        interface: String,
        queue: u16,
        capacity_mbps: u32,
    },
    CreateClass {
        interface: String,
        parent: ClassId,
        class: ClassId,
        rate_mbps: u32,
        ceil_mbps: u32,
        priority: u32,
    },
    AttachLeafQueueDiscipline {
        interface: String,
        class: ClassId,
        discipline: String,
    },
    /// Steer `ip` to `queue` (and its CPU) and classify it into `class`.
    BindFlowToQueue {
        ip: Ipv4Addr,
        queue: u16,
        class: ClassId,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ShapingPlan {
    operations: Vec<Operation>,
}

impl ShapingPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: Operation) {
        self.operations.push(op);
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Operation> {
        self.operations.iter()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// All `CreateClass` operations for `class`, one per interface.
    #[cfg(test)]
    pub fn classes_for(&self, class: ClassId) -> Vec<&Operation> {
        self.operations
            .iter()
            .filter(|op| matches!(op, Operation::CreateClass { class: c, .. } if *c == class))
            .collect()
    }
}

impl<'a> IntoIterator for &'a ShapingPlan {
    type Item = &'a Operation;
    type IntoIter = std::slice::Iter<'a, Operation>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
