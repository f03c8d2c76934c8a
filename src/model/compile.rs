//! Topology-to-plan compilation.
//!
//! Depth-first walk over the topology forest. Every node gets one class per interface; every
//! device hanging off a node gets its own class beneath it plus, when it has an IPv4 address, a
//! flow binding to the node's hardware queue. Top-level branches are spread across queues
//! round-robin and everything beneath a branch stays on that branch's major.

use crate::input::{Device, NetworkNode, Topology};
use crate::model::clamp::{RateBounds, checked_mbps, clamp};
use crate::model::class_id::{ClassId, ClassIdAllocator};
use crate::model::error::CompileError;
use crate::model::plan::{Direction, Operation, SHAPED_CLASS_PRIORITY, ShapingPlan};
use crate::model::queue::QueueAssigner;
use crate::model::reconcile::{find_unshaped, warn_unshaped};

use serde::Serialize;
use std::collections::BTreeMap;

/// A download/upload pair in whole Mbps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capacity {
    pub download_mbps: u32,
    pub upload_mbps: u32,
}

impl Capacity {
    pub const fn new(download_mbps: u32, upload_mbps: u32) -> Self {
        Self {
            download_mbps,
            upload_mbps,
        }
    }
}

/// Global parameters for one compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapingParams {
    /// Carries the download hierarchy.
    pub interface_a: String,
    /// Carries the upload hierarchy.
    pub interface_b: String,
    /// Capacity of each queue's root class.
    pub upstream: Capacity,
    /// Ceiling of each queue's default class; a quarter of it is guaranteed.
    pub default_class: Capacity,
    pub queues: u16,
    /// Queue discipline attached beneath every class, e.g. `fq_codel` or `cake diffserv4`.
    pub leaf_qdisc: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeAssignment {
    pub name: String,
    pub depth: usize,
    pub queue: u16,
    pub parent: ClassId,
    pub class: ClassId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceAssignment {
    pub device_id: String,
    pub hostname: String,
    pub node: String,
    pub queue: u16,
    pub class: ClassId,
    pub download: RateBounds,
    pub upload: RateBounds,
}

/// Result of one compilation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Compilation {
    pub plan: ShapingPlan,
    /// Topology nodes in traversal order.
    pub nodes: Vec<NodeAssignment>,
    /// Shaped devices keyed by their index in the input device list.
    pub devices: BTreeMap<usize, DeviceAssignment>,
    /// Ids of devices whose parent matched no node, in input order.
    pub unshaped: Vec<String>,
}

impl Compilation {
    pub fn shaped_count(&self) -> usize {
        self.devices.len()
    }

    pub fn node(&self, name: &str) -> Option<&NodeAssignment> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn device(&self, id: &str) -> Option<&DeviceAssignment> {
        self.devices.values().find(|d| d.device_id == id)
    }
}

/// Compile `topology` and `devices` into a plan.
///
/// Deterministic: the same inputs always produce the same plan. All counter state lives in this
/// call, so concurrent compilations are independent.
pub fn compile(
    topology: &Topology,
    devices: &[Device],
    params: &ShapingParams,
) -> Result<Compilation, CompileError> {
    let mut compiler = TreeCompiler::new(devices, params)?;
    compiler.emit_queue_roots();
    compiler.walk_level(&topology.roots, 0, None)?;
    let compilation = compiler.finish();

    tracing::info!(
        operations = compilation.plan.len(),
        nodes = compilation.nodes.len(),
        shaped = compilation.shaped_count(),
        unshaped = compilation.unshaped.len(),
        "compiled shaping plan"
    );
    Ok(compilation)
}

/// Position in the tree the next class attaches to.
#[derive(Debug, Clone, Copy)]
struct Branch {
    queue: u16,
    major: u16,
    parent: ClassId,
}

struct TreeCompiler<'a> {
    devices: &'a [Device],
    params: &'a ShapingParams,
    minors: ClassIdAllocator,
    queues: QueueAssigner,
    plan: ShapingPlan,
    nodes: Vec<NodeAssignment>,
    assigned: BTreeMap<usize, DeviceAssignment>,
}

impl<'a> TreeCompiler<'a> {
    fn new(devices: &'a [Device], params: &'a ShapingParams) -> Result<Self, CompileError> {
        Ok(Self {
            devices,
            params,
            minors: ClassIdAllocator::new(),
            queues: QueueAssigner::new(params.queues)?,
            plan: ShapingPlan::new(),
            nodes: Vec::new(),
            assigned: BTreeMap::new(),
        })
    }

    /// Multi-queue root, then per queue: the root class and the default class, each with a leaf
    /// qdisc. Download side (interface A) first.
    fn emit_queue_roots(&mut self) {
        let p = self.params;
        for (interface, upstream, default) in [
            (
                &p.interface_a,
                p.upstream.download_mbps,
                p.default_class.download_mbps,
            ),
            (
                &p.interface_b,
                p.upstream.upload_mbps,
                p.default_class.upload_mbps,
            ),
        ] {
            self.plan.push(Operation::CreateRootQueueGroup {
                interface: interface.clone(),
                queues: p.queues,
            });
            for queue in 1..=p.queues {
                self.plan.push(Operation::CreateQueueRoot {
                    interface: interface.clone(),
                    queue,
                    capacity_mbps: upstream,
                });
                self.attach_leaf(interface, ClassId::queue_root(queue));
                self.plan.push(Operation::CreateDefaultClass {
                    interface: interface.clone(),
                    queue,
                    capacity_mbps: default,
                });
                self.attach_leaf(interface, ClassId::queue_default(queue));
            }
        }
    }

    /// Compile one sibling set. `inherited` is `None` for the top level, where each branch takes
    /// the queue the assigner currently points at.
    fn walk_level(
        &mut self,
        nodes: &[NetworkNode],
        depth: usize,
        inherited: Option<Branch>,
    ) -> Result<(), CompileError> {
        for node in nodes {
            let branch = inherited.unwrap_or_else(|| Branch {
                queue: self.queues.queue(),
                major: self.queues.major(),
                parent: ClassId::queue_root(self.queues.major()),
            });

            self.walk_node(node, depth, branch)?;

            if depth == 0 {
                self.queues.advance();
            }
        }
        Ok(())
    }

    fn walk_node(
        &mut self,
        node: &NetworkNode,
        depth: usize,
        branch: Branch,
    ) -> Result<(), CompileError> {
        let download = node_bounds(node, Direction::Download)?;
        let upload = node_bounds(node, Direction::Upload)?;
        let ceilings = Capacity::new(download.max, upload.max);

        let class = self.minors.next_class(branch.major)?;
        tracing::debug!(
            depth,
            node = %node.name,
            %class,
            parent = %branch.parent,
            queue = branch.queue,
            download = node.download_mbps,
            upload = node.upload_mbps,
            "node class"
        );

        self.emit_class_pair(branch.parent, class, download, upload);
        self.nodes.push(NodeAssignment {
            name: node.name.clone(),
            depth,
            queue: branch.queue,
            parent: branch.parent,
            class,
        });

        // A device binds to the first node (in traversal order) carrying its parent's name.
        let devices = self.devices;
        for (idx, device) in devices.iter().enumerate() {
            if device.parent_node != node.name || self.assigned.contains_key(&idx) {
                continue;
            }
            self.attach_device(idx, device, node, ceilings, class, branch)?;
        }

        if !node.children.is_empty() {
            let below = Branch {
                parent: class,
                ..branch
            };
            self.walk_level(&node.children, depth + 1, Some(below))?;
        }
        Ok(())
    }

    fn attach_device(
        &mut self,
        idx: usize,
        device: &Device,
        node: &NetworkNode,
        ceilings: Capacity,
        node_class: ClassId,
        branch: Branch,
    ) -> Result<(), CompileError> {
        check_device(device)?;

        let download = clamp(
            device.download_min,
            device.download_max,
            ceilings.download_mbps,
        );
        let upload = clamp(device.upload_min, device.upload_max, ceilings.upload_mbps);
        let class = self.minors.next_class(branch.major)?;

        tracing::debug!(
            device = %device.id,
            hostname = %device.hostname,
            node = %node.name,
            %class,
            "download {} to {} Mbps, upload {} to {} Mbps",
            download.min,
            download.max,
            upload.min,
            upload.max
        );

        self.emit_class_pair(node_class, class, download, upload);
        if let Some(ip) = device.ipv4 {
            self.plan.push(Operation::BindFlowToQueue {
                ip,
                queue: branch.queue,
                class,
            });
        }

        self.assigned.insert(
            idx,
            DeviceAssignment {
                device_id: device.id.clone(),
                hostname: device.hostname.clone(),
                node: node.name.clone(),
                queue: branch.queue,
                class,
                download,
                upload,
            },
        );
        Ok(())
    }

    /// Class + leaf qdisc on interface A (download), then the same on interface B (upload).
    fn emit_class_pair(
        &mut self,
        parent: ClassId,
        class: ClassId,
        download: RateBounds,
        upload: RateBounds,
    ) {
        let p = self.params;
        for (interface, bounds) in [(&p.interface_a, download), (&p.interface_b, upload)] {
            self.plan.push(Operation::CreateClass {
                interface: interface.clone(),
                parent,
                class,
                rate_mbps: bounds.min,
                ceil_mbps: bounds.max,
                priority: SHAPED_CLASS_PRIORITY,
            });
            self.attach_leaf(interface, class);
        }
    }

    fn attach_leaf(&mut self, interface: &str, class: ClassId) {
        self.plan.push(Operation::AttachLeafQueueDiscipline {
            interface: interface.to_string(),
            class,
            discipline: self.params.leaf_qdisc.clone(),
        });
    }

    fn finish(self) -> Compilation {
        let unshaped = find_unshaped(self.devices, &self.assigned);
        warn_unshaped(&unshaped);
        let unshaped = unshaped.into_iter().map(|d| d.id.clone()).collect();
        Compilation {
            plan: self.plan,
            nodes: self.nodes,
            devices: self.assigned,
            unshaped,
        }
    }
}

/// Guaranteed rate (a quarter) and ceiling of a node in one direction.
///
/// The capacity must round to a whole, non-zero `u32` Mbps ceiling.
fn node_bounds(node: &NetworkNode, direction: Direction) -> Result<RateBounds, CompileError> {
    let value = match direction {
        Direction::Download => node.download_mbps,
        Direction::Upload => node.upload_mbps,
    };
    let invalid = || CompileError::InvalidNodeCapacity {
        node: node.name.clone(),
        direction,
        value,
    };
    if !value.is_finite() || value <= 0.0 {
        return Err(invalid());
    }
    let max = checked_mbps(value).filter(|m| *m > 0).ok_or_else(invalid)?;
    let min = checked_mbps(value / 4.0).ok_or_else(invalid)?;
    Ok(RateBounds { min, max })
}

fn check_device(device: &Device) -> Result<(), CompileError> {
    for (field, value) in [
        ("download minimum", device.download_min),
        ("upload minimum", device.upload_min),
        ("download maximum", device.download_max),
        ("upload maximum", device.upload_max),
    ] {
        if value == 0 {
            return Err(CompileError::InvalidDeviceRate {
                device: device.id.clone(),
                field,
                value,
            });
        }
    }
    Ok(())
}
