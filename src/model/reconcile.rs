//! Post-compilation reconciliation: which devices never found their parent node.

use crate::input::Device;
use crate::model::compile::DeviceAssignment;
use std::collections::BTreeMap;

/// Devices (in input order) with no entry in `assignments`, keyed by device index.
///
/// Purely diagnostic; the plan is unaffected.
pub fn find_unshaped<'a>(
    devices: &'a [Device],
    assignments: &BTreeMap<usize, DeviceAssignment>,
) -> Vec<&'a Device> {
    devices
        .iter()
        .enumerate()
        .filter(|(idx, _)| !assignments.contains_key(idx))
        .map(|(_, d)| d)
        .collect()
}

/// Emit one operator-facing warning per unshaped device.
pub fn warn_unshaped(unshaped: &[&Device]) {
    for device in unshaped {
        tracing::warn!(
            device = %device.id,
            parent = %device.parent_node,
            "device {} was not shaped; check that its parent node is listed in the network file",
            device.hostname
        );
    }
}
