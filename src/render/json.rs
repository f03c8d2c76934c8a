use crate::model::{Compilation, DeviceAssignment, NodeAssignment, Operation};
use serde::Serialize;

/// Machine-readable view of a compilation.
#[derive(Debug, Serialize)]
pub struct PlanReport<'a> {
    pub operations: &'a [Operation],
    pub nodes: &'a [NodeAssignment],
    /// Shaped devices in input order.
    pub devices: Vec<&'a DeviceAssignment>,
    pub unshaped: &'a [String],
}

impl<'a> From<&'a Compilation> for PlanReport<'a> {
    fn from(c: &'a Compilation) -> Self {
        Self {
            operations: c.plan.operations(),
            nodes: &c.nodes,
            devices: c.devices.values().collect(),
            unshaped: &c.unshaped,
        }
    }
}

pub fn render_json(compilation: &Compilation) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(&PlanReport::from(compilation))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{NetworkNode, Topology};
    use crate::model::{Capacity, ShapingParams, compile};
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};

    #[test]
    fn operations_are_tagged_and_handles_are_strings() {
        let params = ShapingParams {
            interface_a: "a".into(),
            interface_b: "b".into(),
            upstream: Capacity::new(100, 100),
            default_class: Capacity::new(50, 50),
            queues: 1,
            leaf_qdisc: "fq_codel".into(),
        };
        let topo = Topology::new(vec![NetworkNode::new("Site", 40.0, 20.0)]);
        let c = compile(&topo, &[], &params).unwrap();

        let v: Value = serde_json::from_str(&render_json(&c).unwrap()).unwrap();
        assert_eq!(
            v["operations"][0],
            json!({ "op": "create_root_queue_group", "interface": "a", "queues": 1 })
        );
        assert_eq!(
            v["operations"][10],
            json!({
                "op": "create_class",
                "interface": "a",
                "parent": "1:1",
                "class": "1:3",
                "rate_mbps": 10,
                "ceil_mbps": 40,
                "priority": 3
            })
        );
        assert_eq!(v["nodes"][0]["class"], json!("1:3"));
        assert_eq!(v["devices"], json!([]));
        assert_eq!(v["unshaped"], json!([]));
    }
}
