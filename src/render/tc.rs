//! Render plan operations as shell commands.
//!
//! Handles are printed in hex since that is how `tc` parses them; the flow-steering helper takes
//! the same `major:minor` strings.

use crate::exec::ShellCommand;
use crate::model::class_id::MQ_MAJOR;
use crate::model::clamp::quarter_mbps;
use crate::model::plan::{DEFAULT_CLASS_PRIORITY, Operation, ShapingPlan};
use std::path::Path;

const IPHASH_CMDLINE: &str = "src/xdp_iphash_to_cpu_cmdline";

/// Commands for a single operation, in order. Some operations expand to more than one command.
pub fn render_operation(op: &Operation, xdp_cpumap_dir: &Path) -> Vec<ShellCommand> {
    match op {
        Operation::CreateRootQueueGroup { interface, .. } => vec![ShellCommand::parse(&format!(
            "tc qdisc replace dev {} root handle {:x}: mq",
            interface, MQ_MAJOR
        ))],
        Operation::CreateQueueRoot {
            interface,
            queue,
            capacity_mbps,
        } => vec![
            ShellCommand::parse(&format!(
                "tc qdisc add dev {} parent {:x}:{:x} handle {:x}: htb default 2",
                interface, MQ_MAJOR, queue, queue
            )),
            ShellCommand::parse(&format!(
                "tc class add dev {} parent {:x}: classid {:x}:1 htb rate {}mbit ceil {}mbit",
                interface, queue, queue, capacity_mbps, capacity_mbps
            )),
        ],
        Operation::CreateDefaultClass {
            interface,
            queue,
            capacity_mbps,
        } => vec![ShellCommand::parse(&format!(
            "tc class add dev {} parent {:x}:1 classid {:x}:2 htb rate {}mbit ceil {}mbit prio {}",
            interface,
            queue,
            queue,
            quarter_mbps(*capacity_mbps),
            capacity_mbps,
            DEFAULT_CLASS_PRIORITY
        ))],
        Operation::CreateClass {
            interface,
            parent,
            class,
            rate_mbps,
            ceil_mbps,
            priority,
        } => vec![ShellCommand::parse(&format!(
            "tc class add dev {} parent {} classid {} htb rate {}mbit ceil {}mbit prio {}",
            interface, parent, class, rate_mbps, ceil_mbps, priority
        ))],
        Operation::AttachLeafQueueDiscipline {
            interface,
            class,
            discipline,
        } => vec![ShellCommand::parse(&format!(
            "tc qdisc add dev {} parent {} {}",
            interface, class, discipline
        ))],
        // CPUs are zero-based, queues are not.
        Operation::BindFlowToQueue { ip, queue, class } => {
            vec![helper(xdp_cpumap_dir, IPHASH_CMDLINE).args([
                "--add".to_string(),
                "--ip".to_string(),
                ip.to_string(),
                "--cpu".to_string(),
                queue.saturating_sub(1).to_string(),
                "--classid".to_string(),
                class.to_string(),
            ])]
        }
    }
}

pub fn render_plan(plan: &ShapingPlan, xdp_cpumap_dir: &Path) -> Vec<ShellCommand> {
    plan.iter()
        .flat_map(|op| render_operation(op, xdp_cpumap_dir))
        .collect()
}

/// Tear down filters and qdiscs left by a previous run. Failures are expected when nothing is
/// installed yet.
pub fn clear_prior_settings(interface_a: &str, interface_b: &str) -> Vec<ShellCommand> {
    [interface_a, interface_b]
        .into_iter()
        .flat_map(|iface| {
            [
                format!("tc filter delete dev {}", iface),
                format!("tc filter delete dev {} root", iface),
                format!("tc qdisc delete dev {} root", iface),
                format!("tc qdisc delete dev {}", iface),
            ]
        })
        .map(|line| ShellCommand::parse(&line))
        .collect()
}

/// A flow-steering helper under `xdp_cpumap_dir`. The path stays one token whatever it contains.
fn helper(xdp_cpumap_dir: &Path, name: &str) -> ShellCommand {
    ShellCommand::new(xdp_cpumap_dir.join(name).display().to_string())
}

/// Bring up the CPU flow-steering programs and clear their IP map.
pub fn flow_steering_setup(
    interface_a: &str,
    interface_b: &str,
    xdp_cpumap_dir: &Path,
) -> Vec<ShellCommand> {
    let xps = |iface: &str| {
        helper(xdp_cpumap_dir, "bin/xps_setup.sh").args(["-d", iface, "--default", "--disable"])
    };
    let classify =
        |iface: &str| helper(xdp_cpumap_dir, "src/tc_classify").args(["--dev-egress", iface]);
    vec![
        xps(interface_a),
        xps(interface_b),
        helper(xdp_cpumap_dir, "src/xdp_iphash_to_cpu").args(["--dev", interface_a, "--lan"]),
        helper(xdp_cpumap_dir, "src/xdp_iphash_to_cpu").args(["--dev", interface_b, "--wan"]),
        helper(xdp_cpumap_dir, IPHASH_CMDLINE).arg("--clear"),
        classify(interface_a),
        classify(interface_b),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ClassId;
    use pretty_assertions::assert_eq;
    use std::net::Ipv4Addr;

    fn lines(cmds: Vec<ShellCommand>) -> Vec<String> {
        cmds.into_iter().map(|c| c.to_string()).collect()
    }

    const XDP: &str = "/opt/xdp-cpumap-tc";

    #[test]
    fn queue_root_and_default() {
        let xdp = Path::new(XDP);
        let mut out = render_operation(
            &Operation::CreateRootQueueGroup {
                interface: "eth1".into(),
                queues: 12,
            },
            xdp,
        );
        out.extend(render_operation(
            &Operation::CreateQueueRoot {
                interface: "eth1".into(),
                queue: 12,
                capacity_mbps: 1000,
            },
            xdp,
        ));
        out.extend(render_operation(
            &Operation::CreateDefaultClass {
                interface: "eth1".into(),
                queue: 12,
                capacity_mbps: 500,
            },
            xdp,
        ));
        assert_eq!(
            lines(out),
            vec![
                "tc qdisc replace dev eth1 root handle 7fff: mq",
                "tc qdisc add dev eth1 parent 7fff:c handle c: htb default 2",
                "tc class add dev eth1 parent c: classid c:1 htb rate 1000mbit ceil 1000mbit",
                "tc class add dev eth1 parent c:1 classid c:2 htb rate 125mbit ceil 500mbit prio 5",
            ]
        );
    }

    #[test]
    fn class_leaf_and_binding() {
        let plan = {
            let mut p = ShapingPlan::new();
            p.push(Operation::CreateClass {
                interface: "eth1".into(),
                parent: ClassId::new(1, 4),
                class: ClassId::new(1, 0x1a),
                rate_mbps: 10,
                ceil_mbps: 20,
                priority: 3,
            });
            p.push(Operation::AttachLeafQueueDiscipline {
                interface: "eth1".into(),
                class: ClassId::new(1, 0x1a),
                discipline: "cake diffserv4".into(),
            });
            p.push(Operation::BindFlowToQueue {
                ip: Ipv4Addr::new(100, 64, 0, 2),
                queue: 3,
                class: ClassId::new(3, 5),
            });
            p
        };
        assert_eq!(
            lines(render_plan(&plan, Path::new(XDP))),
            vec![
                "tc class add dev eth1 parent 1:4 classid 1:1a htb rate 10mbit ceil 20mbit prio 3",
                "tc qdisc add dev eth1 parent 1:1a cake diffserv4",
                "/opt/xdp-cpumap-tc/src/xdp_iphash_to_cpu_cmdline --add --ip 100.64.0.2 --cpu 2 --classid 3:5",
            ]
        );
    }

    #[test]
    fn prelude_commands() {
        let clear = lines(clear_prior_settings("a", "b"));
        assert_eq!(clear.len(), 8);
        assert_eq!(clear[2], "tc qdisc delete dev a root");
        assert_eq!(clear[7], "tc qdisc delete dev b");

        let setup = lines(flow_steering_setup("a", "b", Path::new(XDP)));
        assert_eq!(
            setup,
            vec![
                "/opt/xdp-cpumap-tc/bin/xps_setup.sh -d a --default --disable",
                "/opt/xdp-cpumap-tc/bin/xps_setup.sh -d b --default --disable",
                "/opt/xdp-cpumap-tc/src/xdp_iphash_to_cpu --dev a --lan",
                "/opt/xdp-cpumap-tc/src/xdp_iphash_to_cpu --dev b --wan",
                "/opt/xdp-cpumap-tc/src/xdp_iphash_to_cpu_cmdline --clear",
                "/opt/xdp-cpumap-tc/src/tc_classify --dev-egress a",
                "/opt/xdp-cpumap-tc/src/tc_classify --dev-egress b",
            ]
        );
    }

    #[test]
    fn helper_path_with_spaces_is_one_program() {
        let xdp = Path::new("/srv/xdp cpumap");
        let bind = render_operation(
            &Operation::BindFlowToQueue {
                ip: Ipv4Addr::new(10, 0, 0, 9),
                queue: 1,
                class: ClassId::new(1, 3),
            },
            xdp,
        );
        assert_eq!(bind[0].program(), "/srv/xdp cpumap/src/xdp_iphash_to_cpu_cmdline");
        assert_eq!(
            bind[0].arguments(),
            ["--add", "--ip", "10.0.0.9", "--cpu", "0", "--classid", "1:3"]
        );
        assert_eq!(
            bind[0].to_string(),
            "'/srv/xdp cpumap/src/xdp_iphash_to_cpu_cmdline' --add --ip 10.0.0.9 --cpu 0 --classid 1:3"
        );

        for cmd in flow_steering_setup("a", "b", xdp) {
            assert!(cmd.program().starts_with("/srv/xdp cpumap/"), "{}", cmd);
            assert!(!cmd.arguments().iter().any(|a| a.contains("cpumap")), "{}", cmd);
        }
    }
}
