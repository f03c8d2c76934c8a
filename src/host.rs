//! Hardware queue probing.
//!
//! The number of transmit queues on the download interface decides how many HTB trees (and CPU
//! flow-steering targets) a plan spreads across.

use crate::Result;

use anyhow::{Context, bail};
use regex::Regex;
use std::fs;
use std::path::Path;

/// Virtual NICs misbehave with more than this many queues.
pub const VM_QUEUE_CAP: u16 = 9;

pub const SYSFS_ROOT: &str = "/sys";
pub const CPUINFO_PATH: &str = "/proc/cpuinfo";

/// Count `tx-N` entries under `<sysfs_root>/class/net/<interface>/queues`.
pub fn count_tx_queues(sysfs_root: &Path, interface: &str) -> Result<u16> {
    let dir = sysfs_root
        .join("class/net")
        .join(interface)
        .join("queues");
    let re = Regex::new(r"^tx-\d+$")?;

    let mut count: u16 = 0;
    for entry in fs::read_dir(&dir).with_context(|| format!("list queues in {}", dir.display()))? {
        let entry = entry.with_context(|| format!("list queues in {}", dir.display()))?;
        if re.is_match(&entry.file_name().to_string_lossy()) {
            count = count.saturating_add(1);
        }
    }

    if count == 0 {
        bail!("no transmit queues found for {} in {}", interface, dir.display());
    }
    Ok(count)
}

/// True when a `flags` line of `/proc/cpuinfo` carries the `hypervisor` flag.
pub fn is_virtual_machine(cpuinfo: &str) -> bool {
    Regex::new(r"(?m)^flags\s*:.*\bhypervisor\b")
        .map(|re| re.is_match(cpuinfo))
        .unwrap_or(false)
}

/// Apply the virtual machine cap to a detected queue count.
pub fn cap_queues(detected: u16, virtualized: bool) -> u16 {
    if virtualized && detected > VM_QUEUE_CAP {
        VM_QUEUE_CAP
    } else {
        detected
    }
}

/// Detect usable queues on `interface`, reading cpuinfo only when the cap could matter.
pub fn available_queues(sysfs_root: &Path, cpuinfo_path: &Path, interface: &str) -> Result<u16> {
    let detected = count_tx_queues(sysfs_root, interface)?;
    if detected <= VM_QUEUE_CAP {
        tracing::info!(interface, queues = detected, "detected transmit queues");
        return Ok(detected);
    }

    let virtualized = match fs::read_to_string(cpuinfo_path) {
        Ok(text) => is_virtual_machine(&text),
        Err(err) => {
            tracing::warn!(%err, path = %cpuinfo_path.display(), "cannot read cpuinfo; assuming bare metal");
            false
        }
    };
    let queues = cap_queues(detected, virtualized);
    tracing::info!(interface, detected, queues, virtualized, "detected transmit queues");
    Ok(queues)
}
