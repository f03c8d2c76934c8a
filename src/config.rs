//! Run configuration (`netshaper.toml` or `.json`).
//!
//! Example:
//! ```toml
//! interface_a = "eth1"
//! interface_b = "eth2"
//! upstream_download_mbps = 1000
//! upstream_upload_mbps = 1000
//! default_class_download_mbps = 500
//! default_class_upload_mbps = 500
//! leaf_qdisc = "cake diffserv4"
//! ```

use crate::Result;
use crate::model::{Capacity, ShapingParams};

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Interface facing subscribers; carries the download hierarchy.
    pub interface_a: String,
    /// Interface facing upstream; carries the upload hierarchy.
    pub interface_b: String,
    pub upstream_download_mbps: u32,
    pub upstream_upload_mbps: u32,
    pub default_class_download_mbps: u32,
    pub default_class_upload_mbps: u32,

    #[serde(default = "default_leaf_qdisc")]
    pub leaf_qdisc: String,

    /// Scaling applied to device rates to leave room for protocol overhead.
    #[serde(default = "default_overhead_factor")]
    pub overhead_factor: f64,

    /// When false, commands are only logged.
    #[serde(default)]
    pub enable_shell_commands: bool,

    #[serde(default)]
    pub run_as_sudo: bool,

    #[serde(default = "default_xdp_cpumap_dir")]
    pub xdp_cpumap_dir: PathBuf,

    /// Skip queue detection and use this many queues.
    #[serde(default)]
    pub queues: Option<u16>,
}

fn default_leaf_qdisc() -> String {
    "fq_codel".to_string()
}

fn default_overhead_factor() -> f64 {
    1.09
}

fn default_xdp_cpumap_dir() -> PathBuf {
    PathBuf::from("./xdp-cpumap-tc")
}

impl Config {
    /// Load from a `.toml` or `.json` file, chosen by extension, and validate.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        let config: Config = match ext.to_lowercase().as_str() {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("parse config file {}", path.display()))?,
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("parse config file {}", path.display()))?,
            _ => bail!("unsupported config file extension: {:?}", ext),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.interface_a.trim().is_empty() || self.interface_b.trim().is_empty() {
            bail!("interface_a and interface_b must be set");
        }
        if self.interface_a == self.interface_b {
            bail!(
                "interface_a and interface_b must differ (both are {})",
                self.interface_a
            );
        }
        for (name, value) in [
            ("upstream_download_mbps", self.upstream_download_mbps),
            ("upstream_upload_mbps", self.upstream_upload_mbps),
            ("default_class_download_mbps", self.default_class_download_mbps),
            ("default_class_upload_mbps", self.default_class_upload_mbps),
        ] {
            if value == 0 {
                bail!("{} must be greater than zero", name);
            }
        }
        if !self.overhead_factor.is_finite() || self.overhead_factor <= 0.0 {
            bail!(
                "overhead_factor must be positive, got {}",
                self.overhead_factor
            );
        }
        if self.leaf_qdisc.trim().is_empty() {
            bail!("leaf_qdisc must not be empty");
        }
        if self.queues == Some(0) {
            bail!("queues must be at least 1 when set");
        }
        Ok(())
    }

    /// Parameters for one compilation over `queues` hardware queues.
    pub fn shaping_params(&self, queues: u16) -> ShapingParams {
        ShapingParams {
            interface_a: self.interface_a.clone(),
            interface_b: self.interface_b.clone(),
            upstream: Capacity::new(self.upstream_download_mbps, self.upstream_upload_mbps),
            default_class: Capacity::new(
                self.default_class_download_mbps,
                self.default_class_upload_mbps,
            ),
            queues,
            leaf_qdisc: self.leaf_qdisc.clone(),
        }
    }
}
