//! Topology file (network.json).
//!
//! JSON shape:
//! {
//!   "SiteA": {
//!     "downloadBandwidthMbps": 500,
//!     "uploadBandwidthMbps": 500,
//!     "children": {
//!       "House1": { "downloadBandwidthMbps": 100, "uploadBandwidthMbps": 50 }
//!     }
//!   }
//! }
//!
//! Object key order is significant (it decides minor numbering), so each level is read through a
//! map visitor into a Vec rather than into a map type.

use crate::Result;

use anyhow::Context;
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::Path;

/// One node of the topology forest.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkNode {
    /// Unique within its sibling set.
    pub name: String,
    pub download_mbps: f64,
    pub upload_mbps: f64,
    /// In source order.
    pub children: Vec<NetworkNode>,
}

impl NetworkNode {
    pub fn new(name: impl Into<String>, download_mbps: f64, upload_mbps: f64) -> Self {
        Self {
            name: name.into(),
            download_mbps,
            upload_mbps,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<NetworkNode>) -> Self {
        self.children = children;
        self
    }
}

/// Ordered forest of top-level nodes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Topology {
    pub roots: Vec<NetworkNode>,
}

impl Topology {
    pub fn new(roots: Vec<NetworkNode>) -> Self {
        Self { roots }
    }

    /// Total number of nodes across all depths.
    pub fn node_count(&self) -> usize {
        fn count(nodes: &[NetworkNode]) -> usize {
            nodes.iter().map(|n| 1 + count(&n.children)).sum()
        }
        count(&self.roots)
    }

    /// Depth-first search by name; first match in traversal order.
    #[cfg(test)]
    pub fn find(&self, name: &str) -> Option<&NetworkNode> {
        fn walk<'a>(nodes: &'a [NetworkNode], name: &str) -> Option<&'a NetworkNode> {
            nodes
                .iter()
                .find_map(|n| (n.name == name).then_some(n).or_else(|| walk(&n.children, name)))
        }
        walk(&self.roots, name)
    }
}

impl<'de> Deserialize<'de> for Topology {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_map(LevelVisitor).map(Topology::new)
    }
}

/// A `children` mapping.
struct Level(Vec<NetworkNode>);

impl<'de> Deserialize<'de> for Level {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_map(LevelVisitor).map(Level)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNode {
    download_bandwidth_mbps: f64,
    upload_bandwidth_mbps: f64,
    #[serde(default)]
    children: Option<Level>,
}

struct LevelVisitor;

impl<'de> Visitor<'de> for LevelVisitor {
    type Value = Vec<NetworkNode>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of node name to node")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Self::Value, A::Error> {
        let mut nodes = Vec::with_capacity(map.size_hint().unwrap_or(0));
        let mut seen = BTreeSet::new();
        while let Some((name, raw)) = map.next_entry::<String, RawNode>()? {
            if !seen.insert(name.clone()) {
                return Err(de::Error::custom(format!(
                    "duplicate sibling node name: {}",
                    name
                )));
            }
            nodes.push(NetworkNode {
                name,
                download_mbps: raw.download_bandwidth_mbps,
                upload_mbps: raw.upload_bandwidth_mbps,
                children: raw.children.map(|l| l.0).unwrap_or_default(),
            });
        }
        Ok(nodes)
    }
}

/// Read and parse a topology file.
pub fn load_network(path: &Path) -> Result<Topology> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("read network file {}", path.display()))?;
    let topology: Topology = serde_json::from_str(&text)
        .with_context(|| format!("parse network file {}", path.display()))?;
    Ok(topology)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names(nodes: &[NetworkNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.name.as_str()).collect()
    }

    #[test]
    fn preserves_source_order() {
        let json = r#"{
            "Zulu":  { "downloadBandwidthMbps": 10, "uploadBandwidthMbps": 10 },
            "Alpha": { "downloadBandwidthMbps": 20, "uploadBandwidthMbps": 20,
                       "children": {
                           "Yankee": { "downloadBandwidthMbps": 5, "uploadBandwidthMbps": 5 },
                           "Bravo":  { "downloadBandwidthMbps": 5, "uploadBandwidthMbps": 5 }
                       } },
            "Mike":  { "downloadBandwidthMbps": 30.5, "uploadBandwidthMbps": 15 }
        }"#;
        let topo: Topology = serde_json::from_str(json).unwrap();
        assert_eq!(names(&topo.roots), vec!["Zulu", "Alpha", "Mike"]);
        assert_eq!(names(&topo.roots[1].children), vec!["Yankee", "Bravo"]);
        assert_eq!(topo.roots[2].download_mbps, 30.5);
        assert_eq!(topo.node_count(), 5);
    }

    #[test]
    fn rejects_duplicate_siblings() {
        let json = r#"{
            "A": { "downloadBandwidthMbps": 10, "uploadBandwidthMbps": 10 },
            "A": { "downloadBandwidthMbps": 20, "uploadBandwidthMbps": 20 }
        }"#;
        let err = serde_json::from_str::<Topology>(json).unwrap_err();
        assert!(err.to_string().contains("duplicate sibling node name: A"));
    }

    #[test]
    fn same_name_in_different_branches_is_allowed() {
        let json = r#"{
            "A": { "downloadBandwidthMbps": 10, "uploadBandwidthMbps": 10,
                   "children": { "X": { "downloadBandwidthMbps": 1, "uploadBandwidthMbps": 1 } } },
            "B": { "downloadBandwidthMbps": 10, "uploadBandwidthMbps": 10,
                   "children": { "X": { "downloadBandwidthMbps": 2, "uploadBandwidthMbps": 2 } } }
        }"#;
        let topo: Topology = serde_json::from_str(json).unwrap();
        assert_eq!(topo.find("X").map(|n| n.download_mbps), Some(1.0));
    }

    #[test]
    fn missing_bandwidth_is_an_error() {
        let json = r#"{ "A": { "downloadBandwidthMbps": 10 } }"#;
        assert!(serde_json::from_str::<Topology>(json).is_err());
    }

    #[test]
    fn load_reports_path() {
        let err = load_network(Path::new("/nonexistent/network.json")).unwrap_err();
        assert!(format!("{:#}", err).contains("/nonexistent/network.json"));
    }
}
