// ── Topology builder ──
//
// Derives the shaper's node hierarchy from the merged record set:
//
//   <router>                 site, router ceiling
//     PLAN-<profile>-<router>  plan, inherits the router ceiling
//   <static parent>          static, top level, only if no node has that name
//
// The tree is keyed by node name and serialized in name order.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::warn;

use crate::config::RouterDescriptor;
use crate::model::DeviceRecord;

/// What a node groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NodeKind {
    Site,
    Plan,
    Static,
}

/// One node of `network.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkNode {
    #[serde(
        rename = "downloadBandwidthMbps",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub download_bandwidth_mbps: Option<u64>,
    #[serde(
        rename = "uploadBandwidthMbps",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub upload_bandwidth_mbps: Option<u64>,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// Member circuit ids, sorted.
    #[serde(default)]
    pub circuits: Vec<String>,
    #[serde(default)]
    pub children: BTreeMap<String, NetworkNode>,
}

impl NetworkNode {
    fn new(kind: NodeKind, download: Option<u64>, upload: Option<u64>) -> Self {
        Self {
            download_bandwidth_mbps: download,
            upload_bandwidth_mbps: upload,
            kind,
            circuits: Vec::new(),
            children: BTreeMap::new(),
        }
    }

    fn sort_circuits(&mut self) {
        self.circuits.sort();
        self.circuits.dedup();
        for child in self.children.values_mut() {
            child.sort_circuits();
        }
    }
}

/// The whole node tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topology {
    pub nodes: BTreeMap<String, NetworkNode>,
}

impl Topology {
    /// Build the tree for one cycle.
    ///
    /// Every configured router gets a site node even when it reported no
    /// records. Static records are placed after router records so they can
    /// join any site or plan node by name.
    pub fn build(routers: &[RouterDescriptor], records: &[DeviceRecord]) -> Self {
        let mut nodes: BTreeMap<String, NetworkNode> = routers
            .iter()
            .map(|r| {
                (
                    r.name.clone(),
                    NetworkNode::new(NodeKind::Site, r.download_ceiling_mbps, r.upload_ceiling_mbps),
                )
            })
            .collect();

        for record in records.iter().filter(|r| !r.is_static()) {
            let Some(router) = record.router.as_deref() else {
                continue;
            };
            let site = nodes
                .entry(router.to_owned())
                .or_insert_with(|| NetworkNode::new(NodeKind::Site, None, None));
            if record.parent_node == router {
                site.circuits.push(record.circuit_id.clone());
            } else {
                let (down, up) = (site.download_bandwidth_mbps, site.upload_bandwidth_mbps);
                site.children
                    .entry(record.parent_node.clone())
                    .or_insert_with(|| NetworkNode::new(NodeKind::Plan, down, up))
                    .circuits
                    .push(record.circuit_id.clone());
            }
        }

        for record in records.iter().filter(|r| r.is_static()) {
            if let Some(node) = find_mut(&mut nodes, &record.parent_node) {
                node.circuits.push(record.circuit_id.clone());
                continue;
            }
            nodes
                .entry(record.parent_node.clone())
                .or_insert_with(|| NetworkNode::new(NodeKind::Static, None, None))
                .circuits
                .push(record.circuit_id.clone());
        }

        for node in nodes.values_mut() {
            node.sort_circuits();
        }
        Self { nodes }
    }

    /// Read a previously written `network.json`.
    ///
    /// A missing file yields `None`; an unreadable or malformed one is
    /// logged and also yields `None`, which just means the next write is
    /// not skipped.
    pub fn load(path: &Path) -> Option<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read previous topology");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(topology) => Some(topology),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "previous topology is malformed, ignoring");
                None
            }
        }
    }

    /// Compare two trees node by node. Children are compared on their own
    /// path, so a change deep in the tree does not mark its ancestors.
    pub fn diff(previous: &Self, next: &Self) -> TopologyDiff {
        let before = flatten(&previous.nodes);
        let after = flatten(&next.nodes);

        let mut diff = TopologyDiff::default();
        for (path, node) in &after {
            match before.get(path) {
                None => diff.added.push(path.clone()),
                Some(old) if old != node => diff.changed.push(path.clone()),
                Some(_) => {}
            }
        }
        diff.removed = before
            .keys()
            .filter(|path| !after.contains_key(*path))
            .cloned()
            .collect();
        diff
    }

    /// Every node path (`site/plan`), depth first.
    pub fn node_paths(&self) -> BTreeSet<String> {
        flatten(&self.nodes).into_keys().collect()
    }
}

fn find_mut<'a>(
    nodes: &'a mut BTreeMap<String, NetworkNode>,
    name: &str,
) -> Option<&'a mut NetworkNode> {
    if nodes.contains_key(name) {
        return nodes.get_mut(name);
    }
    nodes
        .values_mut()
        .find_map(|n| find_mut(&mut n.children, name))
}

/// Node content without its children, for diffing.
#[derive(Debug, PartialEq, Eq)]
struct FlatNode<'a> {
    kind: NodeKind,
    download: Option<u64>,
    upload: Option<u64>,
    circuits: &'a [String],
}

fn flatten(nodes: &BTreeMap<String, NetworkNode>) -> BTreeMap<String, FlatNode<'_>> {
    fn walk<'a>(
        prefix: &str,
        nodes: &'a BTreeMap<String, NetworkNode>,
        out: &mut BTreeMap<String, FlatNode<'a>>,
    ) {
        for (name, node) in nodes {
            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{prefix}/{name}")
            };
            walk(&path, &node.children, out);
            out.insert(
                path,
                FlatNode {
                    kind: node.kind,
                    download: node.download_bandwidth_mbps,
                    upload: node.upload_bandwidth_mbps,
                    circuits: &node.circuits,
                },
            );
        }
    }
    let mut out = BTreeMap::new();
    walk("", nodes, &mut out);
    out
}

/// Node-level differences between two trees.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopologyDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub changed: Vec<String>,
}

impl TopologyDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}
