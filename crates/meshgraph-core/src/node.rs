//! Traffic graph nodes.
//!
//! A [`Node`] is one mesh entity. Its [`NodeKind`] is a closed enum so every
//! pass that branches on kind (reduction, classification, label
//! reconciliation) is checked for exhaustiveness. The label fields a kind does
//! not use are stored empty.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::edge::{Edge, Protocol};
use crate::id::{label_or_empty, NodeId};
use crate::identity;
use crate::metadata::{keys, Metadata};
use crate::options::GraphType;

/// The semantic kind of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    /// Traffic origin outside the mesh.
    Unknown,
    Workload,
    App,
    VersionedApp,
    Service,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeKind::Unknown => "unknown",
            NodeKind::Workload => "workload",
            NodeKind::App => "app",
            NodeKind::VersionedApp => "versionedApp",
            NodeKind::Service => "service",
        };
        f.write_str(s)
    }
}

/// A mesh entity and its outgoing edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub namespace: String,
    pub workload: String,
    pub app: String,
    pub version: String,
    pub service: String,
    /// Outgoing edges, at most one per `(dest, protocol)`.
    pub edges: Vec<Edge>,
    pub metadata: Metadata,
}

impl Node {
    /// Creates a node, resolving its identity from the labels.
    pub fn new(
        namespace: &str,
        workload: &str,
        app: &str,
        version: &str,
        service: &str,
        graph_type: GraphType,
    ) -> Self {
        let (id, kind) = identity::resolve(namespace, workload, app, version, service, graph_type);
        Node::with_identity(id, kind, namespace, workload, app, version, service)
    }

    /// Creates a node with an already resolved identity, trimming the label
    /// fields its kind does not use.
    pub fn with_identity(
        id: NodeId,
        kind: NodeKind,
        namespace: &str,
        workload: &str,
        app: &str,
        version: &str,
        service: &str,
    ) -> Self {
        let (namespace, workload, app, version, service) = match kind {
            NodeKind::Unknown => (crate::id::UNKNOWN, "", "", "", ""),
            // app and version labels help identify a workload, keep them
            NodeKind::Workload => (namespace, workload, app, version, ""),
            NodeKind::App => (namespace, "", app, "", ""),
            NodeKind::VersionedApp => (namespace, workload, app, version, ""),
            NodeKind::Service => (namespace, "", "", "", service),
        };

        Node {
            id,
            kind,
            namespace: namespace.to_string(),
            workload: label_or_empty(workload).to_string(),
            app: label_or_empty(app).to_string(),
            version: label_or_empty(version).to_string(),
            service: label_or_empty(service).to_string(),
            edges: Vec::new(),
            metadata: Metadata::new(),
        }
    }

    /// Returns the edge to `dest` over `protocol`, if any.
    pub fn edge(&self, dest: &NodeId, protocol: &Protocol) -> Option<&Edge> {
        self.edges.iter().find(|e| e.matches(dest, protocol))
    }

    /// Returns the edge to `dest` over `protocol`, creating it if absent.
    pub fn edge_or_insert(&mut self, dest: &NodeId, protocol: Protocol) -> &mut Edge {
        let pos = match self.edges.iter().position(|e| e.matches(dest, &protocol)) {
            Some(pos) => pos,
            None => {
                self.edges
                    .push(Edge::new(self.id.clone(), dest.clone(), protocol));
                self.edges.len() - 1
            }
        };
        &mut self.edges[pos]
    }

    /// Appends `edge` unless an edge with the same `(dest, protocol)` exists.
    ///
    /// Returns `true` if the edge was added. The edge is re-sourced to this
    /// node.
    pub fn adopt_edge(&mut self, mut edge: Edge) -> bool {
        if self.edge(&edge.dest, &edge.protocol).is_some() {
            return false;
        }
        edge.source = self.id.clone();
        self.edges.push(edge);
        true
    }

    pub fn is_root(&self) -> bool {
        self.metadata.flag(keys::IS_ROOT)
    }

    pub fn is_service_entry(&self) -> bool {
        self.metadata.flag(keys::IS_SERVICE_ENTRY)
    }
}
