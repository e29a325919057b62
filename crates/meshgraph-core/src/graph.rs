//! TrafficMap: the container owning every node (and transitively every edge)
//! of a traffic graph.
//!
//! Nodes are keyed by [`NodeId`]. Iteration follows insertion order so that a
//! graph built from the same samples always serializes the same way. Edges
//! refer to their endpoints by id; [`TrafficMap::validate`] checks that every
//! referenced node is present.

use indexmap::map::{Entry, IndexMap};
use serde::{Deserialize, Serialize};

use crate::edge::Edge;
use crate::error::CoreError;
use crate::id::NodeId;
use crate::node::Node;

/// Mapping from node id to node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrafficMap {
    nodes: IndexMap<NodeId, Node>,
}

impl TrafficMap {
    pub fn new() -> Self {
        TrafficMap {
            nodes: IndexMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: &NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    /// Looks up a node, returning [`CoreError::NodeNotFound`] if absent.
    pub fn node(&self, id: &NodeId) -> Result<&Node, CoreError> {
        self.nodes
            .get(id)
            .ok_or_else(|| CoreError::NodeNotFound { id: id.clone() })
    }

    /// Inserts `node` under its id, returning the node it replaced.
    pub fn insert(&mut self, node: Node) -> Option<Node> {
        self.nodes.insert(node.id.clone(), node)
    }

    /// Returns the node with `id`, inserting the node built by `make` if
    /// absent. The flag is `true` when an existing node was found.
    pub fn get_or_insert_with(
        &mut self,
        id: &NodeId,
        make: impl FnOnce() -> Node,
    ) -> (&mut Node, bool) {
        match self.nodes.entry(id.clone()) {
            Entry::Occupied(e) => (e.into_mut(), true),
            Entry::Vacant(e) => (e.insert(make()), false),
        }
    }

    pub fn remove(&mut self, id: &NodeId) -> Option<Node> {
        self.nodes.shift_remove(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.keys()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.nodes.values_mut()
    }

    /// All edges of all nodes.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.nodes.values().flat_map(|n| n.edges.iter())
    }

    pub fn edge_count(&self) -> usize {
        self.nodes.values().map(|n| n.edges.len()).sum()
    }

    /// Consumes the map, yielding its nodes in insertion order.
    pub fn into_nodes(self) -> impl Iterator<Item = Node> {
        self.nodes.into_values()
    }

    /// Checks that every edge is owned by its source and that both endpoints
    /// exist, and that no node holds two edges for the same
    /// `(dest, protocol)`.
    pub fn validate(&self) -> Result<(), CoreError> {
        for node in self.nodes.values() {
            for (i, edge) in node.edges.iter().enumerate() {
                if edge.source != node.id || !self.nodes.contains_key(&edge.dest) {
                    return Err(CoreError::DanglingEdge {
                        from: edge.source.clone(),
                        to: edge.dest.clone(),
                    });
                }
                if node.edges[..i]
                    .iter()
                    .any(|e| e.matches(&edge.dest, &edge.protocol))
                {
                    return Err(CoreError::DuplicateEdge {
                        from: edge.source.clone(),
                        to: edge.dest.clone(),
                        protocol: edge.protocol.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl FromIterator<Node> for TrafficMap {
    fn from_iter<I: IntoIterator<Item = Node>>(iter: I) -> Self {
        let mut map = TrafficMap::new();
        for node in iter {
            map.insert(node);
        }
        map
    }
}
