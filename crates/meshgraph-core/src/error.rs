//! Core error types for meshgraph-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering the
//! failure modes of the traffic graph data model and request options.

use thiserror::Error;

use crate::id::NodeId;
use crate::node::NodeKind;

/// Core errors produced by the meshgraph-core crate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// A graph type string did not name one of the supported graph types.
    #[error("unsupported graph type: '{value}'")]
    UnsupportedGraphType { value: String },

    /// A graph kind string did not name one of the supported graph kinds.
    #[error("unsupported graph kind: '{value}'")]
    UnsupportedGraphKind { value: String },

    /// An edge carries a protocol that cannot be aggregated.
    #[error("unexpected edge protocol '{protocol}' for edge [{from} -> {to}]")]
    UnsupportedProtocol {
        protocol: String,
        from: NodeId,
        to: NodeId,
    },

    /// A node id was not found in the traffic map.
    #[error("node not found: {id}")]
    NodeNotFound { id: NodeId },

    /// A node had a different kind than the operation requires.
    #[error("expected node kind [{expected}] for node [{id}], found [{actual}]")]
    UnexpectedNodeKind {
        id: NodeId,
        expected: NodeKind,
        actual: NodeKind,
    },

    /// An edge references a node that is not owned by the same traffic map.
    #[error("edge [{from} -> {to}] references a node missing from the traffic map")]
    DanglingEdge { from: NodeId, to: NodeId },

    /// A node holds two edges for the same destination and protocol.
    #[error("duplicate {protocol} edge [{from} -> {to}]")]
    DuplicateEdge {
        from: NodeId,
        to: NodeId,
        protocol: String,
    },
}
