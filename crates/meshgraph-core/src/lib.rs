//! Core data model for service-mesh traffic graphs.
//!
//! A [`TrafficMap`] owns [`Node`]s, each of which owns its outgoing
//! [`Edge`]s. Node identities come from the pure [`identity::resolve`]
//! function, and counters on nodes and edges are accumulated through the
//! [`Metadata`] aggregation primitives.

pub mod edge;
pub mod error;
pub mod graph;
pub mod id;
pub mod identity;
pub mod metadata;
pub mod node;
pub mod options;

// Re-export commonly used types
pub use edge::{Edge, Protocol};
pub use error::CoreError;
pub use graph::TrafficMap;
pub use id::{NodeId, UNKNOWN};
pub use metadata::{keys, Metadata, MetadataValue};
pub use node::{Node, NodeKind};
pub use options::{GraphKind, GraphOptions, GraphType, NamespaceScope, NodeSelector};
