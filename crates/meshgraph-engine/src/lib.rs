//! meshgraph-engine: builds service-mesh traffic graphs from telemetry.
//!
//! [`GraphEngine::build_namespaces_graph`] and
//! [`GraphEngine::build_node_graph`] are the entry points. Both build
//! per-namespace [`TrafficMap`](meshgraph_core::TrafficMap)s with the
//! [`builder`], enrich them with the configured [`appender`]s, and finish
//! with the [`classify`] passes; namespace service graphs are then
//! [`reduce`]d.

pub mod appender;
pub mod builder;
pub mod classify;
pub mod error;
mod fetch;
pub mod merge;
pub mod pipeline;
pub mod reduce;

pub use appender::{Appender, GlobalInfo, NamespaceInfo, ResponseTimeAppender};
pub use builder::TrafficBuilder;
pub use error::{ErrorDetail, ErrorKind, GraphError};
pub use pipeline::GraphEngine;
