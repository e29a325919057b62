//! Stable node identifiers.
//!
//! A [`NodeId`] is a string newtype. Ids are never allocated from a counter:
//! they are derived from a node's labels by [`crate::identity::resolve`], so
//! the same mesh entity gets the same id in every namespace pass.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Label value used by the telemetry backend for traffic it cannot attribute.
pub const UNKNOWN: &str = "unknown";

/// Stable node identifier, unique within a [`crate::graph::TrafficMap`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// The single id shared by all unattributable (outside-mesh) nodes.
    pub fn unknown() -> Self {
        NodeId(UNKNOWN.to_string())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn from_composed(id: String) -> Self {
        NodeId(id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<NodeId> for String {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

/// Returns `true` if a label value is present and attributable.
///
/// Both the empty string and the `unknown` sentinel count as absent.
pub fn is_ok(label: &str) -> bool {
    !label.is_empty() && label != UNKNOWN
}

/// Normalizes a label value for storage on a node: `unknown` becomes empty.
pub fn label_or_empty(label: &str) -> &str {
    if is_ok(label) {
        label
    } else {
        ""
    }
}
