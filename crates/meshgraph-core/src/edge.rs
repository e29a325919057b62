//! Directed traffic edges.
//!
//! An [`Edge`] is owned by its source [`crate::node::Node`]. The `source` and
//! `dest` fields are non-owning references by id into the same
//! [`crate::graph::TrafficMap`]. A node holds at most one edge per
//! `(dest, protocol)` pair.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::id::NodeId;
use crate::metadata::{keys, Metadata};

/// Traffic protocol carried by an edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Protocol {
    Http,
    Tcp,
    /// Any other protocol an appender may introduce. Not aggregatable.
    Other(String),
}

impl Protocol {
    pub fn as_str(&self) -> &str {
        match self {
            Protocol::Http => "http",
            Protocol::Tcp => "tcp",
            Protocol::Other(name) => name,
        }
    }

    /// The edge metadata key holding this protocol's rate counter.
    pub fn rate_key(&self) -> Option<&'static str> {
        match self {
            Protocol::Http => Some(keys::HTTP),
            Protocol::Tcp => Some(keys::TCP),
            Protocol::Other(_) => None,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "http" => Protocol::Http,
            "tcp" => Protocol::Tcp,
            other => Protocol::Other(other.to_string()),
        })
    }
}

impl From<String> for Protocol {
    fn from(s: String) -> Self {
        match s.as_str() {
            "http" => Protocol::Http,
            "tcp" => Protocol::Tcp,
            _ => Protocol::Other(s),
        }
    }
}

impl From<Protocol> for String {
    fn from(p: Protocol) -> Self {
        match p {
            Protocol::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

/// A directed `source -> dest` relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source: NodeId,
    pub dest: NodeId,
    pub protocol: Protocol,
    pub metadata: Metadata,
}

impl Edge {
    pub fn new(source: NodeId, dest: NodeId, protocol: Protocol) -> Self {
        Edge {
            source,
            dest,
            protocol,
            metadata: Metadata::new(),
        }
    }

    /// Returns `true` if this edge has the given destination and protocol.
    pub fn matches(&self, dest: &NodeId, protocol: &Protocol) -> bool {
        &self.dest == dest && &self.protocol == protocol
    }

    /// The protocol rate counter, `0.0` if absent.
    pub fn rate(&self) -> f64 {
        self.protocol
            .rate_key()
            .map(|key| self.metadata.number_or_zero(key))
            .unwrap_or(0.0)
    }
}
