//! Graph request options.
//!
//! [`GraphOptions`] is built once per graph request and passed explicitly to
//! every stage of the pipeline. Nothing downstream reads process-wide
//! configuration; the control-plane namespace and the service-entry hosts
//! travel with the request.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Default percentile used by the response-time appender.
pub const DEFAULT_QUANTILE: f64 = 0.95;

/// Default observation window for a namespace.
pub const DEFAULT_DURATION: Duration = Duration::from_secs(600);

/// Default control-plane namespace.
pub const DEFAULT_CONTROL_PLANE_NAMESPACE: &str = "istio-system";

/// The level of aggregation used to resolve node identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GraphType {
    #[default]
    Workload,
    App,
    VersionedApp,
    Service,
}

impl GraphType {
    /// Returns `true` for the graph types that aggregate workloads by app label.
    pub fn is_app_based(self) -> bool {
        matches!(self, GraphType::App | GraphType::VersionedApp)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GraphType::Workload => "workload",
            GraphType::App => "app",
            GraphType::VersionedApp => "versionedApp",
            GraphType::Service => "service",
        }
    }
}

impl fmt::Display for GraphType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GraphType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "workload" => Ok(GraphType::Workload),
            "app" => Ok(GraphType::App),
            "versionedApp" => Ok(GraphType::VersionedApp),
            "service" => Ok(GraphType::Service),
            other => Err(CoreError::UnsupportedGraphType {
                value: other.to_string(),
            }),
        }
    }
}

/// The scope of a graph request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GraphKind {
    /// All traffic into, out of, and within a set of namespaces.
    #[default]
    Namespace,
    /// Traffic requesting or requested by a single node.
    Node,
}

impl fmt::Display for GraphKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphKind::Namespace => f.write_str("namespace"),
            GraphKind::Node => f.write_str("node"),
        }
    }
}

impl FromStr for GraphKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "namespace" => Ok(GraphKind::Namespace),
            "node" => Ok(GraphKind::Node),
            other => Err(CoreError::UnsupportedGraphKind {
                value: other.to_string(),
            }),
        }
    }
}

/// A requested namespace and the length of its observation window.
///
/// The window ends at [`GraphOptions::query_time`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceScope {
    pub name: String,
    #[serde(with = "duration_secs", default = "default_duration")]
    pub duration: Duration,
}

impl NamespaceScope {
    pub fn new(name: impl Into<String>, duration: Duration) -> Self {
        NamespaceScope {
            name: name.into(),
            duration,
        }
    }
}

/// Labels selecting the focal node of a node graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSelector {
    pub namespace: String,
    pub workload: String,
    pub app: String,
    pub version: String,
    pub service: String,
}

/// Options for a single graph request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GraphOptions {
    pub graph_kind: GraphKind,
    pub graph_type: GraphType,
    pub inject_service_nodes: bool,
    /// Include traffic to and from the control-plane namespace.
    pub include_control_plane: bool,
    pub control_plane_namespace: String,
    /// Instant the observation windows end at.
    pub query_time: DateTime<Utc>,
    /// Requested namespaces, in request order.
    pub namespaces: IndexMap<String, NamespaceScope>,
    /// Namespaces the caller may see, with the time access was granted.
    pub accessible_namespaces: HashMap<String, DateTime<Utc>>,
    /// Focal node for [`GraphKind::Node`] requests.
    pub node: Option<NodeSelector>,
    /// Appender names, run in order.
    pub appenders: Vec<String>,
    pub response_time_quantile: f64,
    /// Hosts registered as mesh-external services.
    pub service_entry_hosts: BTreeSet<String>,
    /// Deadline for the whole build.
    #[serde(with = "option_duration_secs")]
    pub timeout: Option<Duration>,
}

impl Default for GraphOptions {
    fn default() -> Self {
        GraphOptions {
            graph_kind: GraphKind::Namespace,
            graph_type: GraphType::Workload,
            inject_service_nodes: false,
            include_control_plane: false,
            control_plane_namespace: DEFAULT_CONTROL_PLANE_NAMESPACE.to_string(),
            query_time: Utc::now(),
            namespaces: IndexMap::new(),
            accessible_namespaces: HashMap::new(),
            node: None,
            appenders: Vec::new(),
            response_time_quantile: DEFAULT_QUANTILE,
            service_entry_hosts: BTreeSet::new(),
            timeout: None,
        }
    }
}

impl GraphOptions {
    /// Creates options for a namespace graph of the given type.
    pub fn new(graph_type: GraphType) -> Self {
        GraphOptions {
            graph_type,
            ..GraphOptions::default()
        }
    }

    /// Adds a requested namespace. The namespace is also made accessible.
    pub fn with_namespace(mut self, name: &str, duration: Duration) -> Self {
        self.namespaces
            .insert(name.to_string(), NamespaceScope::new(name, duration));
        self.accessible_namespaces
            .entry(name.to_string())
            .or_insert(self.query_time);
        self
    }

    /// Marks an additional namespace accessible without requesting it.
    pub fn with_accessible_namespace(mut self, name: &str) -> Self {
        self.accessible_namespaces
            .insert(name.to_string(), self.query_time);
        self
    }

    pub fn with_query_time(mut self, query_time: DateTime<Utc>) -> Self {
        self.query_time = query_time;
        self
    }

    pub fn with_service_injection(mut self, inject: bool) -> Self {
        self.inject_service_nodes = inject;
        self
    }

    pub fn with_control_plane(mut self, include: bool) -> Self {
        self.include_control_plane = include;
        self
    }

    pub fn with_appender(mut self, name: &str) -> Self {
        self.appenders.push(name.to_string());
        self
    }

    /// Switches the request to a node graph centered on `node`.
    pub fn with_node(mut self, node: NodeSelector) -> Self {
        self.graph_kind = GraphKind::Node;
        self.node = Some(node);
        self
    }

    /// Service graphs are always built with injected service nodes so the
    /// reducer can walk service -> workload -> service paths.
    pub fn injects_service_nodes(&self) -> bool {
        self.inject_service_nodes || self.graph_type == GraphType::Service
    }

    /// Returns `true` if `namespace` is one of the requested namespaces.
    pub fn is_requested(&self, namespace: &str) -> bool {
        self.namespaces.contains_key(namespace)
    }

    /// Returns `true` if `namespace` is in the accessible-namespace set.
    pub fn is_accessible(&self, namespace: &str) -> bool {
        self.accessible_namespaces.contains_key(namespace)
    }
}

fn default_duration() -> Duration {
    DEFAULT_DURATION
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

mod option_duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_some(&d.as_secs()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_secs))
    }
}
