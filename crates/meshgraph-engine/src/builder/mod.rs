//! The traffic map builder.
//!
//! [`TrafficBuilder`] turns telemetry samples into nodes and edges. Each
//! sample is attributed to a source and a destination, both resolved to
//! node identities; the sample value is added to the edge between them and
//! to the source's outbound and the destination's inbound counters.
//! Samples missing attribution labels are logged and skipped.

pub mod queries;

use std::time::Duration;

use meshgraph_core::id::{is_ok, label_or_empty};
use meshgraph_core::{
    identity, keys, GraphOptions, GraphType, Node, NodeId, NodeKind, Protocol, TrafficMap,
};
use meshgraph_telemetry::{round, RateQuery, Sample};
use smallvec::SmallVec;

use crate::appender::GlobalInfo;
use crate::error::GraphError;
use crate::fetch::fetch_all;
use queries::labels::*;
use queries::QuerySet;

/// One side of a sample's traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Endpoint<'a> {
    pub namespace: &'a str,
    pub workload: &'a str,
    pub app: &'a str,
    pub version: &'a str,
    pub service: &'a str,
}

impl<'a> Endpoint<'a> {
    /// A bare service reference.
    fn service(namespace: &'a str, service: &'a str) -> Self {
        Endpoint {
            namespace,
            workload: "",
            app: "",
            version: "",
            service,
        }
    }

    pub fn resolve(&self, graph_type: GraphType) -> (NodeId, NodeKind) {
        identity::resolve(
            self.namespace,
            self.workload,
            self.app,
            self.version,
            self.service,
            graph_type,
        )
    }

    fn node(&self, id: NodeId, kind: NodeKind) -> Node {
        Node::with_identity(
            id,
            kind,
            self.namespace,
            self.workload,
            self.app,
            self.version,
            self.service,
        )
    }
}

/// The source and destination labels of a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Attribution<'a> {
    pub source: Endpoint<'a>,
    pub dest: Endpoint<'a>,
}

impl<'a> Attribution<'a> {
    /// Extracts the attribution labels, or `None` if any is missing.
    ///
    /// Byte counters reported for unknown sources carry the workload
    /// namespace instead of the service namespace.
    pub fn from_sample(sample: &'a Sample) -> Option<Self> {
        let dest_namespace = sample
            .label(DEST_SERVICE_NAMESPACE)
            .or_else(|| sample.label(DEST_WORKLOAD_NAMESPACE))?;
        Some(Attribution {
            source: Endpoint {
                namespace: sample.label(SOURCE_NAMESPACE)?,
                workload: sample.label(SOURCE_WORKLOAD)?,
                app: sample.label(SOURCE_APP)?,
                version: sample.label(SOURCE_VERSION)?,
                service: "",
            },
            dest: Endpoint {
                namespace: dest_namespace,
                workload: sample.label(DEST_WORKLOAD)?,
                app: sample.label(DEST_APP)?,
                version: sample.label(DEST_VERSION)?,
                service: sample.label(DEST_SERVICE)?,
            },
        })
    }

    /// The hops this traffic is drawn as.
    ///
    /// With service injection a request to a workload passes through a
    /// service node: `source -> service -> dest`. Each hop carries the full
    /// sample value. Traffic already addressed to a service node, or with
    /// no service label, is drawn directly.
    pub fn hops(&self, options: &GraphOptions) -> SmallVec<[(Endpoint<'a>, Endpoint<'a>); 2]> {
        let mut hops = SmallVec::new();
        if options.injects_service_nodes() && is_ok(self.dest.service) {
            let (_, dest_kind) = self.dest.resolve(options.graph_type);
            if dest_kind != NodeKind::Service {
                let service = Endpoint::service(self.dest.namespace, self.dest.service);
                hops.push((self.source, service));
                hops.push((service, self.dest));
                return hops;
            }
        }
        hops.push((self.source, self.dest));
        hops
    }
}

/// Accumulates samples into a [`TrafficMap`].
#[derive(Debug)]
pub struct TrafficBuilder<'o> {
    options: &'o GraphOptions,
    map: TrafficMap,
}

impl<'o> TrafficBuilder<'o> {
    pub fn new(options: &'o GraphOptions) -> Self {
        TrafficBuilder {
            options,
            map: TrafficMap::new(),
        }
    }

    /// Adds request-counter samples.
    pub fn add_http_samples(&mut self, samples: &[Sample]) {
        for sample in samples {
            let Some(attribution) = Attribution::from_sample(sample) else {
                tracing::warn!("skipping {:?}, missing expected labels", sample.labels);
                continue;
            };
            let Some(code) = sample.label(RESPONSE_CODE) else {
                tracing::warn!("skipping {:?}, missing response code", sample.labels);
                continue;
            };
            if sample.value.is_nan() {
                tracing::warn!("skipping {:?}, value is NaN", sample.labels);
                continue;
            }
            for (source, dest) in attribution.hops(self.options) {
                self.add_traffic(Protocol::Http, sample.value, Some(code), source, dest);
            }
        }
    }

    /// Adds byte-counter samples.
    pub fn add_tcp_samples(&mut self, samples: &[Sample]) {
        for sample in samples {
            let Some(attribution) = Attribution::from_sample(sample) else {
                tracing::warn!("skipping {:?}, missing expected labels", sample.labels);
                continue;
            };
            if sample.value.is_nan() {
                tracing::warn!("skipping {:?}, value is NaN", sample.labels);
                continue;
            }
            for (source, dest) in attribution.hops(self.options) {
                self.add_traffic(Protocol::Tcp, sample.value, None, source, dest);
            }
        }
    }

    pub fn finish(self) -> TrafficMap {
        self.map
    }

    fn add_traffic(
        &mut self,
        protocol: Protocol,
        value: f64,
        code: Option<&str>,
        source: Endpoint<'_>,
        dest: Endpoint<'_>,
    ) {
        let graph_type = self.options.graph_type;
        let (source_id, source_kind) = source.resolve(graph_type);
        let (dest_id, dest_kind) = dest.resolve(graph_type);
        let (out_key, in_key) = match protocol {
            Protocol::Tcp => (keys::TCP_OUT, keys::TCP_IN),
            _ => (keys::HTTP_OUT, keys::HTTP_IN),
        };
        let code_keys = code.and_then(code_class_keys);

        // source side
        let (node, found) = self
            .map
            .get_or_insert_with(&source_id, || source.node(source_id.clone(), source_kind));
        if found {
            reconcile_labels(node, source.app, source.version, value, graph_type);
        }
        node.metadata.sum_into(out_key, value);
        let rate_key = protocol.rate_key().unwrap_or(keys::HTTP);
        let edge = node.edge_or_insert(&dest_id, protocol);
        edge.metadata.sum_into(rate_key, value);
        if let Some((edge_key, _)) = code_keys {
            edge.metadata.sum_into(edge_key, value);
        }

        // destination side
        let service_entry = dest_kind == NodeKind::Service
            && self.options.service_entry_hosts.contains(dest.service);
        let (node, found) = self
            .map
            .get_or_insert_with(&dest_id, || dest.node(dest_id.clone(), dest_kind));
        if found {
            reconcile_labels(node, dest.app, dest.version, value, graph_type);
        }
        if service_entry {
            node.metadata.set_flag(keys::IS_SERVICE_ENTRY);
        }
        if !dest.service.is_empty() {
            node.metadata.insert_into_set(keys::DEST_SERVICES, dest.service);
        }
        node.metadata.sum_into(in_key, value);
        if let Some((_, node_key)) = code_keys {
            node.metadata.sum_into(node_key, value);
        }
    }
}

/// `(edge key, dest node key)` for a response code's class. 2xx is not
/// tracked; it is the rate minus the other classes.
fn code_class_keys(code: &str) -> Option<(&'static str, &'static str)> {
    match code.as_bytes().first() {
        Some(b'3') => Some((keys::HTTP_3XX, keys::HTTP_IN_3XX)),
        Some(b'4') => Some((keys::HTTP_4XX, keys::HTTP_IN_4XX)),
        Some(b'5') => Some((keys::HTTP_5XX, keys::HTTP_IN_5XX)),
        _ => None,
    }
}

/// Flags a workload whose series disagree on app or version labels.
///
/// A series with traffic is trusted over an idle one, so a non-zero sample
/// overwrites the recorded labels.
fn reconcile_labels(node: &mut Node, app: &str, version: &str, value: f64, graph_type: GraphType) {
    let applies = match node.kind {
        NodeKind::Workload => true,
        NodeKind::App | NodeKind::VersionedApp => graph_type == GraphType::VersionedApp,
        NodeKind::Unknown | NodeKind::Service => false,
    };
    if !applies {
        return;
    }

    let app = label_or_empty(app);
    let version = label_or_empty(version);
    let mut differing: SmallVec<[&str; 2]> = SmallVec::new();
    if node.app != app {
        differing.push("app");
    }
    if node.version != version {
        differing.push("version");
    }
    if differing.is_empty() {
        return;
    }

    for label in &differing {
        node.metadata.insert_into_set(keys::IS_MISCONFIGURED, label);
    }
    if value > 0.0 {
        node.app = app.to_string();
        node.version = version.to_string();
    }
}

fn expressions(queries: &[RateQuery]) -> Vec<String> {
    queries.iter().map(|q| round(&q.sum_rate())).collect()
}

/// Runs a query set and feeds the results to a fresh builder.
///
/// All queries are in flight at once; results are applied in query order
/// once every query has returned.
async fn run_query_set(global: &GlobalInfo, set: &QuerySet) -> Result<TrafficMap, GraphError> {
    let http_exprs = expressions(&set.http);
    let tcp_exprs = expressions(&set.tcp);
    let (http, tcp) = futures::try_join!(
        fetch_all(global, &http_exprs),
        fetch_all(global, &tcp_exprs)
    )?;

    let mut builder = TrafficBuilder::new(&global.options);
    for samples in &http {
        builder.add_http_samples(samples);
    }
    for samples in &tcp {
        builder.add_tcp_samples(samples);
    }
    Ok(builder.finish())
}

/// Builds the traffic map of one namespace.
pub async fn build_namespace_map(
    global: &GlobalInfo,
    namespace: &str,
    duration: Duration,
) -> Result<TrafficMap, GraphError> {
    let set = queries::namespace_queries(namespace, duration, &global.options);
    run_query_set(global, &set).await
}

/// Builds the traffic map around `node`.
pub async fn build_node_map(
    global: &GlobalInfo,
    node: &Node,
    duration: Duration,
) -> Result<TrafficMap, GraphError> {
    let set = queries::node_queries(node, duration, &global.options)?;
    run_query_set(global, &set).await
}
