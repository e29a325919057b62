//! The telemetry query sets issued for namespace and node graphs.
//!
//! Queries are split by traffic origin so that every edge touching the
//! namespace is seen exactly once: traffic from outside the mesh, traffic
//! crossing in from other namespaces, and traffic originating inside. The
//! control plane only reports destination-side, so including it takes two
//! extra destination-reported queries.

use std::time::Duration;

use meshgraph_core::{GraphOptions, Node, NodeKind, UNKNOWN};
use meshgraph_telemetry::RateQuery;

use crate::error::GraphError;

pub const HTTP_METRIC: &str = "istio_requests_total";
pub const TCP_METRIC: &str = "istio_tcp_sent_bytes_total";
pub const DURATION_METRIC: &str = "istio_request_duration_seconds_bucket";

/// Response codes counted as traffic.
pub const VALID_RESPONSE_CODES: &str = "[2345][0-9][0-9]";
/// Response codes whose latency is measured.
pub const SUCCESS_RESPONSE_CODES: &str = "2[0-9]{2}";

/// Telemetry label names.
pub mod labels {
    pub const REPORTER: &str = "reporter";
    pub const SOURCE_NAMESPACE: &str = "source_workload_namespace";
    pub const SOURCE_WORKLOAD: &str = "source_workload";
    pub const SOURCE_APP: &str = "source_app";
    pub const SOURCE_VERSION: &str = "source_version";
    pub const DEST_SERVICE_NAMESPACE: &str = "destination_service_namespace";
    pub const DEST_WORKLOAD_NAMESPACE: &str = "destination_workload_namespace";
    pub const DEST_SERVICE: &str = "destination_service_name";
    pub const DEST_WORKLOAD: &str = "destination_workload";
    pub const DEST_APP: &str = "destination_app";
    pub const DEST_VERSION: &str = "destination_version";
    pub const RESPONSE_CODE: &str = "response_code";
}

use labels::*;

/// Grouping for request counters.
pub const HTTP_GROUP_BY: &[&str] = &[
    SOURCE_NAMESPACE,
    SOURCE_WORKLOAD,
    SOURCE_APP,
    SOURCE_VERSION,
    DEST_SERVICE_NAMESPACE,
    DEST_SERVICE,
    DEST_WORKLOAD,
    DEST_APP,
    DEST_VERSION,
    RESPONSE_CODE,
];

/// Grouping for byte counters and latency histograms.
pub const ATTRIBUTION_GROUP_BY: &[&str] = &[
    SOURCE_NAMESPACE,
    SOURCE_WORKLOAD,
    SOURCE_APP,
    SOURCE_VERSION,
    DEST_SERVICE_NAMESPACE,
    DEST_SERVICE,
    DEST_WORKLOAD,
    DEST_APP,
    DEST_VERSION,
];

/// Byte counters reported for unknown sources carry no service namespace.
const TCP_UNKNOWN_GROUP_BY: &[&str] = &[
    SOURCE_NAMESPACE,
    SOURCE_WORKLOAD,
    SOURCE_APP,
    SOURCE_VERSION,
    DEST_WORKLOAD_NAMESPACE,
    DEST_SERVICE,
    DEST_WORKLOAD,
    DEST_APP,
    DEST_VERSION,
];

/// Queries to evaluate for one graph, split by protocol family.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuerySet {
    pub http: Vec<RateQuery>,
    pub tcp: Vec<RateQuery>,
}

/// Request queries for a namespace.
///
/// `metric`, `codes` and `group_by` vary between the request counters and
/// the latency histograms; the origin split is the same.
pub fn namespace_requests(
    metric: &str,
    codes: &str,
    group_by: &[&str],
    namespace: &str,
    range: Duration,
    options: &GraphOptions,
) -> Vec<RateQuery> {
    let base = || RateQuery::new(metric, range).group_by(group_by);

    let mut queries = vec![
        // outside the mesh
        base()
            .eq(REPORTER, "destination")
            .eq(SOURCE_WORKLOAD, UNKNOWN)
            .eq(DEST_SERVICE_NAMESPACE, namespace)
            .regex(RESPONSE_CODE, codes),
        // other namespaces
        base()
            .eq(REPORTER, "source")
            .ne(SOURCE_NAMESPACE, namespace)
            .ne(SOURCE_WORKLOAD, UNKNOWN)
            .eq(DEST_SERVICE_NAMESPACE, namespace)
            .regex(RESPONSE_CODE, codes),
        // inside the namespace
        base()
            .eq(REPORTER, "source")
            .eq(SOURCE_NAMESPACE, namespace)
            .regex(RESPONSE_CODE, codes),
    ];

    if options.include_control_plane {
        let control_plane = options.control_plane_namespace.as_str();
        if namespace == control_plane {
            queries.push(
                base()
                    .eq(REPORTER, "destination")
                    .ne(SOURCE_NAMESPACE, namespace)
                    .eq(DEST_SERVICE_NAMESPACE, namespace)
                    .regex(RESPONSE_CODE, codes),
            );
        }
        queries.push(
            base()
                .eq(REPORTER, "destination")
                .eq(SOURCE_NAMESPACE, namespace)
                .eq(DEST_SERVICE_NAMESPACE, control_plane)
                .regex(RESPONSE_CODE, codes),
        );
    }

    queries
}

/// Byte-counter queries for a namespace.
pub fn namespace_tcp(namespace: &str, range: Duration) -> Vec<RateQuery> {
    vec![
        RateQuery::new(TCP_METRIC, range)
            .eq(REPORTER, "destination")
            .eq(SOURCE_WORKLOAD, UNKNOWN)
            .eq(DEST_WORKLOAD_NAMESPACE, namespace)
            .group_by(TCP_UNKNOWN_GROUP_BY),
        RateQuery::new(TCP_METRIC, range)
            .eq(REPORTER, "source")
            .ne(SOURCE_NAMESPACE, namespace)
            .ne(SOURCE_WORKLOAD, UNKNOWN)
            .eq(DEST_SERVICE_NAMESPACE, namespace)
            .group_by(ATTRIBUTION_GROUP_BY),
        RateQuery::new(TCP_METRIC, range)
            .eq(REPORTER, "source")
            .eq(SOURCE_NAMESPACE, namespace)
            .group_by(ATTRIBUTION_GROUP_BY),
    ]
}

/// Every query of a namespace graph.
pub fn namespace_queries(namespace: &str, range: Duration, options: &GraphOptions) -> QuerySet {
    QuerySet {
        http: namespace_requests(
            HTTP_METRIC,
            VALID_RESPONSE_CODES,
            HTTP_GROUP_BY,
            namespace,
            range,
            options,
        ),
        tcp: namespace_tcp(namespace, range),
    }
}

/// Every query of a node graph centered on `node`.
///
/// Service nodes get no outbound queries: their outbound traffic is the
/// inbound traffic of the workloads behind them.
pub fn node_queries(
    node: &Node,
    range: Duration,
    options: &GraphOptions,
) -> Result<QuerySet, GraphError> {
    let ns = node.namespace.as_str();
    let http = || RateQuery::new(HTTP_METRIC, range).group_by(HTTP_GROUP_BY);
    let tcp = || RateQuery::new(TCP_METRIC, range).group_by(ATTRIBUTION_GROUP_BY);
    let mut set = QuerySet::default();

    match node.kind {
        NodeKind::Workload => {
            set.http.push(
                http()
                    .eq(REPORTER, "destination")
                    .eq(DEST_WORKLOAD_NAMESPACE, ns)
                    .eq(DEST_WORKLOAD, &node.workload)
                    .regex(RESPONSE_CODE, VALID_RESPONSE_CODES),
            );
            set.http.push(
                http()
                    .eq(REPORTER, "source")
                    .eq(SOURCE_NAMESPACE, ns)
                    .eq(SOURCE_WORKLOAD, &node.workload)
                    .regex(RESPONSE_CODE, VALID_RESPONSE_CODES),
            );
            set.tcp.push(
                tcp()
                    .eq(REPORTER, "source")
                    .eq(DEST_WORKLOAD_NAMESPACE, ns)
                    .eq(DEST_WORKLOAD, &node.workload),
            );
            set.tcp.push(
                tcp()
                    .eq(REPORTER, "source")
                    .eq(SOURCE_NAMESPACE, ns)
                    .eq(SOURCE_WORKLOAD, &node.workload),
            );
        }
        NodeKind::App | NodeKind::VersionedApp => {
            let versioned = !node.version.is_empty();
            let inbound = |q: RateQuery| {
                let q = q.eq(DEST_SERVICE_NAMESPACE, ns).eq(DEST_APP, &node.app);
                if versioned {
                    q.eq(DEST_VERSION, &node.version)
                } else {
                    q
                }
            };
            let outbound = |q: RateQuery| {
                let q = q.eq(SOURCE_NAMESPACE, ns).eq(SOURCE_APP, &node.app);
                if versioned {
                    q.eq(SOURCE_VERSION, &node.version)
                } else {
                    q
                }
            };
            set.http.push(
                inbound(http().eq(REPORTER, "destination"))
                    .regex(RESPONSE_CODE, VALID_RESPONSE_CODES),
            );
            set.http.push(
                outbound(http().eq(REPORTER, "source")).regex(RESPONSE_CODE, VALID_RESPONSE_CODES),
            );
            set.tcp.push(inbound(tcp().eq(REPORTER, "source")));
            set.tcp.push(outbound(tcp().eq(REPORTER, "source")));
        }
        NodeKind::Service => {
            // unknown sources only report destination-side
            set.http.push(
                http()
                    .eq(REPORTER, "destination")
                    .eq(SOURCE_WORKLOAD, UNKNOWN)
                    .eq(DEST_SERVICE_NAMESPACE, ns)
                    .eq(DEST_SERVICE, &node.service)
                    .regex(RESPONSE_CODE, VALID_RESPONSE_CODES),
            );
            set.http.push(
                http()
                    .eq(REPORTER, "source")
                    .eq(DEST_SERVICE_NAMESPACE, ns)
                    .eq(DEST_SERVICE, &node.service)
                    .regex(RESPONSE_CODE, VALID_RESPONSE_CODES),
            );
            set.tcp.push(
                tcp()
                    .eq(REPORTER, "source")
                    .eq(DEST_SERVICE_NAMESPACE, ns)
                    .eq(DEST_SERVICE, &node.service),
            );
        }
        NodeKind::Unknown => {
            return Err(GraphError::Configuration(format!(
                "node graph does not support node kind [{}]",
                node.kind
            )))
        }
    }

    if options.include_control_plane {
        let control_plane = options.control_plane_namespace.as_str();
        let query = match node.kind {
            NodeKind::Workload => http()
                .eq(REPORTER, "destination")
                .eq(SOURCE_NAMESPACE, ns)
                .eq(SOURCE_WORKLOAD, &node.workload)
                .eq(DEST_SERVICE_NAMESPACE, control_plane),
            NodeKind::App | NodeKind::VersionedApp => {
                let q = http()
                    .eq(REPORTER, "destination")
                    .eq(SOURCE_NAMESPACE, ns)
                    .eq(SOURCE_APP, &node.app);
                let q = if node.version.is_empty() {
                    q
                } else {
                    q.eq(SOURCE_VERSION, &node.version)
                };
                q.eq(DEST_SERVICE_NAMESPACE, control_plane)
            }
            _ => http()
                .eq(REPORTER, "destination")
                .eq(DEST_SERVICE_NAMESPACE, control_plane)
                .eq(DEST_SERVICE, &node.service),
        };
        set.http.push(query.regex(RESPONSE_CODE, VALID_RESPONSE_CODES));
    }

    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshgraph_core::options::DEFAULT_DURATION;
    use meshgraph_core::GraphType;
    use meshgraph_telemetry::round;

    fn exprs(queries: &[RateQuery]) -> Vec<String> {
        queries.iter().map(|q| round(&q.sum_rate())).collect()
    }

    #[test]
    fn namespace_http_queries_split_by_origin() {
        let options = GraphOptions::new(GraphType::Workload);
        let set = namespace_queries("bookinfo", Duration::from_secs(60), &options);
        assert_eq!(set.http.len(), 3);
        assert_eq!(set.tcp.len(), 3);
        insta::assert_snapshot!(exprs(&set.http).join("\n"), @r#"
        round(sum(rate(istio_requests_total{reporter="destination",source_workload="unknown",destination_service_namespace="bookinfo",response_code=~"[2345][0-9][0-9]"} [60s])) by (source_workload_namespace,source_workload,source_app,source_version,destination_service_namespace,destination_service_name,destination_workload,destination_app,destination_version,response_code),0.001)
        round(sum(rate(istio_requests_total{reporter="source",source_workload_namespace!="bookinfo",source_workload!="unknown",destination_service_namespace="bookinfo",response_code=~"[2345][0-9][0-9]"} [60s])) by (source_workload_namespace,source_workload,source_app,source_version,destination_service_namespace,destination_service_name,destination_workload,destination_app,destination_version,response_code),0.001)
        round(sum(rate(istio_requests_total{reporter="source",source_workload_namespace="bookinfo",response_code=~"[2345][0-9][0-9]"} [60s])) by (source_workload_namespace,source_workload,source_app,source_version,destination_service_namespace,destination_service_name,destination_workload,destination_app,destination_version,response_code),0.001)
        "#);
    }

    #[test]
    fn tcp_unknown_query_uses_workload_namespace() {
        let set = namespace_tcp("bookinfo", DEFAULT_DURATION);
        let first = set[0].sum_rate();
        assert!(first.contains(r#"destination_workload_namespace="bookinfo""#));
        assert!(first.contains(
            "by (source_workload_namespace,source_workload,source_app,source_version,\
             destination_workload_namespace,"
        ));
    }

    #[test]
    fn control_plane_adds_destination_reported_queries() {
        let options = GraphOptions::new(GraphType::Workload).with_control_plane(true);

        let other = namespace_queries("bookinfo", DEFAULT_DURATION, &options);
        assert_eq!(other.http.len(), 4);
        let supplement = other.http[3].sum_rate();
        assert!(supplement.contains(r#"source_workload_namespace="bookinfo","#));
        assert!(supplement.contains(r#"destination_service_namespace="istio-system""#));

        let control_plane = namespace_queries("istio-system", DEFAULT_DURATION, &options);
        assert_eq!(control_plane.http.len(), 5);
        let inbound = control_plane.http[3].sum_rate();
        assert!(inbound.contains(r#"source_workload_namespace!="istio-system","#));
        assert!(inbound.contains(r#"destination_service_namespace="istio-system""#));
    }

    #[test]
    fn service_node_has_no_outbound_queries() {
        let options = GraphOptions::new(GraphType::Workload);
        let node = Node::new("bookinfo", "", "", "", "reviews", GraphType::Workload);
        let set = node_queries(&node, DEFAULT_DURATION, &options).unwrap();
        assert_eq!(set.http.len(), 2);
        assert_eq!(set.tcp.len(), 1);
        assert!(set.http[0].sum_rate().contains(r#"source_workload="unknown""#));
        assert!(set
            .http
            .iter()
            .all(|q| q.sum_rate().contains(r#"destination_service_name="reviews""#)));
    }

    #[test]
    fn app_node_filters_version_only_when_present() {
        let options = GraphOptions::new(GraphType::VersionedApp);
        let unversioned = Node::new("bookinfo", "", "reviews", "", "", GraphType::VersionedApp);
        let set = node_queries(&unversioned, DEFAULT_DURATION, &options).unwrap();
        assert!(set.http.iter().all(|q| !q.sum_rate().contains("_version=")));

        let versioned = Node::new("bookinfo", "", "reviews", "v2", "", GraphType::VersionedApp);
        let set = node_queries(&versioned, DEFAULT_DURATION, &options).unwrap();
        assert!(set.http[0].sum_rate().contains(r#"destination_version="v2""#));
        assert!(set.http[1].sum_rate().contains(r#"source_version="v2""#));
    }

    #[test]
    fn unknown_node_is_rejected() {
        let options = GraphOptions::new(GraphType::Workload);
        let node = Node::new("unknown", "", "", "", "", GraphType::Workload);
        assert!(matches!(
            node_queries(&node, DEFAULT_DURATION, &options),
            Err(GraphError::Configuration(_))
        ));
    }
}
