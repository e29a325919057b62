//! Integration tests for node graphs.

use std::sync::Arc;

use meshgraph_core::options::DEFAULT_DURATION;
use meshgraph_core::{keys, GraphKind, GraphOptions, GraphType, NodeKind, NodeSelector};
use meshgraph_engine::{ErrorKind, GraphEngine};
use meshgraph_telemetry::{InMemoryTelemetry, Sample};
use tokio_util::sync::CancellationToken;

const INBOUND: &str = concat!(
    r#"reporter="destination","#,
    r#"destination_workload_namespace="bookinfo",destination_workload="reviews-v1""#
);
const OUTBOUND: &str =
    r#"reporter="source",source_workload_namespace="bookinfo",source_workload="reviews-v1""#;

fn request(source: (&str, &str), dest: (&str, &str, &str), value: f64) -> Sample {
    Sample::new(
        &[
            ("source_workload_namespace", "bookinfo"),
            ("source_workload", source.0),
            ("source_app", source.1),
            ("source_version", "v1"),
            ("destination_service_namespace", "bookinfo"),
            ("destination_service_name", dest.0),
            ("destination_workload", dest.1),
            ("destination_app", dest.2),
            ("destination_version", "v1"),
            ("response_code", "200"),
        ],
        value,
    )
}

fn reviews_telemetry() -> Arc<InMemoryTelemetry> {
    Arc::new(
        InMemoryTelemetry::new()
            .respond(
                &[INBOUND, "istio_requests_total"],
                vec![request(
                    ("productpage-v1", "productpage"),
                    ("reviews", "reviews-v1", "reviews"),
                    10.0,
                )],
            )
            .respond(
                &[OUTBOUND, "istio_requests_total"],
                vec![request(("reviews-v1", "reviews"), ("ratings", "ratings-v1", "ratings"), 5.0)],
            ),
    )
}

fn reviews_selector() -> NodeSelector {
    NodeSelector {
        namespace: "bookinfo".to_string(),
        workload: "reviews-v1".to_string(),
        ..NodeSelector::default()
    }
}

fn options(graph_type: GraphType) -> GraphOptions {
    GraphOptions::new(graph_type)
        .with_namespace("bookinfo", DEFAULT_DURATION)
        .with_node(reviews_selector())
}

#[tokio::test]
async fn workload_node_graph_has_both_directions() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let telemetry = reviews_telemetry();
    let engine = GraphEngine::new(telemetry.clone());

    let map = engine
        .build_graph(options(GraphType::Workload), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(map.len(), 3);
    assert_eq!(map.edge_count(), 2);
    let reviews = map.nodes().find(|n| n.workload == "reviews-v1").unwrap();
    assert_eq!(reviews.metadata.number(keys::HTTP_IN), Some(10.0));
    assert_eq!(reviews.metadata.number(keys::HTTP_OUT), Some(5.0));
    assert!(map.nodes().find(|n| n.workload == "productpage-v1").unwrap().is_root());
    // two http and two tcp queries
    assert_eq!(telemetry.queries().len(), 4);
}

#[tokio::test]
async fn service_node_graph_is_not_reduced() {
    let engine = GraphEngine::new(reviews_telemetry());
    let map = engine
        .build_node_graph(options(GraphType::Service), CancellationToken::new())
        .await
        .unwrap();

    // productpage -> reviews svc -> reviews-v1 -> ratings svc -> ratings-v1
    assert_eq!(map.len(), 5);
    assert_eq!(map.nodes().filter(|n| n.kind == NodeKind::Workload).count(), 3);
    assert!(map.validate().is_ok());
}

#[tokio::test]
async fn node_graph_requires_one_namespace() {
    let telemetry = reviews_telemetry();
    let engine = GraphEngine::new(telemetry.clone());
    let options = options(GraphType::Workload).with_namespace("shared", DEFAULT_DURATION);

    let err = engine
        .build_node_graph(options, CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(err.to_string().contains("exactly one namespace"));
    assert!(telemetry.queries().is_empty());
}

#[tokio::test]
async fn node_graph_requires_a_selector() {
    let engine = GraphEngine::new(reviews_telemetry());
    let mut options =
        GraphOptions::new(GraphType::Workload).with_namespace("bookinfo", DEFAULT_DURATION);
    options.graph_kind = GraphKind::Node;

    let err = engine
        .build_graph(options, CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[tokio::test]
async fn selector_namespace_must_match_request() {
    let engine = GraphEngine::new(reviews_telemetry());
    let options = GraphOptions::new(GraphType::Workload)
        .with_namespace("shared", DEFAULT_DURATION)
        .with_node(reviews_selector());

    let err = engine
        .build_node_graph(options, CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert_eq!(err.detail().code, "CONFIGURATION_ERROR");
}
