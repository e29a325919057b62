//! Reduction of a service-injected workload graph to a service graph.
//!
//! Every `service -> workload -> service` path becomes a single
//! `service -> service` edge. Non-service nodes are dropped unless they are
//! roots, which are kept to show where traffic enters. A kept root is
//! rewired the same way, so every edge of the reduced graph ends at a
//! service.

use meshgraph_core::{keys, CoreError, Edge, Node, NodeKind, Protocol, TrafficMap};

use crate::error::GraphError;

/// Counters summed when two reduced edges coincide.
const HTTP_COUNTERS: [&str; 4] = [keys::HTTP, keys::HTTP_3XX, keys::HTTP_4XX, keys::HTTP_5XX];

pub fn reduce_to_service_graph(map: &TrafficMap) -> Result<TrafficMap, GraphError> {
    let mut reduced = TrafficMap::new();

    for node in map.nodes() {
        let kept = match node.kind {
            NodeKind::Service => reduce_service(map, node)?,
            _ if node.is_root() => reduce_root(map, node)?,
            _ => continue,
        };
        reduced.insert(kept);
    }

    Ok(reduced)
}

fn reduce_service(map: &TrafficMap, node: &Node) -> Result<Node, GraphError> {
    let mut service = without_edges(node);
    for hop in &node.edges {
        let intermediate = map.node(&hop.dest)?;
        match intermediate.kind {
            NodeKind::Workload => {
                for edge in &intermediate.edges {
                    let child = map.node(&edge.dest)?;
                    expect_kind(child, NodeKind::Service)?;
                    add_service_edge(&mut service, edge)?;
                }
            }
            // service -> service traffic is already reduced
            NodeKind::Service => add_service_edge(&mut service, hop)?,
            _ => expect_kind(intermediate, NodeKind::Workload)?,
        }
    }
    Ok(service)
}

/// Keeps a root's edges into services. An edge into a dropped workload is
/// replaced by that workload's edges into services; anything else is
/// dropped with the node it leads to.
fn reduce_root(map: &TrafficMap, node: &Node) -> Result<Node, GraphError> {
    let mut root = without_edges(node);
    for hop in &node.edges {
        let dest = map.node(&hop.dest)?;
        match dest.kind {
            NodeKind::Service => add_service_edge(&mut root, hop)?,
            NodeKind::Workload => {
                for edge in &dest.edges {
                    if map.node(&edge.dest)?.kind == NodeKind::Service {
                        add_service_edge(&mut root, edge)?;
                    }
                }
            }
            _ => {}
        }
    }
    Ok(root)
}

fn without_edges(node: &Node) -> Node {
    Node {
        edges: Vec::with_capacity(node.edges.len()),
        ..node.clone()
    }
}

fn expect_kind(node: &Node, expected: NodeKind) -> Result<(), CoreError> {
    if node.kind == expected {
        return Ok(());
    }
    Err(CoreError::UnexpectedNodeKind {
        id: node.id.clone(),
        expected,
        actual: node.kind,
    })
}

/// Adds `edge` to `service`, summing into an existing edge with the same
/// destination and protocol.
fn add_service_edge(service: &mut Node, edge: &Edge) -> Result<(), CoreError> {
    let counters: &[&str] = match &edge.protocol {
        Protocol::Http => &HTTP_COUNTERS,
        Protocol::Tcp => &[keys::TCP],
        Protocol::Other(name) => {
            return Err(CoreError::UnsupportedProtocol {
                protocol: name.clone(),
                from: edge.source.clone(),
                to: edge.dest.clone(),
            })
        }
    };

    let response_time = edge.metadata.number(keys::RESPONSE_TIME);

    if let Some(target) = service
        .edges
        .iter_mut()
        .find(|e| e.matches(&edge.dest, &edge.protocol))
    {
        for key in counters {
            if let Some(value) = edge.metadata.number(key) {
                target.metadata.sum_into(key, value);
            }
        }
        if let Some(value) = response_time {
            target.metadata.average_into(keys::RESPONSE_TIME, value);
        }
        return Ok(());
    }

    let mut adopted = edge.clone();
    adopted.source = service.id.clone();
    // restart the running average from this edge's value alone
    if let Some(value) = response_time {
        adopted
            .metadata
            .remove(&format!("{}{}", keys::RESPONSE_TIME, keys::TOTAL_SUFFIX));
        adopted
            .metadata
            .remove(&format!("{}{}", keys::RESPONSE_TIME, keys::COUNT_SUFFIX));
        adopted.metadata.remove(keys::RESPONSE_TIME);
        adopted.metadata.average_into(keys::RESPONSE_TIME, value);
    }
    service.edges.push(adopted);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshgraph_core::{GraphType, NodeId};

    fn service(name: &str) -> Node {
        Node::new("bookinfo", "", "", "", name, GraphType::Service)
    }

    fn workload(name: &str) -> Node {
        Node::new("bookinfo", name, "", "", "", GraphType::Service)
    }

    fn link<'a>(from: &'a mut Node, to: &NodeId, protocol: Protocol, rate: f64) -> &'a mut Edge {
        let key = protocol.rate_key().unwrap_or(keys::HTTP);
        let edge = from.edge_or_insert(to, protocol);
        edge.metadata.sum_into(key, rate);
        edge
    }

    #[test]
    fn collapses_workload_hop() {
        let mut s1 = service("productpage");
        let mut w = workload("productpage-v1");
        let s2 = service("reviews");
        link(&mut s1, &w.id, Protocol::Http, 100.0);
        link(&mut w, &s2.id, Protocol::Http, 100.0);
        let map: TrafficMap = [s1.clone(), w, s2.clone()].into_iter().collect();

        let reduced = reduce_to_service_graph(&map).unwrap();
        assert_eq!(reduced.len(), 2);
        let edges = &reduced.get(&s1.id).unwrap().edges;
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].dest, s2.id);
        assert_eq!(edges[0].source, s1.id);
        assert_eq!(edges[0].rate(), 100.0);
        assert!(reduced.validate().is_ok());
    }

    #[test]
    fn parallel_workloads_are_summed_and_averaged() {
        let mut s1 = service("productpage");
        let mut w1 = workload("productpage-v1");
        let mut w2 = workload("productpage-v2");
        let s2 = service("reviews");
        link(&mut s1, &w1.id, Protocol::Http, 150.0);
        link(&mut s1, &w2.id, Protocol::Http, 50.0);
        let e1 = link(&mut w1, &s2.id, Protocol::Http, 100.0);
        e1.metadata.sum_into(keys::HTTP_5XX, 4.0);
        e1.metadata.insert(keys::RESPONSE_TIME, 10.0);
        let e2 = link(&mut w2, &s2.id, Protocol::Http, 50.0);
        e2.metadata.sum_into(keys::HTTP_5XX, 1.0);
        e2.metadata.insert(keys::RESPONSE_TIME, 30.0);
        let map: TrafficMap = [s1.clone(), w1, w2, s2].into_iter().collect();

        let reduced = reduce_to_service_graph(&map).unwrap();
        let edges = &reduced.get(&s1.id).unwrap().edges;
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].rate(), 150.0);
        assert_eq!(edges[0].metadata.number(keys::HTTP_5XX), Some(5.0));
        assert_eq!(edges[0].metadata.number(keys::RESPONSE_TIME), Some(20.0));
    }

    #[test]
    fn roots_survive_other_workloads_do_not() {
        let mut gen = workload("traffic-generator");
        gen.metadata.set_flag(keys::IS_ROOT);
        let s = service("productpage");
        link(&mut gen, &s.id, Protocol::Tcp, 8.0);
        let idle = workload("idle");
        let map: TrafficMap = [gen.clone(), s.clone(), idle.clone()].into_iter().collect();

        let reduced = reduce_to_service_graph(&map).unwrap();
        assert!(reduced.contains(&gen.id));
        assert!(reduced.contains(&s.id));
        assert!(!reduced.contains(&idle.id));
    }

    #[test]
    fn direct_and_indirect_service_traffic_is_summed() {
        let mut s1 = service("productpage");
        let mut w = workload("productpage-v1");
        let s2 = service("reviews");
        let direct = link(&mut s1, &s2.id, Protocol::Http, 10.0);
        direct.metadata.sum_into(keys::HTTP_5XX, 1.0);
        link(&mut s1, &w.id, Protocol::Http, 5.0);
        let indirect = link(&mut w, &s2.id, Protocol::Http, 5.0);
        indirect.metadata.sum_into(keys::HTTP_5XX, 2.0);
        let map: TrafficMap = [s1.clone(), w, s2.clone()].into_iter().collect();

        let reduced = reduce_to_service_graph(&map).unwrap();
        let edges = &reduced.get(&s1.id).unwrap().edges;
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].dest, s2.id);
        assert_eq!(edges[0].rate(), 15.0);
        assert_eq!(edges[0].metadata.number(keys::HTTP_5XX), Some(3.0));
        assert!(reduced.validate().is_ok());
    }

    #[test]
    fn root_calling_workload_without_service_keeps_no_dangling_edge() {
        use crate::builder::queries::labels::*;
        use crate::builder::TrafficBuilder;
        use crate::classify::mark_traffic_generators;
        use meshgraph_core::GraphOptions;
        use meshgraph_telemetry::Sample;

        let options = GraphOptions::new(GraphType::Service);
        let mut builder = TrafficBuilder::new(&options);
        builder.add_http_samples(&[Sample::new(
            &[
                (SOURCE_NAMESPACE, "bookinfo"),
                (SOURCE_WORKLOAD, "gen"),
                (SOURCE_APP, "unknown"),
                (SOURCE_VERSION, "unknown"),
                (DEST_SERVICE_NAMESPACE, "bookinfo"),
                (DEST_SERVICE, "unknown"),
                (DEST_WORKLOAD, "legacy"),
                (DEST_APP, "unknown"),
                (DEST_VERSION, "unknown"),
                (RESPONSE_CODE, "200"),
            ],
            4.0,
        )]);
        let mut map = builder.finish();
        mark_traffic_generators(&mut map);

        let reduced = reduce_to_service_graph(&map).unwrap();
        assert_eq!(reduced.len(), 1);
        let gen = reduced.nodes().next().unwrap();
        assert!(gen.is_root());
        assert!(gen.edges.is_empty());
        assert!(reduced.validate().is_ok());
    }

    #[test]
    fn root_is_rewired_past_dropped_workload() {
        let mut gen = workload("traffic-generator");
        gen.metadata.set_flag(keys::IS_ROOT);
        let mut legacy = workload("legacy");
        let s = service("reviews");
        link(&mut gen, &legacy.id, Protocol::Http, 6.0);
        link(&mut legacy, &s.id, Protocol::Http, 6.0);
        let map: TrafficMap = [gen.clone(), legacy.clone(), s.clone()].into_iter().collect();

        let reduced = reduce_to_service_graph(&map).unwrap();
        assert!(!reduced.contains(&legacy.id));
        let edges = &reduced.get(&gen.id).unwrap().edges;
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].source, gen.id);
        assert_eq!(edges[0].dest, s.id);
        assert_eq!(edges[0].rate(), 6.0);
        assert!(reduced.validate().is_ok());
    }

    #[test]
    fn unexpected_protocol_is_a_data_error() {
        let mut s1 = service("productpage");
        let mut w = workload("productpage-v1");
        let s2 = service("reviews");
        link(&mut s1, &w.id, Protocol::Http, 1.0);
        w.edge_or_insert(&s2.id, Protocol::Other("grpc".into()));
        let map: TrafficMap = [s1, w, s2].into_iter().collect();

        let err = reduce_to_service_graph(&map).unwrap_err();
        assert!(matches!(err, GraphError::Data(msg) if msg.contains("grpc")));
    }

    #[test]
    fn workload_child_is_a_data_error() {
        let mut s1 = service("productpage");
        let mut w1 = workload("productpage-v1");
        let w2 = workload("reviews-v1");
        link(&mut s1, &w1.id, Protocol::Http, 1.0);
        link(&mut w1, &w2.id, Protocol::Http, 1.0);
        let map: TrafficMap = [s1, w1, w2].into_iter().collect();

        assert!(matches!(
            reduce_to_service_graph(&map),
            Err(GraphError::Data(_))
        ));
    }

    #[test]
    fn empty_graph_reduces_to_empty() {
        assert!(reduce_to_service_graph(&TrafficMap::new()).unwrap().is_empty());
    }
}
