//! Node classification passes, run once over the merged graph.

use std::collections::HashSet;

use meshgraph_core::{keys, GraphOptions, Node, NodeId, NodeKind, TrafficMap, UNKNOWN};

/// Flags nodes outside the requested namespaces, and those the caller may
/// not see.
///
/// Unknown nodes and service-entry services are always inaccessible.
pub fn mark_outside_or_inaccessible(map: &mut TrafficMap, options: &GraphOptions) {
    for node in map.nodes_mut() {
        match node.kind {
            NodeKind::Unknown => node.metadata.set_flag(keys::IS_INACCESSIBLE),
            NodeKind::Service if node.is_service_entry() => {
                node.metadata.set_flag(keys::IS_INACCESSIBLE)
            }
            _ => {
                if is_outside(node, options) {
                    node.metadata.set_flag(keys::IS_OUTSIDE);
                }
            }
        }
        if node.metadata.flag(keys::IS_OUTSIDE)
            && !node.metadata.flag(keys::IS_INACCESSIBLE)
            && !options.is_accessible(&node.namespace)
        {
            node.metadata.set_flag(keys::IS_INACCESSIBLE);
        }
    }
}

fn is_outside(node: &Node, options: &GraphOptions) -> bool {
    node.namespace != UNKNOWN && !options.is_requested(&node.namespace)
}

/// Flags nodes that send traffic but receive none as roots.
pub fn mark_traffic_generators(map: &mut TrafficMap) {
    let dests: HashSet<NodeId> = map.edges().map(|e| e.dest.clone()).collect();
    for node in map.nodes_mut() {
        if !node.edges.is_empty() && !dests.contains(&node.id) {
            node.metadata.set_flag(keys::IS_ROOT);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshgraph_core::options::DEFAULT_DURATION;
    use meshgraph_core::{GraphType, Protocol};

    fn options() -> GraphOptions {
        GraphOptions::new(GraphType::Workload)
            .with_namespace("bookinfo", DEFAULT_DURATION)
            .with_accessible_namespace("shared")
    }

    fn chain() -> TrafficMap {
        let mut unknown = Node::new("unknown", "", "", "", "", GraphType::Workload);
        let mut productpage =
            Node::new("bookinfo", "productpage-v1", "", "", "", GraphType::Workload);
        let mut cache = Node::new("shared", "cache-v1", "", "", "", GraphType::Workload);
        let db = Node::new("payments", "db-v1", "", "", "", GraphType::Workload);
        unknown.edge_or_insert(&productpage.id, Protocol::Http);
        productpage.edge_or_insert(&cache.id, Protocol::Http);
        cache.edge_or_insert(&db.id, Protocol::Tcp);
        [unknown, productpage, cache, db].into_iter().collect()
    }

    fn flags(map: &TrafficMap, ns: &str) -> (bool, bool, bool) {
        let node = map.nodes().find(|n| n.namespace == ns).unwrap();
        (
            node.metadata.flag(keys::IS_OUTSIDE),
            node.metadata.flag(keys::IS_INACCESSIBLE),
            node.is_root(),
        )
    }

    #[test]
    fn outside_and_inaccessible() {
        let mut map = chain();
        mark_outside_or_inaccessible(&mut map, &options());
        assert_eq!(flags(&map, "unknown"), (false, true, false));
        assert_eq!(flags(&map, "bookinfo"), (false, false, false));
        assert_eq!(flags(&map, "shared"), (true, false, false));
        assert_eq!(flags(&map, "payments"), (true, true, false));
    }

    #[test]
    fn service_entry_is_inaccessible_but_not_outside() {
        let mut stripe = Node::new("bookinfo", "", "", "", "api.stripe.com", GraphType::Workload);
        stripe.metadata.set_flag(keys::IS_SERVICE_ENTRY);
        let mut map: TrafficMap = [stripe].into_iter().collect();
        mark_outside_or_inaccessible(&mut map, &options());
        assert_eq!(flags(&map, "bookinfo"), (false, true, false));
    }

    #[test]
    fn only_pure_sources_are_roots() {
        let mut map = chain();
        mark_traffic_generators(&mut map);
        assert!(flags(&map, "unknown").2);
        assert!(!flags(&map, "bookinfo").2);
        assert!(!flags(&map, "payments").2);
    }

    #[test]
    fn passes_are_no_ops_on_empty_map() {
        let mut map = TrafficMap::new();
        mark_outside_or_inaccessible(&mut map, &options());
        mark_traffic_generators(&mut map);
        assert!(map.is_empty());
    }
}
