//! Folding per-namespace traffic maps into the request's graph.

use meshgraph_core::TrafficMap;

/// Moves every node of `incoming`, built for `namespace`, into `global`.
///
/// When both maps hold a node, the instance belonging to `namespace` wins:
/// it has had that namespace's appenders applied. The losing instance only
/// contributes the edges the winner does not already have, so merging the
/// same map twice adds nothing the second time.
///
/// Duplicates arise when the terminal node of one namespace is a source in
/// another:
///
/// ```text
/// ns1: unknown -> ns1/A -> ns2/B
/// ns2:            ns1/A -> ns2/B -> ns2/C
/// ```
pub fn merge(global: &mut TrafficMap, namespace: &str, incoming: TrafficMap) {
    for mut node in incoming.into_nodes() {
        let Some(existing) = global.get_mut(&node.id) else {
            global.insert(node);
            continue;
        };
        if node.namespace == namespace {
            std::mem::swap(existing, &mut node);
        }
        for edge in node.edges {
            existing.adopt_edge(edge);
        }
    }
}
