//! The identity resolver.
//!
//! [`resolve`] maps a label tuple and a [`GraphType`] to a node id and
//! [`NodeKind`]. It is a pure function with no hidden state, so independent
//! namespace passes and appenders agree on the identity of every entity.
//!
//! Rules, in priority order:
//! 1. namespace `unknown` -> `Unknown`
//! 2. a service with no workload, app or version -> `Service`
//! 3. app-based graph types with an app label -> `VersionedApp` or `App`
//! 4. a workload label -> `Workload`
//!
//! An entity matching none of the rules falls back to `Service` when it has a
//! service label and to `Unknown` otherwise.

use crate::id::{is_ok, NodeId};
use crate::node::NodeKind;
use crate::options::GraphType;

const DELIMITER: char = '_';
const ESCAPE: char = '\\';

/// Resolves the identity of the entity described by the given labels.
pub fn resolve(
    namespace: &str,
    workload: &str,
    app: &str,
    version: &str,
    service: &str,
    graph_type: GraphType,
) -> (NodeId, NodeKind) {
    if namespace == crate::id::UNKNOWN {
        return (NodeId::unknown(), NodeKind::Unknown);
    }

    let workload_ok = is_ok(workload);
    let app_ok = is_ok(app);
    let version_ok = is_ok(version);
    let service_ok = is_ok(service);

    if service_ok && !workload_ok && !app_ok && !version_ok {
        return (compose("svc", &[namespace, service]), NodeKind::Service);
    }

    if graph_type.is_app_based() && app_ok {
        if graph_type == GraphType::VersionedApp && version_ok {
            return (
                compose("vapp", &[namespace, app, version]),
                NodeKind::VersionedApp,
            );
        }
        return (compose("app", &[namespace, app]), NodeKind::App);
    }

    if workload_ok {
        return (compose("wl", &[namespace, workload]), NodeKind::Workload);
    }

    if service_ok {
        return (compose("svc", &[namespace, service]), NodeKind::Service);
    }

    (NodeId::unknown(), NodeKind::Unknown)
}

/// Joins a kind prefix and fields with `_`, escaping `_` and `\` inside
/// fields so distinct tuples never collide.
fn compose(prefix: &str, fields: &[&str]) -> NodeId {
    let capacity = prefix.len() + fields.iter().map(|f| f.len() + 1).sum::<usize>();
    let mut id = String::with_capacity(capacity);
    id.push_str(prefix);
    for field in fields {
        id.push(DELIMITER);
        for c in field.chars() {
            if c == DELIMITER || c == ESCAPE {
                id.push(ESCAPE);
            }
            id.push(c);
        }
    }
    NodeId::from_composed(id)
}
