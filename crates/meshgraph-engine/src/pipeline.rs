//! Graph build entry points.
//!
//! A namespace graph is built namespace by namespace: each namespace's map
//! is built from telemetry and run through the appenders, then folded into
//! the request graph. Namespaces are built concurrently but merged one at
//! a time in request order, so the result does not depend on which query
//! finishes first. Classification runs on the merged graph and service
//! graphs are reduced last.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use futures::future::try_join_all;
use meshgraph_core::{GraphKind, GraphOptions, GraphType, Node, NodeSelector, TrafficMap};
use meshgraph_telemetry::{TelemetryClient, TelemetryError};
use tokio_util::sync::CancellationToken;

use crate::appender::{self, Appender, GlobalInfo, NamespaceInfo};
use crate::builder;
use crate::classify::{mark_outside_or_inaccessible, mark_traffic_generators};
use crate::error::GraphError;
use crate::merge::merge;
use crate::reduce::reduce_to_service_graph;

/// Builds traffic graphs against one telemetry backend.
#[derive(Clone)]
pub struct GraphEngine {
    client: Arc<dyn TelemetryClient>,
    extra_appenders: Vec<Arc<dyn Appender>>,
}

impl GraphEngine {
    pub fn new(client: Arc<dyn TelemetryClient>) -> Self {
        GraphEngine {
            client,
            extra_appenders: Vec::new(),
        }
    }

    /// Registers an appender that runs after the ones named in the options.
    pub fn with_appender(mut self, appender: Arc<dyn Appender>) -> Self {
        self.extra_appenders.push(appender);
        self
    }

    /// Builds the graph `options.graph_kind` asks for.
    pub async fn build_graph(
        &self,
        options: GraphOptions,
        cancel: CancellationToken,
    ) -> Result<TrafficMap, GraphError> {
        match options.graph_kind {
            GraphKind::Namespace => self.build_namespaces_graph(options, cancel).await,
            GraphKind::Node => self.build_node_graph(options, cancel).await,
        }
    }

    /// Builds the graph of every namespace in `options.namespaces`.
    pub async fn build_namespaces_graph(
        &self,
        options: GraphOptions,
        cancel: CancellationToken,
    ) -> Result<TrafficMap, GraphError> {
        let appenders = self.appenders(&options)?;
        let global = GlobalInfo::new(self.client.clone(), Arc::new(options), cancel.child_token());
        let started = Instant::now();

        let map = with_deadline(&global, async {
            tracing::debug!(
                "build [{}] graph for [{}] namespace(s)",
                global.options.graph_type,
                global.options.namespaces.len()
            );

            let namespace_maps = try_join_all(global.options.namespaces.values().map(|scope| {
                let info = NamespaceInfo::new(scope.name.clone(), scope.duration);
                let appenders = &appenders;
                let global = &global;
                async move {
                    let mut map =
                        builder::build_namespace_map(global, &info.namespace, info.duration).await?;
                    appender::run_all(appenders, &mut map, global, &info).await?;
                    Ok::<_, GraphError>((info.namespace, map))
                }
            }))
            .await?;

            let mut map = TrafficMap::new();
            for (namespace, namespace_map) in namespace_maps {
                merge(&mut map, &namespace, namespace_map);
            }

            mark_outside_or_inaccessible(&mut map, &global.options);
            mark_traffic_generators(&mut map);

            if global.options.graph_type == GraphType::Service {
                map = reduce_to_service_graph(&map)?;
            }
            Ok::<_, GraphError>(map)
        })
        .await?;

        tracing::info!(
            "built [{}] namespace graph with {} node(s) in {:?}",
            global.options.graph_type,
            map.len(),
            started.elapsed()
        );
        Ok(map)
    }

    /// Builds the graph of traffic requesting or requested by `options.node`.
    ///
    /// Exactly one namespace scope is required. The node graph is never
    /// reduced, even for service graphs.
    pub async fn build_node_graph(
        &self,
        options: GraphOptions,
        cancel: CancellationToken,
    ) -> Result<TrafficMap, GraphError> {
        if options.namespaces.len() != 1 {
            return Err(GraphError::Configuration(format!(
                "node graph requires exactly one namespace, got {}",
                options.namespaces.len()
            )));
        }
        let selector = options.node.clone().ok_or_else(|| {
            GraphError::Configuration("node graph requires a node selector".to_string())
        })?;
        let info = scope_for(&options, &selector)?;
        let node = Node::new(
            &info.namespace,
            &selector.workload,
            &selector.app,
            &selector.version,
            &selector.service,
            options.graph_type,
        );

        let appenders = self.appenders(&options)?;
        let global = GlobalInfo::new(self.client.clone(), Arc::new(options), cancel.child_token());
        let started = Instant::now();

        let map = with_deadline(&global, async {
            tracing::debug!("build graph for node [{}]", node.id);
            let mut map = builder::build_node_map(&global, &node, info.duration).await?;
            appender::run_all(&appenders, &mut map, &global, &info).await?;
            mark_outside_or_inaccessible(&mut map, &global.options);
            mark_traffic_generators(&mut map);
            Ok::<_, GraphError>(map)
        })
        .await?;

        tracing::info!(
            "built [{}] node graph for [{}] with {} node(s) in {:?}",
            global.options.graph_type,
            node.id,
            map.len(),
            started.elapsed()
        );
        Ok(map)
    }

    fn appenders(&self, options: &GraphOptions) -> Result<Vec<Arc<dyn Appender>>, GraphError> {
        let mut appenders = appender::from_options(options)?;
        appenders.extend(self.extra_appenders.iter().cloned());
        Ok(appenders)
    }
}

/// The namespace scope of a node graph. The selector's namespace, when set,
/// must be the requested one.
fn scope_for(options: &GraphOptions, selector: &NodeSelector) -> Result<NamespaceInfo, GraphError> {
    let scope = options
        .namespaces
        .values()
        .next()
        .ok_or_else(|| GraphError::Configuration("no namespace requested".to_string()))?;
    if !selector.namespace.is_empty() && selector.namespace != scope.name {
        return Err(GraphError::Configuration(format!(
            "node namespace [{}] is not the requested namespace [{}]",
            selector.namespace, scope.name
        )));
    }
    Ok(NamespaceInfo::new(scope.name.clone(), scope.duration))
}

/// Runs `build` under the request deadline, cancelling outstanding queries
/// when it passes.
async fn with_deadline<F>(global: &GlobalInfo, build: F) -> Result<TrafficMap, GraphError>
where
    F: Future<Output = Result<TrafficMap, GraphError>>,
{
    let Some(limit) = global.options.timeout else {
        return build.await;
    };
    match tokio::time::timeout(limit, build).await {
        Ok(result) => result,
        Err(_) => {
            global.cancel.cancel();
            tracing::warn!("graph build exceeded its {:?} deadline", limit);
            Err(GraphError::Query(TelemetryError::DeadlineExceeded))
        }
    }
}

impl std::fmt::Debug for GraphEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphEngine")
            .field(
                "extra_appenders",
                &self.extra_appenders.iter().map(|a| a.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
