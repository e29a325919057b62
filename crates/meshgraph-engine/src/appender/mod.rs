//! The appender pipeline.
//!
//! An [`Appender`] enriches one namespace's [`TrafficMap`] after it is built
//! and before it is merged. Appenders run strictly in the configured order
//! and each sees the changes of the previous one. They may query telemetry
//! through [`GlobalInfo`]; those queries honour the request's cancellation
//! token.

pub mod response_time;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use meshgraph_core::{GraphOptions, TrafficMap};
use meshgraph_telemetry::TelemetryClient;
use tokio_util::sync::CancellationToken;

use crate::error::GraphError;

pub use response_time::ResponseTimeAppender;

/// Request-wide state shared by every pipeline stage.
#[derive(Clone)]
pub struct GlobalInfo {
    pub client: Arc<dyn TelemetryClient>,
    pub options: Arc<GraphOptions>,
    pub cancel: CancellationToken,
}

impl GlobalInfo {
    pub fn new(
        client: Arc<dyn TelemetryClient>,
        options: Arc<GraphOptions>,
        cancel: CancellationToken,
    ) -> Self {
        GlobalInfo {
            client,
            options,
            cancel,
        }
    }
}

impl std::fmt::Debug for GlobalInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalInfo")
            .field("options", &self.options)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

/// The namespace whose map an appender is working on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceInfo {
    pub namespace: String,
    /// Observation window for the namespace's queries.
    pub duration: Duration,
}

impl NamespaceInfo {
    pub fn new(namespace: impl Into<String>, duration: Duration) -> Self {
        NamespaceInfo {
            namespace: namespace.into(),
            duration,
        }
    }
}

/// A named graph enrichment stage.
#[async_trait]
pub trait Appender: Send + Sync {
    fn name(&self) -> &str;

    /// Mutates `map` in place.
    async fn append_graph(
        &self,
        map: &mut TrafficMap,
        global: &GlobalInfo,
        namespace: &NamespaceInfo,
    ) -> Result<(), GraphError>;
}

/// Instantiates the appenders named in `options.appenders`, in order.
pub fn from_options(options: &GraphOptions) -> Result<Vec<Arc<dyn Appender>>, GraphError> {
    options
        .appenders
        .iter()
        .map(|name| match name.as_str() {
            response_time::NAME => {
                Ok(Arc::new(ResponseTimeAppender::new(options)) as Arc<dyn Appender>)
            }
            other => Err(GraphError::Configuration(format!(
                "unknown appender '{other}'"
            ))),
        })
        .collect()
}

/// Runs `appenders` over `map` one after another.
pub(crate) async fn run_all(
    appenders: &[Arc<dyn Appender>],
    map: &mut TrafficMap,
    global: &GlobalInfo,
    namespace: &NamespaceInfo,
) -> Result<(), GraphError> {
    for appender in appenders {
        let started = std::time::Instant::now();
        appender.append_graph(map, global, namespace).await?;
        tracing::debug!(
            "appender [{}] on namespace [{}] took {:?}",
            appender.name(),
            namespace.namespace,
            started.elapsed()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshgraph_core::GraphType;

    #[test]
    fn builds_named_appenders_in_order() {
        let options = GraphOptions::new(GraphType::Workload).with_appender("responseTime");
        let appenders = from_options(&options).unwrap();
        assert_eq!(appenders.len(), 1);
        assert_eq!(appenders[0].name(), "responseTime");
    }

    #[test]
    fn unknown_appender_is_a_configuration_error() {
        let options = GraphOptions::new(GraphType::Workload).with_appender("securityPolicy");
        let err = from_options(&options).err().unwrap();
        assert!(matches!(err, GraphError::Configuration(msg) if msg.contains("securityPolicy")));
    }
}
