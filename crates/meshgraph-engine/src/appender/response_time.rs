//! Response-time appender.
//!
//! Attaches a latency percentile, in milliseconds, to every http edge. The
//! percentile is computed from the request duration histogram with the same
//! origin split as the traffic queries, restricted to successful requests.
//! Several series can map onto one edge (e.g. the two hops of an injected
//! service); their values are averaged.

use std::collections::HashMap;

use async_trait::async_trait;
use meshgraph_core::options::DEFAULT_QUANTILE;
use meshgraph_core::{keys, GraphOptions, Metadata, NodeId, Protocol, TrafficMap};
use meshgraph_telemetry::{round, Sample};

use super::{Appender, GlobalInfo, NamespaceInfo};
use crate::builder::queries::{
    namespace_requests, ATTRIBUTION_GROUP_BY, DURATION_METRIC, SUCCESS_RESPONSE_CODES,
};
use crate::builder::Attribution;
use crate::error::GraphError;
use crate::fetch::fetch_all;

pub const NAME: &str = "responseTime";

type ResponseTimes = HashMap<(NodeId, NodeId), Metadata>;

#[derive(Debug, Clone)]
pub struct ResponseTimeAppender {
    quantile: f64,
}

impl ResponseTimeAppender {
    pub fn new(options: &GraphOptions) -> Self {
        ResponseTimeAppender::with_quantile(options.response_time_quantile)
    }

    pub fn with_quantile(quantile: f64) -> Self {
        let quantile = if quantile <= 0.0 || quantile >= 100.0 {
            tracing::warn!(
                "replacing invalid quantile [{:.2}] with default [{:.2}]",
                quantile,
                DEFAULT_QUANTILE
            );
            DEFAULT_QUANTILE
        } else {
            quantile
        };
        ResponseTimeAppender { quantile }
    }

    pub fn quantile(&self) -> f64 {
        self.quantile
    }

    /// Folds latency samples into per-edge running averages.
    fn populate(&self, times: &mut ResponseTimes, samples: &[Sample], options: &GraphOptions) {
        for sample in samples {
            let Some(attribution) = Attribution::from_sample(sample) else {
                tracing::warn!("skipping {:?}, missing expected labels", sample.labels);
                continue;
            };
            // NaN when there was no traffic in the window
            if sample.value.is_nan() {
                continue;
            }
            let millis = sample.value * 1000.0;
            for (source, dest) in attribution.hops(options) {
                let (source_id, _) = source.resolve(options.graph_type);
                let (dest_id, _) = dest.resolve(options.graph_type);
                times
                    .entry((source_id, dest_id))
                    .or_default()
                    .average_into(keys::RESPONSE_TIME, millis);
            }
        }
    }
}

/// Sets `responseTime` on every http edge a value was measured for.
fn apply(map: &mut TrafficMap, times: &ResponseTimes) {
    for node in map.nodes_mut() {
        for edge in node.edges.iter_mut().filter(|e| e.protocol == Protocol::Http) {
            let key = (edge.source.clone(), edge.dest.clone());
            if let Some(value) = times.get(&key).and_then(|md| md.number(keys::RESPONSE_TIME)) {
                edge.metadata.insert(keys::RESPONSE_TIME, value);
            }
        }
    }
}

#[async_trait]
impl Appender for ResponseTimeAppender {
    fn name(&self) -> &str {
        NAME
    }

    async fn append_graph(
        &self,
        map: &mut TrafficMap,
        global: &GlobalInfo,
        namespace: &NamespaceInfo,
    ) -> Result<(), GraphError> {
        if map.is_empty() {
            return Ok(());
        }
        tracing::debug!(
            "generating responseTime using quantile [{:.2}]; namespace = {}",
            self.quantile,
            namespace.namespace
        );

        let exprs: Vec<String> = namespace_requests(
            DURATION_METRIC,
            SUCCESS_RESPONSE_CODES,
            ATTRIBUTION_GROUP_BY,
            &namespace.namespace,
            namespace.duration,
            &global.options,
        )
        .iter()
        .map(|q| round(&q.histogram_quantile(self.quantile)))
        .collect();

        let results = fetch_all(global, &exprs).await?;

        let mut times = ResponseTimes::new();
        for samples in &results {
            self.populate(&mut times, samples, &global.options);
        }
        apply(map, &times);
        Ok(())
    }
}
