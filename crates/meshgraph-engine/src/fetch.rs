//! Cancellable telemetry fetches.

use std::time::Instant;

use futures::future::try_join_all;
use meshgraph_telemetry::{Sample, TelemetryError};

use crate::appender::GlobalInfo;

/// Evaluates `expr` at the request's query time, aborting as soon as the
/// request is cancelled.
pub(crate) async fn fetch(global: &GlobalInfo, expr: &str) -> Result<Vec<Sample>, TelemetryError> {
    let started = Instant::now();
    tracing::debug!("telemetry query: {}", expr);

    let samples = tokio::select! {
        biased;
        _ = global.cancel.cancelled() => return Err(TelemetryError::Cancelled),
        result = global.client.instant_query(expr, global.options.query_time) => result?,
    };

    tracing::debug!(
        "telemetry query returned {} sample(s) in {:?}",
        samples.len(),
        started.elapsed()
    );
    Ok(samples)
}

/// Evaluates every expression concurrently. The first failure aborts the
/// rest; results are returned in expression order.
pub(crate) async fn fetch_all(
    global: &GlobalInfo,
    exprs: &[String],
) -> Result<Vec<Vec<Sample>>, TelemetryError> {
    try_join_all(exprs.iter().map(|expr| fetch(global, expr))).await
}
