//! The [`TelemetryClient`] trait: the only contract the graph engine needs
//! from a telemetry backend.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::TelemetryError;
use crate::sample::Sample;

/// Evaluates query expressions against a time-series backend.
///
/// Implementations must be shareable across tasks: the engine issues the
/// queries of one graph request concurrently.
#[async_trait]
pub trait TelemetryClient: Send + Sync {
    /// Evaluates `expr` at `time`, returning the resulting instant vector.
    async fn instant_query(
        &self,
        expr: &str,
        time: DateTime<Utc>,
    ) -> Result<Vec<Sample>, TelemetryError>;
}

#[async_trait]
impl<T: TelemetryClient + ?Sized> TelemetryClient for Arc<T> {
    async fn instant_query(
        &self,
        expr: &str,
        time: DateTime<Utc>,
    ) -> Result<Vec<Sample>, TelemetryError> {
        (**self).instant_query(expr, time).await
    }
}
