//! Graph build error types.
//!
//! [`GraphError`] carries the classification the HTTP boundary needs to pick
//! a status code: configuration mistakes, telemetry query failures and
//! inconsistent graph data. All three abort the request; recoverable
//! per-sample problems are logged and never surface here.

use meshgraph_core::CoreError;
use meshgraph_telemetry::TelemetryError;
use serde::Serialize;
use thiserror::Error;

/// Errors that abort a graph build.
#[derive(Debug, Error)]
pub enum GraphError {
    /// The request cannot be served as configured.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A telemetry query failed, was cancelled or timed out.
    #[error("query error: {0}")]
    Query(#[from] TelemetryError),

    /// The graph contains data the pipeline cannot process.
    #[error("data error: {0}")]
    Data(String),
}

/// Error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    Configuration,
    Query,
    Data,
}

/// Structured error detail handed to the transport layer.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g. "QUERY_ERROR").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl GraphError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GraphError::Configuration(_) => ErrorKind::Configuration,
            GraphError::Query(TelemetryError::Config(_)) => ErrorKind::Configuration,
            GraphError::Query(_) => ErrorKind::Query,
            GraphError::Data(_) => ErrorKind::Data,
        }
    }

    pub fn detail(&self) -> ErrorDetail {
        let code = match self.kind() {
            ErrorKind::Configuration => "CONFIGURATION_ERROR",
            ErrorKind::Query => "QUERY_ERROR",
            ErrorKind::Data => "DATA_ERROR",
        };
        ErrorDetail {
            code: code.to_string(),
            message: self.to_string(),
        }
    }

    /// Returns `true` if the build was aborted by cancellation or deadline.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            GraphError::Query(TelemetryError::Cancelled | TelemetryError::DeadlineExceeded)
        )
    }
}

impl From<CoreError> for GraphError {
    fn from(err: CoreError) -> Self {
        match &err {
            CoreError::UnsupportedGraphType { .. } | CoreError::UnsupportedGraphKind { .. } => {
                GraphError::Configuration(err.to_string())
            }
            CoreError::UnsupportedProtocol { .. }
            | CoreError::NodeNotFound { .. }
            | CoreError::UnexpectedNodeKind { .. }
            | CoreError::DanglingEdge { .. }
            | CoreError::DuplicateEdge { .. } => GraphError::Data(err.to_string()),
        }
    }
}
