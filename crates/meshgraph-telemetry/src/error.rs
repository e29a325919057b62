//! Telemetry error types.
//!
//! [`TelemetryError`] covers every way an instant query can fail: transport,
//! backend-reported errors, undecodable responses, and cancellation.

use thiserror::Error;

/// Errors produced by telemetry queries and client configuration.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The HTTP request could not be sent or its body could not be read.
    #[error("telemetry request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend answered with a non-success status and no error document.
    #[error("telemetry backend returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The backend reported a query error.
    #[error("telemetry query error ({error_type}): {error}")]
    Backend { error_type: String, error: String },

    /// The response body could not be decoded.
    #[error("malformed telemetry response: {0}")]
    Parse(#[from] serde_json::Error),

    /// The query evaluated to something other than an instant vector.
    #[error("unexpected telemetry result type '{0}', expected 'vector'")]
    UnexpectedResultType(String),

    /// The request was cancelled before the query finished.
    #[error("telemetry query cancelled")]
    Cancelled,

    /// The request deadline passed before the query finished.
    #[error("telemetry query deadline exceeded")]
    DeadlineExceeded,

    /// Client configuration is invalid.
    #[error("invalid telemetry configuration: {0}")]
    Config(String),
}
