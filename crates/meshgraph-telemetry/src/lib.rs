//! meshgraph-telemetry: the boundary to the time-series backend.
//!
//! The graph engine only needs [`TelemetryClient::instant_query`]. This
//! crate provides the trait, the sample type it returns, a builder for the
//! rate and quantile expressions the engine issues, a Prometheus-backed
//! client and an in-memory client for tests.

pub mod client;
pub mod config;
pub mod error;
pub mod memory;
pub mod prometheus;
pub mod query;
pub mod sample;

pub use client::TelemetryClient;
pub use config::TelemetryConfig;
pub use error::TelemetryError;
pub use memory::InMemoryTelemetry;
pub use prometheus::PrometheusClient;
pub use query::{round, LabelMatcher, MatchOp, RateQuery};
pub use sample::{LabelSet, Sample};
