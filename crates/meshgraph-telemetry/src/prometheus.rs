//! Prometheus HTTP API client.
//!
//! Only the instant query endpoint (`/api/v1/query`) is used. Responses are
//! decoded into [`Sample`]s; anything other than a `vector` result is an
//! error.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::client::TelemetryClient;
use crate::config::TelemetryConfig;
use crate::error::TelemetryError;
use crate::sample::{LabelSet, Sample};

/// [`TelemetryClient`] backed by a Prometheus server.
#[derive(Debug, Clone)]
pub struct PrometheusClient {
    http: reqwest::Client,
    endpoint: String,
}

impl PrometheusClient {
    pub fn new(config: &TelemetryConfig) -> Result<Self, TelemetryError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(PrometheusClient {
            http,
            endpoint: format!("{}/api/v1/query", config.url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl TelemetryClient for PrometheusClient {
    async fn instant_query(
        &self,
        expr: &str,
        time: DateTime<Utc>,
    ) -> Result<Vec<Sample>, TelemetryError> {
        let time = format!("{:.3}", time.timestamp_millis() as f64 / 1000.0);
        let response = self
            .http
            .get(&self.endpoint)
            .query(&[("query", expr), ("time", time.as_str())])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        match parse_query_response(&body) {
            Ok(samples) => Ok(samples),
            // Prometheus sends an error document with 4xx/5xx; prefer it when present.
            Err(TelemetryError::Parse(_)) if !status.is_success() => Err(TelemetryError::Status {
                status: status.as_u16(),
                body,
            }),
            Err(err) => Err(err),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    status: String,
    #[serde(default)]
    data: Option<QueryData>,
    #[serde(default)]
    error_type: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryData {
    result_type: String,
    result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct VectorElement {
    metric: LabelSet,
    value: (f64, String),
}

/// Decodes an instant query response body.
pub fn parse_query_response(body: &str) -> Result<Vec<Sample>, TelemetryError> {
    let parsed: QueryResponse = serde_json::from_str(body)?;

    if parsed.status != "success" {
        return Err(TelemetryError::Backend {
            error_type: parsed.error_type.unwrap_or_else(|| "unknown".to_string()),
            error: parsed.error.unwrap_or_default(),
        });
    }

    let Some(data) = parsed.data else {
        return Ok(Vec::new());
    };
    if data.result_type != "vector" {
        return Err(TelemetryError::UnexpectedResultType(data.result_type));
    }

    let elements: Vec<VectorElement> = serde_json::from_value(data.result)?;
    elements
        .into_iter()
        .map(|element| {
            let (_, raw) = element.value;
            let value = raw.parse::<f64>().map_err(|_| TelemetryError::Backend {
                error_type: "bad_value".to_string(),
                error: format!("sample value '{raw}' is not a number"),
            })?;
            Ok(Sample {
                labels: element.metric,
                value,
            })
        })
        .collect()
}
