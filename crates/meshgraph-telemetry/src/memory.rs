//! In-memory implementation of [`TelemetryClient`].
//!
//! [`InMemoryTelemetry`] answers queries from canned rules instead of a
//! backend. A rule matches when the expression contains every one of its
//! fragments; the first matching rule wins and unmatched queries return an
//! empty vector. Every evaluated expression is recorded so tests can
//! inspect what was asked.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::client::TelemetryClient;
use crate::error::TelemetryError;
use crate::sample::Sample;

#[derive(Debug, Clone)]
enum Outcome {
    Samples(Vec<Sample>),
    Failure(String),
}

#[derive(Debug, Clone)]
struct Rule {
    fragments: Vec<String>,
    outcome: Outcome,
}

impl Rule {
    fn matches(&self, expr: &str) -> bool {
        self.fragments.iter().all(|f| expr.contains(f.as_str()))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryTelemetry {
    rules: Vec<Rule>,
    latency: Option<Duration>,
    recorded: Mutex<Vec<String>>,
}

impl InMemoryTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers expressions containing all `fragments` with `samples`.
    pub fn respond(mut self, fragments: &[&str], samples: Vec<Sample>) -> Self {
        self.rules.push(Rule {
            fragments: fragments.iter().map(|f| f.to_string()).collect(),
            outcome: Outcome::Samples(samples),
        });
        self
    }

    /// Fails expressions containing all `fragments` with a backend error.
    pub fn fail(mut self, fragments: &[&str], message: &str) -> Self {
        self.rules.push(Rule {
            fragments: fragments.iter().map(|f| f.to_string()).collect(),
            outcome: Outcome::Failure(message.to_string()),
        });
        self
    }

    /// Delays every answer by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Expressions evaluated so far, in arrival order.
    pub fn queries(&self) -> Vec<String> {
        self.recorded.lock().clone()
    }
}

#[async_trait]
impl TelemetryClient for InMemoryTelemetry {
    async fn instant_query(
        &self,
        expr: &str,
        _time: DateTime<Utc>,
    ) -> Result<Vec<Sample>, TelemetryError> {
        self.recorded.lock().push(expr.to_string());

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        match self.rules.iter().find(|r| r.matches(expr)) {
            Some(Rule {
                outcome: Outcome::Samples(samples),
                ..
            }) => Ok(samples.clone()),
            Some(Rule {
                outcome: Outcome::Failure(message),
                ..
            }) => Err(TelemetryError::Backend {
                error_type: "execution".to_string(),
                error: message.clone(),
            }),
            None => Ok(Vec::new()),
        }
    }
}
