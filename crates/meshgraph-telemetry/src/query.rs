//! Query expression builder.
//!
//! Expressions are composed from a metric name, label matchers, a rate range
//! and a grouping label list. The graph builder only ever needs two shapes:
//! a summed rate and a histogram quantile over a summed bucket rate. Both are
//! evaluated at a single instant.

use std::fmt;
use std::time::Duration;

/// Label comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOp {
    Eq,
    Ne,
    Regex,
}

/// A single `name op "value"` label matcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMatcher {
    pub name: String,
    pub op: MatchOp,
    pub value: String,
}

impl fmt::Display for LabelMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self.op {
            MatchOp::Eq => "=",
            MatchOp::Ne => "!=",
            MatchOp::Regex => "=~",
        };
        write!(f, "{}{}\"{}\"", self.name, op, self.value)
    }
}

/// A rate over a range vector, summed by a set of labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateQuery {
    metric: String,
    matchers: Vec<LabelMatcher>,
    range: Duration,
    group_by: Vec<String>,
}

impl RateQuery {
    pub fn new(metric: &str, range: Duration) -> Self {
        RateQuery {
            metric: metric.to_string(),
            matchers: Vec::new(),
            range,
            group_by: Vec::new(),
        }
    }

    pub fn matcher(mut self, name: &str, op: MatchOp, value: &str) -> Self {
        self.matchers.push(LabelMatcher {
            name: name.to_string(),
            op,
            value: value.to_string(),
        });
        self
    }

    pub fn eq(self, name: &str, value: &str) -> Self {
        self.matcher(name, MatchOp::Eq, value)
    }

    pub fn ne(self, name: &str, value: &str) -> Self {
        self.matcher(name, MatchOp::Ne, value)
    }

    pub fn regex(self, name: &str, value: &str) -> Self {
        self.matcher(name, MatchOp::Regex, value)
    }

    pub fn group_by(mut self, labels: &[&str]) -> Self {
        self.group_by = labels.iter().map(|l| l.to_string()).collect();
        self
    }

    fn selector(&self) -> String {
        let matchers: Vec<String> = self.matchers.iter().map(|m| m.to_string()).collect();
        format!("{}{{{}}}", self.metric, matchers.join(","))
    }

    /// `sum(rate(M{..} [Ns])) by (G)`
    pub fn sum_rate(&self) -> String {
        format!(
            "sum(rate({} [{}s])) by ({})",
            self.selector(),
            self.range.as_secs(),
            self.group_by.join(",")
        )
    }

    /// `histogram_quantile(Q, sum(rate(M{..}[Ns])) by (le,G))`
    pub fn histogram_quantile(&self, quantile: f64) -> String {
        let mut group_by = Vec::with_capacity(self.group_by.len() + 1);
        group_by.push("le");
        group_by.extend(self.group_by.iter().map(String::as_str));
        format!(
            "histogram_quantile({}, sum(rate({}[{}s])) by ({}))",
            quantile,
            self.selector(),
            self.range.as_secs(),
            group_by.join(",")
        )
    }
}

/// Rounds every sample of `expr` to three decimals.
pub fn round(expr: &str) -> String {
    format!("round({expr},0.001)")
}
