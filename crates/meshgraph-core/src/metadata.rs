//! Node and edge metadata with the metric aggregation primitives.
//!
//! Metadata values are a closed set of shapes: numbers (counters and derived
//! metrics), flags, and string sets. Contributions are additive:
//! [`Metadata::sum_into`] accumulates counters and [`Metadata::average_into`]
//! keeps a running average for metrics that cannot be summed.

use std::collections::{btree_map, BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Well-known metadata keys.
pub mod keys {
    /// Edge request rate.
    pub const HTTP: &str = "http";
    pub const HTTP_3XX: &str = "http3xx";
    pub const HTTP_4XX: &str = "http4xx";
    pub const HTTP_5XX: &str = "http5xx";
    /// Node inbound request rate.
    pub const HTTP_IN: &str = "httpIn";
    pub const HTTP_IN_3XX: &str = "httpIn3xx";
    pub const HTTP_IN_4XX: &str = "httpIn4xx";
    pub const HTTP_IN_5XX: &str = "httpIn5xx";
    /// Node outbound request rate.
    pub const HTTP_OUT: &str = "httpOut";
    /// Edge byte rate.
    pub const TCP: &str = "tcp";
    pub const TCP_IN: &str = "tcpIn";
    pub const TCP_OUT: &str = "tcpOut";
    /// Edge response time percentile, in milliseconds.
    pub const RESPONSE_TIME: &str = "responseTime";
    /// Set of service names a node was reached through.
    pub const DEST_SERVICES: &str = "destServices";
    /// Set of label names that disagreed across a node's time series.
    pub const IS_MISCONFIGURED: &str = "isMisconfigured";
    pub const IS_OUTSIDE: &str = "isOutside";
    pub const IS_INACCESSIBLE: &str = "isInaccessible";
    pub const IS_ROOT: &str = "isRoot";
    pub const IS_SERVICE_ENTRY: &str = "isServiceEntry";

    /// Suffix of the shadow key holding a running total.
    pub const TOTAL_SUFFIX: &str = "_total";
    /// Suffix of the shadow key holding a running count.
    pub const COUNT_SUFFIX: &str = "_count";
}

/// A single metadata value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Number(f64),
    Flag(bool),
    Set(BTreeSet<String>),
}

impl MetadataValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            MetadataValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            MetadataValue::Flag(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&BTreeSet<String>> {
        match self {
            MetadataValue::Set(s) => Some(s),
            _ => None,
        }
    }
}

impl From<f64> for MetadataValue {
    fn from(n: f64) -> Self {
        MetadataValue::Number(n)
    }
}

impl From<bool> for MetadataValue {
    fn from(b: bool) -> Self {
        MetadataValue::Flag(b)
    }
}

/// Open key -> value mapping attached to nodes and edges.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(BTreeMap<String, MetadataValue>);

impl Metadata {
    pub fn new() -> Self {
        Metadata(BTreeMap::new())
    }

    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.0.get(key)
    }

    /// Returns the numeric value under `key`, if it holds a number.
    pub fn number(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(MetadataValue::as_number)
    }

    /// Returns the numeric value under `key`, or `0.0`.
    pub fn number_or_zero(&self, key: &str) -> f64 {
        self.number(key).unwrap_or(0.0)
    }

    /// Returns `true` only if `key` holds `Flag(true)`.
    pub fn flag(&self, key: &str) -> bool {
        self.0
            .get(key)
            .and_then(MetadataValue::as_flag)
            .unwrap_or(false)
    }

    pub fn set_flag(&mut self, key: &str) {
        self.0.insert(key.to_string(), MetadataValue::Flag(true));
    }

    pub fn string_set(&self, key: &str) -> Option<&BTreeSet<String>> {
        self.0.get(key).and_then(MetadataValue::as_set)
    }

    /// Adds `value` to the string set under `key`, creating the set if needed.
    pub fn insert_into_set(&mut self, key: &str, value: &str) {
        let entry = self
            .0
            .entry(key.to_string())
            .or_insert_with(|| MetadataValue::Set(BTreeSet::new()));
        match entry {
            MetadataValue::Set(set) => {
                set.insert(value.to_string());
            }
            other => {
                *other = MetadataValue::Set(BTreeSet::from([value.to_string()]));
            }
        }
    }

    pub fn insert(&mut self, key: &str, value: impl Into<MetadataValue>) -> Option<MetadataValue> {
        self.0.insert(key.to_string(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<MetadataValue> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, MetadataValue> {
        self.0.iter()
    }

    /// `metadata[key] := metadata.get(key, 0) + value`.
    ///
    /// A non-numeric value under `key` counts as zero.
    pub fn sum_into(&mut self, key: &str, value: f64) {
        let current = self.number_or_zero(key);
        self.0
            .insert(key.to_string(), MetadataValue::Number(current + value));
    }

    /// Folds `value` into the running average stored under `key`.
    ///
    /// Maintains `key_total` and `key_count` shadow keys. Every call counts
    /// once regardless of how many samples `value` summarizes, so this is an
    /// average of averages.
    pub fn average_into(&mut self, key: &str, value: f64) {
        let total_key = format!("{key}{}", keys::TOTAL_SUFFIX);
        let count_key = format!("{key}{}", keys::COUNT_SUFFIX);
        let total = self.number_or_zero(&total_key) + value;
        let count = self.number_or_zero(&count_key) + 1.0;
        self.0.insert(total_key, MetadataValue::Number(total));
        self.0.insert(count_key, MetadataValue::Number(count));
        self.0
            .insert(key.to_string(), MetadataValue::Number(total / count));
    }
}

impl<'a> IntoIterator for &'a Metadata {
    type Item = (&'a String, &'a MetadataValue);
    type IntoIter = btree_map::Iter<'a, String, MetadataValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn sum_into_starts_from_zero() {
        let mut md = Metadata::new();
        md.sum_into(keys::HTTP, 5.0);
        md.sum_into(keys::HTTP, 2.5);
        assert_eq!(md.number(keys::HTTP), Some(7.5));
    }

    #[test]
    fn sum_into_replaces_non_numeric_value() {
        let mut md = Metadata::new();
        md.set_flag(keys::HTTP);
        md.sum_into(keys::HTTP, 3.0);
        assert_eq!(md.number(keys::HTTP), Some(3.0));
    }

    #[test]
    fn average_into_keeps_shadow_keys() {
        let mut md = Metadata::new();
        md.average_into(keys::RESPONSE_TIME, 10.0);
        md.average_into(keys::RESPONSE_TIME, 20.0);
        assert_eq!(md.number("responseTime"), Some(15.0));
        assert_eq!(md.number("responseTime_total"), Some(30.0));
        assert_eq!(md.number("responseTime_count"), Some(2.0));
    }

    #[test]
    fn insert_into_set_accumulates() {
        let mut md = Metadata::new();
        md.insert_into_set(keys::DEST_SERVICES, "reviews");
        md.insert_into_set(keys::DEST_SERVICES, "ratings");
        md.insert_into_set(keys::DEST_SERVICES, "reviews");
        let set = md.string_set(keys::DEST_SERVICES).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.contains("ratings"));
    }

    #[test]
    fn flag_defaults_to_false() {
        let mut md = Metadata::new();
        assert!(!md.flag(keys::IS_ROOT));
        md.set_flag(keys::IS_ROOT);
        assert!(md.flag(keys::IS_ROOT));
    }

    #[test]
    fn serializes_untagged_values() {
        let mut md = Metadata::new();
        md.sum_into(keys::HTTP, 1.5);
        md.set_flag(keys::IS_ROOT);
        md.insert_into_set(keys::DEST_SERVICES, "reviews");
        let json = serde_json::to_value(&md).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "destServices": ["reviews"],
                "http": 1.5,
                "isRoot": true,
            })
        );
    }

    proptest! {
        #[test]
        fn average_into_is_arithmetic_mean(
            values in prop::collection::vec(0.0f64..10_000.0, 1..32),
        ) {
            let mut md = Metadata::new();
            for v in &values {
                md.average_into(keys::RESPONSE_TIME, *v);
            }
            let expected = values.iter().sum::<f64>() / values.len() as f64;
            let actual = md.number(keys::RESPONSE_TIME).unwrap();
            prop_assert!((actual - expected).abs() < 1e-6 * expected.max(1.0));
        }

        #[test]
        fn sum_into_is_order_independent(values in prop::collection::vec(0.0f64..1_000.0, 0..32)) {
            let mut forward = Metadata::new();
            let mut backward = Metadata::new();
            for v in &values {
                forward.sum_into(keys::TCP, *v);
            }
            for v in values.iter().rev() {
                backward.sum_into(keys::TCP, *v);
            }
            let diff =
                (forward.number_or_zero(keys::TCP) - backward.number_or_zero(keys::TCP)).abs();
            prop_assert!(diff < 1e-6);
        }
    }
}
