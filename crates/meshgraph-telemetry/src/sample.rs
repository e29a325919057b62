//! Instant-vector samples returned by the telemetry backend.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Label name -> label value.
pub type LabelSet = BTreeMap<String, String>;

/// One element of an instant vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub labels: LabelSet,
    pub value: f64,
}

impl Sample {
    /// Builds a sample from `(name, value)` label pairs.
    pub fn new(labels: &[(&str, &str)], value: f64) -> Self {
        Sample {
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            value,
        }
    }

    /// Returns the value of label `name`, if present.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels.get(name).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_lookup() {
        let s = Sample::new(&[("source_workload", "productpage-v1")], 2.0);
        assert_eq!(s.label("source_workload"), Some("productpage-v1"));
        assert_eq!(s.label("destination_workload"), None);
        assert_eq!(s.value, 2.0);
    }
}
