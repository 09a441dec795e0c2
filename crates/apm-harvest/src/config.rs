// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Resolved harvest-side configuration.

use serde::Deserialize;

fn default_max_transaction_events() -> usize {
    2_000
}

fn default_max_error_events() -> usize {
    100
}

fn default_trace_threshold_ms() -> u64 {
    2_000
}

/// Reservoir sizes and trace-capture threshold.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Transaction event reservoir capacity per harvest cycle.
    #[serde(default = "default_max_transaction_events")]
    pub max_transaction_events: usize,
    /// Error event reservoir capacity per harvest cycle.
    #[serde(default = "default_max_error_events")]
    pub max_error_events: usize,
    /// Minimum response time before a transaction competes for trace
    /// storage, in milliseconds.
    #[serde(default = "default_trace_threshold_ms")]
    pub transaction_trace_threshold_ms: u64,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        HarvestConfig {
            max_transaction_events: default_max_transaction_events(),
            max_error_events: default_max_error_events(),
            transaction_trace_threshold_ms: default_trace_threshold_ms(),
        }
    }
}

impl HarvestConfig {
    #[must_use]
    pub fn transaction_trace_threshold(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.transaction_trace_threshold_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HarvestConfig::default();
        assert_eq!(config.max_transaction_events, 2_000);
        assert_eq!(config.max_error_events, 100);
        assert_eq!(config.transaction_trace_threshold_ms, 2_000);
    }

    #[test]
    fn test_partial_document() {
        let config: HarvestConfig =
            serde_json::from_str(r#"{"max_error_events":7}"#).expect("config parse failed");
        assert_eq!(config.max_error_events, 7);
        assert_eq!(config.max_transaction_events, 2_000);
    }
}
