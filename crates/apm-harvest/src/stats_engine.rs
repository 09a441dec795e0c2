// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Metric aggregation engine for finalized transactions.
//!
//! The engine accumulates response-time, Apdex, and plain-count metrics
//! across transactions between harvests. Scoped metrics from a transaction
//! are keyed under its blame metric name at merge time; unscoped metrics and
//! rollups aggregate globally. The engine itself is single-threaded; the
//! [`crate::double_buffer::DoubleBufferedStatsEngine`] provides the
//! concurrent wrapper.

use apm_transaction::stats::{ApdexStats, ResponseTimeStats, TransactionStats};
use fnv::FnvHashMap;

/// Metric identity: name plus optional scope (the owning transaction name).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MetricKey {
    pub name: String,
    pub scope: Option<String>,
}

impl MetricKey {
    #[must_use]
    pub fn unscoped(name: &str) -> MetricKey {
        MetricKey {
            name: name.to_string(),
            scope: None,
        }
    }

    #[must_use]
    pub fn scoped(name: &str, scope: &str) -> MetricKey {
        MetricKey {
            name: name.to_string(),
            scope: Some(scope.to_string()),
        }
    }
}

/// One harvest's worth of drained metrics.
#[derive(Debug, Default)]
pub struct MetricsPayload {
    pub response_times: Vec<(MetricKey, ResponseTimeStats)>,
    pub apdex: Vec<(String, ApdexStats)>,
    pub counts: Vec<(String, u64)>,
}

impl MetricsPayload {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.response_times.is_empty() && self.apdex.is_empty() && self.counts.is_empty()
    }

    /// Response-time stats for a metric, for assertions and listeners.
    #[must_use]
    pub fn response_time(&self, name: &str, scope: Option<&str>) -> Option<&ResponseTimeStats> {
        self.response_times
            .iter()
            .find(|(key, _)| key.name == name && key.scope.as_deref() == scope)
            .map(|(_, stats)| stats)
    }
}

/// Accumulates metrics between harvests.
#[derive(Debug, Default)]
pub struct StatsEngine {
    response_times: FnvHashMap<MetricKey, ResponseTimeStats>,
    apdex: FnvHashMap<String, ApdexStats>,
    counts: FnvHashMap<String, u64>,
}

impl StatsEngine {
    #[must_use]
    pub fn new() -> StatsEngine {
        StatsEngine::default()
    }

    /// Merges one finalized transaction's stats. Scoped metrics land under
    /// the transaction's blame metric name.
    pub fn merge_transaction(&mut self, scope: &str, stats: &TransactionStats) {
        for (name, metric) in stats.scoped() {
            self.response_times
                .entry(MetricKey::scoped(name, scope))
                .or_default()
                .merge(metric);
        }
        for (name, metric) in stats.unscoped() {
            self.response_times
                .entry(MetricKey::unscoped(name))
                .or_default()
                .merge(metric);
        }
        for (name, metric) in stats.apdex() {
            self.apdex.entry(name.clone()).or_default().merge(metric);
        }
    }

    /// Increments a plain counter (supportability metrics).
    pub fn record_count(&mut self, name: &str, delta: u64) {
        if delta == 0 {
            return;
        }
        *self.counts.entry(name.to_string()).or_default() += delta;
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.response_times.is_empty() && self.apdex.is_empty() && self.counts.is_empty()
    }

    /// Drains everything accumulated so far.
    pub fn consume(&mut self) -> MetricsPayload {
        MetricsPayload {
            response_times: self.response_times.drain().collect(),
            apdex: self.apdex.drain().collect(),
            counts: self.counts.drain().collect(),
        }
    }
}
