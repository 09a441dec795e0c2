//! Per-transaction stats accumulation.
//!
//! Each [`crate::transaction::TransactionActivity`] accumulates a
//! [`TransactionStats`] while its tracers finish; activity stats are merged
//! into one `TransactionStats` when the transaction finalizes. The harvest
//! side merges finalized transaction stats into its shared engine; nothing in
//! this module is shared between threads.
//!
//! Scoped metrics are keyed by metric name only. The final transaction name
//! is not known until finalization, so the scope is applied by the consumer.

use std::time::Duration;

use fnv::FnvHashMap;

/// Response-time aggregate for one metric: call count, total and exclusive
/// time, min/max, and sum of squares (seconds squared) for variance.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ResponseTimeStats {
    pub call_count: u64,
    pub total: Duration,
    pub total_exclusive: Duration,
    pub min: Duration,
    pub max: Duration,
    pub sum_of_squares: f64,
}

impl ResponseTimeStats {
    pub fn record(&mut self, total: Duration, exclusive: Duration) {
        self.min = if self.call_count == 0 {
            total
        } else {
            self.min.min(total)
        };
        self.max = self.max.max(total);
        self.call_count += 1;
        self.total += total;
        self.total_exclusive += exclusive;
        let secs = total.as_secs_f64();
        self.sum_of_squares += secs * secs;
    }

    pub fn merge(&mut self, other: &ResponseTimeStats) {
        if other.call_count == 0 {
            return;
        }
        self.min = if self.call_count == 0 {
            other.min
        } else {
            self.min.min(other.min)
        };
        self.max = self.max.max(other.max);
        self.call_count += other.call_count;
        self.total += other.total;
        self.total_exclusive += other.total_exclusive;
        self.sum_of_squares += other.sum_of_squares;
    }
}

/// Apdex bucket for one response time against threshold T.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApdexZone {
    Satisfying,
    Tolerating,
    Frustrating,
}

impl ApdexZone {
    /// Buckets a response time: satisfied at or under T, tolerating at or
    /// under 4T, frustrated above.
    #[must_use]
    pub fn classify(response_time: Duration, apdex_t: Duration) -> ApdexZone {
        if response_time <= apdex_t {
            ApdexZone::Satisfying
        } else if response_time <= apdex_t * 4 {
            ApdexZone::Tolerating
        } else {
            ApdexZone::Frustrating
        }
    }

    /// Single-letter form used on analytic events.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ApdexZone::Satisfying => "S",
            ApdexZone::Tolerating => "T",
            ApdexZone::Frustrating => "F",
        }
    }
}

/// Satisfying/tolerating/frustrating counters for one Apdex metric.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ApdexStats {
    pub satisfying: u64,
    pub tolerating: u64,
    pub frustrating: u64,
}

impl ApdexStats {
    pub fn record(&mut self, zone: ApdexZone) {
        match zone {
            ApdexZone::Satisfying => self.satisfying += 1,
            ApdexZone::Tolerating => self.tolerating += 1,
            ApdexZone::Frustrating => self.frustrating += 1,
        }
    }

    pub fn merge(&mut self, other: &ApdexStats) {
        self.satisfying += other.satisfying;
        self.tolerating += other.tolerating;
        self.frustrating += other.frustrating;
    }
}

/// Scoped and unscoped response-time aggregates plus Apdex counters for one
/// transaction (or one activity, before merging).
#[derive(Clone, Debug, Default)]
pub struct TransactionStats {
    scoped: FnvHashMap<String, ResponseTimeStats>,
    unscoped: FnvHashMap<String, ResponseTimeStats>,
    apdex: FnvHashMap<String, ApdexStats>,
}

impl TransactionStats {
    #[must_use]
    pub fn new() -> Self {
        TransactionStats::default()
    }

    pub fn record_scoped(&mut self, name: &str, total: Duration, exclusive: Duration) {
        self.scoped
            .entry(name.to_string())
            .or_default()
            .record(total, exclusive);
    }

    pub fn record_unscoped(&mut self, name: &str, total: Duration, exclusive: Duration) {
        self.unscoped
            .entry(name.to_string())
            .or_default()
            .record(total, exclusive);
    }

    pub fn record_apdex(&mut self, name: &str, zone: ApdexZone) {
        self.apdex.entry(name.to_string()).or_default().record(zone);
    }

    pub fn merge(&mut self, other: &TransactionStats) {
        for (name, stats) in &other.scoped {
            self.scoped.entry(name.clone()).or_default().merge(stats);
        }
        for (name, stats) in &other.unscoped {
            self.unscoped.entry(name.clone()).or_default().merge(stats);
        }
        for (name, stats) in &other.apdex {
            self.apdex.entry(name.clone()).or_default().merge(stats);
        }
    }

    #[must_use]
    pub fn scoped(&self) -> &FnvHashMap<String, ResponseTimeStats> {
        &self.scoped
    }

    #[must_use]
    pub fn unscoped(&self) -> &FnvHashMap<String, ResponseTimeStats> {
        &self.unscoped
    }

    #[must_use]
    pub fn apdex(&self) -> &FnvHashMap<String, ApdexStats> {
        &self.apdex
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scoped.is_empty() && self.unscoped.is_empty() && self.apdex.is_empty()
    }
}
