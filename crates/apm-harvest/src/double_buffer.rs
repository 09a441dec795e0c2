// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Double-buffered wrapper around the stats engine.
//!
//! Two engines sit behind an atomic index. Merges lock only the active
//! buffer; a harvest swaps the index and drains the retired buffer while new
//! transactions keep accumulating in the fresh one. Harvesting therefore
//! never stalls live instrumentation for more than the active-buffer lock.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use apm_transaction::stats::TransactionStats;

use crate::stats_engine::{MetricsPayload, StatsEngine};

pub struct DoubleBufferedStatsEngine {
    buffers: [Arc<Mutex<StatsEngine>>; 2],
    active_index: AtomicUsize,
}

impl Default for DoubleBufferedStatsEngine {
    fn default() -> Self {
        DoubleBufferedStatsEngine::new()
    }
}

impl DoubleBufferedStatsEngine {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffers: [
                Arc::new(Mutex::new(StatsEngine::new())),
                Arc::new(Mutex::new(StatsEngine::new())),
            ],
            active_index: AtomicUsize::new(0),
        }
    }

    pub fn merge_transaction(&self, scope: &str, stats: &TransactionStats) {
        let index = self.active_index.load(Ordering::Acquire);
        let buffer = &self.buffers[index];

        #[allow(clippy::expect_used)]
        let mut engine = buffer.lock().expect("lock poisoned");
        engine.merge_transaction(scope, stats);
    }

    pub fn record_count(&self, name: &str, delta: u64) {
        let index = self.active_index.load(Ordering::Acquire);
        let buffer = &self.buffers[index];

        #[allow(clippy::expect_used)]
        let mut engine = buffer.lock().expect("lock poisoned");
        engine.record_count(name, delta);
    }

    /// Swaps buffers and drains the retired one.
    pub fn flush(&self) -> MetricsPayload {
        let old_index = self.active_index.load(Ordering::Acquire);
        let new_index = 1 - old_index;

        self.active_index.store(new_index, Ordering::Release);

        std::thread::yield_now();

        let flush_buffer = &self.buffers[old_index];

        #[allow(clippy::expect_used)]
        let mut engine = flush_buffer.lock().expect("lock poisoned");

        engine.consume()
    }

    #[cfg(test)]
    pub(crate) fn get_active_engine(&self) -> Arc<Mutex<StatsEngine>> {
        let index = self.active_index.load(Ordering::Acquire);
        Arc::clone(&self.buffers[index])
    }

    #[cfg(test)]
    pub(crate) fn get_inactive_engine(&self) -> Arc<Mutex<StatsEngine>> {
        let index = self.active_index.load(Ordering::Acquire);
        Arc::clone(&self.buffers[1 - index])
    }
}
