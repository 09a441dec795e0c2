// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Slowest-transaction trace storage.
//!
//! Keeps the single slowest over-threshold transaction trace per harvest
//! cycle. A harvest takes the stored trace and resets the slot, so the next
//! cycle competes fresh.

use std::time::Duration;

use apm_transaction::transaction::TransactionData;

use crate::events::TransactionTrace;

pub struct TraceStorage {
    threshold: Duration,
    slowest: Option<TransactionTrace>,
}

impl TraceStorage {
    #[must_use]
    pub fn new(threshold: Duration) -> TraceStorage {
        TraceStorage {
            threshold,
            slowest: None,
        }
    }

    /// Offers a finalized transaction. It is kept when it crossed the
    /// threshold, carries a trace tree, and is slower than the current
    /// holder.
    pub fn consider(&mut self, data: &TransactionData) {
        if data.duration() < self.threshold {
            return;
        }
        let Some(root) = data.root_tracer() else {
            return;
        };
        let slower = self
            .slowest
            .as_ref()
            .is_none_or(|current| data.duration() > current.duration);
        if slower {
            self.slowest = Some(TransactionTrace {
                transaction_name: data.transaction_name().to_string(),
                duration: data.duration(),
                start_time: data.start_time(),
                root: root.clone(),
            });
        }
    }

    /// Takes the stored trace, leaving the slot empty for the next cycle.
    pub fn take(&mut self) -> Option<TransactionTrace> {
        self.slowest.take()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use apm_transaction::config::AgentConfig;
    use apm_transaction::stats::TransactionStats;
    use apm_transaction::tracers::{ClassMethodSignature, TracerFlags, TracerOutcome};
    use apm_transaction::transaction::{
        TransactionData, TransactionFinishedListener, TransactionService,
    };
    use std::sync::{Arc, Mutex};
    use std::thread;

    struct Capture {
        data: Mutex<Vec<TransactionData>>,
    }

    impl TransactionFinishedListener for Capture {
        fn transaction_finished(&self, data: &TransactionData, _stats: &TransactionStats) {
            self.data.lock().unwrap().push(data.clone());
        }
    }

    fn transaction_taking(millis: u64) -> TransactionData {
        let service = TransactionService::new(Arc::new(AgentConfig::default()));
        let capture = Arc::new(Capture {
            data: Mutex::new(Vec::new()),
        });
        service.add_listener(capture.clone());
        let (_transaction, mut activity) = service.begin_background_transaction();
        let root = activity.start_tracer(
            ClassMethodSignature::new("Job", "run"),
            TracerFlags::default(),
        );
        thread::sleep(Duration::from_millis(millis));
        activity.finish_tracer(root, TracerOutcome::Return);
        let finalized = capture.data.lock().unwrap().pop().expect("finalized transaction");
        finalized
    }

    #[test]
    fn test_under_threshold_not_stored() {
        let mut storage = TraceStorage::new(Duration::from_secs(10));
        storage.consider(&transaction_taking(1));
        assert!(storage.take().is_none());
    }

    #[test]
    fn test_slowest_wins_and_take_resets() {
        let mut storage = TraceStorage::new(Duration::ZERO);
        let fast = transaction_taking(1);
        let slow = transaction_taking(20);
        storage.consider(&fast);
        storage.consider(&slow);
        let trace = storage.take().expect("stored trace");
        assert_eq!(trace.duration, slow.duration());
        assert!(storage.take().is_none());
    }
}
