// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Analytic events built from finalized transactions.
//!
//! One [`TransactionEvent`] is built per harvested transaction; an
//! [`ErrorEvent`] is built when the transaction carries a reportable error.
//! Attributes on both are destination-filtered before they ever enter a
//! reservoir.

use std::collections::BTreeMap;
use std::time::{Duration, SystemTime};

use apm_transaction::attributes::{AttributeValue, Destination};
use apm_transaction::errors::ErrorClassification;
use apm_transaction::transaction::TransactionData;
use serde::Serialize;

fn epoch_millis(time: SystemTime) -> u64 {
    #[allow(clippy::cast_possible_truncation)]
    {
        time.duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// One transaction, flattened for the event reservoir.
#[derive(Clone, Debug, Serialize)]
pub struct TransactionEvent {
    #[serde(rename = "type")]
    pub event_type: &'static str,
    pub name: String,
    pub timestamp: u64,
    /// Response time in seconds.
    pub duration: f64,
    /// Sum of all activities' durations in seconds.
    pub total_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apdex_zone: Option<&'static str>,
    pub error: bool,
    pub guid: String,
    pub trace_id: String,
    pub priority: f32,
    pub sampled: bool,
    pub attributes: BTreeMap<String, AttributeValue>,
}

/// Builds the analytic event for one finalized transaction.
#[must_use]
pub fn transaction_event(data: &TransactionData) -> TransactionEvent {
    let mut attributes: BTreeMap<String, AttributeValue> = data
        .attributes_for(Destination::TransactionEvents)
        .into_iter()
        .collect();
    for (key, value) in data.intrinsic_attributes() {
        attributes.insert(key.clone(), value.clone());
    }
    TransactionEvent {
        event_type: "Transaction",
        name: data.transaction_name().to_string(),
        timestamp: epoch_millis(data.start_time()),
        duration: data.duration().as_secs_f64(),
        total_time: data.total_time().as_secs_f64(),
        apdex_zone: data.apdex_zone().map(apm_transaction::stats::ApdexZone::as_str),
        error: data.error_classification() == ErrorClassification::Ordinary,
        guid: data.guid().to_string(),
        trace_id: data.trace_id().to_string(),
        priority: data.priority(),
        sampled: data.sampled(),
        attributes,
    }
}

/// One reportable error, flattened for the error event reservoir.
#[derive(Clone, Debug, Serialize)]
pub struct ErrorEvent {
    #[serde(rename = "type")]
    pub event_type: &'static str,
    pub error_class: String,
    pub error_message: String,
    pub expected: bool,
    pub transaction_name: String,
    pub timestamp: u64,
    pub duration: f64,
    pub attributes: BTreeMap<String, AttributeValue>,
}

/// Builds the error event for a finalized transaction, when its error state
/// is reportable. Ignored errors and clean transactions produce none.
#[must_use]
pub fn error_event(data: &TransactionData) -> Option<ErrorEvent> {
    if !data.error_classification().is_reportable() {
        return None;
    }
    let (error_class, error_message) = match data.throwable() {
        Some(throwable) => (throwable.error_class.clone(), throwable.message.clone()),
        // Status-driven errors have no throwable; synthesize one from the
        // response code.
        None => {
            let status = data.status_code()?;
            ("HttpError".to_string(), format!("status {status}"))
        }
    };
    let attributes: BTreeMap<String, AttributeValue> = data
        .attributes_for(Destination::ErrorEvents)
        .into_iter()
        .collect();
    Some(ErrorEvent {
        event_type: "TransactionError",
        error_class,
        error_message,
        expected: data.error_classification() == ErrorClassification::Expected,
        transaction_name: data.transaction_name().to_string(),
        timestamp: epoch_millis(data.start_time()),
        duration: data.duration().as_secs_f64(),
        attributes,
    })
}

/// Trace tree for the slowest-transaction storage.
#[derive(Clone, Debug)]
pub struct TransactionTrace {
    pub transaction_name: String,
    pub duration: Duration,
    pub start_time: SystemTime,
    pub root: apm_transaction::tracers::TracerSnapshot,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use apm_transaction::config::AgentConfig;
    use apm_transaction::naming::TransactionNamePriority;
    use apm_transaction::tracers::{ClassMethodSignature, TracerFlags, TracerOutcome};
    use apm_transaction::transaction::{
        TransactionData, TransactionFinishedListener, TransactionService,
    };
    use apm_transaction::stats::TransactionStats;
    use std::sync::{Arc, Mutex};

    struct Capture {
        data: Mutex<Vec<TransactionData>>,
    }

    impl TransactionFinishedListener for Capture {
        fn transaction_finished(&self, data: &TransactionData, _stats: &TransactionStats) {
            self.data.lock().unwrap().push(data.clone());
        }
    }

    fn finished_transaction(configure: impl FnOnce(&apm_transaction::Transaction)) -> TransactionData {
        let service = TransactionService::new(Arc::new(AgentConfig::default()));
        let capture = Arc::new(Capture {
            data: Mutex::new(Vec::new()),
        });
        service.add_listener(capture.clone());
        let (transaction, mut activity) = service.begin_background_transaction();
        transaction.set_transaction_name(
            TransactionNamePriority::CustomHigh,
            true,
            "Custom",
            "Job",
        );
        configure(&transaction);
        let root = activity.start_tracer(
            ClassMethodSignature::new("Job", "run"),
            TracerFlags::default(),
        );
        activity.finish_tracer(root, TracerOutcome::Return);
        let mut captured = capture.data.lock().unwrap();
        captured.pop().expect("one finalized transaction")
    }

    #[test]
    fn test_transaction_event_fields() {
        let data = finished_transaction(|transaction| {
            assert!(transaction.add_custom_parameter("cart.size", 3_i64));
        });
        let event = transaction_event(&data);
        assert_eq!(event.event_type, "Transaction");
        assert_eq!(event.name, "OtherTransaction/Custom/Job");
        assert!(!event.error);
        assert_eq!(
            event.attributes.get("cart.size"),
            Some(&AttributeValue::Long(3))
        );
        assert!(event.timestamp > 0);
    }

    #[test]
    fn test_error_event_only_for_reportable_errors() {
        let clean = finished_transaction(|_| {});
        assert!(error_event(&clean).is_none());

        let failed = finished_transaction(|transaction| {
            transaction.notice_error("CheckoutError", "payment declined", false);
        });
        let event = error_event(&failed).expect("error event");
        assert_eq!(event.error_class, "CheckoutError");
        assert_eq!(event.error_message, "payment declined");
        assert!(!event.expected);
        assert_eq!(event.transaction_name, "OtherTransaction/Custom/Job");

        let expected = finished_transaction(|transaction| {
            transaction.notice_error("CartEmpty", "nothing to buy", true);
        });
        let event = error_event(&expected).expect("expected error event");
        assert!(event.expected);
    }

    #[test]
    fn test_transaction_event_serializes() {
        let data = finished_transaction(|_| {});
        let json = serde_json::to_string(&transaction_event(&data)).expect("serialize");
        assert!(json.contains("\"type\":\"Transaction\""));
        assert!(json.contains("\"name\":\"OtherTransaction/Custom/Job\""));
    }
}
