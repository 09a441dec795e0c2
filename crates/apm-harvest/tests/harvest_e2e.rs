// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! End-to-end harvest tests: core transactions flowing through the harvest
//! actor into metrics, events, and trace storage.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use apm_harvest::config::HarvestConfig;
use apm_harvest::harvest_service::install;
use apm_transaction::config::AgentConfig;
use apm_transaction::dispatcher::WebRequest;
use apm_transaction::metric_names;
use apm_transaction::naming::TransactionNamePriority;
use apm_transaction::stats::TransactionStats;
use apm_transaction::tracers::{ClassMethodSignature, TracerFlags, TracerOutcome};
use apm_transaction::transaction::{TransactionData, TransactionFinishedListener};
use apm_transaction::TransactionService;

fn simulate_servlet(service: &Arc<TransactionService>, sleep: Duration) {
    let (transaction, mut activity) = service.begin_web_transaction(&WebRequest::get("/cart"));
    let dispatcher = activity.start_tracer(
        ClassMethodSignature::new("com.shop.web.CartServlet", "service"),
        TracerFlags::dispatcher(),
    );
    transaction.set_transaction_name(
        TransactionNamePriority::ServletName,
        false,
        "Servlet",
        "CartServlet",
    );
    std::thread::sleep(sleep);
    transaction.set_status_code(200);
    transaction.request_destroyed();
    activity.finish_tracer(dispatcher, TracerOutcome::Return);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_servlet_transaction_reaches_harvest() {
    let transactions = TransactionService::new(Arc::new(AgentConfig::default()));
    let config = HarvestConfig {
        transaction_trace_threshold_ms: 50,
        ..HarvestConfig::default()
    };
    let harvester = install(&transactions, &config);

    simulate_servlet(&transactions, Duration::from_millis(100));

    let payload = harvester.harvest().await.expect("harvest");

    // Blame metric with the transaction's response time.
    let blame = payload
        .metrics
        .response_time("WebTransaction/Servlet/CartServlet", None)
        .expect("blame metric");
    assert_eq!(blame.call_count, 1);
    assert!(blame.total >= Duration::from_millis(100));

    // Dispatcher tracer scoped under the blame name.
    let scoped = payload
        .metrics
        .response_time(
            "Servlet/CartServlet/service",
            Some("WebTransaction/Servlet/CartServlet"),
        )
        .expect("scoped dispatcher metric");
    assert_eq!(scoped.call_count, 1);

    // Apdex for a 100ms response under the 500ms threshold: satisfying.
    let apdex = payload
        .metrics
        .apdex
        .iter()
        .find(|(name, _)| name == metric_names::APDEX)
        .map(|(_, stats)| *stats)
        .expect("apdex rollup");
    assert_eq!(apdex.satisfying, 1);

    // One transaction event, with the name and timing flattened in.
    assert_eq!(payload.transaction_events.len(), 1);
    let event = &payload.transaction_events[0];
    assert_eq!(event.name, "WebTransaction/Servlet/CartServlet");
    assert!(event.duration >= 0.1);
    assert_eq!(event.apdex_zone, Some("S"));

    // Slow enough for the configured 50ms trace threshold.
    let trace = payload.transaction_trace.expect("transaction trace");
    assert_eq!(trace.transaction_name, "WebTransaction/Servlet/CartServlet");
    assert_eq!(trace.root.metric_name, "Servlet/CartServlet/service");

    // A second harvest starts empty.
    let next = harvester.harvest().await.expect("harvest");
    assert!(next.transaction_events.is_empty());
    assert!(next.transaction_trace.is_none());
    assert!(next
        .metrics
        .response_time("WebTransaction/Servlet/CartServlet", None)
        .is_none());

    harvester.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_many_transactions_aggregate() {
    let transactions = TransactionService::new(Arc::new(AgentConfig::default()));
    let harvester = install(&transactions, &HarvestConfig::default());

    for _ in 0..10 {
        simulate_servlet(&transactions, Duration::from_millis(1));
    }

    let payload = harvester.harvest().await.expect("harvest");
    let rollup = payload
        .metrics
        .response_time(metric_names::WEB_TRANSACTION, None)
        .expect("web rollup");
    assert_eq!(rollup.call_count, 10);
    assert_eq!(payload.transaction_events.len(), 10);

    harvester.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_reservoir_overflow_counted() {
    let transactions = TransactionService::new(Arc::new(AgentConfig::default()));
    let config = HarvestConfig {
        max_transaction_events: 3,
        ..HarvestConfig::default()
    };
    let harvester = install(&transactions, &config);

    for _ in 0..5 {
        simulate_servlet(&transactions, Duration::from_millis(1));
    }

    let payload = harvester.harvest().await.expect("harvest");
    assert_eq!(payload.transaction_events.len(), 3);
    let dropped = payload
        .metrics
        .counts
        .iter()
        .find(|(name, _)| name == metric_names::SUPPORTABILITY_EVENTS_DROPPED)
        .map(|(_, count)| *count);
    assert_eq!(dropped, Some(2));
    let seen = payload
        .metrics
        .counts
        .iter()
        .find(|(name, _)| name == metric_names::SUPPORTABILITY_EVENTS_SEEN)
        .map(|(_, count)| *count);
    assert_eq!(seen, Some(5));

    harvester.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_harvest_side_listener_fan_out() {
    struct Counter {
        names: Mutex<Vec<String>>,
    }

    impl TransactionFinishedListener for Counter {
        fn transaction_finished(&self, data: &TransactionData, _stats: &TransactionStats) {
            self.names
                .lock()
                .unwrap()
                .push(data.transaction_name().to_string());
        }
    }

    let transactions = TransactionService::new(Arc::new(AgentConfig::default()));
    let harvester = install(&transactions, &HarvestConfig::default());
    let counter = Arc::new(Counter {
        names: Mutex::new(Vec::new()),
    });
    harvester
        .add_listener(counter.clone())
        .await
        .expect("listener registered");

    simulate_servlet(&transactions, Duration::from_millis(1));

    let _ = harvester.harvest().await.expect("harvest");
    let names = counter.names.lock().unwrap();
    assert_eq!(names.as_slice(), ["WebTransaction/Servlet/CartServlet"]);

    harvester.shutdown();
}
