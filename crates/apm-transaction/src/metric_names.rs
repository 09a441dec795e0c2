//! Metric name vocabulary shared by the core and the harvest side.
//!
//! Names follow the `<Category>/<segment>/<segment>` convention. Transaction
//! blame metrics are rooted at [`WEB_TRANSACTION`] or [`OTHER_TRANSACTION`];
//! rollups use the fixed names below.

pub const SEGMENT_DELIMITER: &str = "/";

pub const WEB_TRANSACTION: &str = "WebTransaction";
pub const WEB_TRANSACTION_TOTAL_TIME: &str = "WebTransactionTotalTime";
pub const OTHER_TRANSACTION: &str = "OtherTransaction";
pub const OTHER_TRANSACTION_ALL: &str = "OtherTransaction/all";
pub const OTHER_TRANSACTION_TOTAL_TIME: &str = "OtherTransactionTotalTime";

/// Rollup incremented once per web transaction with its response time.
pub const HTTP_DISPATCHER: &str = "HttpDispatcher";

pub const ERRORS_ALL: &str = "Errors/all";
pub const ERRORS_ALL_WEB: &str = "Errors/allWeb";
pub const ERRORS_ALL_OTHER: &str = "Errors/allOther";
pub const ERRORS_EXPECTED_ALL: &str = "ErrorsExpected/all";

pub const APDEX: &str = "Apdex";
pub const APDEX_OTHER: &str = "ApdexOther";
pub const APDEX_OTHER_TRANSACTION: &str = "ApdexOther/Transaction";

/// Default category substituted for an empty category on explicit naming calls.
pub const CUSTOM: &str = "Custom";

/// Default segment root for tracers without an explicit name.
pub const FUNCTION: &str = "Function";

/// Segment root for dispatcher (request entry point) tracers.
pub const SERVLET: &str = "Servlet";

pub const SUPPORTABILITY_EVENTS_SEEN: &str = "Supportability/AnalyticsEvents/TotalEventsSeen";
pub const SUPPORTABILITY_EVENTS_DROPPED: &str = "Supportability/AnalyticsEvents/TotalEventsDropped";

/// `Errors/<transaction name>` metric for one transaction's errors.
#[must_use]
pub fn error_metric_name(transaction_name: &str) -> String {
    format!("Errors{SEGMENT_DELIMITER}{transaction_name}")
}

/// Per-transaction Apdex metric name derived from the blame metric name.
///
/// `WebTransaction/Servlet/Foo` maps to `Apdex/Servlet/Foo`; background
/// transactions map under `ApdexOther/Transaction`.
#[must_use]
pub fn apdex_metric_name(transaction_name: &str) -> String {
    if let Some(rest) = transaction_name.strip_prefix(WEB_TRANSACTION) {
        format!("{APDEX}{rest}")
    } else if let Some(rest) = transaction_name.strip_prefix(OTHER_TRANSACTION) {
        format!("{APDEX_OTHER_TRANSACTION}{rest}")
    } else {
        format!("{APDEX}{SEGMENT_DELIMITER}{transaction_name}")
    }
}
