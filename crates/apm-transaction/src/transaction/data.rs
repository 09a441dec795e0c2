//! Read-only snapshot of a finalized transaction.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::attributes::{AttributeValue, AttributesFilter, Destination};
use crate::errors::{ErrorClassification, TransactionThrowable};
use crate::stats::ApdexZone;
use crate::tracers::TracerSnapshot;
use crate::transaction::{Transaction, TransactionState};

/// Everything listeners may read about a finished transaction. Immutable.
#[derive(Clone)]
pub struct TransactionData {
    guid: String,
    transaction_name: String,
    is_web: bool,
    start_time: SystemTime,
    duration: Duration,
    total_time: Duration,
    status_code: Option<u16>,
    throwable: Option<TransactionThrowable>,
    error_classification: ErrorClassification,
    apdex_zone: Option<ApdexZone>,
    root_tracer: Option<TracerSnapshot>,
    user_attributes: Vec<(String, AttributeValue)>,
    agent_attributes: Vec<(String, AttributeValue)>,
    intrinsic_attributes: Vec<(String, AttributeValue)>,
    trace_id: String,
    span_id: String,
    priority: f32,
    sampled: bool,
    filter: Arc<AttributesFilter>,
}

impl TransactionData {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        transaction: &Transaction,
        state: &mut TransactionState,
        transaction_name: String,
        duration: Duration,
        total_time: Duration,
        status_code: Option<u16>,
        error_classification: ErrorClassification,
        apdex_zone: Option<ApdexZone>,
        root_tracer: Option<TracerSnapshot>,
    ) -> TransactionData {
        TransactionData {
            guid: transaction.guid().to_string(),
            transaction_name,
            is_web: state.is_web,
            start_time: transaction.wall_start(),
            duration,
            total_time,
            status_code,
            throwable: state.throwable.take(),
            error_classification,
            apdex_zone,
            root_tracer,
            user_attributes: std::mem::take(&mut state.user_attributes),
            agent_attributes: std::mem::take(&mut state.agent_attributes),
            intrinsic_attributes: std::mem::take(&mut state.intrinsic_attributes),
            trace_id: state
                .span_proxy
                .effective_trace_id(transaction.guid())
                .to_string(),
            span_id: transaction.span_guid().to_string(),
            priority: state.span_proxy.priority,
            sampled: state.span_proxy.sampled,
            filter: Arc::clone(transaction.service().attributes_filter()),
        }
    }

    #[must_use]
    pub fn guid(&self) -> &str {
        &self.guid
    }

    /// The blame metric name: the single metric attributed as the
    /// transaction's root-cause time consumer.
    #[must_use]
    pub fn blame_metric_name(&self) -> &str {
        &self.transaction_name
    }

    #[must_use]
    pub fn transaction_name(&self) -> &str {
        &self.transaction_name
    }

    #[must_use]
    pub fn is_web(&self) -> bool {
        self.is_web
    }

    #[must_use]
    pub fn start_time(&self) -> SystemTime {
        self.start_time
    }

    /// Root tracer response time; the transaction's wall-clock duration.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Sum of all activities' root durations across threads.
    #[must_use]
    pub fn total_time(&self) -> Duration {
        self.total_time
    }

    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    #[must_use]
    pub fn throwable(&self) -> Option<&TransactionThrowable> {
        self.throwable.as_ref()
    }

    #[must_use]
    pub fn error_classification(&self) -> ErrorClassification {
        self.error_classification
    }

    #[must_use]
    pub fn apdex_zone(&self) -> Option<ApdexZone> {
        self.apdex_zone
    }

    #[must_use]
    pub fn root_tracer(&self) -> Option<&TracerSnapshot> {
        self.root_tracer.as_ref()
    }

    #[must_use]
    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    #[must_use]
    pub fn span_id(&self) -> &str {
        &self.span_id
    }

    #[must_use]
    pub fn priority(&self) -> f32 {
        self.priority
    }

    #[must_use]
    pub fn sampled(&self) -> bool {
        self.sampled
    }

    /// User plus agent attributes allowed at the given destination,
    /// destination-filtered. Intrinsics are not subject to filtering; read
    /// them through [`TransactionData::intrinsic_attributes`].
    #[must_use]
    pub fn attributes_for(&self, destination: Destination) -> Vec<(String, AttributeValue)> {
        let mut result = Vec::new();
        for (key, value) in self
            .filter
            .filter(destination, &self.user_attributes)
            .into_iter()
            .chain(self.filter.filter(destination, &self.agent_attributes))
        {
            result.push((key.to_string(), value.clone()));
        }
        result
    }

    #[must_use]
    pub fn user_attributes(&self) -> &[(String, AttributeValue)] {
        &self.user_attributes
    }

    #[must_use]
    pub fn agent_attributes(&self) -> &[(String, AttributeValue)] {
        &self.agent_attributes
    }

    #[must_use]
    pub fn intrinsic_attributes(&self) -> &[(String, AttributeValue)] {
        &self.intrinsic_attributes
    }
}
