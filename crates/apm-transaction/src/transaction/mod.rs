// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The transaction state machine.
//!
//! A [`Transaction`] is one logical request or job. It is created explicitly
//! from a [`TransactionService`] (no ambient thread-local state: instrumented
//! code holds the handles it needs), mutated by instrumentation and API calls
//! while activities run, and finalized exactly once when the root activity's
//! root tracer has finished and no other activities or tokens remain.
//! Finalization classifies the error state, rolls up metrics, and dispatches
//! a read-only [`TransactionData`] snapshot plus merged
//! [`stats::TransactionStats`] to the service's registered listeners.
//!
//! Threading: each [`TransactionActivity`] is owned by exactly one thread.
//! The transaction itself is shared behind an `Arc`; its mutable state sits
//! under one mutex, and the finalization hand-off is guarded by atomics so
//! the last finishing participant triggers listener notification exactly
//! once.

pub mod activity;
pub mod data;
pub mod token;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::{Duration, Instant, SystemTime};

use tracing::{debug, warn};

use crate::attributes::{
    AttributeValidator, AttributeValue, AttributesFilter, MAX_USER_ATTRIBUTES,
};
use crate::config::AgentConfig;
use crate::dispatcher::{WebRequest, WebRequestDispatcher};
use crate::distributed::{
    generate_guid, DistributedTracePayload, PayloadData, PayloadError, SpanProxy,
    PARENT_TYPE_APP,
};
use crate::errors::{classify, ErrorClassification, TransactionThrowable};
use crate::metric_names;
use crate::naming::{
    ApplicationNamePriority, PriorityApplicationName, PriorityTransactionName,
    TransactionNamePriority,
};
use crate::stats::{ApdexZone, TransactionStats};
use crate::tracers::TracerSnapshot;

pub use activity::TransactionActivity;
pub use data::TransactionData;
pub use token::Token;

/// Receives every finalized, non-ignored transaction.
pub trait TransactionFinishedListener: Send + Sync {
    fn transaction_finished(&self, data: &TransactionData, stats: &TransactionStats);
}

/// Creates transactions and fans finalized ones out to listeners.
pub struct TransactionService {
    config: Arc<AgentConfig>,
    filter: Arc<AttributesFilter>,
    listeners: RwLock<Vec<Arc<dyn TransactionFinishedListener>>>,
}

impl TransactionService {
    #[must_use]
    pub fn new(config: Arc<AgentConfig>) -> Arc<TransactionService> {
        let filter = Arc::new(AttributesFilter::from_config(&config.attributes));
        Arc::new(TransactionService {
            config,
            filter,
            listeners: RwLock::new(Vec::new()),
        })
    }

    #[must_use]
    pub fn config(&self) -> &Arc<AgentConfig> {
        &self.config
    }

    #[must_use]
    pub fn attributes_filter(&self) -> &Arc<AttributesFilter> {
        &self.filter
    }

    pub fn add_listener(&self, listener: Arc<dyn TransactionFinishedListener>) {
        #[allow(clippy::expect_used)]
        self.listeners
            .write()
            .expect("listener lock poisoned")
            .push(listener);
    }

    /// Begins a web transaction bracketed by the given request.
    #[must_use]
    pub fn begin_web_transaction(
        self: &Arc<Self>,
        request: &WebRequest,
    ) -> (Arc<Transaction>, TransactionActivity) {
        let (transaction, activity) = self.begin_transaction(true);
        transaction.request_initialized(request);
        (transaction, activity)
    }

    /// Begins a background (non-web) transaction.
    #[must_use]
    pub fn begin_background_transaction(
        self: &Arc<Self>,
    ) -> (Arc<Transaction>, TransactionActivity) {
        self.begin_transaction(false)
    }

    fn begin_transaction(
        self: &Arc<Self>,
        is_web: bool,
    ) -> (Arc<Transaction>, TransactionActivity) {
        let transaction = Arc::new(Transaction::new(Arc::clone(self), is_web));
        let activity = transaction.new_activity(true);
        (transaction, activity)
    }

    fn dispatch(&self, data: &TransactionData, stats: &TransactionStats) {
        #[allow(clippy::expect_used)]
        let listeners = self.listeners.read().expect("listener lock poisoned");
        for listener in listeners.iter() {
            listener.transaction_finished(data, stats);
        }
    }
}

/// Completed activity output handed back to the owning transaction.
pub(crate) struct ActivityResult {
    pub(crate) root: Option<TracerSnapshot>,
    pub(crate) stats: TransactionStats,
    pub(crate) duration: Duration,
    pub(crate) is_root: bool,
}

pub(crate) struct TransactionState {
    is_web: bool,
    transaction_name: PriorityTransactionName,
    application_name: PriorityApplicationName,
    dispatcher: Option<WebRequestDispatcher>,
    user_attributes: Vec<(String, AttributeValue)>,
    agent_attributes: Vec<(String, AttributeValue)>,
    intrinsic_attributes: Vec<(String, AttributeValue)>,
    throwable: Option<TransactionThrowable>,
    ignore: bool,
    ignore_apdex: bool,
    span_proxy: SpanProxy,
    activities: Vec<ActivityResult>,
}

/// One monitored request or job.
pub struct Transaction {
    service: Arc<TransactionService>,
    config: Arc<AgentConfig>,
    guid: String,
    span_guid: String,
    start: Instant,
    wall_start: SystemTime,
    state: Mutex<TransactionState>,
    validator: AttributeValidator,
    segment_counter: AtomicUsize,
    /// Live activities plus outstanding tokens. Finalization waits for zero.
    open_handles: AtomicUsize,
    root_done: AtomicBool,
    finished: AtomicBool,
}

impl Transaction {
    fn new(service: Arc<TransactionService>, is_web: bool) -> Transaction {
        let config = Arc::clone(service.config());
        let span_proxy = SpanProxy::new(config.distributed_tracing.sample_ratio);
        Transaction {
            service,
            guid: generate_guid(),
            span_guid: generate_guid(),
            start: Instant::now(),
            wall_start: SystemTime::now(),
            state: Mutex::new(TransactionState {
                is_web,
                transaction_name: PriorityTransactionName::default(),
                application_name: PriorityApplicationName::default(),
                dispatcher: None,
                user_attributes: Vec::new(),
                agent_attributes: Vec::new(),
                intrinsic_attributes: Vec::new(),
                throwable: None,
                ignore: false,
                ignore_apdex: false,
                span_proxy,
                activities: Vec::new(),
            }),
            validator: AttributeValidator::default(),
            segment_counter: AtomicUsize::new(0),
            open_handles: AtomicUsize::new(0),
            root_done: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            config,
        }
    }

    fn state(&self) -> MutexGuard<'_, TransactionState> {
        #[allow(clippy::expect_used)]
        self.state.lock().expect("transaction state lock poisoned")
    }

    #[must_use]
    pub fn guid(&self) -> &str {
        &self.guid
    }

    #[must_use]
    pub fn config(&self) -> &Arc<AgentConfig> {
        &self.config
    }

    #[must_use]
    pub fn is_web(&self) -> bool {
        self.state().is_web
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    pub(crate) fn start_instant(&self) -> Instant {
        self.start
    }

    // ---- naming ---------------------------------------------------------

    /// Applies a transaction name candidate. Automatic sources are skipped
    /// when automatic naming is disabled; explicit API calls always compete.
    pub fn set_transaction_name(
        &self,
        priority: TransactionNamePriority,
        override_existing: bool,
        category: &str,
        name: &str,
    ) -> bool {
        if self.is_finished() {
            debug!(name, "ignoring transaction name on finished transaction");
            return false;
        }
        if !priority.is_explicit() && !self.config.transaction_naming.auto_transaction_naming {
            return false;
        }
        self.state()
            .transaction_name
            .set(priority, override_existing, category, name)
    }

    /// Locks the transaction name against any further change.
    pub fn freeze_transaction_name(&self) {
        self.state().transaction_name.freeze();
    }

    pub fn set_application_name(
        &self,
        priority: ApplicationNamePriority,
        override_existing: bool,
        name: &str,
    ) -> bool {
        if self.is_finished() {
            return false;
        }
        self.state()
            .application_name
            .set(priority, override_existing, name)
    }

    /// Resolved application name, falling back to the configured one.
    #[must_use]
    pub fn application_name(&self) -> String {
        self.state()
            .application_name
            .name()
            .unwrap_or(&self.config.app_name)
            .to_string()
    }

    // ---- attributes -----------------------------------------------------

    /// Adds a validated custom attribute. Returns whether it was stored.
    /// High security mode drops all custom attributes.
    pub fn add_custom_parameter(&self, key: &str, value: impl Into<AttributeValue>) -> bool {
        if self.config.high_security {
            debug!(key, "dropping custom attribute in high security mode");
            return false;
        }
        if self.is_finished() {
            debug!(key, "ignoring custom attribute on finished transaction");
            return false;
        }
        let Some((key, value)) = self.validator.validate(key, value.into()) else {
            return false;
        };
        let mut state = self.state();
        if let Some(slot) = state.user_attributes.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
            return true;
        }
        if state.user_attributes.len() >= MAX_USER_ATTRIBUTES {
            debug!(key, "dropping custom attribute over the per-transaction cap");
            return false;
        }
        state.user_attributes.push((key, value));
        true
    }

    /// Adds an agent-generated attribute (request metadata and the like).
    pub fn add_agent_attribute(&self, key: &str, value: impl Into<AttributeValue>) {
        if self.is_finished() {
            return;
        }
        let value = value.into();
        let mut state = self.state();
        if let Some(slot) = state.agent_attributes.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            state.agent_attributes.push((key.to_string(), value));
        }
    }

    fn add_intrinsic(state: &mut TransactionState, key: &str, value: AttributeValue) {
        state.intrinsic_attributes.push((key.to_string(), value));
    }

    // ---- errors ---------------------------------------------------------

    /// Records a throwable on the transaction. The first one wins; nested
    /// dispatchers that swallow their own exceptions must not leak one into
    /// the outer transaction.
    pub fn notice_error(&self, error_class: &str, message: &str, expected: bool) {
        if self.is_finished() {
            return;
        }
        let mut state = self.state();
        if state.throwable.is_some() {
            debug!(error_class, "transaction already holds a throwable");
            return;
        }
        let mut throwable = TransactionThrowable::new(error_class, message);
        throwable.expected = expected;
        state.throwable = Some(throwable);
    }

    /// Drops this transaction entirely: no listeners, no metrics, no events.
    pub fn ignore(&self) {
        self.state().ignore = true;
    }

    /// Excludes this transaction from Apdex scoring.
    pub fn ignore_apdex(&self) {
        self.state().ignore_apdex = true;
    }

    // ---- web lifecycle --------------------------------------------------

    /// Brackets the start of a web request. Idempotent: the dispatcher is
    /// created once and reused on repeated calls.
    pub fn request_initialized(&self, request: &WebRequest) {
        {
            let mut state = self.state();
            if state.dispatcher.is_some() {
                debug!("request already initialized");
                return;
            }
            state.is_web = true;
            state.dispatcher = Some(WebRequestDispatcher::new(request));
        }
        self.set_transaction_name(
            TransactionNamePriority::RequestUri,
            false,
            "Uri",
            &request.uri,
        );
        self.add_agent_attribute("request.uri", request.uri.as_str());
        self.add_agent_attribute("request.method", request.method.as_str());
    }

    /// Brackets the end of a web request. Calling twice is a no-op.
    pub fn request_destroyed(&self) {
        let mut state = self.state();
        match state.dispatcher.as_mut() {
            Some(dispatcher) => {
                if !dispatcher.destroy() {
                    debug!("request already destroyed");
                }
            }
            None => warn!("request_destroyed without request_initialized"),
        }
    }

    pub fn set_status_code(&self, status: u16) {
        if let Some(dispatcher) = self.state().dispatcher.as_mut() {
            dispatcher.set_status_code(status);
        }
    }

    // ---- distributed tracing --------------------------------------------

    /// Effective trace id. Reading it pins the acceptance decision: a
    /// payload arriving afterwards is rejected.
    #[must_use]
    pub fn trace_id(&self) -> String {
        let mut state = self.state();
        state.span_proxy.trace_id_observed = true;
        state.span_proxy.effective_trace_id(&self.guid).to_string()
    }

    /// This transaction's own span id (the root tracer's identifier).
    #[must_use]
    pub fn span_id(&self) -> String {
        self.span_guid.clone()
    }

    #[must_use]
    pub fn priority(&self) -> f32 {
        self.state().span_proxy.priority
    }

    #[must_use]
    pub fn sampled(&self) -> bool {
        self.state().span_proxy.sampled
    }

    /// Builds an outbound payload. Idempotent with respect to the trace id:
    /// the local identifier is never changed by creating payloads.
    #[must_use]
    pub fn create_distributed_trace_payload(&self) -> DistributedTracePayload {
        let mut state = self.state();
        state.span_proxy.outbound_created = true;
        let trace_id = state.span_proxy.effective_trace_id(&self.guid).to_string();
        let timestamp_ms = self
            .wall_start
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        DistributedTracePayload {
            version: [0, 1],
            data: PayloadData {
                parent_type: PARENT_TYPE_APP.to_string(),
                account_id: self.config.distributed_tracing.account_id.clone(),
                application_id: self.config.distributed_tracing.primary_application_id.clone(),
                span_id: Some(self.span_guid.clone()),
                transaction_id: Some(self.guid.clone()),
                trace_id,
                priority: state.span_proxy.priority,
                sampled: state.span_proxy.sampled,
                timestamp_ms,
            },
        }
    }

    /// Accepts an inbound payload, at most once, and only before the trace
    /// id was observed or any payload was created. Returns whether the
    /// payload took effect; late or repeated accepts are no-ops.
    pub fn accept_distributed_trace_payload(
        &self,
        payload_text: &str,
    ) -> Result<bool, PayloadError> {
        if self.is_finished() {
            return Ok(false);
        }
        let payload = DistributedTracePayload::parse(payload_text)?;
        let mut state = self.state();
        let proxy = &state.span_proxy;
        if proxy.inbound.is_some() || proxy.outbound_created || proxy.trace_id_observed {
            debug!("rejecting late or repeated distributed trace payload");
            return Ok(false);
        }
        state.span_proxy.priority = payload.data.priority;
        state.span_proxy.sampled = payload.data.sampled;
        Self::add_intrinsic(
            &mut state,
            "parent.type",
            AttributeValue::Str(payload.data.parent_type.clone()),
        );
        Self::add_intrinsic(
            &mut state,
            "parent.account",
            AttributeValue::Str(payload.data.account_id.clone()),
        );
        Self::add_intrinsic(
            &mut state,
            "parent.app",
            AttributeValue::Str(payload.data.application_id.clone()),
        );
        state.span_proxy.inbound = Some(payload);
        Ok(true)
    }

    // ---- activities, tokens, finalization -------------------------------

    pub(crate) fn new_activity(self: &Arc<Self>, is_root: bool) -> TransactionActivity {
        self.open_handles.fetch_add(1, Ordering::AcqRel);
        TransactionActivity::new(Arc::clone(self), is_root)
    }

    /// Hands a token to other threads so they can attach activities.
    /// On a finished transaction this returns an inert token.
    #[must_use]
    pub fn create_token(self: &Arc<Self>) -> Token {
        if self.is_finished() {
            debug!("token requested on finished transaction");
            return Token::inert();
        }
        self.open_handles.fetch_add(1, Ordering::AcqRel);
        Token::active(Arc::clone(self))
    }

    /// Reserves one transaction-trace segment slot. Over the configured
    /// limit, tracers degrade to metric-only mode.
    pub(crate) fn try_reserve_segment(&self) -> bool {
        let limit = self.config.transaction_tracer.segment_limit;
        let previous = self.segment_counter.fetch_add(1, Ordering::Relaxed);
        if previous >= limit {
            self.segment_counter.fetch_sub(1, Ordering::Relaxed);
            return false;
        }
        true
    }

    pub(crate) fn activity_finished(self: &Arc<Self>, result: ActivityResult) {
        let is_root = result.is_root;
        self.state().activities.push(result);
        if is_root {
            self.root_done.store(true, Ordering::Release);
        }
        self.handle_closed();
    }

    pub(crate) fn activity_abandoned(self: &Arc<Self>) {
        warn!(guid = %self.guid, "transaction activity dropped before its root tracer finished");
        self.handle_closed();
    }

    pub(crate) fn handle_closed(self: &Arc<Self>) {
        let remaining = self.open_handles.fetch_sub(1, Ordering::AcqRel) - 1;
        if remaining == 0 && self.root_done.load(Ordering::Acquire) {
            self.maybe_finalize();
        }
    }

    fn maybe_finalize(self: &Arc<Self>) {
        if self.finished.swap(true, Ordering::AcqRel) {
            return;
        }
        self.finalize();
    }

    /// Runs exactly once. Resolves the name, classifies the error state,
    /// rolls up metrics, and dispatches the finalized snapshot.
    fn finalize(self: &Arc<Self>) {
        let (data, stats, ignored) = {
            let mut state = self.state();
            state.transaction_name.freeze();

            let activities = std::mem::take(&mut state.activities);
            let duration = activities
                .iter()
                .find(|a| a.is_root)
                .map_or_else(|| self.start.elapsed(), |a| a.duration);
            let total_time: Duration = activities.iter().map(|a| a.duration).sum();

            let status_code = state.dispatcher.as_ref().and_then(WebRequestDispatcher::status_code);
            if let Some(status) = status_code {
                state
                    .agent_attributes
                    .push(("http.statusCode".to_string(), AttributeValue::Long(i64::from(status))));
            }

            let dispatcher_uri = state.dispatcher.as_ref().map(|d| d.uri().to_string());
            let transaction_name = state
                .transaction_name
                .render(state.is_web, dispatcher_uri.as_deref());

            let classification = classify(
                state.throwable.as_ref(),
                status_code,
                &self.config.error_collector,
            );

            let mut stats = TransactionStats::new();
            for activity in &activities {
                stats.merge(&activity.stats);
            }
            Self::record_rollups(
                &mut stats,
                &state,
                &transaction_name,
                duration,
                total_time,
                classification,
            );

            let apdex_zone = self.apdex_zone(&state, duration, classification);
            if let Some(zone) = apdex_zone {
                stats.record_apdex(metric_names::APDEX, zone);
                stats.record_apdex(&metric_names::apdex_metric_name(&transaction_name), zone);
            }

            let root = activities.into_iter().find(|a| a.is_root).and_then(|a| a.root);
            let data = TransactionData::new(
                self,
                &mut state,
                transaction_name,
                duration,
                total_time,
                status_code,
                classification,
                apdex_zone,
                root,
            );
            (data, stats, state.ignore)
        };

        if ignored {
            debug!(guid = %self.guid, "transaction ignored, skipping listeners");
            return;
        }
        self.service.dispatch(&data, &stats);
    }

    fn record_rollups(
        stats: &mut TransactionStats,
        state: &TransactionState,
        transaction_name: &str,
        duration: Duration,
        total_time: Duration,
        classification: ErrorClassification,
    ) {
        stats.record_unscoped(transaction_name, duration, duration);
        if state.is_web {
            stats.record_unscoped(metric_names::WEB_TRANSACTION, duration, duration);
            stats.record_unscoped(metric_names::HTTP_DISPATCHER, duration, duration);
            stats.record_unscoped(metric_names::WEB_TRANSACTION_TOTAL_TIME, total_time, total_time);
        } else {
            stats.record_unscoped(metric_names::OTHER_TRANSACTION_ALL, duration, duration);
            stats.record_unscoped(
                metric_names::OTHER_TRANSACTION_TOTAL_TIME,
                total_time,
                total_time,
            );
        }
        match classification {
            ErrorClassification::Ordinary => {
                stats.record_unscoped(metric_names::ERRORS_ALL, Duration::ZERO, Duration::ZERO);
                let per_kind = if state.is_web {
                    metric_names::ERRORS_ALL_WEB
                } else {
                    metric_names::ERRORS_ALL_OTHER
                };
                stats.record_unscoped(per_kind, Duration::ZERO, Duration::ZERO);
                stats.record_unscoped(
                    &metric_names::error_metric_name(transaction_name),
                    Duration::ZERO,
                    Duration::ZERO,
                );
            }
            ErrorClassification::Expected => {
                stats.record_unscoped(
                    metric_names::ERRORS_EXPECTED_ALL,
                    Duration::ZERO,
                    Duration::ZERO,
                );
            }
            ErrorClassification::None | ErrorClassification::Ignored => {}
        }
    }

    fn apdex_zone(
        &self,
        state: &TransactionState,
        duration: Duration,
        classification: ErrorClassification,
    ) -> Option<ApdexZone> {
        if !state.is_web || state.ignore_apdex || classification == ErrorClassification::Ignored {
            return None;
        }
        if classification == ErrorClassification::Ordinary {
            return Some(ApdexZone::Frustrating);
        }
        Some(ApdexZone::classify(duration, self.config.apdex_t()))
    }

    pub(crate) fn service(&self) -> &Arc<TransactionService> {
        &self.service
    }

    pub(crate) fn span_guid(&self) -> &str {
        &self.span_guid
    }

    pub(crate) fn wall_start(&self) -> SystemTime {
        self.wall_start
    }
}
