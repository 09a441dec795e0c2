// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Harvest service: the actor that receives finalized transactions.
//!
//! The service implements the handle/service split: a clonable
//! [`HarvestHandle`] is registered as the core's transaction listener, and a
//! background task processes commands sequentially. Stats merge directly on
//! the caller thread through the double-buffered engine (a harvest is only a
//! pointer swap there); everything that needs ordering — listener fan-out,
//! reservoirs, trace storage — flows through the command channel.
//!
//! # Backpressure
//!
//! The command channel is bounded. When it is full, finished transactions
//! are dropped with a warning rather than blocking the instrumented thread;
//! their metrics were already merged on the caller side. Harvest commands use
//! a blocking `send` since they sit on the flush path, not the hot path.

use std::sync::Arc;

use apm_transaction::metric_names;
use apm_transaction::stats::TransactionStats;
use apm_transaction::transaction::{TransactionData, TransactionFinishedListener};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

use crate::config::HarvestConfig;
use crate::double_buffer::DoubleBufferedStatsEngine;
use crate::events::{error_event, transaction_event, ErrorEvent, TransactionEvent, TransactionTrace};
use crate::reservoir::EventReservoir;
use crate::stats_engine::MetricsPayload;
use crate::trace_storage::TraceStorage;

/// Buffer size for the harvest command channel.
///
/// Bounds memory under load: when the channel is full, finished transactions
/// are dropped (their metrics already merged) instead of blocking.
const HARVEST_CHANNEL_BUFFER_SIZE: usize = 1_000;

/// Errors from handle-to-service communication.
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    /// The service task stopped or the channel closed.
    #[error("failed to send command to harvest service: {0}")]
    SendError(String),

    /// The service task dropped the response channel.
    #[error("failed to receive response from harvest service: {0}")]
    RecvError(#[from] oneshot::error::RecvError),
}

/// A finalized transaction crossing the channel.
pub struct FinishedTransaction {
    pub data: TransactionData,
    pub stats: TransactionStats,
}

/// Commands processed sequentially by the service task.
pub enum HarvestCommand {
    TransactionFinished(Box<FinishedTransaction>),
    Harvest(oneshot::Sender<HarvestPayload>),
    AddListener(Arc<dyn TransactionFinishedListener>),
    Shutdown,
}

/// One harvest cycle's drained data.
pub struct HarvestPayload {
    pub metrics: MetricsPayload,
    pub transaction_events: Vec<TransactionEvent>,
    pub error_events: Vec<ErrorEvent>,
    pub transaction_trace: Option<TransactionTrace>,
}

/// Clonable handle; also the core's transaction listener.
#[derive(Clone)]
pub struct HarvestHandle {
    tx: mpsc::Sender<HarvestCommand>,
    engine: Arc<DoubleBufferedStatsEngine>,
}

impl HarvestHandle {
    /// Drains a harvest cycle: metric buffer swap, reservoirs, trace slot.
    pub async fn harvest(&self) -> Result<HarvestPayload, HarvestError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(HarvestCommand::Harvest(response_tx))
            .await
            .map_err(|e| HarvestError::SendError(e.to_string()))?;
        Ok(response_rx.await?)
    }

    /// Registers a harvest-side listener, called for each finished
    /// transaction before reservoir insertion.
    pub async fn add_listener(
        &self,
        listener: Arc<dyn TransactionFinishedListener>,
    ) -> Result<(), HarvestError> {
        self.tx
            .send(HarvestCommand::AddListener(listener))
            .await
            .map_err(|e| HarvestError::SendError(e.to_string()))
    }

    pub fn shutdown(&self) {
        if self.tx.try_send(HarvestCommand::Shutdown).is_err() {
            debug!("harvest service already stopped or backlogged at shutdown");
        }
    }
}

impl TransactionFinishedListener for HarvestHandle {
    fn transaction_finished(&self, data: &TransactionData, stats: &TransactionStats) {
        // Merge on the caller thread: active-buffer lock only, never a
        // harvest stall.
        self.engine.merge_transaction(data.transaction_name(), stats);

        let finished = Box::new(FinishedTransaction {
            data: data.clone(),
            stats: stats.clone(),
        });
        if self
            .tx
            .try_send(HarvestCommand::TransactionFinished(finished))
            .is_err()
        {
            warn!(
                transaction = %data.transaction_name(),
                "harvest channel full, dropping transaction events (metrics kept)"
            );
        }
    }
}

/// The background half; run it with `tokio::spawn(service.run())`.
pub struct HarvestService {
    rx: mpsc::Receiver<HarvestCommand>,
    engine: Arc<DoubleBufferedStatsEngine>,
    transaction_events: EventReservoir<TransactionEvent>,
    error_events: EventReservoir<ErrorEvent>,
    traces: TraceStorage,
    listeners: Vec<Arc<dyn TransactionFinishedListener>>,
    events_seen: u64,
}

impl HarvestService {
    #[must_use]
    pub fn new(config: &HarvestConfig) -> (HarvestService, HarvestHandle) {
        let (tx, rx) = mpsc::channel(HARVEST_CHANNEL_BUFFER_SIZE);
        let engine = Arc::new(DoubleBufferedStatsEngine::new());
        let service = HarvestService {
            rx,
            engine: Arc::clone(&engine),
            transaction_events: EventReservoir::new(config.max_transaction_events),
            error_events: EventReservoir::new(config.max_error_events),
            traces: TraceStorage::new(config.transaction_trace_threshold()),
            listeners: Vec::new(),
            events_seen: 0,
        };
        let handle = HarvestHandle { tx, engine };
        (service, handle)
    }

    pub async fn run(mut self) {
        debug!("harvest service started");

        while let Some(command) = self.rx.recv().await {
            match command {
                HarvestCommand::TransactionFinished(finished) => {
                    self.on_transaction_finished(&finished);
                }

                HarvestCommand::Harvest(response_tx) => {
                    let payload = self.drain_cycle();
                    if response_tx.send(payload).is_err() {
                        error!("failed to send harvest payload - receiver dropped");
                    }
                }

                HarvestCommand::AddListener(listener) => {
                    self.listeners.push(listener);
                }

                HarvestCommand::Shutdown => {
                    debug!("harvest service shutting down");
                    break;
                }
            }
        }

        debug!("harvest service stopped");
    }

    fn on_transaction_finished(&mut self, finished: &FinishedTransaction) {
        // Listener fan-out happens before reservoir insertion.
        for listener in &self.listeners {
            listener.transaction_finished(&finished.data, &finished.stats);
        }

        self.events_seen += 1;
        self.transaction_events.add(transaction_event(&finished.data));
        if let Some(event) = error_event(&finished.data) {
            self.error_events.add(event);
        }
        self.traces.consider(&finished.data);
    }

    fn drain_cycle(&mut self) -> HarvestPayload {
        let (transaction_events, transactions_dropped) = self.transaction_events.drain();
        let (error_events, errors_dropped) = self.error_events.drain();

        self.engine
            .record_count(metric_names::SUPPORTABILITY_EVENTS_SEEN, self.events_seen);
        self.engine.record_count(
            metric_names::SUPPORTABILITY_EVENTS_DROPPED,
            transactions_dropped + errors_dropped,
        );
        self.events_seen = 0;

        HarvestPayload {
            metrics: self.engine.flush(),
            transaction_events,
            error_events,
            transaction_trace: self.traces.take(),
        }
    }
}

/// Wires a harvest service into a transaction service and spawns it.
/// Returns the handle for harvesting and shutdown.
#[must_use]
pub fn install(
    transaction_service: &Arc<apm_transaction::TransactionService>,
    config: &HarvestConfig,
) -> HarvestHandle {
    let (service, handle) = HarvestService::new(config);
    transaction_service.add_listener(Arc::new(handle.clone()));
    tokio::spawn(service.run());
    handle
}
