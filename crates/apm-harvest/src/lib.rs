//! # APM Harvest
//!
//! Asynchronous service side of the transaction core: receives finalized
//! transactions from `apm-transaction`, aggregates metrics behind a
//! double-buffered engine, buffers analytic events in bounded reservoirs,
//! keeps the slowest transaction trace, and drains everything on demand
//! ("harvest").
//!
//! ## Architecture
//!
//! - [`stats_engine`]: metric aggregation across transactions
//! - [`double_buffer`]: atomic-swap wrapper so harvests never stall callers
//! - [`reservoir`]: bounded FIFO event buffers with drop accounting
//! - [`events`]: transaction and error analytic events
//! - [`trace_storage`]: slowest over-threshold trace per cycle
//! - [`harvest_service`]: the handle/service actor wiring it together
//! - [`logger`]: tracing formatter and installer for agent logs
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use apm_harvest::config::HarvestConfig;
//! use apm_harvest::harvest_service::install;
//! use apm_transaction::{AgentConfig, TransactionService};
//!
//! # async fn example() {
//! let transactions = TransactionService::new(Arc::new(AgentConfig::default()));
//! let harvester = install(&transactions, &HarvestConfig::default());
//! // ... drive transactions ...
//! let payload = harvester.harvest().await.expect("harvest");
//! # }
//! ```

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(unused_extern_crates)]
#![deny(unreachable_pub)]
#![allow(missing_docs)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_possible_truncation)]

/// Resolved harvest configuration
pub mod config;

/// Double-buffered stats engine wrapper
pub mod double_buffer;

/// Transaction and error analytic events
pub mod events;

/// Harvest actor: handle/service split and commands
pub mod harvest_service;

/// Logging formatter and installation
pub mod logger;

/// Bounded FIFO event reservoirs
pub mod reservoir;

/// Metric aggregation engine
pub mod stats_engine;

/// Slowest-transaction trace storage
pub mod trace_storage;

pub use config::HarvestConfig;
pub use harvest_service::{install, HarvestHandle, HarvestPayload, HarvestService};
