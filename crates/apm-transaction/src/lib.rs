// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! # APM Transaction Core
//!
//! In-process transaction and tracer state machine for application
//! performance monitoring. This crate is the synchronous half of the agent:
//! instrumented code drives it directly, with no async runtime in the path.
//!
//! ## Overview
//!
//! A [`transaction::Transaction`] represents one logical request or job being
//! monitored end-to-end. Each participating thread owns a
//! [`transaction::TransactionActivity`], a strict stack of tracer frames; a
//! tracer is one traced unit of work. Additional threads join a transaction
//! through opaque [`transaction::Token`]s. When the root activity's root
//! tracer finishes and no activities or tokens remain outstanding, the
//! transaction is finalized exactly once and a read-only
//! [`transaction::TransactionData`] snapshot plus merged
//! [`stats::TransactionStats`] are dispatched to registered listeners.
//!
//! ## Architecture
//!
//! - [`naming`]: priority-ranked transaction and application naming
//! - [`attributes`]: attribute validation and per-destination glob filtering
//! - [`tracers`]: tracer flags, signatures, and metric name resolution
//! - [`transaction`]: the transaction/activity/token state machine
//! - [`dispatcher`]: web request lifecycle bracketing
//! - [`errors`]: expected/ignored/ordinary error classification
//! - [`distributed`]: distributed trace payload create/accept
//! - [`stats`]: per-transaction response-time and Apdex accumulation
//! - [`api`]: a facade that degrades to no-ops outside a transaction
//!
//! The harvest side (concurrent stats engine, reservoirs, periodic drain)
//! lives in the `apm-harvest` crate, which subscribes to this crate's
//! listener seam.

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
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]

/// Facade over an optional transaction; every operation is a no-op without one
pub mod api;

/// Attribute validation and per-destination include/exclude filtering
pub mod attributes;

/// Resolved configuration structures consumed by the core
pub mod config;

/// Web request dispatcher lifecycle
pub mod dispatcher;

/// Distributed trace payload creation, acceptance, and identifiers
pub mod distributed;

/// Error classification (expected, ignored, ordinary)
pub mod errors;

/// Metric name vocabulary and composition helpers
pub mod metric_names;

/// Priority-ranked transaction and application naming
pub mod naming;

/// Response-time, Apdex, and per-transaction stats accumulation
pub mod stats;

/// Tracer flags, signatures, and metric name resolution
pub mod tracers;

/// Transaction, activity, and token state machine
pub mod transaction;

pub use config::AgentConfig;
pub use transaction::{
    Transaction, TransactionActivity, TransactionData, TransactionFinishedListener,
    TransactionService, Token,
};
