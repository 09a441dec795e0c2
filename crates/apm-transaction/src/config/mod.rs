//! Resolved configuration consumed by the transaction core.
//!
//! Configuration parsing (files, environment) happens outside this crate; the
//! core only ever sees an already-resolved [`AgentConfig`]. Every section
//! derives `Deserialize` with per-field defaults so a partially specified
//! document resolves to the same values as [`AgentConfig::default`].
//!
//! High security mode is a master switch: when enabled, custom and request
//! attribute capture is disabled regardless of any other attribute settings.

use serde::Deserialize;

use crate::errors::ErrorCollectorConfig;

fn default_true() -> bool {
    true
}

fn default_apdex_t_ms() -> u64 {
    500
}

fn default_segment_limit() -> usize {
    3_000
}

fn default_sample_ratio() -> f32 {
    1.0
}

/// Top-level resolved agent configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Primary application name reported with every transaction.
    pub app_name: String,
    /// Master switch disabling custom/request attribute capture entirely.
    pub high_security: bool,
    /// Apdex threshold T in milliseconds. Responses under T are satisfying,
    /// under 4T tolerating, anything else frustrating.
    pub apdex_t_ms: u64,
    pub attributes: AttributesConfig,
    pub transaction_tracer: TransactionTracerConfig,
    pub transaction_naming: TransactionNamingConfig,
    pub error_collector: ErrorCollectorConfig,
    pub distributed_tracing: DistributedTracingConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig {
            app_name: String::new(),
            high_security: false,
            apdex_t_ms: default_apdex_t_ms(),
            attributes: AttributesConfig::default(),
            transaction_tracer: TransactionTracerConfig::default(),
            transaction_naming: TransactionNamingConfig::default(),
            error_collector: ErrorCollectorConfig::default(),
            distributed_tracing: DistributedTracingConfig::default(),
        }
    }
}

impl AgentConfig {
    /// Apdex threshold as a [`std::time::Duration`].
    #[must_use]
    pub fn apdex_t(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.apdex_t_ms)
    }
}

/// Include/exclude settings for one attribute destination.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct DestinationAttributesConfig {
    /// `None` inherits the destination's built-in default.
    pub enabled: Option<bool>,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

/// Attribute capture configuration, global plus per destination.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct AttributesConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Globs applied to every destination.
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub transaction_events: DestinationAttributesConfig,
    pub transaction_traces: DestinationAttributesConfig,
    pub error_events: DestinationAttributesConfig,
    pub browser: DestinationAttributesConfig,
    pub span_events: DestinationAttributesConfig,
    pub transaction_segments: DestinationAttributesConfig,
}

impl Default for AttributesConfig {
    fn default() -> Self {
        AttributesConfig {
            enabled: true,
            include: Vec::new(),
            exclude: Vec::new(),
            transaction_events: DestinationAttributesConfig::default(),
            transaction_traces: DestinationAttributesConfig::default(),
            error_events: DestinationAttributesConfig::default(),
            browser: DestinationAttributesConfig::default(),
            span_events: DestinationAttributesConfig::default(),
            transaction_segments: DestinationAttributesConfig::default(),
        }
    }
}

/// Transaction tracer limits.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct TransactionTracerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Maximum tracer frames collected per transaction. Once reached, further
    /// tracers degrade to metric-only (flyweight) mode.
    #[serde(default = "default_segment_limit")]
    pub segment_limit: usize,
}

impl Default for TransactionTracerConfig {
    fn default() -> Self {
        TransactionTracerConfig {
            enabled: true,
            segment_limit: default_segment_limit(),
        }
    }
}

/// Automatic naming enablement.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct TransactionNamingConfig {
    /// When disabled, only explicit API naming calls take effect; automatic
    /// sources (request URI, servlet/filter names, framework guesses) are
    /// skipped and the name stays unset until an explicit call arrives.
    #[serde(default = "default_true")]
    pub auto_transaction_naming: bool,
}

impl Default for TransactionNamingConfig {
    fn default() -> Self {
        TransactionNamingConfig {
            auto_transaction_naming: true,
        }
    }
}

/// Distributed tracing identity and sampling.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DistributedTracingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Account identifier stamped into outbound payloads.
    pub account_id: String,
    /// Application identifier stamped into outbound payloads.
    pub primary_application_id: String,
    /// Fraction of transactions sampled in, in `[0.0, 1.0]`.
    #[serde(default = "default_sample_ratio")]
    pub sample_ratio: f32,
}

impl Default for DistributedTracingConfig {
    fn default() -> Self {
        DistributedTracingConfig {
            enabled: true,
            account_id: String::new(),
            primary_application_id: String::new(),
            sample_ratio: default_sample_ratio(),
        }
    }
}
