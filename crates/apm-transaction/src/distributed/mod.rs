//! Distributed trace payloads and identifiers.
//!
//! A payload is a versioned JSON envelope carried across a service boundary.
//! Creating one stamps the transaction's effective trace id into the `tr`
//! field; accepting an inbound payload adopts its trace id, priority, and
//! sampling decision. Acceptance is at most once per transaction and only
//! before the trace id has been observed; the acceptance state itself lives
//! on the owning transaction.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Payload major version this core understands.
pub const SUPPORTED_MAJOR_VERSION: u8 = 0;

/// Parent type stamped into outbound payloads.
pub const PARENT_TYPE_APP: &str = "App";

#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("failed to parse distributed trace payload: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unsupported distributed trace payload version {0}.{1}")]
    UnsupportedVersion(u8, u8),
}

/// Versioned envelope: `v` is `[major, minor]`, `d` the payload body.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct DistributedTracePayload {
    #[serde(rename = "v")]
    pub version: [u8; 2],
    #[serde(rename = "d")]
    pub data: PayloadData,
}

/// Payload body with the short field keys used on the wire.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct PayloadData {
    #[serde(rename = "ty")]
    pub parent_type: String,
    #[serde(rename = "ac")]
    pub account_id: String,
    #[serde(rename = "ap")]
    pub application_id: String,
    /// Caller's span id, when span events were enabled upstream.
    #[serde(rename = "id", skip_serializing_if = "Option::is_none", default)]
    pub span_id: Option<String>,
    /// Caller's transaction GUID.
    #[serde(rename = "tx", skip_serializing_if = "Option::is_none", default)]
    pub transaction_id: Option<String>,
    #[serde(rename = "tr")]
    pub trace_id: String,
    #[serde(rename = "pr")]
    pub priority: f32,
    #[serde(rename = "sa")]
    pub sampled: bool,
    /// Milliseconds since the epoch at creation time.
    #[serde(rename = "ti")]
    pub timestamp_ms: u64,
}

impl DistributedTracePayload {
    /// Parses and version-checks payload text.
    pub fn parse(text: &str) -> Result<DistributedTracePayload, PayloadError> {
        let payload: DistributedTracePayload = serde_json::from_str(text)?;
        if payload.version[0] > SUPPORTED_MAJOR_VERSION {
            return Err(PayloadError::UnsupportedVersion(
                payload.version[0],
                payload.version[1],
            ));
        }
        Ok(payload)
    }

    /// Serializes to the wire form.
    pub fn to_json(&self) -> Result<String, PayloadError> {
        serde_json::to_string(self).map_err(PayloadError::from)
    }
}

/// Generates a 16-character lowercase hex identifier for traces and spans.
#[must_use]
pub fn generate_guid() -> String {
    let id: u64 = rand::thread_rng().gen();
    format!("{id:016x}")
}

/// Sampling state carried by a transaction and propagated in payloads.
#[derive(Clone, Debug)]
pub struct SpanProxy {
    pub(crate) inbound: Option<DistributedTracePayload>,
    pub(crate) outbound_created: bool,
    pub(crate) trace_id_observed: bool,
    pub(crate) priority: f32,
    pub(crate) sampled: bool,
}

impl SpanProxy {
    /// Draws a fresh sampling decision. Sampled transactions get a priority
    /// boost so downstream reservoirs prefer them.
    pub(crate) fn new(sample_ratio: f32) -> SpanProxy {
        let mut priority: f32 = rand::thread_rng().gen_range(0.0..1.0);
        let sampled = priority < sample_ratio;
        if sampled {
            priority += 1.0;
        }
        SpanProxy {
            inbound: None,
            outbound_created: false,
            trace_id_observed: false,
            priority,
            sampled,
        }
    }

    /// Effective trace id: the accepted inbound one, else the local GUID.
    pub(crate) fn effective_trace_id<'a>(&'a self, local_guid: &'a str) -> &'a str {
        self.inbound
            .as_ref()
            .map_or(local_guid, |payload| payload.data.trace_id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> DistributedTracePayload {
        DistributedTracePayload {
            version: [0, 1],
            data: PayloadData {
                parent_type: PARENT_TYPE_APP.to_string(),
                account_id: "12345".to_string(),
                application_id: "67890".to_string(),
                span_id: Some("b4a07f08064ee8f9".to_string()),
                transaction_id: Some("5f28dee791c7a137".to_string()),
                trace_id: "3221bf09aa0bcf0d".to_string(),
                priority: 1.234_567,
                sampled: true,
                timestamp_ms: 1_482_959_525_577,
            },
        }
    }

    #[test]
    fn test_round_trip_uses_short_keys() {
        let json = payload().to_json().expect("serialize");
        assert!(json.contains("\"tr\":\"3221bf09aa0bcf0d\""));
        assert!(json.contains("\"ty\":\"App\""));
        let parsed = DistributedTracePayload::parse(&json).expect("parse");
        assert_eq!(parsed, payload());
    }

    #[test]
    fn test_optional_fields_may_be_absent() {
        let json = r#"{"v":[0,1],"d":{"ty":"App","ac":"1","ap":"2","tr":"abc","pr":0.5,"sa":false,"ti":1}}"#;
        let parsed = DistributedTracePayload::parse(json).expect("parse");
        assert_eq!(parsed.data.span_id, None);
        assert_eq!(parsed.data.transaction_id, None);
    }

    #[test]
    fn test_unsupported_major_version_rejected() {
        let mut newer = payload();
        newer.version = [1, 0];
        let json = newer.to_json().expect("serialize");
        match DistributedTracePayload::parse(&json) {
            Err(PayloadError::UnsupportedVersion(1, 0)) => {}
            other => panic!("expected version error, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        assert!(matches!(
            DistributedTracePayload::parse("{not json"),
            Err(PayloadError::Parse(_))
        ));
    }

    #[test]
    fn test_generate_guid_shape() {
        let guid = generate_guid();
        assert_eq!(guid.len(), 16);
        assert!(guid.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(generate_guid(), guid);
    }

    #[test]
    fn test_effective_trace_id() {
        let mut proxy = SpanProxy::new(1.0);
        assert_eq!(proxy.effective_trace_id("local"), "local");
        proxy.inbound = Some(payload());
        assert_eq!(proxy.effective_trace_id("local"), "3221bf09aa0bcf0d");
    }

    #[test]
    fn test_sampled_priority_boosted() {
        let proxy = SpanProxy::new(1.0);
        assert!(proxy.sampled);
        assert!(proxy.priority >= 1.0);
        let proxy = SpanProxy::new(0.0);
        assert!(!proxy.sampled);
        assert!(proxy.priority < 1.0);
    }
}
