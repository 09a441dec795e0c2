//! Attribute capture: validation, truncation, and destination filtering.
//!
//! Validation is independent of the destination trie: keys and values are
//! checked and truncated before a transaction stores them; the per-destination
//! filter in [`filter`] runs later, when a finalized transaction's attributes
//! are read for a concrete destination.

pub mod filter;
pub mod node;

use serde::Serialize;
use tracing::debug;

pub use filter::{AttributesFilter, Destination, ALL_DESTINATIONS};
pub use node::AttributesNode;

/// Byte cap for attribute keys and general string values.
pub const MAX_ATTRIBUTE_SIZE: usize = 255;

/// Byte cap for string values bound for log destinations.
pub const MAX_LOG_ATTRIBUTE_SIZE: usize = 32_768;

/// Maximum distinct custom attributes per transaction; later keys are dropped.
pub const MAX_USER_ATTRIBUTES: usize = 64;

/// A validated attribute value.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Str(String),
    Long(i64),
    Double(f64),
    Bool(bool),
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Str(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Str(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Long(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Double(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

/// Validates keys and values before they are stored on a transaction.
#[derive(Clone, Copy, Debug)]
pub struct AttributeValidator {
    value_cap: usize,
}

impl Default for AttributeValidator {
    fn default() -> Self {
        AttributeValidator {
            value_cap: MAX_ATTRIBUTE_SIZE,
        }
    }
}

impl AttributeValidator {
    /// Validator with the larger value cap used for log attributes.
    #[must_use]
    pub fn for_logs() -> AttributeValidator {
        AttributeValidator {
            value_cap: MAX_LOG_ATTRIBUTE_SIZE,
        }
    }

    /// Verifies one key/value pair. Oversized string values are truncated,
    /// not rejected; invalid keys or non-finite numbers drop the pair.
    #[must_use]
    pub fn validate(
        &self,
        key: &str,
        value: AttributeValue,
    ) -> Option<(String, AttributeValue)> {
        if key.is_empty() {
            debug!("dropping attribute with empty key");
            return None;
        }
        if key.len() > MAX_ATTRIBUTE_SIZE {
            debug!(key_len = key.len(), "dropping attribute with oversized key");
            return None;
        }
        let value = match value {
            AttributeValue::Str(s) => {
                AttributeValue::Str(truncate_to_char_boundary(&s, self.value_cap).to_string())
            }
            AttributeValue::Double(d) if !d.is_finite() => {
                debug!(key, "dropping attribute with non-finite value");
                return None;
            }
            other => other,
        };
        Some((key.to_string(), value))
    }
}

/// Truncates to at most `cap` bytes without splitting a UTF-8 character.
fn truncate_to_char_boundary(s: &str, cap: usize) -> &str {
    if s.len() <= cap {
        return s;
    }
    let mut end = cap;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
