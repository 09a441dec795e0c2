//! Destination filtering for captured attributes.
//!
//! One glob trie is compiled per destination from the global include/exclude
//! globs, the destination-specific globs, and a small set of mandatory
//! excludes that no configuration can re-include. Filtering a key walks the
//! trie; when nothing below the root matches, the destination's built-in
//! default decides (browser capture defaults off, everything else on).

use crate::attributes::node::AttributesNode;
use crate::attributes::AttributeValue;
use crate::config::{AttributesConfig, DestinationAttributesConfig};

/// Mandatory excludes compiled into every destination; configuration cannot
/// override these.
const MANDATORY_EXCLUDES: &[&str] = &[
    "password*",
    "request.headers.authorization",
    "request.headers.cookie",
    "request.headers.set-cookie*",
];

/// Where a finalized transaction's attributes may be sent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Destination {
    TransactionEvents,
    TransactionTraces,
    ErrorEvents,
    Browser,
    SpanEvents,
    TransactionSegments,
}

pub const ALL_DESTINATIONS: [Destination; 6] = [
    Destination::TransactionEvents,
    Destination::TransactionTraces,
    Destination::ErrorEvents,
    Destination::Browser,
    Destination::SpanEvents,
    Destination::TransactionSegments,
];

impl Destination {
    fn index(self) -> usize {
        match self {
            Destination::TransactionEvents => 0,
            Destination::TransactionTraces => 1,
            Destination::ErrorEvents => 2,
            Destination::Browser => 3,
            Destination::SpanEvents => 4,
            Destination::TransactionSegments => 5,
        }
    }

    /// Built-in capture default when no rule matches.
    fn default_include(self) -> bool {
        !matches!(self, Destination::Browser)
    }

    /// Whether capture is enabled at all absent configuration.
    fn default_enabled(self) -> bool {
        !matches!(self, Destination::Browser)
    }
}

struct DestinationFilter {
    root: AttributesNode,
    enabled: bool,
    default_include: bool,
}

impl DestinationFilter {
    fn build(
        global: &AttributesConfig,
        specific: &DestinationAttributesConfig,
        destination: Destination,
    ) -> DestinationFilter {
        let mut root = AttributesNode::root();
        for pattern in &global.exclude {
            root.insert(pattern, false, false);
        }
        for pattern in &global.include {
            root.insert(pattern, true, false);
        }
        for pattern in &specific.exclude {
            root.insert(pattern, false, false);
        }
        for pattern in &specific.include {
            root.insert(pattern, true, false);
        }
        for pattern in MANDATORY_EXCLUDES {
            root.insert(pattern, false, true);
        }
        DestinationFilter {
            root,
            enabled: global.enabled
                && specific.enabled.unwrap_or_else(|| destination.default_enabled()),
            default_include: destination.default_include(),
        }
    }

    fn is_included(&self, key: &str) -> bool {
        if !self.enabled {
            return false;
        }
        self.root.apply(key).unwrap_or(self.default_include)
    }
}

/// Compiled per-destination attribute filters.
pub struct AttributesFilter {
    filters: [DestinationFilter; 6],
}

impl AttributesFilter {
    #[must_use]
    pub fn from_config(config: &AttributesConfig) -> AttributesFilter {
        let build = |specific: &DestinationAttributesConfig, destination: Destination| {
            DestinationFilter::build(config, specific, destination)
        };
        AttributesFilter {
            filters: [
                build(&config.transaction_events, Destination::TransactionEvents),
                build(&config.transaction_traces, Destination::TransactionTraces),
                build(&config.error_events, Destination::ErrorEvents),
                build(&config.browser, Destination::Browser),
                build(&config.span_events, Destination::SpanEvents),
                build(&config.transaction_segments, Destination::TransactionSegments),
            ],
        }
    }

    #[must_use]
    pub fn is_included(&self, destination: Destination, key: &str) -> bool {
        self.filters[destination.index()].is_included(key)
    }

    /// Returns the subset of `attributes` allowed at `destination`,
    /// preserving order.
    #[must_use]
    pub fn filter<'a>(
        &self,
        destination: Destination,
        attributes: &'a [(String, AttributeValue)],
    ) -> Vec<(&'a str, &'a AttributeValue)> {
        attributes
            .iter()
            .filter(|(key, _)| self.is_included(destination, key))
            .map(|(key, value)| (key.as_str(), value))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(include: &[&str], exclude: &[&str]) -> AttributesConfig {
        AttributesConfig {
            include: include.iter().map(ToString::to_string).collect(),
            exclude: exclude.iter().map(ToString::to_string).collect(),
            ..AttributesConfig::default()
        }
    }

    #[test]
    fn test_default_include_per_destination() {
        let filter = AttributesFilter::from_config(&AttributesConfig::default());
        assert!(filter.is_included(Destination::TransactionEvents, "user.id"));
        assert!(filter.is_included(Destination::ErrorEvents, "user.id"));
        assert!(!filter.is_included(Destination::Browser, "user.id"));
    }

    #[test]
    fn test_browser_opt_in() {
        let mut config = AttributesConfig::default();
        config.browser.enabled = Some(true);
        config.browser.include = vec!["user.*".to_string()];
        let filter = AttributesFilter::from_config(&config);
        assert!(filter.is_included(Destination::Browser, "user.id"));
        assert!(!filter.is_included(Destination::Browser, "cart.total"));
    }

    #[test]
    fn test_global_exclude_applies_everywhere() {
        let filter = AttributesFilter::from_config(&config_with(&[], &["secret*"]));
        for destination in ALL_DESTINATIONS {
            assert!(!filter.is_included(destination, "secret.token"), "{destination:?}");
        }
    }

    #[test]
    fn test_destination_include_overrides_global_exclude() {
        let mut config = config_with(&[], &["request*"]);
        config.transaction_traces.include = vec!["request.params.*".to_string()];
        let filter = AttributesFilter::from_config(&config);
        assert!(filter.is_included(Destination::TransactionTraces, "request.params.id"));
        assert!(!filter.is_included(Destination::TransactionEvents, "request.params.id"));
        assert!(!filter.is_included(Destination::TransactionTraces, "request.uri"));
    }

    #[test]
    fn test_mandatory_excludes_cannot_be_included() {
        let filter = AttributesFilter::from_config(&config_with(
            &["request.headers.cookie", "password"],
            &[],
        ));
        assert!(!filter.is_included(Destination::TransactionEvents, "request.headers.cookie"));
        assert!(!filter.is_included(Destination::TransactionEvents, "password"));
    }

    #[test]
    fn test_disabled_drops_everything() {
        let mut config = config_with(&["user.id"], &[]);
        config.enabled = false;
        let filter = AttributesFilter::from_config(&config);
        assert!(!filter.is_included(Destination::TransactionEvents, "user.id"));
    }

    #[test]
    fn test_filter_preserves_order() {
        let filter = AttributesFilter::from_config(&config_with(&[], &["b"]));
        let attributes = vec![
            ("a".to_string(), AttributeValue::Long(1)),
            ("b".to_string(), AttributeValue::Long(2)),
            ("c".to_string(), AttributeValue::Long(3)),
        ];
        let kept = filter.filter(Destination::TransactionEvents, &attributes);
        let keys: Vec<&str> = kept.iter().map(|(key, _)| *key).collect();
        assert_eq!(keys, vec!["a", "c"]);
    }
}
