//! Metric name resolution for tracers.
//!
//! Given the invocation signature, an optional explicit name (which may carry
//! a `${className}` placeholder), and the tracer flags, derives the metric
//! name, the transaction-segment name, and an optional segment URI. The
//! resolution is deterministic: the same inputs always produce the same
//! names.

use crate::metric_names;
use crate::tracers::{ClassMethodSignature, TracerFlags};

/// Placeholder substituted with the simple class name of the target.
pub const CLASS_NAME_PLACEHOLDER: &str = "${className}";

/// Resolved names for one tracer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedMetricName {
    pub metric_name: String,
    pub segment_name: String,
    pub segment_uri: Option<String>,
}

/// Resolves the metric and segment names for a tracer.
///
/// - An explicit name wins; `${className}` inside it is replaced with the
///   simple class name, and custom tracers get a `Custom/` root unless the
///   name already carries one.
/// - Dispatcher tracers default to `Servlet/<SimpleClass>/<method>`.
/// - Everything else defaults to `Function/<class>/<method>` (`Custom/...`
///   when flagged custom).
#[must_use]
pub fn resolve(
    signature: &ClassMethodSignature,
    explicit_name: Option<&str>,
    flags: TracerFlags,
) -> ResolvedMetricName {
    let metric_name = match explicit_name {
        Some(name) => {
            let name = name.replace(CLASS_NAME_PLACEHOLDER, signature.simple_class_name());
            let name = name.strip_prefix('/').unwrap_or(&name).to_string();
            if flags.custom && !name.starts_with(metric_names::CUSTOM) {
                format!("{}/{name}", metric_names::CUSTOM)
            } else {
                name
            }
        }
        None if flags.dispatcher => format!(
            "{}/{}/{}",
            metric_names::SERVLET,
            signature.simple_class_name(),
            signature.method_name
        ),
        None => {
            let root = if flags.custom {
                metric_names::CUSTOM
            } else {
                metric_names::FUNCTION
            };
            format!("{root}/{}/{}", signature.class_name, signature.method_name)
        }
    };
    ResolvedMetricName {
        segment_name: metric_name.clone(),
        metric_name,
        segment_uri: None,
    }
}
