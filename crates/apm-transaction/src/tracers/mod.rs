//! Tracer building blocks: signatures, flags, outcomes, and handles.
//!
//! A tracer is one traced unit of work on one activity. Most tracers are
//! frames on the activity's stack; flyweight tracers carry only a start time
//! and their rollup metric names, for invocations that must stay out of the
//! trace tree (hot methods, frames beneath a leaf, segment-limit overflow).

pub mod metric_name_format;

use std::time::{Duration, Instant};

pub use metric_name_format::ResolvedMetricName;

/// Class plus method identifying the instrumented call site.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ClassMethodSignature {
    pub class_name: String,
    pub method_name: String,
}

impl ClassMethodSignature {
    #[must_use]
    pub fn new(class_name: &str, method_name: &str) -> ClassMethodSignature {
        ClassMethodSignature {
            class_name: class_name.to_string(),
            method_name: method_name.to_string(),
        }
    }

    /// Final path segment of the class name, for `${className}` substitution
    /// and dispatcher naming.
    #[must_use]
    pub fn simple_class_name(&self) -> &str {
        self.class_name
            .rsplit(['.', ':'])
            .next()
            .unwrap_or(&self.class_name)
    }
}

/// Behavior flags for one tracer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TracerFlags {
    /// Explicitly instrumented through the custom API.
    pub custom: bool,
    /// Request entry point; the transaction's response time tracer.
    pub dispatcher: bool,
    /// Keep this frame but suppress all descendant frames.
    pub leaf: bool,
    /// Keep this invocation out of the trace tree entirely (metrics only).
    pub excluded_from_trace: bool,
}

impl TracerFlags {
    #[must_use]
    pub fn custom() -> TracerFlags {
        TracerFlags {
            custom: true,
            ..TracerFlags::default()
        }
    }

    #[must_use]
    pub fn dispatcher() -> TracerFlags {
        TracerFlags {
            dispatcher: true,
            ..TracerFlags::default()
        }
    }

    #[must_use]
    pub fn leaf(mut self) -> TracerFlags {
        self.leaf = true;
        self
    }

    #[must_use]
    pub fn excluded_from_trace(mut self) -> TracerFlags {
        self.excluded_from_trace = true;
        self
    }
}

/// How an instrumented call exited.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TracerOutcome {
    Return,
    Throw,
}

/// Index of a frame within its activity's arena. Opaque to callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TracerId(pub(crate) usize);

/// Metric-only tracer: records rollup metrics at finish, builds no frame.
#[derive(Debug)]
pub struct FlyweightTracer {
    pub(crate) start: Instant,
    pub(crate) rollup_names: Vec<String>,
}

impl FlyweightTracer {
    pub(crate) fn new(rollup_names: Vec<String>) -> FlyweightTracer {
        FlyweightTracer {
            start: Instant::now(),
            rollup_names,
        }
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Handle returned from starting a tracer; must be passed back to finish it.
#[derive(Debug)]
pub enum Tracer {
    Frame(TracerId),
    Flyweight(FlyweightTracer),
    /// Started against a completed activity; finishing is a no-op.
    Noop,
}

impl Tracer {
    /// Whether this tracer contributes a frame to the trace tree.
    #[must_use]
    pub fn is_frame(&self) -> bool {
        matches!(self, Tracer::Frame(_))
    }
}

/// Finished tracer subtree inside a [`crate::transaction::TransactionData`].
#[derive(Clone, Debug)]
pub struct TracerSnapshot {
    pub signature: ClassMethodSignature,
    pub metric_name: String,
    pub segment_name: String,
    pub segment_uri: Option<String>,
    /// Offset from the transaction start.
    pub start_offset: Duration,
    pub duration: Duration,
    pub exclusive_duration: Duration,
    pub children: Vec<TracerSnapshot>,
}

impl TracerSnapshot {
    /// Number of segments in this subtree, root included.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        1 + self.children.iter().map(TracerSnapshot::segment_count).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_class_name() {
        assert_eq!(
            ClassMethodSignature::new("com.shop.web.CartServlet", "service").simple_class_name(),
            "CartServlet"
        );
        assert_eq!(
            ClassMethodSignature::new("shop::web::CartHandler", "handle").simple_class_name(),
            "CartHandler"
        );
        assert_eq!(
            ClassMethodSignature::new("CartServlet", "service").simple_class_name(),
            "CartServlet"
        );
    }

    #[test]
    fn test_flag_builders() {
        let flags = TracerFlags::custom().leaf();
        assert!(flags.custom);
        assert!(flags.leaf);
        assert!(!flags.dispatcher);
    }

    #[test]
    fn test_segment_count() {
        let leaf = TracerSnapshot {
            signature: ClassMethodSignature::new("A", "b"),
            metric_name: "Function/A/b".to_string(),
            segment_name: "Function/A/b".to_string(),
            segment_uri: None,
            start_offset: Duration::ZERO,
            duration: Duration::ZERO,
            exclusive_duration: Duration::ZERO,
            children: Vec::new(),
        };
        let mut root = leaf.clone();
        root.children = vec![leaf.clone(), leaf];
        assert_eq!(root.segment_count(), 3);
    }
}
