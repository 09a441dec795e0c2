//! Per-thread tracer stack.
//!
//! One activity belongs to exactly one thread of control. Tracer frames live
//! in an index arena (no reference cycles); the stack holds the indices of
//! running frames, top last. Finishing the root frame completes the activity
//! and hands its tracer tree and stats back to the owning transaction.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::stats::TransactionStats;
use crate::tracers::metric_name_format::{self, ResolvedMetricName};
use crate::tracers::{
    ClassMethodSignature, FlyweightTracer, Tracer, TracerFlags, TracerId, TracerOutcome,
    TracerSnapshot,
};
use crate::transaction::{ActivityResult, Transaction};

struct Frame {
    signature: ClassMethodSignature,
    resolved: ResolvedMetricName,
    flags: TracerFlags,
    start: Instant,
    start_offset: Duration,
    duration: Option<Duration>,
    children_duration: Duration,
    children: Vec<usize>,
    parent: Option<usize>,
}

/// The tracer stack for one thread participating in a transaction.
pub struct TransactionActivity {
    transaction: Arc<Transaction>,
    frames: Vec<Frame>,
    stack: Vec<usize>,
    stats: TransactionStats,
    root_index: Option<usize>,
    is_root: bool,
    completed: bool,
}

impl TransactionActivity {
    pub(crate) fn new(transaction: Arc<Transaction>, is_root: bool) -> TransactionActivity {
        TransactionActivity {
            transaction,
            frames: Vec::new(),
            stack: Vec::new(),
            stats: TransactionStats::new(),
            root_index: None,
            is_root,
            completed: false,
        }
    }

    #[must_use]
    pub fn transaction(&self) -> &Arc<Transaction> {
        &self.transaction
    }

    /// Depth of the running tracer stack.
    #[must_use]
    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    /// Frames collected so far, finished or running.
    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Starts a tracer for an instrumented invocation.
    pub fn start_tracer(&mut self, signature: ClassMethodSignature, flags: TracerFlags) -> Tracer {
        self.start_tracer_named(signature, None, flags)
    }

    /// Starts a tracer with an explicit metric name (may contain
    /// `${className}`).
    pub fn start_tracer_named(
        &mut self,
        signature: ClassMethodSignature,
        explicit_name: Option<&str>,
        flags: TracerFlags,
    ) -> Tracer {
        if self.completed {
            warn!("tracer started on completed activity");
            return Tracer::Noop;
        }
        let resolved = metric_name_format::resolve(&signature, explicit_name, flags);

        let under_leaf = self
            .stack
            .last()
            .is_some_and(|&index| self.frames[index].flags.leaf);
        let collecting = self.transaction.config().transaction_tracer.enabled;
        if flags.excluded_from_trace
            || under_leaf
            || !collecting
            || !self.transaction.try_reserve_segment()
        {
            // Invisible to the trace tree, still visible in metric counts.
            return Tracer::Flyweight(FlyweightTracer::new(vec![resolved.metric_name]));
        }

        let parent = self.stack.last().copied();
        let index = self.frames.len();
        self.frames.push(Frame {
            signature,
            resolved,
            flags,
            start: Instant::now(),
            start_offset: self.transaction.start_instant().elapsed(),
            duration: None,
            children_duration: Duration::ZERO,
            children: Vec::new(),
            parent,
        });
        match parent {
            Some(parent_index) => self.frames[parent_index].children.push(index),
            None => {
                if self.root_index.is_none() {
                    self.root_index = Some(index);
                }
            }
        }
        self.stack.push(index);
        Tracer::Frame(TracerId(index))
    }

    /// Starts a metric-only tracer with explicit rollup names. Hot paths use
    /// this to stay out of the trace tree at constant overhead.
    pub fn start_flyweight_tracer(
        &mut self,
        signature: &ClassMethodSignature,
        rollup_names: &[&str],
    ) -> Tracer {
        if self.completed {
            return Tracer::Noop;
        }
        let mut names: Vec<String> = rollup_names.iter().map(ToString::to_string).collect();
        if names.is_empty() {
            let resolved =
                metric_name_format::resolve(signature, None, TracerFlags::default());
            names.push(resolved.metric_name);
        }
        Tracer::Flyweight(FlyweightTracer::new(names))
    }

    /// Finishes a tracer. Finishing twice is a no-op; finishing a frame that
    /// is not on top implicitly finishes the abandoned frames above it.
    pub fn finish_tracer(&mut self, tracer: Tracer, outcome: TracerOutcome) {
        match tracer {
            Tracer::Noop => {}
            Tracer::Flyweight(flyweight) => {
                if self.completed {
                    debug!("flyweight tracer finished after activity completion");
                    return;
                }
                let duration = flyweight.elapsed();
                for name in &flyweight.rollup_names {
                    self.stats.record_unscoped(name, duration, duration);
                }
            }
            Tracer::Frame(id) => self.finish_frame(id.0, outcome),
        }
    }

    fn finish_frame(&mut self, index: usize, outcome: TracerOutcome) {
        if self.completed {
            warn!("tracer finished on completed activity");
            return;
        }
        if index >= self.frames.len() || self.frames[index].duration.is_some() {
            warn!("tracer finished twice");
            return;
        }
        let Some(position) = self.stack.iter().rposition(|&i| i == index) else {
            warn!("tracer is not on the activity stack");
            return;
        };
        while self.stack.len() > position + 1 {
            #[allow(clippy::expect_used)]
            let abandoned = *self.stack.last().expect("stack is non-empty");
            warn!(
                metric = %self.frames[abandoned].resolved.metric_name,
                "implicitly finishing abandoned tracer frame"
            );
            self.pop_frame(abandoned, outcome);
        }
        self.pop_frame(index, outcome);
    }

    fn pop_frame(&mut self, index: usize, _outcome: TracerOutcome) {
        self.stack.pop();
        let duration = self.frames[index].start.elapsed();
        let exclusive = duration.saturating_sub(self.frames[index].children_duration);
        self.frames[index].duration = Some(duration);
        let metric_name = self.frames[index].resolved.metric_name.clone();
        self.stats.record_scoped(&metric_name, duration, exclusive);
        match self.frames[index].parent {
            Some(parent) => self.frames[parent].children_duration += duration,
            None => self.complete(duration),
        }
    }

    fn complete(&mut self, root_duration: Duration) {
        self.completed = true;
        let root = self.root_index.map(|index| self.build_snapshot(index));
        let stats = std::mem::take(&mut self.stats);
        let transaction = Arc::clone(&self.transaction);
        transaction.activity_finished(ActivityResult {
            root,
            stats,
            duration: root_duration,
            is_root: self.is_root,
        });
    }

    fn build_snapshot(&self, index: usize) -> TracerSnapshot {
        let frame = &self.frames[index];
        let duration = frame.duration.unwrap_or_default();
        TracerSnapshot {
            signature: frame.signature.clone(),
            metric_name: frame.resolved.metric_name.clone(),
            segment_name: frame.resolved.segment_name.clone(),
            segment_uri: frame.resolved.segment_uri.clone(),
            start_offset: frame.start_offset,
            duration,
            exclusive_duration: duration.saturating_sub(frame.children_duration),
            children: frame
                .children
                .iter()
                .map(|&child| self.build_snapshot(child))
                .collect(),
        }
    }

    /// Stats accumulated so far; activities hand these off at completion.
    #[must_use]
    pub fn stats(&self) -> &TransactionStats {
        &self.stats
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed
    }
}

impl Drop for TransactionActivity {
    fn drop(&mut self) {
        if !self.completed {
            self.transaction.activity_abandoned();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::AgentConfig;
    use crate::transaction::{TransactionData, TransactionFinishedListener, TransactionService};
    use std::sync::Mutex;
    use std::thread;

    struct Capture {
        finished: Mutex<Vec<(TransactionData, TransactionStats)>>,
    }

    impl Capture {
        fn new() -> Arc<Capture> {
            Arc::new(Capture {
                finished: Mutex::new(Vec::new()),
            })
        }

        fn take(&self) -> Vec<(TransactionData, TransactionStats)> {
            std::mem::take(&mut *self.finished.lock().unwrap())
        }
    }

    impl TransactionFinishedListener for Capture {
        fn transaction_finished(&self, data: &TransactionData, stats: &TransactionStats) {
            self.finished.lock().unwrap().push((data.clone(), stats.clone()));
        }
    }

    fn begin() -> (Arc<Transaction>, TransactionActivity) {
        let service = TransactionService::new(Arc::new(AgentConfig::default()));
        service.begin_background_transaction()
    }

    fn begin_captured() -> (Arc<Capture>, Arc<Transaction>, TransactionActivity) {
        let service = TransactionService::new(Arc::new(AgentConfig::default()));
        let capture = Capture::new();
        service.add_listener(capture.clone());
        let (transaction, activity) = service.begin_background_transaction();
        (capture, transaction, activity)
    }

    fn sig(class: &str, method: &str) -> ClassMethodSignature {
        ClassMethodSignature::new(class, method)
    }

    #[test]
    fn test_nested_exclusive_durations() {
        let (capture, _tx, mut activity) = begin_captured();
        let root = activity.start_tracer(sig("Outer", "run"), TracerFlags::default());
        let child = activity.start_tracer(sig("Inner", "step"), TracerFlags::default());
        thread::sleep(Duration::from_millis(5));
        activity.finish_tracer(child, TracerOutcome::Return);
        activity.finish_tracer(root, TracerOutcome::Return);
        assert!(activity.is_completed());

        let finished = capture.take();
        assert_eq!(finished.len(), 1);
        let (data, stats) = &finished[0];
        let root_snapshot = data.root_tracer().expect("root snapshot");
        assert_eq!(root_snapshot.children.len(), 1);
        let child_snapshot = &root_snapshot.children[0];
        assert!(child_snapshot.duration <= root_snapshot.duration);
        assert_eq!(
            root_snapshot.exclusive_duration,
            root_snapshot.duration - child_snapshot.duration
        );
        assert!(child_snapshot.duration >= Duration::from_millis(5));

        let outer = stats.scoped().get("Function/Outer/run").expect("outer metric");
        assert_eq!(outer.call_count, 1);
        assert_eq!(outer.total_exclusive, root_snapshot.exclusive_duration);
    }

    #[test]
    fn test_finish_twice_is_noop() {
        let (_tx, mut activity) = begin();
        let root = activity.start_tracer(sig("Outer", "run"), TracerFlags::default());
        let child = activity.start_tracer(sig("Inner", "step"), TracerFlags::default());
        let Tracer::Frame(child_id) = child else {
            panic!("expected frame")
        };
        activity.finish_tracer(Tracer::Frame(child_id), TracerOutcome::Return);
        // Same frame again: must not corrupt the stack.
        activity.finish_tracer(Tracer::Frame(child_id), TracerOutcome::Return);
        assert_eq!(activity.stack_depth(), 1);
        activity.finish_tracer(root, TracerOutcome::Return);
        assert!(activity.is_completed());
    }

    #[test]
    fn test_unbalanced_finish_closes_abandoned_frames() {
        let (_tx, mut activity) = begin();
        let root = activity.start_tracer(sig("Outer", "run"), TracerFlags::default());
        let _middle = activity.start_tracer(sig("Middle", "step"), TracerFlags::default());
        let _inner = activity.start_tracer(sig("Inner", "leaf"), TracerFlags::default());
        // Finishing the root with two frames still open finishes them first.
        activity.finish_tracer(root, TracerOutcome::Throw);
        assert!(activity.is_completed());
        assert_eq!(activity.stack_depth(), 0);
    }

    #[test]
    fn test_leaf_suppresses_descendants() {
        let (_tx, mut activity) = begin();
        let root = activity.start_tracer(sig("Outer", "run"), TracerFlags::default());
        let leaf = activity.start_tracer(sig("Hot", "spin"), TracerFlags::default().leaf());
        let hidden = activity.start_tracer(sig("Hidden", "call"), TracerFlags::default());
        assert!(!hidden.is_frame());
        activity.finish_tracer(hidden, TracerOutcome::Return);
        activity.finish_tracer(leaf, TracerOutcome::Return);
        activity.finish_tracer(root, TracerOutcome::Return);
        // Root and leaf frames only; the hidden call never made the tree.
        assert_eq!(activity.frame_count(), 2);
    }

    #[test]
    fn test_flyweight_counts_without_frames() {
        let (_tx, mut activity) = begin();
        let root = activity.start_tracer(sig("Outer", "run"), TracerFlags::default());
        let signature = sig("Hot", "tight_loop");
        for _ in 0..100_000 {
            let flyweight =
                activity.start_flyweight_tracer(&signature, &["Custom/Hot/tight_loop"]);
            activity.finish_tracer(flyweight, TracerOutcome::Return);
        }
        assert_eq!(activity.frame_count(), 1);
        let rollup = activity.stats().unscoped()["Custom/Hot/tight_loop"];
        assert_eq!(rollup.call_count, 100_000);
        activity.finish_tracer(root, TracerOutcome::Return);
    }

    #[test]
    fn test_segment_limit_degrades_to_flyweight() {
        let mut config = AgentConfig::default();
        config.transaction_tracer.segment_limit = 2;
        let service = TransactionService::new(Arc::new(config));
        let (_tx, mut activity) = service.begin_background_transaction();

        let root = activity.start_tracer(sig("Outer", "run"), TracerFlags::default());
        let first = activity.start_tracer(sig("A", "a"), TracerFlags::default());
        let second = activity.start_tracer(sig("B", "b"), TracerFlags::default());
        assert!(root.is_frame());
        assert!(first.is_frame());
        assert!(!second.is_frame());
        activity.finish_tracer(second, TracerOutcome::Return);
        activity.finish_tracer(first, TracerOutcome::Return);
        activity.finish_tracer(root, TracerOutcome::Return);
        assert_eq!(activity.frame_count(), 2);
    }
}
