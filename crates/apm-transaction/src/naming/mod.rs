//! Priority-ranked transaction and application naming.
//!
//! Several sources compete to name a transaction: framework guesses, servlet
//! and filter configuration, and explicit API calls. Resolution is monotonic:
//! a candidate only applies if its priority is strictly greater than the
//! current one, or equal with the override flag set. A frozen name accepts no
//! further changes at any priority.

use crate::metric_names;

/// Ordered naming sources, lowest to highest. Ordinal values are the enum
/// discriminants; nothing serializes them, so the ordering is the contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TransactionNamePriority {
    None,
    RequestUri,
    StatusCode,
    FilterName,
    FilterInitParam,
    ServletName,
    ServletInitParam,
    FrameworkLow,
    Framework,
    FrameworkHigh,
    CustomLow,
    CustomHigh,
    Frozen,
}

impl TransactionNamePriority {
    /// Explicit API sources apply even when automatic naming is disabled.
    #[must_use]
    pub fn is_explicit(self) -> bool {
        matches!(
            self,
            TransactionNamePriority::CustomLow
                | TransactionNamePriority::CustomHigh
                | TransactionNamePriority::Frozen
        )
    }
}

/// Ordered application-name sources, lowest to highest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ApplicationNamePriority {
    None,
    ContextPath,
    ContextName,
    ContextParam,
    FilterInitParam,
    ServletInitParam,
    RequestAttribute,
}

/// Monotonic priority slot shared by both name kinds.
#[derive(Clone, Copy, Debug)]
struct PrioritySlot<P> {
    priority: P,
    frozen: bool,
}

impl<P: Copy + Ord> PrioritySlot<P> {
    fn new(lowest: P) -> Self {
        PrioritySlot {
            priority: lowest,
            frozen: false,
        }
    }

    fn can_set(&self, priority: P, override_existing: bool) -> bool {
        if self.frozen {
            return false;
        }
        priority > self.priority || (priority == self.priority && override_existing)
    }

    fn commit(&mut self, priority: P) {
        self.priority = priority;
    }
}

/// Priority-ranked transaction name: category plus name under a slot.
#[derive(Clone, Debug)]
pub struct PriorityTransactionName {
    slot: PrioritySlot<TransactionNamePriority>,
    category: String,
    name: Option<String>,
}

impl Default for PriorityTransactionName {
    fn default() -> Self {
        PriorityTransactionName {
            slot: PrioritySlot::new(TransactionNamePriority::None),
            category: String::new(),
            name: None,
        }
    }
}

impl PriorityTransactionName {
    /// Applies a candidate. An empty category collapses to `Custom`.
    /// Returns whether the candidate took effect.
    pub fn set(
        &mut self,
        priority: TransactionNamePriority,
        override_existing: bool,
        category: &str,
        name: &str,
    ) -> bool {
        if !self.slot.can_set(priority, override_existing) {
            return false;
        }
        self.category = if category.is_empty() {
            metric_names::CUSTOM.to_string()
        } else {
            category.to_string()
        };
        self.name = Some(name.to_string());
        self.slot.commit(priority);
        true
    }

    /// Locks the current value against any further change.
    pub fn freeze(&mut self) {
        self.slot.frozen = true;
    }

    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.slot.frozen
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        self.name.is_some()
    }

    #[must_use]
    pub fn priority(&self) -> TransactionNamePriority {
        self.slot.priority
    }

    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Renders the full blame metric name,
    /// `WebTransaction/<category>/<name>` or `OtherTransaction/...`.
    /// Unset names render a fallback under `Uri` (web) or `Unknown`.
    #[must_use]
    pub fn render(&self, is_web: bool, fallback_uri: Option<&str>) -> String {
        let prefix = if is_web {
            metric_names::WEB_TRANSACTION
        } else {
            metric_names::OTHER_TRANSACTION
        };
        match &self.name {
            Some(name) => {
                let name = name.strip_prefix('/').unwrap_or(name);
                format!("{prefix}/{}/{name}", self.category)
            }
            None if is_web => {
                let uri = fallback_uri.unwrap_or("unknown");
                let uri = uri.strip_prefix('/').unwrap_or(uri);
                format!("{prefix}/Uri/{uri}")
            }
            None => format!("{prefix}/Unknown"),
        }
    }
}

/// Priority-ranked application name.
#[derive(Clone, Debug)]
pub struct PriorityApplicationName {
    slot: PrioritySlot<ApplicationNamePriority>,
    name: Option<String>,
}

impl Default for PriorityApplicationName {
    fn default() -> Self {
        PriorityApplicationName {
            slot: PrioritySlot::new(ApplicationNamePriority::None),
            name: None,
        }
    }
}

impl PriorityApplicationName {
    pub fn set(
        &mut self,
        priority: ApplicationNamePriority,
        override_existing: bool,
        name: &str,
    ) -> bool {
        if name.is_empty() || !self.slot.can_set(priority, override_existing) {
            return false;
        }
        self.name = Some(name.to_string());
        self.slot.commit(priority);
        true
    }

    pub fn freeze(&mut self) {
        self.slot.frozen = true;
    }

    #[must_use]
    pub fn priority(&self) -> ApplicationNamePriority {
        self.slot.priority
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}
