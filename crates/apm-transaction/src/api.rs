//! Facade for instrumented code that may or may not be inside a transaction.
//!
//! Every operation degrades to a harmless no-op when no transaction is
//! present: identifiers come back as empty strings, tokens come back inert,
//! and mutators return `false`. Instrumented call sites therefore never
//! branch on transaction presence.

use std::sync::Arc;

use crate::attributes::AttributeValue;
use crate::naming::TransactionNamePriority;
use crate::transaction::{Token, Transaction};

/// Handle over an optional transaction.
#[derive(Clone, Default)]
pub struct TransactionApi {
    transaction: Option<Arc<Transaction>>,
}

impl TransactionApi {
    #[must_use]
    pub fn new(transaction: Arc<Transaction>) -> TransactionApi {
        TransactionApi {
            transaction: Some(transaction),
        }
    }

    /// Facade with no transaction behind it.
    #[must_use]
    pub fn noop() -> TransactionApi {
        TransactionApi::default()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.transaction
            .as_ref()
            .is_some_and(|transaction| !transaction.is_finished())
    }

    /// Effective trace id, or the empty string outside a transaction.
    #[must_use]
    pub fn trace_id(&self) -> String {
        self.transaction
            .as_ref()
            .map(|transaction| transaction.trace_id())
            .unwrap_or_default()
    }

    /// Span id, or the empty string outside a transaction.
    #[must_use]
    pub fn span_id(&self) -> String {
        self.transaction
            .as_ref()
            .map(|transaction| transaction.span_id())
            .unwrap_or_default()
    }

    /// Token for async hand-off; inert outside a transaction.
    #[must_use]
    pub fn create_token(&self) -> Token {
        self.transaction
            .as_ref()
            .map_or_else(Token::inert, Transaction::create_token)
    }

    pub fn set_transaction_name(&self, category: &str, name: &str) -> bool {
        self.transaction.as_ref().is_some_and(|transaction| {
            transaction.set_transaction_name(
                TransactionNamePriority::CustomHigh,
                true,
                category,
                name,
            )
        })
    }

    pub fn add_custom_parameter(&self, key: &str, value: impl Into<AttributeValue>) -> bool {
        self.transaction
            .as_ref()
            .is_some_and(|transaction| transaction.add_custom_parameter(key, value))
    }

    pub fn notice_error(&self, error_class: &str, message: &str, expected: bool) {
        if let Some(transaction) = self.transaction.as_ref() {
            transaction.notice_error(error_class, message, expected);
        }
    }

    pub fn ignore(&self) {
        if let Some(transaction) = self.transaction.as_ref() {
            transaction.ignore();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentConfig;
    use crate::transaction::TransactionService;

    #[test]
    fn test_noop_facade_outside_transaction() {
        let api = TransactionApi::noop();
        assert!(!api.is_active());
        assert_eq!(api.trace_id(), "");
        assert_eq!(api.span_id(), "");
        assert!(!api.create_token().is_active());
        assert!(!api.set_transaction_name("Custom", "Name"));
        assert!(!api.add_custom_parameter("key", 1_i64));
        // Must not panic.
        api.notice_error("Boom", "msg", false);
        api.ignore();
    }

    #[test]
    fn test_active_facade_delegates() {
        let service = TransactionService::new(Arc::new(AgentConfig::default()));
        let (transaction, mut activity) = service.begin_background_transaction();
        let api = TransactionApi::new(Arc::clone(&transaction));
        assert!(api.is_active());
        assert_eq!(api.trace_id(), transaction.guid());
        assert_eq!(api.span_id().len(), 16);
        assert!(api.set_transaction_name("Custom", "Named"));
        assert!(api.add_custom_parameter("cart.size", 3_i64));

        let token = api.create_token();
        assert!(token.is_active());
        token.expire();

        use crate::tracers::{ClassMethodSignature, TracerFlags, TracerOutcome};
        let root = activity.start_tracer(
            ClassMethodSignature::new("Job", "run"),
            TracerFlags::default(),
        );
        activity.finish_tracer(root, TracerOutcome::Return);
        assert!(transaction.is_finished());
    }
}
