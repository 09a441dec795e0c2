//! Async hand-off tokens.
//!
//! A token is an opaque capability tying work on another thread back to the
//! transaction it came from. Instrumented code obtains one on the request
//! thread, moves it to the worker, and calls [`Token::link_and_expire`] there
//! to receive a fresh activity on the same transaction. Tokens obtained
//! outside a transaction are inert, so callers never null-check.
//!
//! An outstanding token defers transaction finalization; dropping an unused
//! token releases it.

use std::sync::Arc;

use crate::transaction::{Transaction, TransactionActivity};

pub struct Token {
    transaction: Option<Arc<Transaction>>,
}

impl Token {
    /// Inert token returned outside of any transaction.
    #[must_use]
    pub fn inert() -> Token {
        Token { transaction: None }
    }

    pub(crate) fn active(transaction: Arc<Transaction>) -> Token {
        Token {
            transaction: Some(transaction),
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.transaction.is_some()
    }

    /// Attaches a new activity to the owning transaction and expires the
    /// token. Returns `None` for inert tokens or finished transactions.
    #[must_use]
    pub fn link_and_expire(mut self) -> Option<TransactionActivity> {
        let transaction = self.transaction.take()?;
        let activity = if transaction.is_finished() {
            None
        } else {
            Some(transaction.new_activity(false))
        };
        transaction.handle_closed();
        activity
    }

    /// Releases the token without linking any work.
    pub fn expire(mut self) {
        if let Some(transaction) = self.transaction.take() {
            transaction.handle_closed();
        }
    }
}

impl Drop for Token {
    fn drop(&mut self) {
        if let Some(transaction) = self.transaction.take() {
            transaction.handle_closed();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inert_token() {
        let token = Token::inert();
        assert!(!token.is_active());
        assert!(token.link_and_expire().is_none());
    }
}
