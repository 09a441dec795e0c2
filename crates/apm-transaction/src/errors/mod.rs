//! Error classification: expected, ignored, or ordinary.
//!
//! Classification runs exactly once per transaction, at finalization, against
//! the first throwable noticed and the final response status. Expected errors
//! roll up under `ErrorsExpected/all` and never frustrate Apdex; ignored
//! errors are recorded nowhere; everything else rolls up under `Errors/all`.
//!
//! Rule precedence is by specificity: a class+message rule beats a class-only
//! rule of the other kind. At equal specificity ignore wins. Rules never
//! apply transitively to other error classes.

use serde::Deserialize;

fn default_true() -> bool {
    true
}

/// One expected/ignore rule: an error class, optionally narrowed to an exact
/// message.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct ErrorRule {
    pub error_class: String,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorRule {
    #[must_use]
    pub fn by_class(error_class: &str) -> ErrorRule {
        ErrorRule {
            error_class: error_class.to_string(),
            message: None,
        }
    }

    #[must_use]
    pub fn by_class_and_message(error_class: &str, message: &str) -> ErrorRule {
        ErrorRule {
            error_class: error_class.to_string(),
            message: Some(message.to_string()),
        }
    }

    /// Match specificity: 0 no match, 1 class-only, 2 class+message.
    fn specificity(&self, error_class: &str, message: &str) -> u8 {
        if self.error_class != error_class {
            return 0;
        }
        match &self.message {
            None => 1,
            Some(required) if required == message => 2,
            Some(_) => 0,
        }
    }
}

/// Inclusive status code range.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub struct StatusCodeRange {
    pub min: u16,
    pub max: u16,
}

impl StatusCodeRange {
    #[must_use]
    pub fn single(code: u16) -> StatusCodeRange {
        StatusCodeRange {
            min: code,
            max: code,
        }
    }

    #[must_use]
    pub fn contains(&self, code: u16) -> bool {
        code >= self.min && code <= self.max
    }
}

/// Resolved error collector configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ErrorCollectorConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub expected_classes: Vec<ErrorRule>,
    pub ignore_classes: Vec<ErrorRule>,
    pub expected_status_codes: Vec<StatusCodeRange>,
    pub ignore_status_codes: Vec<StatusCodeRange>,
}

impl Default for ErrorCollectorConfig {
    fn default() -> Self {
        ErrorCollectorConfig {
            enabled: true,
            expected_classes: Vec::new(),
            ignore_classes: Vec::new(),
            expected_status_codes: Vec::new(),
            // Plain 404s are noise, not failures.
            ignore_status_codes: vec![StatusCodeRange::single(404)],
        }
    }
}

/// The first throwable noticed on a transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionThrowable {
    pub error_class: String,
    pub message: String,
    /// Marked expected at the API call site, independent of configuration.
    pub expected: bool,
}

impl TransactionThrowable {
    #[must_use]
    pub fn new(error_class: &str, message: &str) -> TransactionThrowable {
        TransactionThrowable {
            error_class: error_class.to_string(),
            message: message.to_string(),
            expected: false,
        }
    }
}

/// Outcome of classification, resolved once at finalization.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClassification {
    /// No error on this transaction.
    None,
    Ordinary,
    Expected,
    Ignored,
}

impl ErrorClassification {
    #[must_use]
    pub fn is_reportable(self) -> bool {
        matches!(self, ErrorClassification::Ordinary | ErrorClassification::Expected)
    }
}

/// Classifies a transaction's error state. A throwable takes precedence over
/// the response status; a status of 400 or above without a throwable is an
/// error in its own right.
#[must_use]
pub fn classify(
    throwable: Option<&TransactionThrowable>,
    status_code: Option<u16>,
    config: &ErrorCollectorConfig,
) -> ErrorClassification {
    let present = throwable.is_some() || status_code.is_some_and(|s| s >= 400);
    if !present {
        return ErrorClassification::None;
    }
    if !config.enabled {
        return ErrorClassification::Ignored;
    }

    if let Some(throwable) = throwable {
        let expected = best_specificity(&config.expected_classes, throwable);
        let ignored = best_specificity(&config.ignore_classes, throwable);
        if ignored > 0 && ignored >= expected {
            return ErrorClassification::Ignored;
        }
        if expected > 0 || throwable.expected {
            return ErrorClassification::Expected;
        }
        return ErrorClassification::Ordinary;
    }

    // Status-driven classification for throwable-less error responses.
    let status = status_code.unwrap_or_default();
    if config.ignore_status_codes.iter().any(|r| r.contains(status)) {
        return ErrorClassification::Ignored;
    }
    if config.expected_status_codes.iter().any(|r| r.contains(status)) {
        return ErrorClassification::Expected;
    }
    ErrorClassification::Ordinary
}

fn best_specificity(rules: &[ErrorRule], throwable: &TransactionThrowable) -> u8 {
    rules
        .iter()
        .map(|rule| rule.specificity(&throwable.error_class, &throwable.message))
        .max()
        .unwrap_or(0)
}
