//! Web request dispatcher: the container-facing bracket around one web
//! transaction.
//!
//! `request_initialized` is idempotent (the dispatcher is created once and
//! reused); `request_destroyed` called twice is a no-op. Both are driven by
//! the embedding container and must never panic on out-of-order calls.

/// Incoming request details handed to the transaction at initialization.
#[derive(Clone, Debug)]
pub struct WebRequest {
    pub uri: String,
    pub method: String,
}

impl WebRequest {
    #[must_use]
    pub fn new(uri: &str, method: &str) -> WebRequest {
        WebRequest {
            uri: uri.to_string(),
            method: method.to_string(),
        }
    }

    #[must_use]
    pub fn get(uri: &str) -> WebRequest {
        WebRequest::new(uri, "GET")
    }
}

/// Per-transaction web dispatcher state.
#[derive(Clone, Debug)]
pub struct WebRequestDispatcher {
    uri: String,
    method: String,
    status_code: Option<u16>,
    destroyed: bool,
}

impl WebRequestDispatcher {
    #[must_use]
    pub fn new(request: &WebRequest) -> WebRequestDispatcher {
        WebRequestDispatcher {
            uri: request.uri.clone(),
            method: request.method.clone(),
            status_code: None,
            destroyed: false,
        }
    }

    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    pub fn set_status_code(&mut self, status: u16) {
        // First write wins; a nested dispatch must not overwrite the outer
        // response status.
        if self.status_code.is_none() {
            self.status_code = Some(status);
        }
    }

    /// Marks the request destroyed. Returns whether this call was the first.
    pub fn destroy(&mut self) -> bool {
        if self.destroyed {
            return false;
        }
        self.destroyed = true;
        true
    }

    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}
