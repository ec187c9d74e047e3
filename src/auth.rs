//! Bearer-token sourcing for outbound requests.
//!
//! The streaming layer does not manage credentials itself; it asks an
//! application-supplied [`TokenProvider`] for the current token at request
//! time. A `None` token means the request goes out without an
//! `Authorization` header, which the backend treats as an anonymous call.

use std::sync::Arc;

/// Supplies the current bearer token, if any.
///
/// Implementations are consulted on every request, so a provider backed by
/// refreshable session storage always yields the live token rather than
/// whatever was current when a client was constructed.
pub trait TokenProvider: Send + Sync {
    fn bearer_token(&self) -> Option<String>;
}

/// Fixed token, mainly for tests and one-shot tools.
pub struct StaticToken {
    token: String,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            token: token.into(),
        })
    }
}

impl TokenProvider for StaticToken {
    fn bearer_token(&self) -> Option<String> {
        Some(self.token.clone())
    }
}

/// Anonymous access: no `Authorization` header is attached.
pub struct NoAuth;

impl NoAuth {
    pub fn new() -> Arc<Self> {
        Arc::new(Self)
    }
}

impl TokenProvider for NoAuth {
    fn bearer_token(&self) -> Option<String> {
        None
    }
}
