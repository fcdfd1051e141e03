//! Request-scoped context.
//!
//! Every request owns exactly one [`Context`]. Middleware writes into it on
//! the way in (the auth gate stores the caller's identity, the request-id
//! stage stores the id) and handlers read from it. It is dropped together
//! with the request and is never shared between requests.
//!
//! The context also carries the request's [`CancellationToken`]. Long-running
//! handlers should select on [`Request::cancelled`](crate::Request::cancelled)
//! so that a timeout upstream stops them early.

use std::collections::HashMap;

use tokio_util::sync::CancellationToken;

/// Well-known context keys written by the built-in middleware.
pub mod keys {
    /// Set by [`Auth`](crate::middleware::Auth).
    pub const USER_ID: &str = "user_id";
    /// Set by [`Auth`](crate::middleware::Auth).
    pub const USERNAME: &str = "username";
    /// Set by [`RequestId`](crate::middleware::RequestId).
    pub const REQUEST_ID: &str = "request_id";
}

/// String key/value store attached to a single request.
#[derive(Debug, Default)]
pub struct Context {
    values: HashMap<String, String>,
    cancel: CancellationToken,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key`, returning the previous value if any.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.values.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The token that fires when this request's work should stop.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Replaces the cancellation token. Used by stages that scope a deadline
    /// to the remainder of the chain.
    pub fn set_cancellation(&mut self, token: CancellationToken) {
        self.cancel = token;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_overwrites_and_returns_previous() {
        let mut ctx = Context::new();
        assert_eq!(ctx.insert(keys::USER_ID, "1"), None);
        assert_eq!(ctx.insert(keys::USER_ID, "2").as_deref(), Some("1"));
        assert_eq!(ctx.get(keys::USER_ID), Some("2"));
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn child_token_follows_parent() {
        let mut ctx = Context::new();
        let parent = ctx.cancellation().clone();
        ctx.set_cancellation(parent.child_token());

        assert!(!ctx.is_cancelled());
        parent.cancel();
        assert!(ctx.is_cancelled());
    }
}
