//! Middleware layer.
//!
//! Middleware intercepts requests and responses and is the right place for
//! cross-cutting concerns: access logging, request ids, authentication,
//! rate limiting, deadlines.
//!
//! # The contract
//!
//! A middleware receives the [`Request`] (which owns its
//! [`Context`](crate::Context)) and a [`Next`] bound to the rest of the
//! chain, terminal handler included. It then does exactly one of:
//!
//! - **continue**: `next.run(req).await`, optionally touching the request
//!   before and the response after;
//! - **short-circuit**: return its own [`Response`] without running `next`.
//!   Nothing further down the chain executes.
//!
//! `Next::run` takes `self`, so a stage cannot continue twice. Execution is
//! nested: for `[A, B]` around handler `H` the order is
//! `A-pre, B-pre, H, B-post, A-post`.
//!
//! ```rust
//! use tradegate::middleware::{from_fn, Chain};
//! use tradegate::{Request, Response};
//!
//! let stamp = from_fn("stamp", |req: Request, next| async move {
//!     let mut res = next.run(req).await;
//!     res.set_header("x-served-by", "tradegate");
//!     res
//! });
//!
//! let chain = Chain::new().with(stamp);
//! # let _ = chain;
//! ```
//!
//! Panics are not caught by the chain. Register [`Recover`] first.

mod auth;
mod chain;
mod compression;
mod cors;
mod rate_limit;
mod recover;
mod request_id;
mod response_time;
mod security_headers;
mod timeout;
mod trace;

use std::future::Future;
use std::sync::Arc;

pub use auth::{Auth, AuthError, HmacTokenVerifier, Identity, StaticTokenVerifier, TokenVerifier};
pub use chain::Chain;
pub use compression::Compression;
pub use cors::Cors;
pub use rate_limit::{ClientKey, Decision, RateLimit, RateLimiter};
pub use recover::Recover;
pub use request_id::RequestId;
pub use response_time::ResponseTime;
pub use security_headers::SecurityHeaders;
pub use timeout::Timeout;
pub use trace::Trace;

use crate::handler::{BoxFuture, BoxedHandler};
use crate::request::Request;
use crate::response::Response;

/// A type-erased middleware shared by every request that passes through it.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// One stage of a middleware chain.
///
/// Stages are constructed once with explicit configuration and shared
/// across concurrent requests, so any mutable state they keep must be
/// synchronised internally (see [`RateLimiter`]).
pub trait Middleware: Send + Sync + 'static {
    /// Stable name used in logs.
    fn name(&self) -> &'static str;

    /// Processes `req`, either calling `next.run(req)` once or answering
    /// directly.
    fn handle<'a>(&'a self, req: Request, next: Next) -> BoxFuture<'a>;
}

/// Continuation bound to the remainder of a chain.
///
/// `Next` owns everything it needs (`'static + Send`), so a stage may move
/// it onto another task, as [`Timeout`] does.
pub struct Next {
    stack: Arc<[BoxedMiddleware]>,
    position: usize,
    endpoint: BoxedHandler,
}

impl Next {
    pub(crate) fn new(stack: Arc<[BoxedMiddleware]>, endpoint: BoxedHandler) -> Self {
        Self { stack, position: 0, endpoint }
    }

    /// Runs the next stage, or the terminal handler once the stages are
    /// exhausted.
    pub async fn run(self, req: Request) -> Response {
        let current = self.stack.get(self.position).cloned();
        match current {
            Some(middleware) => {
                let next = Next {
                    stack: self.stack,
                    position: self.position + 1,
                    endpoint: self.endpoint,
                };
                middleware.handle(req, next).await
            }
            None => self.endpoint.call(req).await,
        }
    }

    /// Number of stages still ahead of the terminal handler.
    pub fn remaining(&self) -> usize {
        self.stack.len().saturating_sub(self.position)
    }
}

/// Builds a middleware from an async closure. See the module docs.
pub fn from_fn<F, Fut>(name: &'static str, func: F) -> FnMiddleware<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    FnMiddleware { name, func }
}

/// Middleware created by [`from_fn`].
pub struct FnMiddleware<F> {
    name: &'static str,
    func: F,
}

impl<F, Fut> Middleware for FnMiddleware<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn handle<'a>(&'a self, req: Request, next: Next) -> BoxFuture<'a> {
        Box::pin((self.func)(req, next))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use http::StatusCode;

    use super::{BoxedMiddleware, Chain, Middleware};
    use crate::{Request, Response};

    /// Runs `req` through a single stage in front of `handler`.
    pub async fn run_one<M, F, Fut>(middleware: M, req: Request, handler: F) -> Response
    where
        M: Middleware,
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Response> + Send + 'static,
    {
        Chain::new().with(middleware).run(req, handler).await
    }

    /// Like [`run_one`] with a shared stage instance.
    pub async fn run_shared<M: Middleware>(middleware: &Arc<M>, req: Request) -> Response {
        Chain::new().with_shared(Arc::clone(middleware) as BoxedMiddleware).run(req, ok).await
    }

    pub async fn ok(_req: Request) -> Response {
        Response::text("ok")
    }

    pub fn body_json(res: &Response) -> serde_json::Value {
        serde_json::from_slice(res.body()).unwrap_or(serde_json::Value::Null)
    }

    pub fn assert_error(res: &Response, status: StatusCode, message: &str) {
        assert_eq!(res.status_code(), status);
        assert_eq!(body_json(res)["error"], message);
    }
}
