//! Ordered middleware around a terminal handler.

use std::sync::Arc;

use super::{BoxedMiddleware, Middleware, Next};
use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler, Handler};
use crate::request::Request;
use crate::response::Response;

/// An ordered, immutable-once-built list of middleware.
///
/// Cloning is one atomic increment: the stages live behind an `Arc<[_]>`.
/// Building appends, running never allocates for the stage list.
#[derive(Clone)]
pub struct Chain {
    stack: Arc<[BoxedMiddleware]>,
}

impl Chain {
    pub fn new() -> Self {
        Self { stack: Arc::from(Vec::new()) }
    }

    /// Appends a stage. Stages run in the order they were added.
    pub fn with(self, middleware: impl Middleware) -> Self {
        self.with_shared(Arc::new(middleware))
    }

    /// Appends a stage that is also referenced elsewhere, e.g. one rate
    /// limiter shared by several route groups.
    pub fn with_shared(self, middleware: BoxedMiddleware) -> Self {
        let mut stack = self.stack.to_vec();
        stack.push(middleware);
        Self { stack: stack.into() }
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Stage names in execution order.
    pub fn names(&self) -> Vec<&'static str> {
        self.stack.iter().map(|m| m.name()).collect()
    }

    /// Runs `req` through every stage and then `handler`.
    ///
    /// Any stage may answer early; the response it returns is then final.
    pub async fn run(&self, req: Request, handler: impl Handler) -> Response {
        self.run_boxed(req, handler.into_boxed_handler()).await
    }

    pub(crate) async fn run_boxed(&self, req: Request, endpoint: BoxedHandler) -> Response {
        Next::new(Arc::clone(&self.stack), endpoint).run(req).await
    }

    /// Fuses the chain with `endpoint` into a single handler.
    pub(crate) fn bind(self, endpoint: BoxedHandler) -> BoxedHandler {
        if self.is_empty() {
            return endpoint;
        }
        Arc::new(Bound { stack: self.stack, endpoint })
    }
}

impl Default for Chain {
    fn default() -> Self { Self::new() }
}

/// A chain fused with its terminal handler.
struct Bound {
    stack: Arc<[BoxedMiddleware]>,
    endpoint: BoxedHandler,
}

impl ErasedHandler for Bound {
    fn call(&self, req: Request) -> BoxFuture<'static> {
        let next = Next::new(Arc::clone(&self.stack), Arc::clone(&self.endpoint));
        Box::pin(next.run(req))
    }
}
