//! Per-request deadline.
//!
//! The remainder of the chain runs on its own task, scoped by a child
//! cancellation token installed in the request context. Whichever finishes
//! first wins:
//!
//! - the work: its response is returned untouched;
//! - the deadline: the token is cancelled, the task is aborted, and the
//!   client gets `408 {"error":"Request timeout"}`.
//!
//! Aborting stops the task at its next await point. The token reaches work
//! that outlives the task (anything the handler spawned with a clone of it),
//! and lets handlers wind down cooperatively through
//! [`Request::cancelled`](crate::Request::cancelled).

use std::time::Duration;

use http::StatusCode;
use tokio_util::task::AbortOnDropHandle;
use tracing::{error, warn};

use super::{Middleware, Next};
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::Response;

#[derive(Debug, Clone, Copy)]
pub struct Timeout {
    limit: Duration,
}

impl Timeout {
    pub fn new(limit: Duration) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }
}

impl Middleware for Timeout {
    fn name(&self) -> &'static str {
        "timeout"
    }

    fn handle<'a>(&'a self, mut req: Request, next: Next) -> BoxFuture<'a> {
        Box::pin(async move {
            let token = req.context().cancellation().child_token();
            req.context_mut().set_cancellation(token.clone());
            let path = req.path().to_owned();

            // Dropping this stage (client gone) aborts the task as well.
            let mut task = AbortOnDropHandle::new(tokio::spawn(next.run(req)));

            match tokio::time::timeout(self.limit, &mut task).await {
                Ok(Ok(res)) => res,
                Ok(Err(err)) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
                Ok(Err(err)) => {
                    error!(%path, "request task ended without a response: {err}");
                    Response::error(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
                }
                Err(_) => {
                    token.cancel();
                    task.abort();
                    warn!(%path, limit_ms = self.limit.as_millis() as u64, "request timed out");
                    Response::error(StatusCode::REQUEST_TIMEOUT, "Request timeout")
                }
            }
        })
    }
}
