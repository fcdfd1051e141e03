//! Request id propagation.
//!
//! Reuses the caller's `X-Request-ID` when present so ids survive across
//! services; otherwise a UUID v4 is generated. The id is stored in the
//! context under [`keys::REQUEST_ID`] and echoed on the response.

use uuid::Uuid;

use super::{Middleware, Next};
use crate::context::keys;
use crate::handler::BoxFuture;
use crate::request::Request;

pub const HEADER: &str = "x-request-id";

/// Longest caller-supplied id that is accepted verbatim.
const MAX_LEN: usize = 128;

#[derive(Debug, Default, Clone, Copy)]
pub struct RequestId;

impl RequestId {
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for RequestId {
    fn name(&self) -> &'static str {
        "request_id"
    }

    fn handle<'a>(&'a self, mut req: Request, next: Next) -> BoxFuture<'a> {
        let id = req.header(HEADER)
            .map(str::trim)
            .filter(|id| !id.is_empty() && id.len() <= MAX_LEN)
            .map(str::to_owned)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        req.context_mut().insert(keys::REQUEST_ID, id.clone());

        Box::pin(async move {
            let mut res = next.run(req).await;
            res.set_header(HEADER, id);
            res
        })
    }
}
