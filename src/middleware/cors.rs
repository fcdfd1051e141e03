//! CORS headers and preflight handling.
//!
//! `OPTIONS` requests are answered here with `204` and never reach routing,
//! which is why this stage belongs on the router, not on a route group.

use http::{Method, StatusCode};

use super::{Middleware, Next};
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::Response;

const ALLOW_HEADERS: &str = "Content-Type, Content-Length, Accept-Encoding, X-CSRF-Token, \
    Authorization, accept, origin, Cache-Control, X-Requested-With, X-Request-ID";
const ALLOW_METHODS: &str = "POST, OPTIONS, GET, PUT, DELETE";

#[derive(Debug, Clone)]
pub struct Cors {
    allow_origin: String,
}

impl Cors {
    pub fn new(allow_origin: impl Into<String>) -> Self {
        Self { allow_origin: allow_origin.into() }
    }

    /// Any origin.
    pub fn permissive() -> Self {
        Self::new("*")
    }

    fn apply(&self, res: &mut Response) {
        res.set_header("access-control-allow-origin", self.allow_origin.as_str());
        // Browsers reject credentials paired with a wildcard origin.
        if self.allow_origin != "*" {
            res.set_header("access-control-allow-credentials", "true");
        }
        res.set_header("access-control-allow-headers", ALLOW_HEADERS);
        res.set_header("access-control-allow-methods", ALLOW_METHODS);
    }
}

impl Default for Cors {
    fn default() -> Self { Self::permissive() }
}

impl Middleware for Cors {
    fn name(&self) -> &'static str {
        "cors"
    }

    fn handle<'a>(&'a self, req: Request, next: Next) -> BoxFuture<'a> {
        Box::pin(async move {
            let mut res = if req.method() == Method::OPTIONS {
                Response::status(StatusCode::NO_CONTENT)
            } else {
                next.run(req).await
            };
            self.apply(&mut res);
            res
        })
    }
}
