//! Hardening headers applied to every response.
//!
//! Values a handler has already set are left alone, so an endpoint that needs
//! a looser CSP can still send one.

use super::{Middleware, Next};
use crate::handler::BoxFuture;
use crate::request::Request;

const HEADERS: [(&str, &str); 6] = [
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "DENY"),
    ("x-xss-protection", "1; mode=block"),
    ("strict-transport-security", "max-age=31536000; includeSubDomains"),
    ("content-security-policy", "default-src 'self'"),
    ("referrer-policy", "strict-origin-when-cross-origin"),
];

#[derive(Debug, Default, Clone, Copy)]
pub struct SecurityHeaders;

impl SecurityHeaders {
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for SecurityHeaders {
    fn name(&self) -> &'static str {
        "security_headers"
    }

    fn handle<'a>(&'a self, req: Request, next: Next) -> BoxFuture<'a> {
        Box::pin(async move {
            let mut res = next.run(req).await;
            for (name, value) in HEADERS {
                res.set_header_if_absent(name, value);
            }
            res
        })
    }
}
