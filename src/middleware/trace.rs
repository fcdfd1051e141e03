//! Access logging.
//!
//! Everything downstream runs inside a `request` span carrying method, path
//! and client address, so events logged by handlers are attributed to the
//! request that caused them. One `info` event per request records status and
//! latency.

use std::net::IpAddr;

use tokio::time::Instant;
use tracing::{info, info_span, Instrument};

use super::{Middleware, Next};
use crate::handler::BoxFuture;
use crate::request::Request;

#[derive(Debug, Clone, Default)]
pub struct Trace {
    trusted_proxies: Vec<IpAddr>,
}

impl Trace {
    /// Forwarding headers name the logged client only when the peer is one
    /// of `trusted_proxies`.
    pub fn new(trusted_proxies: Vec<IpAddr>) -> Self {
        Self { trusted_proxies }
    }
}

impl Middleware for Trace {
    fn name(&self) -> &'static str {
        "trace"
    }

    fn handle<'a>(&'a self, req: Request, next: Next) -> BoxFuture<'a> {
        let client = req.client_ip(&self.trusted_proxies)
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "-".to_owned());
        let user_agent = req.header("user-agent").unwrap_or("-").to_owned();
        let span = info_span!(
            "request",
            method = %req.method(),
            path = %req.path(),
            client = %client,
        );

        Box::pin(
            async move {
                let start = Instant::now();
                let res = next.run(req).await;
                info!(
                    status = res.status_code().as_u16(),
                    latency_us = start.elapsed().as_micros() as u64,
                    user_agent = %user_agent,
                    "request completed"
                );
                res
            }
            .instrument(span),
        )
    }
}
