//! Sliding-window rate limiting.
//!
//! Each client gets a deque of the instants at which it was admitted. On
//! every request the deque is pruned of entries at least `window` old (an
//! entry exactly `window` old has expired), then the request is admitted only
//! if fewer than `max_requests` entries remain.
//!
//! The prune-check-append sequence runs under one mutex, so simultaneous
//! requests from the same client cannot both see the last free slot.
//!
//! The client map is an LRU with a fixed capacity: when a new client arrives
//! at capacity the least recently seen one is forgotten. [`RateLimiter::sweep`]
//! additionally drops clients whose window has emptied; the server binary runs
//! it periodically via [`RateLimiter::spawn_sweeper`].

use std::collections::VecDeque;
use std::net::IpAddr;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;
use lru::LruCache;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{Middleware, Next};
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::Response;

/// Rate limit header names.
pub mod headers {
    pub const LIMIT: &str = "x-ratelimit-limit";
    pub const REMAINING: &str = "x-ratelimit-remaining";
    pub const RETRY_AFTER: &str = "retry-after";
}

/// Key used for requests that carry no usable client address.
const UNKNOWN_CLIENT: &str = "unknown";

/// Outcome of [`RateLimiter::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Admitted and recorded; `remaining` more fit in the current window.
    Allowed { remaining: usize },
    /// Rejected; the oldest recorded request leaves the window after `retry_after`.
    Limited { retry_after: Duration },
}

/// Shared per-client sliding-window store.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    clients: Mutex<LruCache<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    /// `max_requests` per trailing `window`, tracking at most `max_clients`
    /// clients at once. Zero values are clamped to one.
    pub fn new(max_requests: usize, window: Duration, max_clients: usize) -> Self {
        let capacity = NonZeroUsize::new(max_clients).unwrap_or(NonZeroUsize::MIN);
        Self {
            max_requests: max_requests.max(1),
            window,
            clients: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Admits or rejects one request from `client`, recording it if admitted.
    pub async fn check(&self, client: &str) -> Decision {
        let mut clients = self.clients.lock().await;
        // Read under the lock so each client's stamps stay in order.
        let now = Instant::now();
        let stamps = clients.get_or_insert_mut(client.to_owned(), VecDeque::new);

        while let Some(&oldest) = stamps.front() {
            if now.saturating_duration_since(oldest) < self.window {
                break;
            }
            stamps.pop_front();
        }

        if stamps.len() >= self.max_requests {
            let oldest = stamps.front().copied().unwrap_or(now);
            let retry_after = self.window.saturating_sub(now.saturating_duration_since(oldest));
            return Decision::Limited { retry_after };
        }

        stamps.push_back(now);
        Decision::Allowed { remaining: self.max_requests - stamps.len() }
    }

    /// Drops every client whose window no longer holds any request.
    /// Returns how many were removed.
    pub async fn sweep(&self) -> usize {
        let mut clients = self.clients.lock().await;
        let now = Instant::now();
        let idle: Vec<String> = clients.iter()
            .filter(|(_, stamps)| {
                stamps.back().is_none_or(|&t| now.saturating_duration_since(t) >= self.window)
            })
            .map(|(key, _)| key.clone())
            .collect();
        for key in &idle {
            clients.pop(key);
        }
        idle.len()
    }

    /// Number of clients currently tracked.
    pub async fn tracked_clients(&self) -> usize {
        self.clients.lock().await.len()
    }

    /// Runs [`sweep`](Self::sweep) every `every` until the handle is aborted.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let removed = limiter.sweep().await;
                if removed > 0 {
                    debug!(removed, "rate limiter swept idle clients");
                }
            }
        })
    }
}

/// How the client key is derived from a request.
#[derive(Debug, Clone, Default)]
pub enum ClientKey {
    /// Socket peer address only.
    #[default]
    RemoteAddr,
    /// Forwarding headers, honoured only when the peer is one of these
    /// proxies. See [`Request::client_ip`].
    Forwarded(Vec<IpAddr>),
    /// Value of the named header, e.g. an API key.
    Header(String),
}

impl ClientKey {
    fn extract(&self, req: &Request) -> String {
        let key = match self {
            Self::RemoteAddr => req.client_ip(&[]).map(|ip| ip.to_string()),
            Self::Forwarded(proxies) => req.client_ip(proxies).map(|ip| ip.to_string()),
            Self::Header(name) => req.header(name).map(str::to_owned),
        };
        key.unwrap_or_else(|| UNKNOWN_CLIENT.to_owned())
    }
}

/// Middleware enforcing a [`RateLimiter`].
///
/// Rejected requests get `429` with `{"error":"Rate limit exceeded"}` and a
/// `retry-after` header; the rest of the chain does not run. Admitted
/// requests get `x-ratelimit-limit` / `x-ratelimit-remaining` on the way out.
#[derive(Debug, Clone)]
pub struct RateLimit {
    limiter: Arc<RateLimiter>,
    key: ClientKey,
}

impl RateLimit {
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self { limiter, key: ClientKey::default() }
    }

    pub fn key(mut self, key: ClientKey) -> Self {
        self.key = key;
        self
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }
}

impl Middleware for RateLimit {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    fn handle<'a>(&'a self, req: Request, next: Next) -> BoxFuture<'a> {
        Box::pin(async move {
            let client = self.key.extract(&req);
            let limit = self.limiter.max_requests().to_string();

            match self.limiter.check(&client).await {
                Decision::Allowed { remaining } => {
                    let mut res = next.run(req).await;
                    res.set_header(headers::LIMIT, limit);
                    res.set_header(headers::REMAINING, remaining.to_string());
                    res
                }
                Decision::Limited { retry_after } => {
                    warn!(%client, limit = self.limiter.max_requests(), "rate limit exceeded");
                    let mut res = Response::error(StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded");
                    res.set_header(headers::LIMIT, limit);
                    res.set_header(headers::REMAINING, "0");
                    res.set_header(headers::RETRY_AFTER, retry_seconds(retry_after).to_string());
                    res
                }
            }
        })
    }
}

/// Whole seconds, rounded up, never zero.
fn retry_seconds(after: Duration) -> u64 {
    let secs = after.as_secs() + u64::from(after.subsec_nanos() > 0);
    secs.max(1)
}
