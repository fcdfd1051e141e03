//! The trading API's HTTP surface.
//!
//! ```text
//! GET  /health                     liveness
//! GET  /ready                      readiness
//! /api/v1                          rate limit, request id
//!   GET  /ping
//!   GET|POST /users, GET|PUT|DELETE /users/{id}
//!   POST /auth/login | /auth/register | /auth/logout
//! /api/v1/account                  rate limit, request id, auth, timeout
//!   GET  /profile
//! ```
//!
//! Both API groups draw from one [`RateLimiter`], so a client's quota covers
//! the whole `/api/v1` tree.

mod handlers;

use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::health;
use crate::middleware::{
    Auth, BoxedMiddleware, ClientKey, Compression, Cors, HmacTokenVerifier, Identity, RateLimit,
    RateLimiter, Recover, RequestId, ResponseTime, SecurityHeaders, StaticTokenVerifier, Timeout,
    TokenVerifier, Trace,
};
use crate::router::{Group, Router};

pub use handlers::{not_implemented, ping, profile, Pong, Profile};

/// The assembled router plus the limiter whose sweeper the caller runs.
pub struct Api {
    pub router: Router,
    pub limiter: Arc<RateLimiter>,
}

/// Wires routes and middleware from configuration.
pub fn build(cfg: &AppConfig) -> Api {
    let trusted = cfg.rate_limit.trusted_proxies();

    let limiter = Arc::new(RateLimiter::new(
        cfg.rate_limit.max_requests,
        cfg.rate_limit.window(),
        cfg.rate_limit.max_clients,
    ));
    let key = if trusted.is_empty() {
        ClientKey::RemoteAddr
    } else {
        ClientKey::Forwarded(trusted.clone())
    };
    let rate_limit: BoxedMiddleware = Arc::new(RateLimit::new(Arc::clone(&limiter)).key(key));

    let v1 = Group::new()
        .wrap_shared(Arc::clone(&rate_limit))
        .wrap(RequestId::new())
        .get("/ping", ping)
        .get("/users", not_implemented)
        .post("/users", not_implemented)
        .get("/users/{id}", not_implemented)
        .put("/users/{id}", not_implemented)
        .delete("/users/{id}", not_implemented)
        .post("/auth/login", not_implemented)
        .post("/auth/register", not_implemented)
        .post("/auth/logout", not_implemented);

    let account = Group::new()
        .wrap_shared(rate_limit)
        .wrap(RequestId::new())
        .wrap(Auth::shared(verifier(cfg)))
        .wrap(Timeout::new(Duration::from_millis(cfg.timeout.request_ms)))
        .get("/profile", profile);

    let router = Router::new()
        .wrap(Recover::new())
        .wrap(Trace::new(trusted))
        .wrap(Cors::new(cfg.cors.allow_origin.as_str()))
        .wrap(SecurityHeaders::new())
        .wrap(ResponseTime::new(Duration::from_millis(cfg.response_time.slow_ms)))
        .wrap(Compression::new(cfg.compression.min_size))
        .get("/health", health::liveness)
        .get("/ready", health::readiness)
        .nest("/api/v1", v1)
        .nest("/api/v1/account", account);

    Api { router, limiter }
}

/// Signed tokens when a secret is configured, otherwise the single static
/// development token.
fn verifier(cfg: &AppConfig) -> Arc<dyn TokenVerifier> {
    let auth = &cfg.auth;
    if auth.signing_secret.is_empty() {
        Arc::new(StaticTokenVerifier::new(
            auth.token.as_str(),
            Identity::new(auth.user_id.as_str(), auth.username.as_str()),
        ))
    } else {
        Arc::new(HmacTokenVerifier::new(auth.signing_secret.as_bytes()))
    }
}
