//! Bearer-token authentication gate.
//!
//! The gate owns the HTTP side (header parsing, `401` answers, writing the
//! identity into the request context). Deciding whether a token is good is
//! delegated to a [`TokenVerifier`], so swapping the static development token
//! for signed tokens, or for a call to an identity service, does not touch
//! the gate.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use http::StatusCode;
use sha2::Sha256;
use tracing::debug;

use super::{Middleware, Next};
use crate::context::keys;
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::Response;

type HmacSha256 = Hmac<Sha256>;

const SCHEME: &str = "Bearer";

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub username: String,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), username: username.into() }
    }
}

/// Why a request was turned away. The `Display` text is what the client sees.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Authorization header is required")]
    MissingHeader,

    #[error("Invalid authorization header format")]
    MalformedHeader,

    #[error("Invalid token")]
    InvalidToken,

    /// Reported to the client as an invalid token; kept apart for logs.
    #[error("Invalid token")]
    Expired,

    /// Raised when minting, never by the gate: `.` separates token fields.
    #[error("identity fields must not contain '.'")]
    UnencodableIdentity,
}

/// Decides whether a bearer token is acceptable and whom it belongs to.
#[async_trait]
pub trait TokenVerifier: Send + Sync + 'static {
    async fn verify(&self, token: &str) -> Result<Identity, AuthError>;
}

// ── Static token ──────────────────────────────────────────────────────────────

/// Accepts exactly one configured token and maps it to a fixed identity.
///
/// Meant for development and smoke tests, not for production traffic.
pub struct StaticTokenVerifier {
    token: String,
    identity: Identity,
}

impl StaticTokenVerifier {
    pub fn new(token: impl Into<String>, identity: Identity) -> Self {
        Self { token: token.into(), identity }
    }
}

#[async_trait]
impl TokenVerifier for StaticTokenVerifier {
    async fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        if constant_time_eq(token.as_bytes(), self.token.as_bytes()) {
            Ok(self.identity.clone())
        } else {
            Err(AuthError::InvalidToken)
        }
    }
}

/// Compares without short-circuiting on the first differing byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |diff, (x, y)| diff | (x ^ y)) == 0
}

// ── Signed token ──────────────────────────────────────────────────────────────

/// Stateless signed tokens: `user_id.username.expires.signature`.
///
/// `expires` is a unix timestamp in seconds and `signature` is the hex
/// HMAC-SHA256 of `user_id.username.expires` under the shared secret.
/// Neither `user_id` nor `username` may contain a `.`.
pub struct HmacTokenVerifier {
    secret: Vec<u8>,
}

impl HmacTokenVerifier {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self { secret: secret.as_ref().to_vec() }
    }

    /// Mints a token for `identity` valid for `ttl` from now.
    pub fn issue(&self, identity: &Identity, ttl: Duration) -> Result<String, AuthError> {
        if identity.user_id.contains('.') || identity.username.contains('.') {
            return Err(AuthError::UnencodableIdentity);
        }
        let expires = unix_now().saturating_add(ttl.as_secs());
        let payload = format!("{}.{}.{}", identity.user_id, identity.username, expires);
        let signature = hex::encode(self.mac(&payload)?.finalize().into_bytes());
        Ok(format!("{payload}.{signature}"))
    }

    fn mac(&self, payload: &str) -> Result<HmacSha256, AuthError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret).map_err(|_| AuthError::InvalidToken)?;
        mac.update(payload.as_bytes());
        Ok(mac)
    }
}

#[async_trait]
impl TokenVerifier for HmacTokenVerifier {
    async fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let (payload, signature) = token.rsplit_once('.').ok_or(AuthError::InvalidToken)?;
        let signature = hex::decode(signature).map_err(|_| AuthError::InvalidToken)?;
        self.mac(payload)?
            .verify_slice(&signature)
            .map_err(|_| AuthError::InvalidToken)?;

        let mut parts = payload.splitn(3, '.');
        let (Some(user_id), Some(username), Some(expires)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(AuthError::InvalidToken);
        };
        let expires: u64 = expires.parse().map_err(|_| AuthError::InvalidToken)?;
        if expires <= unix_now() {
            return Err(AuthError::Expired);
        }
        Ok(Identity::new(user_id, username))
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

// ── Gate ──────────────────────────────────────────────────────────────────────

/// Middleware requiring `Authorization: Bearer <token>`.
///
/// On success `user_id` and `username` are stored in the request context
/// and the chain continues. Every failure answers `401` with
/// `{"error": <reason>}` and stops the chain.
#[derive(Clone)]
pub struct Auth {
    verifier: Arc<dyn TokenVerifier>,
}

impl Auth {
    pub fn new(verifier: impl TokenVerifier) -> Self {
        Self { verifier: Arc::new(verifier) }
    }

    pub fn shared(verifier: Arc<dyn TokenVerifier>) -> Self {
        Self { verifier }
    }

    async fn authenticate(&self, req: &Request) -> Result<Identity, AuthError> {
        let header = req.header("authorization")
            .filter(|v| !v.trim().is_empty())
            .ok_or(AuthError::MissingHeader)?;
        let token = bearer_token(header)?;
        self.verifier.verify(token).await
    }
}

/// Extracts the token from `Bearer <token>`; anything else is malformed.
fn bearer_token(header: &str) -> Result<&str, AuthError> {
    let mut parts = header.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(SCHEME), Some(token), None) => Ok(token),
        _ => Err(AuthError::MalformedHeader),
    }
}

impl Middleware for Auth {
    fn name(&self) -> &'static str {
        "auth"
    }

    fn handle<'a>(&'a self, mut req: Request, next: Next) -> BoxFuture<'a> {
        Box::pin(async move {
            match self.authenticate(&req).await {
                Ok(identity) => {
                    let ctx = req.context_mut();
                    ctx.insert(keys::USER_ID, identity.user_id);
                    ctx.insert(keys::USERNAME, identity.username);
                    next.run(req).await
                }
                Err(err) => {
                    debug!(path = req.path(), reason = ?err, "request rejected by auth gate");
                    let mut res = Response::error(StatusCode::UNAUTHORIZED, err.to_string());
                    res.set_header("www-authenticate", SCHEME);
                    res
                }
            }
        })
    }
}
