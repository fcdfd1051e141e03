//! Layered service configuration.
//!
//! Sources, lowest precedence first:
//!
//! 1. `config/default.toml`, embedded at compile time;
//! 2. `tradegate.toml` in the working directory, if present;
//! 3. the file named by `TRADEGATE_CONFIG`, if set;
//! 4. environment variables `TRADEGATE__<SECTION>__<KEY>`, e.g.
//!    `TRADEGATE__RATE_LIMIT__MAX_REQUESTS=20`.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use serde::Deserialize;

use crate::error::Error;

const DEFAULTS: &str = include_str!("../config/default.toml");

/// Environment prefix for overrides and the config-file path variable.
pub const ENV_PREFIX: &str = "TRADEGATE";

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Request bodies above this many bytes are answered `413`.
    pub max_body_bytes: usize,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, Error> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse().map_err(|source| Error::Address { addr, source })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directives; `RUST_LOG` wins when set.
    pub filter: String,
    pub json: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub max_requests: usize,
    pub window_secs: u64,
    pub max_clients: usize,
    pub sweep_interval_secs: u64,
    /// Key clients by forwarding headers, but only on connections from
    /// `trusted_proxies`.
    pub trust_proxy_headers: bool,
    #[serde(default)]
    pub trusted_proxies: Vec<IpAddr>,
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Peers whose forwarding headers are believed; empty unless
    /// `trust_proxy_headers` is on.
    pub fn trusted_proxies(&self) -> Vec<IpAddr> {
        if self.trust_proxy_headers {
            self.trusted_proxies.clone()
        } else {
            Vec::new()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub token: String,
    pub user_id: String,
    pub username: String,
    /// When non-empty, bearer tokens are HMAC-signed and `token` is ignored.
    #[serde(default)]
    pub signing_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutConfig {
    pub request_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    pub allow_origin: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseTimeConfig {
    pub slow_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompressionConfig {
    pub min_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub rate_limit: RateLimitConfig,
    pub auth: AuthConfig,
    pub timeout: TimeoutConfig,
    pub cors: CorsConfig,
    pub response_time: ResponseTimeConfig,
    pub compression: CompressionConfig,
}

impl AppConfig {
    /// The embedded defaults alone, ignoring files and environment.
    pub fn defaults() -> Result<Self, Error> {
        let cfg = ::config::Config::builder()
            .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
            .build()?;
        Ok(cfg.try_deserialize()?)
    }

    /// Settings that are valid but worth a word in the log. Returned rather
    /// than logged because configuration loads before tracing is installed.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if cfg!(unix) && self.server.port < 1024 {
            warnings.push(format!(
                "using privileged port {}, may require elevated permissions",
                self.server.port
            ));
        }
        if self.cors.allow_origin == "*" {
            warnings.push("cors.allow_origin is \"*\", credentials are not allowed".to_owned());
        }
        warnings
    }
}

/// Loads and validates configuration from every source.
///
/// Call `dotenvy::dotenv()` first if `.env` files should contribute.
pub fn load() -> Result<AppConfig, Error> {
    let mut builder = ::config::Config::builder()
        .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
        .add_source(::config::File::with_name("tradegate").required(false));

    if let Ok(path) = std::env::var(format!("{ENV_PREFIX}_CONFIG")) {
        builder = builder.add_source(::config::File::with_name(&path).required(false));
    }
    builder = builder.add_source(
        ::config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("rate_limit.trusted_proxies"),
    );

    let cfg: AppConfig = builder.build()?.try_deserialize()?;
    validate(&cfg)?;
    Ok(cfg)
}

pub fn validate(cfg: &AppConfig) -> Result<(), Error> {
    fn invalid(msg: &str) -> Result<(), Error> {
        Err(Error::InvalidConfig(msg.to_owned()))
    }

    if cfg.server.port == 0 {
        return invalid("server.port must be > 0");
    }
    if cfg.server.max_body_bytes == 0 {
        return invalid("server.max_body_bytes must be > 0");
    }

    if cfg.rate_limit.max_requests == 0 {
        return invalid("rate_limit.max_requests must be > 0");
    }
    if cfg.rate_limit.window_secs == 0 {
        return invalid("rate_limit.window_secs must be > 0");
    }
    if cfg.rate_limit.max_clients == 0 {
        return invalid("rate_limit.max_clients must be > 0");
    }
    if cfg.rate_limit.sweep_interval_secs == 0 {
        return invalid("rate_limit.sweep_interval_secs must be > 0");
    }

    if cfg.rate_limit.trust_proxy_headers && cfg.rate_limit.trusted_proxies.is_empty() {
        return invalid("rate_limit.trusted_proxies must list the proxies when trust_proxy_headers is on");
    }

    if cfg.auth.signing_secret.is_empty() && cfg.auth.token.is_empty() {
        return invalid("auth.token must be set when auth.signing_secret is empty");
    }
    if cfg.auth.user_id.is_empty() {
        return invalid("auth.user_id must not be empty");
    }

    if cfg.timeout.request_ms == 0 {
        return invalid("timeout.request_ms must be > 0");
    }
    if cfg.cors.allow_origin.is_empty() {
        return invalid("cors.allow_origin must not be empty");
    }
    if cfg.response_time.slow_ms == 0 {
        return invalid("response_time.slow_ms must be > 0");
    }
    Ok(())
}
