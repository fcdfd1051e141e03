use anyhow::Context as _;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tradegate::config::{self, LoggingConfig};
use tradegate::{api, Server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();

    let cfg = config::load().context("loading configuration")?;
    init_tracing(&cfg.logging);
    for warning in cfg.warnings() {
        warn!("{warning}");
    }

    let addr = cfg.server.socket_addr()?;
    let api = api::build(&cfg);
    let sweeper = api.limiter.spawn_sweeper(cfg.rate_limit.sweep_interval());

    info!(
        max_requests = cfg.rate_limit.max_requests,
        window_secs = cfg.rate_limit.window_secs,
        request_timeout_ms = cfg.timeout.request_ms,
        signed_tokens = !cfg.auth.signing_secret.is_empty(),
        "starting tradegate"
    );

    let result = Server::bind(addr)
        .max_body(cfg.server.max_body_bytes)
        .serve(api.router).await;
    sweeper.abort();
    result?;
    Ok(())
}

/// `RUST_LOG` overrides the configured filter.
fn init_tracing(logging: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.filter));

    if logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
