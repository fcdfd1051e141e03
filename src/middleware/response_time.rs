//! `X-Response-Time` header and slow-request warnings.

use std::time::Duration;

use tokio::time::Instant;
use tracing::warn;

use super::{Middleware, Next};
use crate::handler::BoxFuture;
use crate::request::Request;

pub const HEADER: &str = "x-response-time";

#[derive(Debug, Clone, Copy)]
pub struct ResponseTime {
    slow: Duration,
}

impl ResponseTime {
    /// Requests slower than `slow` are logged at `warn`.
    pub fn new(slow: Duration) -> Self {
        Self { slow }
    }
}

impl Default for ResponseTime {
    fn default() -> Self { Self::new(Duration::from_secs(1)) }
}

impl Middleware for ResponseTime {
    fn name(&self) -> &'static str {
        "response_time"
    }

    fn handle<'a>(&'a self, req: Request, next: Next) -> BoxFuture<'a> {
        let method = req.method().clone();
        let path = req.path().to_owned();
        Box::pin(async move {
            let start = Instant::now();
            let mut res = next.run(req).await;
            let elapsed = start.elapsed();

            res.set_header(HEADER, format!("{elapsed:?}"));
            if elapsed > self.slow {
                warn!(%method, %path, elapsed_ms = elapsed.as_millis() as u64, "slow request");
            }
            res
        })
    }
}
