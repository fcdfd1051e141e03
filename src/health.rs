//! Built-in Kubernetes health-check handlers.
//!
//! | Probe | Path | Question |
//! |---|---|---|
//! | **Liveness** | `/health` | Is the process alive? Failure → restart. |
//! | **Readiness** | `/ready` | Can the pod serve traffic? Failure → pulled from load-balancer. |
//!
//! ```rust
//! use tradegate::{health, Router};
//!
//! let app = Router::new()
//!     .get("/health", health::liveness)
//!     .get("/ready", health::readiness);
//! # let _ = app;
//! ```

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::response::Json;
use crate::Request;

#[derive(Debug, Serialize)]
pub struct Liveness {
    pub status: &'static str,
    pub message: &'static str,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct Readiness {
    pub status: &'static str,
}

/// Liveness probe. Always `200 OK`; the body carries the current UTC time in
/// RFC 3339 so a stale cache in front of the service is easy to spot.
pub async fn liveness(_req: Request) -> Json<Liveness> {
    Json(Liveness {
        status: "ok",
        message: "Awesome Trade API is running",
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    })
}

/// Readiness probe. The service has no downstream dependencies to gate on.
pub async fn readiness(_req: Request) -> Json<Readiness> {
    Json(Readiness { status: "ready" })
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;

    use super::*;
    use crate::response::IntoResponse;

    #[tokio::test]
    async fn liveness_reports_rfc3339_timestamp() {
        let res = liveness(Request::builder().build()).await.into_response();
        let body: serde_json::Value = serde_json::from_slice(res.body()).unwrap();

        assert_eq!(body["status"], "ok");
        assert_eq!(body["message"], "Awesome Trade API is running");
        let ts = body["timestamp"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(ts).is_ok(), "{ts}");
    }

    #[tokio::test]
    async fn readiness_is_ready() {
        let res = readiness(Request::builder().build()).await.into_response();
        assert_eq!(res.body(), br#"{"status":"ready"}"#);
    }
}
