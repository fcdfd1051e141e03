//! # tradegate
//!
//! The HTTP front door of the trading API: a radix-tree router, an ordered
//! middleware chain, and the request policies that guard the API (rate
//! limiting, bearer-token auth, per-request deadlines, panic recovery).
//!
//! ## Request flow
//!
//! ```text
//! hyper ─▶ global chain ─▶ route table ─▶ group chain ─▶ handler
//!          Recover, Trace,     404/405      RateLimit, RequestId,
//!          Cors, ...                        Auth, Timeout
//! ```
//!
//! Each stage either continues with `next.run(req)` or answers on its own;
//! see [`middleware`] for the contract.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use tradegate::middleware::{RateLimit, RateLimiter, Recover};
//! use tradegate::{Group, Json, Request, Router, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tradegate::Error> {
//!     let limiter = Arc::new(RateLimiter::new(100, Duration::from_secs(60), 10_000));
//!
//!     let app = Router::new()
//!         .wrap(Recover::new())
//!         .nest("/api/v1", Group::new().wrap(RateLimit::new(limiter)).get("/quotes/{symbol}", quote));
//!
//!     Server::bind(([0, 0, 0, 0], 8080).into()).serve(app).await
//! }
//!
//! async fn quote(req: Request) -> Json<serde_json::Value> {
//!     let symbol = req.param("symbol").unwrap_or("unknown");
//!     Json(serde_json::json!({ "symbol": symbol, "bid": 1.0841 }))
//! }
//! ```

mod context;
mod error;
mod handler;
mod request;
mod response;
mod router;
mod server;

pub mod api;
pub mod config;
pub mod health;
pub mod middleware;

pub use context::{keys, Context};
pub use error::Error;
pub use handler::{BoxFuture, Handler};
pub use request::{Request, RequestBuilder};
pub use response::{IntoResponse, Json, Response, ResponseBuilder};
pub use router::{App, Group, Router};
pub use server::Server;
