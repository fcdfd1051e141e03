//! Panic recovery.
//!
//! A panic in a handler or any later stage unwinds through the chain up to
//! this stage, which logs it and answers `500`. The connection task, and with
//! it the server, keeps running. Register it first so that it wraps
//! everything, including the timeout stage's spawned work (which re-raises
//! its panics on the awaiting side).

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use http::StatusCode;
use serde_json::json;
use tracing::error;

use super::{Middleware, Next};
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::Response;

#[derive(Debug, Default, Clone, Copy)]
pub struct Recover;

impl Recover {
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for Recover {
    fn name(&self) -> &'static str {
        "recover"
    }

    fn handle<'a>(&'a self, req: Request, next: Next) -> BoxFuture<'a> {
        let method = req.method().clone();
        let path = req.path().to_owned();
        Box::pin(async move {
            match AssertUnwindSafe(next.run(req)).catch_unwind().await {
                Ok(res) => res,
                Err(panic) => {
                    error!(%method, %path, panic = panic_message(&*panic), "handler panicked");
                    internal_error()
                }
            }
        })
    }
}

fn internal_error() -> Response {
    let body = json!({
        "error": "Internal Server Error",
        "message": "Something went wrong",
    });
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .json(serde_json::to_vec(&body).unwrap_or_default())
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::test_support::{body_json, run_one};

    async fn explode(_req: Request) -> Response {
        panic!("ledger out of balance")
    }

    #[tokio::test]
    async fn panic_becomes_500() {
        let res = run_one(Recover::new(), Request::builder().build(), explode).await;

        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(&res);
        assert_eq!(body["error"], "Internal Server Error");
        assert_eq!(body["message"], "Something went wrong");
    }

    #[tokio::test]
    async fn normal_response_passes_through() {
        let res = run_one(Recover::new(), Request::builder().build(), |_req: Request| async {
            Response::text("fine")
        })
        .await;
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.body(), b"fine");
    }

    #[test]
    fn panic_message_reads_both_payload_kinds() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let borrowed: Box<dyn Any + Send> = Box::new("static");
        let other: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(&*owned), "owned");
        assert_eq!(panic_message(&*borrowed), "static");
        assert_eq!(panic_message(&*other), "<non-string panic payload>");
    }
}
