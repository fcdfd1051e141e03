//! End-to-end behaviour of the assembled API, driven through `App::call`.

use std::time::Duration;

use http::{Method, StatusCode};
use serde_json::Value;
use tradegate::config::AppConfig;
use tradegate::middleware::{HmacTokenVerifier, Identity};
use tradegate::{api, App, Request, Response};

fn config() -> AppConfig {
    let mut cfg = AppConfig::defaults().unwrap();
    cfg.rate_limit.max_requests = 5;
    cfg
}

fn app_with(cfg: &AppConfig) -> App {
    api::build(cfg).router.into_app()
}

fn app() -> App {
    app_with(&config())
}

fn get(uri: &str) -> Request {
    Request::builder().uri(uri).remote_addr("198.51.100.20:50000".parse().unwrap()).build()
}

fn json(res: &Response) -> Value {
    serde_json::from_slice(res.body()).unwrap()
}

fn profile(auth: Option<&str>) -> Request {
    let mut builder = Request::builder()
        .uri("/api/v1/account/profile")
        .remote_addr("198.51.100.21:50000".parse().unwrap());
    if let Some(value) = auth {
        builder = builder.header("Authorization", value);
    }
    builder.build()
}

#[tokio::test]
async fn health_and_ready() {
    let app = app();

    let res = app.call(get("/health")).await;
    assert_eq!(res.status_code(), StatusCode::OK);
    let body = json(&res);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["message"], "Awesome Trade API is running");
    assert!(body["timestamp"].is_string());

    let res = app.call(get("/ready")).await;
    assert_eq!(json(&res)["status"], "ready");
}

#[tokio::test]
async fn ping_carries_request_id_and_quota_headers() {
    let res = app().call(get("/api/v1/ping")).await;

    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(json(&res)["message"], "pong");
    assert!(res.header("x-request-id").is_some());
    assert_eq!(res.header("x-ratelimit-limit"), Some("5"));
    assert_eq!(res.header("x-ratelimit-remaining"), Some("4"));
}

#[tokio::test]
async fn incoming_request_id_is_echoed() {
    let req = Request::builder().uri("/api/v1/ping").header("X-Request-ID", "trade-42").build();
    let res = app().call(req).await;
    assert_eq!(res.header("x-request-id"), Some("trade-42"));
}

#[tokio::test]
async fn every_response_gets_security_and_cors_headers() {
    let app = app();
    for uri in ["/health", "/api/v1/ping", "/missing"] {
        let res = app.call(get(uri)).await;
        assert_eq!(res.header("x-content-type-options"), Some("nosniff"), "{uri}");
        assert_eq!(res.header("x-frame-options"), Some("DENY"), "{uri}");
        assert_eq!(res.header("access-control-allow-origin"), Some("*"), "{uri}");
        assert_eq!(res.header("access-control-allow-credentials"), None, "{uri}");
        assert!(res.header("x-response-time").is_some(), "{uri}");
    }
}

#[tokio::test]
async fn rate_limit_rejects_request_past_quota() {
    let app = app();
    for _ in 0..5 {
        assert_eq!(app.call(get("/api/v1/ping")).await.status_code(), StatusCode::OK);
    }

    let res = app.call(get("/api/v1/ping")).await;
    assert_eq!(res.status_code(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(res.body(), br#"{"error":"Rate limit exceeded"}"#);
    assert!(res.header("retry-after").is_some());

    // Health checks are outside the limited groups.
    assert_eq!(app.call(get("/health")).await.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn rotating_forwarded_for_does_not_reset_quota() {
    let app = app();
    let spoofed = |i: usize| {
        Request::builder()
            .uri("/api/v1/ping")
            .header("X-Forwarded-For", &format!("10.9.9.{i}"))
            .remote_addr("198.51.100.20:50000".parse().unwrap())
            .build()
    };

    let mut statuses = Vec::new();
    for i in 0..20 {
        statuses.push(app.call(spoofed(i)).await.status_code());
    }
    assert!(statuses[..5].iter().all(|s| *s == StatusCode::OK));
    assert!(statuses[5..].iter().all(|s| *s == StatusCode::TOO_MANY_REQUESTS));
}

#[tokio::test]
async fn quota_follows_forwarded_client_behind_trusted_proxy() {
    let mut cfg = config();
    cfg.rate_limit.trust_proxy_headers = true;
    cfg.rate_limit.trusted_proxies = vec!["10.0.0.5".parse().unwrap()];
    let app = app_with(&cfg);
    let via_proxy = |xff: &str| {
        Request::builder()
            .uri("/api/v1/ping")
            .header("X-Forwarded-For", xff)
            .remote_addr("10.0.0.5:4000".parse().unwrap())
            .build()
    };

    for _ in 0..4 {
        assert_eq!(app.call(via_proxy("203.0.113.1")).await.status_code(), StatusCode::OK);
    }
    // A client-written leading hop does not change who the proxy saw.
    assert_eq!(app.call(via_proxy("6.6.6.6, 203.0.113.1")).await.status_code(), StatusCode::OK);
    assert_eq!(
        app.call(via_proxy("7.7.7.7, 203.0.113.1")).await.status_code(),
        StatusCode::TOO_MANY_REQUESTS
    );
    assert_eq!(app.call(via_proxy("203.0.113.2")).await.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn profile_requires_bearer_token() {
    let app = app();
    let cases = [
        (None, "Authorization header is required"),
        (Some("Token valid-token"), "Invalid authorization header format"),
        (Some("Bearer"), "Invalid authorization header format"),
        (Some("Bearer wrong"), "Invalid token"),
    ];
    for (header, message) in cases {
        let res = app.call(profile(header)).await;
        assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED, "{header:?}");
        assert_eq!(json(&res)["error"], message, "{header:?}");
    }
}

#[tokio::test]
async fn profile_returns_authenticated_identity() {
    let res = app().call(profile(Some("Bearer valid-token"))).await;

    assert_eq!(res.status_code(), StatusCode::OK);
    let body = json(&res);
    assert_eq!(body["user_id"], "123");
    assert_eq!(body["username"], "john_doe");
    assert_eq!(body["message"], "This is a protected endpoint");
}

#[tokio::test]
async fn signed_tokens_replace_static_token() {
    let mut cfg = config();
    cfg.auth.signing_secret = "desk-secret".to_owned();
    let app = app_with(&cfg);

    let token = HmacTokenVerifier::new("desk-secret")
        .issue(&Identity::new("7", "trader"), Duration::from_secs(300))
        .unwrap();
    let res = app.call(profile(Some(&format!("Bearer {token}")))).await;
    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(json(&res)["user_id"], "7");

    let res = app.call(profile(Some("Bearer valid-token"))).await;
    assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unimplemented_endpoints_answer_501() {
    let app = app();
    let req = Request::builder().method(Method::PUT).uri("/api/v1/users/9").build();
    let res = app.call(req).await;
    assert_eq!(res.status_code(), StatusCode::NOT_IMPLEMENTED);
    assert_eq!(json(&res)["error"], "Not Implemented");
}

#[tokio::test]
async fn routing_misses() {
    let app = app();

    let res = app.call(get("/api/v2/ping")).await;
    assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(json(&res)["error"], "Not Found");

    let req = Request::builder().method(Method::DELETE).uri("/api/v1/ping").build();
    let res = app.call(req).await;
    assert_eq!(res.status_code(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(res.header("allow"), Some("GET"));
}

#[tokio::test]
async fn preflight_short_circuits_before_auth() {
    let req = Request::builder().method(Method::OPTIONS).uri("/api/v1/account/profile").build();
    let res = app().call(req).await;

    assert_eq!(res.status_code(), StatusCode::NO_CONTENT);
    assert!(res.header("access-control-allow-methods").is_some());
    assert!(res.header("x-ratelimit-limit").is_none());
}

#[tokio::test]
async fn large_bodies_are_gzipped_on_request() {
    let mut cfg = config();
    cfg.compression.min_size = 16;
    let app = app_with(&cfg);

    let req = Request::builder().uri("/health").header("Accept-Encoding", "gzip").build();
    let res = app.call(req).await;
    assert_eq!(res.header("content-encoding"), Some("gzip"));

    let res = app.call(get("/health")).await;
    assert_eq!(res.header("content-encoding"), None);
    assert_eq!(json(&res)["status"], "ok");
}
