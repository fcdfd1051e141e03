//! Endpoint handlers for `/api/v1`.

use http::StatusCode;
use serde::Serialize;

use crate::context::keys;
use crate::response::{Json, Response};
use crate::Request;

#[derive(Debug, Serialize)]
pub struct Pong {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct Profile {
    pub user_id: String,
    pub username: String,
    pub message: &'static str,
}

pub async fn ping(_req: Request) -> Json<Pong> {
    Json(Pong { message: "pong" })
}

/// The caller's identity as established by the auth gate.
pub async fn profile(req: Request) -> Json<Profile> {
    let ctx = req.context();
    Json(Profile {
        user_id: ctx.get(keys::USER_ID).unwrap_or_default().to_owned(),
        username: ctx.get(keys::USERNAME).unwrap_or_default().to_owned(),
        message: "This is a protected endpoint",
    })
}

/// Placeholder for user and session endpoints that have no backing store yet.
pub async fn not_implemented(_req: Request) -> Response {
    Response::error(StatusCode::NOT_IMPLEMENTED, "Not Implemented")
}
