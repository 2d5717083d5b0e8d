//! Route handlers.

pub mod auth;
pub mod health;
pub mod me;

use axum::http::StatusCode;

pub async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}
