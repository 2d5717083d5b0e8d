//! Session login, logout and status.
//!
//! The security context lives in the session under
//! [`SECURITY_CONTEXT_ATTR`]; these handlers are the only writers.

use crate::api::{access::current_authentication, error::ApiError, AppState};
use crate::security::{SecurityContext, SECURITY_CONTEXT_ATTR};
use crate::session::Session;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use secrecy::SecretString;
use serde::Deserialize;
use tracing::{debug, info, instrument};
use utoipa::ToSchema;

const MESSAGE_OK: &str = "ok";
const MESSAGE_NO_AUTHENTICATION_FOUND: &str = "No Authentication Found";

#[derive(ToSchema, Deserialize)]
pub struct Credential {
    id: String,
    password: String,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("password", &"***")
            .finish()
    }
}

#[utoipa::path(
    get,
    path = "/auth/check",
    responses(
        (status = 200, description = "Session is authenticated", body = String),
        (status = 401, description = "No authentication in session", body = String)
    ),
    tag = "auth"
)]
pub async fn check(session: Session) -> Result<(StatusCode, &'static str), ApiError> {
    if current_authentication(&session).await?.is_some() {
        Ok((StatusCode::OK, MESSAGE_OK))
    } else {
        Ok((StatusCode::UNAUTHORIZED, MESSAGE_NO_AUTHENTICATION_FOUND))
    }
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = Credential,
    responses(
        (status = 200, description = "Authenticated, session established", body = String),
        (status = 400, description = "Malformed request body"),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    payload: Result<Json<Credential>, JsonRejection>,
) -> Result<(StatusCode, &'static str), ApiError> {
    let Json(credential) =
        payload.map_err(|rejection| ApiError::Rejected(rejection.status(), rejection.body_text()))?;

    let authentication = state
        .auth
        .authenticate(&credential.id, SecretString::from(credential.password))
        .await?;

    let mut context = session
        .get::<SecurityContext>(SECURITY_CONTEXT_ATTR)
        .await?
        .unwrap_or_default();

    info!(principal = %authentication.principal, "login succeeded");
    context.authentication = Some(authentication);
    session.insert(SECURITY_CONTEXT_ATTR, &context).await?;

    Ok((StatusCode::OK, MESSAGE_OK))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Authentication removed from session", body = String)
    ),
    tag = "auth"
)]
pub async fn logout(session: Session) -> (StatusCode, &'static str) {
    clear_security_context(&session).await;
    (StatusCode::OK, MESSAGE_OK)
}

/// `POST /logout`: same effect as [`logout`], answered with an empty body.
#[utoipa::path(
    post,
    path = "/logout",
    responses(
        (status = 200, description = "Authentication removed from session")
    ),
    tag = "auth"
)]
pub async fn logout_success(session: Session) -> StatusCode {
    clear_security_context(&session).await;
    StatusCode::OK
}

async fn clear_security_context(session: &Session) {
    if session.remove(SECURITY_CONTEXT_ATTR).await {
        debug!("security context removed from session");
    }
}
