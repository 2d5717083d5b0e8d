//! Request-level access control.
//!
//! Runs after the session layer and before routing. `OPTIONS`, everything
//! under `/auth` and `POST /logout` pass through; any other request needs an
//! authenticated security context in its session, otherwise it is answered
//! with an empty `401`.

use super::error::ApiError;
use crate::security::{Authentication, Role, RoleHierarchy, SecurityContext, SECURITY_CONTEXT_ATTR};
use crate::session::{Session, SessionError};
use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request},
    http::{request::Parts, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

const PERMIT_ALL_PREFIX: &str = "/auth";
pub const LOGOUT_PATH: &str = "/logout";

#[must_use]
pub fn is_permitted(method: &Method, path: &str) -> bool {
    if method == Method::OPTIONS {
        return true;
    }

    let under_auth = path
        .strip_prefix(PERMIT_ALL_PREFIX)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'));

    under_auth || (method == Method::POST && path == LOGOUT_PATH)
}

/// Authentication stored in the session's security context, if any.
///
/// # Errors
/// Returns an error if the stored context cannot be decoded.
pub async fn current_authentication(
    session: &Session,
) -> Result<Option<Authentication>, SessionError> {
    Ok(session
        .get::<SecurityContext>(SECURITY_CONTEXT_ATTR)
        .await?
        .and_then(|context| context.authentication))
}

pub async fn require_authentication(
    session: Session,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if is_permitted(request.method(), request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let Some(authentication) = current_authentication(&session).await? else {
        debug!(
            "unauthenticated {} {}",
            request.method(),
            request.uri().path()
        );
        return Ok(StatusCode::UNAUTHORIZED.into_response());
    };

    request.extensions_mut().insert(authentication);
    Ok(next.run(request).await)
}

/// # Errors
/// Returns [`ApiError::Forbidden`] unless `authentication` holds `role`,
/// directly or through the hierarchy.
pub fn require_role(
    hierarchy: &RoleHierarchy,
    authentication: &Authentication,
    role: Role,
) -> Result<(), ApiError> {
    if authentication.has_role(hierarchy, role) {
        Ok(())
    } else {
        debug!("{} lacks {role}", authentication.principal);
        Err(ApiError::Forbidden)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Authentication
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or(StatusCode::UNAUTHORIZED)
    }
}
