use crate::api::{access::require_role, error::ApiError, AppState};
use crate::security::{Authentication, Role};
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Me {
    pub username: String,
    /// Every authority held, including those implied by the role hierarchy.
    pub roles: Vec<String>,
}

#[utoipa::path(
    get,
    path = "/me",
    responses(
        (status = 200, description = "Current principal", body = Me),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Missing ROLE_USER")
    ),
    tag = "me"
)]
pub async fn me(
    State(state): State<AppState>,
    authentication: Authentication,
) -> Result<Json<Me>, ApiError> {
    require_role(&state.hierarchy, &authentication, Role::User)?;

    let roles = state
        .hierarchy
        .reachable_roles(&authentication.authorities)
        .into_iter()
        .map(String::from)
        .collect();

    Ok(Json(Me {
        username: authentication.principal,
        roles,
    }))
}

#[utoipa::path(
    get,
    path = "/admin",
    responses(
        (status = 200, description = "Caller holds ROLE_ADMIN", body = String),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Missing ROLE_ADMIN")
    ),
    tag = "me"
)]
pub async fn admin(
    State(state): State<AppState>,
    authentication: Authentication,
) -> Result<&'static str, ApiError> {
    require_role(&state.hierarchy, &authentication, Role::Admin)?;
    Ok("ok")
}
