use crate::api::AppState;
use crate::GIT_COMMIT_HASH;
use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info_span, Instrument};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Health {
    commit: String,
    name: String,
    version: String,
    session_store: String,
}

#[utoipa::path(
    get,
    path= "/health",
    responses (
        (status = 200, description = "Session store is reachable", body = [Health]),
        (status = 401, description = "Not authenticated"),
        (status = 503, description = "Session store is unreachable", body = [Health])
    ),
    tag= "health"
)]
// axum handler for health, OPTIONS answers without a body
pub async fn health(method: Method, State(state): State<AppState>) -> impl IntoResponse {
    let store = state.sessions.store();
    let ping_span = info_span!("session_store.ping", store = store.name());
    let result = store.ping().instrument(ping_span).await;

    if let Err(err) = &result {
        error!("Failed to ping session store: {}", err);
    }

    let health = Health {
        commit: GIT_COMMIT_HASH.to_string(),
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        session_store: if result.is_ok() {
            format!("{}:ok", store.name())
        } else {
            format!("{}:error", store.name())
        },
    };

    let body = if method == Method::GET {
        Json(&health).into_response()
    } else {
        Body::empty().into_response()
    };

    let short_hash = if health.commit.len() > 7 {
        &health.commit[0..7]
    } else {
        ""
    };

    let headers = format!("{}:{}:{}", health.name, health.version, short_hash)
        .parse::<HeaderValue>()
        .map(|x_app_header_value| {
            debug!("X-App header: {:?}", x_app_header_value);

            let mut headers = HeaderMap::new();

            headers.insert("X-App", x_app_header_value);

            headers
        })
        .map_err(|err| {
            error!("Failed to parse X-App header: {}", err);
        });

    // empty headers if the value could not be built
    let headers = headers.unwrap_or_else(|()| HeaderMap::new());

    if result.is_ok() {
        (StatusCode::OK, headers, body)
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, headers, body)
    }
}
