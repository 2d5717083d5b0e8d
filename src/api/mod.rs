use crate::security::{AuthenticationManager, RoleHierarchy};
use crate::session::layer::{manage_session, SessionManager};
use anyhow::Result;
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::{net::TcpListener, signal};
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;

pub mod access;
pub mod error;
pub mod handlers;
mod openapi;

pub use openapi::openapi;

use handlers::{auth, health, me};

pub(crate) const REQUEST_ID_HEADER: &str = "x-request-id";

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthenticationManager>,
    pub hierarchy: Arc<RoleHierarchy>,
    pub sessions: SessionManager,
}

impl AppState {
    #[must_use]
    pub fn new(
        auth: AuthenticationManager,
        hierarchy: RoleHierarchy,
        sessions: SessionManager,
    ) -> Self {
        Self {
            auth: Arc::new(auth),
            hierarchy: Arc::new(hierarchy),
            sessions,
        }
    }
}

/// Build the application router with the full filter chain.
///
/// Outermost first: request id, tracing, error rendering, session, access.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/auth/check", get(auth::check))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route(access::LOGOUT_PATH, post(auth::logout_success))
        .route("/me", get(me::me))
        .route("/admin", get(me::admin))
        .route("/health", get(health::health).options(health::health))
        .fallback(handlers::not_found)
        .layer(middleware::from_fn(access::require_authentication))
        .layer(middleware::from_fn_with_state(
            state.sessions.clone(),
            manage_session,
        ))
        .layer(middleware::from_fn(error::render_errors))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static(REQUEST_ID_HEADER),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    REQUEST_ID_HEADER,
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span)),
        )
        .with_state(state)
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, state: AppState) -> Result<()> {
    info!(
        "Session store: {}, role hierarchy: {}",
        state.sessions.store().name(),
        state.hierarchy
    );

    let app = router(state);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Gracefully shutdown");
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
