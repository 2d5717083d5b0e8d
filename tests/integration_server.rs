#![allow(clippy::unwrap_used, clippy::expect_used)]

use axum::{
    body::{to_bytes, Body},
    http::{
        header::{CONTENT_TYPE, COOKIE, SET_COOKIE},
        Method, Request, Response, StatusCode,
    },
    Router,
};
use async_trait::async_trait;
use portier::{
    api::{self, AppState},
    security::{AuthenticationManager, PasswordEncoder, RoleHierarchy, UserStore, DEFAULT_ROLE_HIERARCHY},
    session::{
        layer::SessionManager, MemoryStore, SessionConfig, SessionError, SessionId, SessionRecord,
        SessionStore,
    },
};
use serde_json::{json, Value};
use std::{sync::Arc, time::Duration};
use tower::ServiceExt;

struct TestApp {
    router: Router,
    store: MemoryStore,
}

fn router_with_store(store: Arc<dyn SessionStore>, config: SessionConfig) -> Router {
    let encoder = PasswordEncoder::with_params(8, 1, 1).expect("argon2 params");
    let users = UserStore::with_sample_users(&encoder).expect("sample users");
    let auth = AuthenticationManager::new(users, encoder).expect("authentication manager");
    let hierarchy = RoleHierarchy::parse(DEFAULT_ROLE_HIERARCHY).expect("role hierarchy");

    let sessions = SessionManager::new(store, config);
    api::router(AppState::new(auth, hierarchy, sessions))
}

fn app_with_config(config: SessionConfig) -> TestApp {
    let store = MemoryStore::new();
    TestApp {
        router: router_with_store(Arc::new(store.clone()), config),
        store,
    }
}

/// Store whose backend is always down.
struct UnavailableStore;

#[async_trait]
impl SessionStore for UnavailableStore {
    async fn load(&self, _id: &SessionId) -> Result<Option<SessionRecord>, SessionError> {
        Err(SessionError::Unavailable("down".to_string()))
    }

    async fn save(&self, _record: &SessionRecord, _ttl: Duration) -> Result<(), SessionError> {
        Err(SessionError::Unavailable("down".to_string()))
    }

    async fn touch(&self, _id: &SessionId, _ttl: Duration) -> Result<(), SessionError> {
        Err(SessionError::Unavailable("down".to_string()))
    }

    async fn ping(&self) -> Result<(), SessionError> {
        Err(SessionError::Unavailable("down".to_string()))
    }

    fn name(&self) -> &'static str {
        "unavailable"
    }
}

async fn assert_internal_error(response: Response<Body>, path: &str) {
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR, "{path}");
    assert!(response.headers().get(SET_COOKIE).is_none());
    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["status"], 500);
    assert_eq!(body["error"], "Internal Server Error");
    assert_eq!(body["path"], path);
    assert!(body["message"]
        .as_str()
        .is_some_and(|message| message.starts_with("session store unavailable")));
}

fn app() -> TestApp {
    app_with_config(SessionConfig::new())
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn get(&self, path: &str, cookie: Option<&str>) -> Response<Body> {
        self.send(request(Method::GET, path, cookie, Body::empty()))
            .await
    }

    async fn post(&self, path: &str, cookie: Option<&str>) -> Response<Body> {
        self.send(request(Method::POST, path, cookie, Body::empty()))
            .await
    }

    async fn login(&self, id: &str, password: &str, cookie: Option<&str>) -> Response<Body> {
        let body = json!({ "id": id, "password": password }).to_string();
        let mut req = request(Method::POST, "/auth/login", cookie, Body::from(body));
        req.headers_mut()
            .insert(CONTENT_TYPE, "application/json".parse().unwrap());
        self.send(req).await
    }

    /// Log in and return the `name=value` pair to send back as `Cookie`.
    async fn login_cookie(&self, id: &str, password: &str) -> String {
        let response = self.login(id, password, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        session_cookie(&response).expect("login should set the session cookie")
    }
}

fn request(method: Method, path: &str, cookie: Option<&str>, body: Body) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    builder.body(body).unwrap()
}

fn session_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(str::to_string)
}

async fn body_string(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn protected_routes_require_authentication() {
    let app = app();

    for path in ["/me", "/admin", "/health", "/does-not-exist"] {
        let response = app.get(path, None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{path}");
        assert!(response.headers().get(SET_COOKIE).is_none());
        assert_eq!(body_string(response).await, "", "{path}");
    }
}

#[tokio::test]
async fn check_without_session_is_unauthorized() {
    let app = app();

    let response = app.get("/auth/check", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().get(SET_COOKIE).is_none());
    assert_eq!(body_string(response).await, "No Authentication Found");
    assert!(app.store.is_empty().await);
}

#[tokio::test]
async fn login_then_check_succeeds() {
    let app = app();

    let response = app.login("user", "user", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = session_cookie(&response).unwrap();
    assert!(cookie.starts_with("SESSION="));
    let set_cookie = response
        .headers()
        .get(SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .unwrap()
        .to_string();
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("Path=/"));
    assert_eq!(body_string(response).await, "ok");
    assert_eq!(app.store.len().await, 1);

    let response = app.get("/auth/check", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    // existing session, no new cookie
    assert!(response.headers().get(SET_COOKIE).is_none());
    assert_eq!(body_string(response).await, "ok");
}

#[tokio::test]
async fn logout_clears_authentication() {
    let app = app();
    let cookie = app.login_cookie("admin", "admin").await;

    let response = app.post("/auth/logout", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "ok");

    let response = app.get("/auth/check", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.get("/me", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_without_session_is_ok() {
    let app = app();

    let response = app.post("/auth/logout", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(SET_COOKIE).is_none());
    assert_eq!(body_string(response).await, "ok");
}

#[tokio::test]
async fn bad_credentials_are_rejected() {
    let app = app();

    for (id, password) in [("user", "wrong"), ("nobody", "nobody"), ("", "")] {
        let response = app.login(id, password, None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{id}");
        assert!(response.headers().get(SET_COOKIE).is_none());

        let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["status"], 401);
        assert_eq!(body["error"], "Unauthorized");
        assert_eq!(body["message"], "Invalid Credentials");
        assert_eq!(body["path"], "/auth/login");
        assert!(body["timestamp"].is_string());
        assert!(body["requestId"].is_string());
    }

    assert!(app.store.is_empty().await);
}

#[tokio::test]
async fn failed_login_keeps_previous_authentication() {
    let app = app();
    let cookie = app.login_cookie("user", "user").await;

    let response = app.login("user", "wrong", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.get("/auth/check", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn relogin_replaces_principal() {
    let app = app();
    let cookie = app.login_cookie("user", "user").await;

    let response = app.login("admin", "admin", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    // same session, so no new cookie
    assert!(response.headers().get(SET_COOKIE).is_none());

    let response = app.get("/admin", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn malformed_login_body_is_client_error() {
    let app = app();

    let mut req = request(
        Method::POST,
        "/auth/login",
        None,
        Body::from("{not json"),
    );
    req.headers_mut()
        .insert(CONTENT_TYPE, "application/json".parse().unwrap());
    let response = app.send(req).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.headers().get(SET_COOKIE).is_none());

    let req = request(
        Method::POST,
        "/auth/login",
        None,
        Body::from(r#"{"id":"user","password":"user"}"#),
    );
    let response = app.send(req).await;
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let mut req = request(Method::POST, "/auth/login", None, Body::from(r#"{"id":"user"}"#));
    req.headers_mut()
        .insert(CONTENT_TYPE, "application/json".parse().unwrap());
    let response = app.send(req).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn options_and_auth_paths_bypass_the_gate() {
    let app = app();

    let response = app
        .send(request(Method::OPTIONS, "/me", None, Body::empty()))
        .await;
    assert_ne!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .send(request(Method::OPTIONS, "/health", None, Body::empty()))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("X-App").is_some());
    assert_eq!(body_string(response).await, "");

    // unknown routes under /auth are routed, not gated
    let response = app.get("/auth/unknown", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn me_reports_reachable_roles() {
    let app = app();

    let cookie = app.login_cookie("admin", "admin").await;
    let response = app.get("/me", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["username"], "admin");
    assert_eq!(body["roles"], json!(["ROLE_ADMIN", "ROLE_USER"]));

    let cookie = app.login_cookie("user", "user").await;
    let response = app.get("/me", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["username"], "user");
    assert_eq!(body["roles"], json!(["ROLE_USER"]));
}

#[tokio::test]
async fn admin_route_follows_role_hierarchy() {
    let app = app();

    let cookie = app.login_cookie("admin", "admin").await;
    let response = app.get("/admin", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = app.login_cookie("user", "user").await;
    let response = app.get("/admin", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_string(response).await, "");
}

#[tokio::test]
async fn public_logout_endpoint() {
    let app = app();

    let response = app.post("/logout", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "");

    let cookie = app.login_cookie("user", "user").await;
    let response = app.post("/logout", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.get("/auth/check", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // only POST is public
    let response = app.get("/logout", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_reports_session_store() {
    let app = app();
    let cookie = app.login_cookie("user", "user").await;

    let response = app.get("/health", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("X-App").is_some());
    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["name"], "portier");
    assert_eq!(body["session_store"], "memory:ok");
}

#[tokio::test]
async fn unknown_session_cookie_is_ignored() {
    let app = app();

    let forged = "SESSION=AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
    let response = app.get("/auth/check", Some(forged)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.get("/me", Some("SESSION=garbage")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn request_id_is_propagated() {
    let app = app();

    let response = app.get("/auth/check", None).await;
    assert!(response.headers().get("x-request-id").is_some());

    let mut req = request(Method::GET, "/auth/check", None, Body::empty());
    req.headers_mut()
        .insert("x-request-id", "client-supplied".parse().unwrap());
    let response = app.send(req).await;
    assert_eq!(
        response
            .headers()
            .get("x-request-id")
            .and_then(|value| value.to_str().ok()),
        Some("client-supplied")
    );
}

#[tokio::test]
async fn custom_cookie_settings() {
    let app = app_with_config(
        SessionConfig::new()
            .with_cookie_name("PORTIER".to_string())
            .with_cookie_secure(true),
    );

    let response = app.login("user", "user", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let set_cookie = response
        .headers()
        .get(SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .unwrap()
        .to_string();
    assert!(set_cookie.starts_with("PORTIER="));
    assert!(set_cookie.ends_with("; Secure"));

    let cookie = session_cookie(&response).unwrap();
    let response = app.get("/auth/check", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn expired_session_is_unauthenticated() {
    let app = app_with_config(SessionConfig::new().with_ttl_seconds(0));

    let cookie = app.login_cookie("user", "user").await;

    let response = app.get("/auth/check", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.get("/me", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unavailable_session_store_is_internal_error() {
    let app = TestApp {
        router: router_with_store(Arc::new(UnavailableStore), SessionConfig::new()),
        store: MemoryStore::new(),
    };

    // saving the new session fails
    let response = app.login("user", "user", None).await;
    assert_internal_error(response, "/auth/login").await;

    // loading an existing session fails
    let cookie = format!("SESSION={}", SessionId::generate().as_str());
    let response = app.get("/auth/check", Some(&cookie)).await;
    assert_internal_error(response, "/auth/check").await;

    let response = app.get("/me", Some(&cookie)).await;
    assert_internal_error(response, "/me").await;
}

#[tokio::test]
async fn oversized_ttl_fails_without_panicking() {
    let app = app_with_config(SessionConfig::new().with_ttl_seconds(u64::MAX));

    let response = app.login("user", "user", None).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.headers().get(SET_COOKIE).is_none());
    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["status"], 500);
    assert!(app.store.is_empty().await);
}
