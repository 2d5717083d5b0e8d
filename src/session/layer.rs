//! Cookie-driven session middleware.

use super::{
    store::SessionError, SessionId, SessionRecord, SessionStore, DEFAULT_SESSION_TTL_SECONDS,
};
use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{
        header::{InvalidHeaderValue, COOKIE, SET_COOKIE},
        request::Parts,
        HeaderMap, HeaderValue, StatusCode,
    },
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use std::{sync::Arc, time::Duration};
use tokio::sync::Mutex;
use tracing::{debug, error};

pub const DEFAULT_COOKIE_NAME: &str = "SESSION";

#[derive(Clone, Debug)]
pub struct SessionConfig {
    cookie_name: String,
    cookie_secure: bool,
    ttl: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            cookie_secure: false,
            ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECONDS),
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_cookie_name(mut self, name: String) -> Self {
        self.cookie_name = name;
        self
    }

    #[must_use]
    pub fn with_cookie_secure(mut self, secure: bool) -> Self {
        self.cookie_secure = secure;
        self
    }

    #[must_use]
    pub fn with_ttl_seconds(mut self, seconds: u64) -> Self {
        self.ttl = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    #[must_use]
    pub fn cookie_secure(&self) -> bool {
        self.cookie_secure
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

/// Store plus cookie settings, shared by every request.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    config: SessionConfig,
}

impl SessionManager {
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>, config: SessionConfig) -> Self {
        Self { store, config }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

#[derive(Debug)]
struct SessionState {
    record: SessionRecord,
    is_new: bool,
    modified: bool,
}

/// Handle to the current request's session.
///
/// Clones share the same state; the lock is never held across requests.
#[derive(Clone, Debug)]
pub struct Session {
    state: Arc<Mutex<SessionState>>,
}

impl Session {
    fn from_record(record: SessionRecord, is_new: bool) -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState {
                record,
                is_new,
                modified: false,
            })),
        }
    }

    /// A fresh session that has not been written to any store.
    #[must_use]
    pub fn new_unsaved() -> Self {
        Self::from_record(SessionRecord::new(SessionId::generate()), true)
    }

    pub async fn is_new(&self) -> bool {
        self.state.lock().await.is_new
    }

    /// # Errors
    /// Returns an error if the stored value does not deserialize into `T`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, SessionError> {
        let state = self.state.lock().await;
        match state.record.attributes.get(key) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.state.lock().await.record.attributes.contains_key(key)
    }

    /// # Errors
    /// Returns an error if `value` cannot be serialized.
    pub async fn insert<T: Serialize>(&self, key: &str, value: &T) -> Result<(), SessionError> {
        let value = serde_json::to_value(value)?;
        let mut state = self.state.lock().await;
        state.record.attributes.insert(key.to_string(), value);
        state.modified = true;
        Ok(())
    }

    /// Remove `key`, returning whether it was present.
    pub async fn remove(&self, key: &str) -> bool {
        let mut state = self.state.lock().await;
        let removed = state.record.attributes.remove(key).is_some();
        state.modified |= removed;
        removed
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Self>().cloned().ok_or_else(|| {
            error!("session requested but the session layer is not installed");
            StatusCode::INTERNAL_SERVER_ERROR
        })
    }
}

/// Resolve the session cookie, run the request, then persist the session.
///
/// Unchanged existing sessions only get their expiration refreshed; new
/// sessions are saved (and their cookie sent) only once something was stored
/// in them.
///
/// # Errors
/// Returns a [`SessionError`] when the store cannot be read or written.
pub async fn manage_session(
    State(manager): State<SessionManager>,
    mut request: Request,
    next: Next,
) -> Result<Response, SessionError> {
    let config = manager.config();

    let existing = match extract_session_id(request.headers(), config.cookie_name()) {
        Some(id) => manager.store().load(&id).await?,
        None => None,
    };

    let session = match existing {
        Some(record) => Session::from_record(record, false),
        None => Session::new_unsaved(),
    };

    request.extensions_mut().insert(session.clone());

    let mut response = next.run(request).await;

    let mut state = session.state.lock().await;
    if state.modified {
        if state.is_new && state.record.attributes.is_empty() {
            return Ok(response);
        }

        state.record.last_accessed_at = Utc::now();
        manager.store().save(&state.record, config.ttl()).await?;
        debug!("persisted session {:?}", state.record.id);

        if state.is_new {
            match session_cookie(config, &state.record.id) {
                Ok(cookie) => {
                    response.headers_mut().append(SET_COOKIE, cookie);
                }
                Err(err) => error!("Failed to build session cookie: {err}"),
            }
        }
    } else if !state.is_new {
        manager
            .store()
            .touch(&state.record.id, config.ttl())
            .await?;
    }

    Ok(response)
}

/// `Set-Cookie` value for a newly created session.
pub(crate) fn session_cookie(
    config: &SessionConfig,
    id: &SessionId,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax",
        config.cookie_name(),
        id.as_str()
    );
    if config.cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn extract_session_id(headers: &HeaderMap, cookie_name: &str) -> Option<SessionId> {
    // several Cookie headers may be present
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| {
            let mut parts = pair.trim().splitn(2, '=');
            let key = parts.next()?.trim();
            let val = parts.next()?.trim();
            (key == cookie_name).then_some(val)
        })
        .find_map(SessionId::parse)
}
