//! Server-side sessions.
//!
//! A session is an attribute map keyed by an opaque identifier that travels in
//! a cookie. The [`layer`] middleware resolves the cookie, hands a [`Session`]
//! to the rest of the request and persists it afterwards through a
//! [`SessionStore`]. Sessions are created lazily: a fresh session is only
//! written to the store (and its cookie only sent) once an attribute is set.

pub mod layer;
pub mod memory;
pub mod redis_store;
pub mod store;

pub use layer::{Session, SessionConfig};
pub use memory::MemoryStore;
pub use redis_store::RedisStore;
pub use store::{SessionError, SessionStore};

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Utc};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt};

const SESSION_ID_BYTES: usize = 32;

pub const DEFAULT_SESSION_TTL_SECONDS: u64 = 60 * 60 * 2;

/// Upper bound for the inactivity timeout (30 days).
pub const MAX_SESSION_TTL_SECONDS: u64 = 60 * 60 * 24 * 30;

#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; SESSION_ID_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(Base64UrlUnpadded::encode_string(&bytes))
    }

    /// Accept only values shaped like ids we issue.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let decoded = Base64UrlUnpadded::decode_vec(value).ok()?;
        (decoded.len() == SESSION_ID_BYTES).then(|| Self(value.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// ids are bearer secrets, keep them out of logs
impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = self.0.get(..6).unwrap_or_default();
        write!(f, "SessionId({prefix}...)")
    }
}

/// What the store persists for one session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: SessionId,
    pub attributes: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
}

impl SessionRecord {
    #[must_use]
    pub fn new(id: SessionId) -> Self {
        let now = Utc::now();
        Self {
            id,
            attributes: HashMap::new(),
            created_at: now,
            last_accessed_at: now,
        }
    }
}
