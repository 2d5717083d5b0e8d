//! Session persistence seam.

use super::{SessionId, SessionRecord};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session store unavailable: {0}")]
    Unavailable(String),
    #[error("failed to (de)serialize session: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<redis::RedisError> for SessionError {
    fn from(err: redis::RedisError) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// Backend holding serialized sessions keyed by id.
///
/// Implementations own expiration: a record not touched or saved within its
/// `ttl` must no longer be returned by [`SessionStore::load`].
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, id: &SessionId) -> Result<Option<SessionRecord>, SessionError>;

    async fn save(&self, record: &SessionRecord, ttl: Duration) -> Result<(), SessionError>;

    /// Extend the expiration of an existing record.
    async fn touch(&self, id: &SessionId, ttl: Duration) -> Result<(), SessionError>;

    async fn ping(&self) -> Result<(), SessionError>;

    fn name(&self) -> &'static str;
}
