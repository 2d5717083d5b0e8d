//! Redis-backed session store.
//!
//! Each session is a JSON string under `portier:session:sessions:<id>`,
//! written with `SET .. EX` so Redis expires it on inactivity.

use super::{
    store::SessionError, SessionId, SessionRecord, SessionStore, MAX_SESSION_TTL_SECONDS,
};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::time::Duration;
use tracing::{debug, instrument};

const KEY_NAMESPACE: &str = "portier:session:sessions";

#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Connect to Redis at `url` (e.g. `redis://127.0.0.1:6379/0`).
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the server cannot be reached.
    pub async fn connect(url: &str) -> Result<Self, SessionError> {
        let client = redis::Client::open(url)?;
        let connection = ConnectionManager::new(client).await?;
        Ok(Self { connection })
    }

    fn key(id: &SessionId) -> String {
        format!("{KEY_NAMESPACE}:{}", id.as_str())
    }
}

// EX/EXPIRE take whole seconds, never zero
fn ttl_seconds(ttl: Duration) -> Result<u64, SessionError> {
    let seconds = ttl.as_secs().max(1);
    if seconds > MAX_SESSION_TTL_SECONDS {
        return Err(SessionError::Unavailable(format!(
            "session ttl out of range: {seconds}s"
        )));
    }
    Ok(seconds)
}

#[async_trait]
impl SessionStore for RedisStore {
    #[instrument(skip_all)]
    async fn load(&self, id: &SessionId) -> Result<Option<SessionRecord>, SessionError> {
        let mut connection = self.connection.clone();
        let payload: Option<String> = redis::cmd("GET")
            .arg(Self::key(id))
            .query_async(&mut connection)
            .await?;

        match payload {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip_all)]
    async fn save(&self, record: &SessionRecord, ttl: Duration) -> Result<(), SessionError> {
        let payload = serde_json::to_string(record)?;
        let mut connection = self.connection.clone();
        let () = redis::cmd("SET")
            .arg(Self::key(&record.id))
            .arg(payload)
            .arg("EX")
            .arg(ttl_seconds(ttl)?)
            .query_async(&mut connection)
            .await?;
        debug!("session saved");
        Ok(())
    }

    #[instrument(skip_all)]
    async fn touch(&self, id: &SessionId, ttl: Duration) -> Result<(), SessionError> {
        let mut connection = self.connection.clone();
        let _updated: i64 = redis::cmd("EXPIRE")
            .arg(Self::key(id))
            .arg(ttl_seconds(ttl)?)
            .query_async(&mut connection)
            .await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), SessionError> {
        let mut connection = self.connection.clone();
        let pong: String = redis::cmd("PING").query_async(&mut connection).await?;
        if pong == "PONG" {
            Ok(())
        } else {
            Err(SessionError::Unavailable(format!(
                "unexpected PING reply: {pong}"
            )))
        }
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
