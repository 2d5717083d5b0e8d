//! In-process session store for single-instance deployments and tests.

use super::{store::SessionError, SessionId, SessionRecord, SessionStore};
use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::{
    sync::RwLock,
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tracing::debug;

#[derive(Clone, Debug)]
struct Entry {
    // kept serialized so callers never share state with the store
    payload: String,
    expires_at: Instant,
}

#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<SessionId, Entry>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired entry, returning how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        let purged = before - entries.len();
        if purged > 0 {
            debug!("purged {purged} expired sessions");
        }
        purged
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Purge expired entries every `period` until the runtime shuts down.
    #[must_use]
    pub fn spawn_purge_task(&self, period: Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                store.purge_expired().await;
            }
        })
    }
}

fn deadline(ttl: Duration) -> Result<Instant, SessionError> {
    Instant::now()
        .checked_add(ttl)
        .ok_or_else(|| SessionError::Unavailable(format!("session ttl out of range: {ttl:?}")))
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load(&self, id: &SessionId) -> Result<Option<SessionRecord>, SessionError> {
        let payload = {
            let entries = self.entries.read().await;
            match entries.get(id) {
                Some(entry) if entry.expires_at > Instant::now() => Some(entry.payload.clone()),
                Some(_) => None,
                None => return Ok(None),
            }
        };

        match payload {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => {
                self.entries.write().await.remove(id);
                Ok(None)
            }
        }
    }

    async fn save(&self, record: &SessionRecord, ttl: Duration) -> Result<(), SessionError> {
        let payload = serde_json::to_string(record)?;
        self.entries.write().await.insert(
            record.id.clone(),
            Entry {
                payload,
                expires_at: deadline(ttl)?,
            },
        );
        Ok(())
    }

    async fn touch(&self, id: &SessionId, ttl: Duration) -> Result<(), SessionError> {
        let expires_at = deadline(ttl)?;
        if let Some(entry) = self.entries.write().await.get_mut(id) {
            entry.expires_at = expires_at;
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), SessionError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
