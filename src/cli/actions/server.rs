use crate::{
    api::{self, AppState},
    cli::telemetry,
    security::{AuthenticationManager, PasswordEncoder, RoleHierarchy, UserStore},
    session::{layer::SessionManager, MemoryStore, RedisStore, SessionConfig, SessionStore},
};
use anyhow::{Context, Result};
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, warn};

const MEMORY_PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub redis_url: Option<String>,
    pub session_ttl_seconds: u64,
    pub session_cookie_name: String,
    pub session_cookie_secure: bool,
    pub role_hierarchy: RoleHierarchy,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the user store cannot be built, Redis is unreachable, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let encoder = PasswordEncoder::default();

    let users = UserStore::with_sample_users(&encoder).context("Failed to build user store")?;
    debug!("Loaded {} users", users.len());

    let auth = AuthenticationManager::new(users, encoder)
        .context("Failed to build authentication manager")?;

    let store: Arc<dyn SessionStore> = match &args.redis_url {
        Some(url) => {
            let store = RedisStore::connect(url)
                .await
                .context("Failed to connect to Redis session store")?;
            store
                .ping()
                .await
                .context("Redis session store did not answer PING")?;
            Arc::new(store)
        }
        None => {
            warn!("No Redis URL configured, sessions are kept in memory");
            let store = MemoryStore::new();
            let _purge = store.spawn_purge_task(MEMORY_PURGE_INTERVAL);
            Arc::new(store)
        }
    };

    let config = SessionConfig::new()
        .with_cookie_name(args.session_cookie_name)
        .with_cookie_secure(args.session_cookie_secure)
        .with_ttl_seconds(args.session_ttl_seconds);

    info!(
        "Session cookie: {}, ttl: {}s",
        config.cookie_name(),
        config.ttl().as_secs()
    );

    let state = AppState::new(
        auth,
        args.role_hierarchy,
        SessionManager::new(store, config),
    );

    let result = api::new(args.port, state).await;

    telemetry::shutdown_tracer();

    result
}
