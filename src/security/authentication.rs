//! Credential verification and the per-session security context.

use super::{
    password::{PasswordEncoder, PasswordError},
    role::{Role, RoleHierarchy},
    user::UserStore,
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, sync::Arc};
use thiserror::Error;
use tracing::debug;

/// Session attribute under which the [`SecurityContext`] is stored.
pub const SECURITY_CONTEXT_ATTR: &str = "SECURITY_CONTEXT";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid Credentials")]
    InvalidCredentials,
    #[error("password verification task failed: {0}")]
    Task(String),
}

/// A verified identity. Credentials are dropped once verified.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authentication {
    pub principal: String,
    pub authorities: BTreeSet<Role>,
}

impl Authentication {
    #[must_use]
    pub fn has_role(&self, hierarchy: &RoleHierarchy, role: Role) -> bool {
        hierarchy.grants(&self.authorities, role)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityContext {
    pub authentication: Option<Authentication>,
}

impl SecurityContext {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.authentication.is_some()
    }
}

/// Verifies usernames and passwords against the [`UserStore`].
#[derive(Clone, Debug)]
pub struct AuthenticationManager {
    users: Arc<UserStore>,
    encoder: PasswordEncoder,
    // compared against when the user does not exist
    dummy_hash: String,
}

impl AuthenticationManager {
    /// # Errors
    /// Returns an error if the placeholder hash cannot be computed.
    pub fn new(users: UserStore, encoder: PasswordEncoder) -> Result<Self, PasswordError> {
        let dummy_hash = encoder.encode(&SecretString::from("portier-dummy".to_string()))?;
        Ok(Self {
            users: Arc::new(users),
            encoder,
            dummy_hash,
        })
    }

    /// Look `id` up and verify `password` against its hash.
    ///
    /// Hashing runs on the blocking pool.
    ///
    /// # Errors
    /// Returns [`AuthError::InvalidCredentials`] for unknown users and wrong passwords.
    pub async fn authenticate(
        &self,
        id: &str,
        password: SecretString,
    ) -> Result<Authentication, AuthError> {
        let user = self.users.find(id).cloned();
        let encoder = self.encoder.clone();
        let hash = user
            .as_ref()
            .map_or_else(|| self.dummy_hash.clone(), |u| u.password_hash.clone());

        let verified = tokio::task::spawn_blocking(move || encoder.matches(&password, &hash))
            .await
            .map_err(|e| AuthError::Task(e.to_string()))?;

        match user {
            Some(user) if verified => {
                debug!("authenticated principal {}", user.username);
                Ok(Authentication {
                    principal: user.username,
                    authorities: user.roles,
                })
            }
            _ => {
                debug!("authentication failed");
                Err(AuthError::InvalidCredentials)
            }
        }
    }
}
