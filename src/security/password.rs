//! Delegating password encoder.
//!
//! Encoded passwords carry the id of the algorithm that produced them, e.g.
//! `{argon2}$argon2id$v=19$...` or `{bcrypt}$2b$12$...`. New passwords are
//! always encoded with `argon2id`; `bcrypt` is accepted for verification so
//! hashes imported from elsewhere keep working.

use argon2::{
    password_hash::SaltString, Algorithm, Argon2, Params, PasswordHash, PasswordHasher,
    PasswordVerifier, Version,
};
use rand::rngs::OsRng;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const ARGON2_ID: &str = "argon2";
const BCRYPT_ID: &str = "bcrypt";

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("failed to hash password: {0}")]
    Hash(String),
    #[error("invalid argon2 parameters: {0}")]
    Params(String),
}

#[derive(Clone)]
pub struct PasswordEncoder {
    argon2: Argon2<'static>,
}

impl std::fmt::Debug for PasswordEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordEncoder")
            .field("default", &ARGON2_ID)
            .finish()
    }
}

impl Default for PasswordEncoder {
    fn default() -> Self {
        Self {
            argon2: Argon2::default(),
        }
    }
}

impl PasswordEncoder {
    /// Encoder with explicit argon2id cost parameters.
    ///
    /// # Errors
    /// Returns an error if the parameters are rejected by `argon2`.
    pub fn with_params(m_cost: u32, t_cost: u32, p_cost: u32) -> Result<Self, PasswordError> {
        let params = Params::new(m_cost, t_cost, p_cost, None)
            .map_err(|e| PasswordError::Params(e.to_string()))?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    /// Hash `raw` with argon2id and a random salt, prefixed with `{argon2}`.
    ///
    /// # Errors
    /// Returns an error if hashing fails.
    pub fn encode(&self, raw: &SecretString) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(raw.expose_secret().as_bytes(), &salt)
            .map_err(|e| PasswordError::Hash(e.to_string()))?;
        Ok(format!("{{{ARGON2_ID}}}{hash}"))
    }

    /// Check `raw` against an encoded password. Unknown ids never match.
    #[must_use]
    pub fn matches(&self, raw: &SecretString, encoded: &str) -> bool {
        let Some((id, hash)) = split_id(encoded) else {
            return false;
        };

        match id {
            ARGON2_ID => PasswordHash::new(hash).is_ok_and(|parsed| {
                self.argon2
                    .verify_password(raw.expose_secret().as_bytes(), &parsed)
                    .is_ok()
            }),
            BCRYPT_ID => bcrypt::verify(raw.expose_secret(), hash).unwrap_or(false),
            _ => false,
        }
    }
}

fn split_id(encoded: &str) -> Option<(&str, &str)> {
    let rest = encoded.strip_prefix('{')?;
    let end = rest.find('}')?;
    Some((&rest[..end], &rest[end + 1..]))
}
