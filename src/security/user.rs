//! In-memory user store.

use super::{
    password::{PasswordEncoder, PasswordError},
    role::Role,
};
use secrecy::SecretString;
use std::collections::{BTreeSet, HashMap};

#[derive(Clone, Debug)]
pub struct User {
    pub username: String,
    pub password_hash: String,
    pub roles: BTreeSet<Role>,
}

impl User {
    /// Build a user whose password is hashed with `encoder`.
    ///
    /// # Errors
    /// Returns an error if the password cannot be hashed.
    pub fn new(
        encoder: &PasswordEncoder,
        username: &str,
        password: &SecretString,
        roles: &[Role],
    ) -> Result<Self, PasswordError> {
        Ok(Self {
            username: username.to_string(),
            password_hash: encoder.encode(password)?,
            roles: roles.iter().copied().collect(),
        })
    }
}

/// Read-only user lookup keyed by username.
#[derive(Clone, Debug, Default)]
pub struct UserStore {
    users: HashMap<String, User>,
}

impl UserStore {
    #[must_use]
    pub fn new(users: impl IntoIterator<Item = User>) -> Self {
        Self {
            users: users
                .into_iter()
                .map(|user| (user.username.clone(), user))
                .collect(),
        }
    }

    /// The two built-in personas. Each password equals the username.
    ///
    /// # Errors
    /// Returns an error if a password cannot be hashed.
    pub fn with_sample_users(encoder: &PasswordEncoder) -> Result<Self, PasswordError> {
        Ok(Self::new([
            sample_user(encoder, "admin", &[Role::Admin, Role::User])?,
            sample_user(encoder, "user", &[Role::User])?,
        ]))
    }

    #[must_use]
    pub fn find(&self, username: &str) -> Option<&User> {
        self.users.get(username)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

fn sample_user(
    encoder: &PasswordEncoder,
    persona: &str,
    roles: &[Role],
) -> Result<User, PasswordError> {
    User::new(
        encoder,
        persona,
        &SecretString::from(persona.to_string()),
        roles,
    )
}
