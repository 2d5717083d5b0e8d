//! Roles and the role hierarchy.
//!
//! A hierarchy is written the same way it is configured on the command line:
//! one or more `HIGHER > LOWER` relations separated by newlines or `;`, for
//! example `ROLE_ADMIN > ROLE_USER`. Holding a role grants every role reachable
//! from it, transitively.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const ROLE_PREFIX: &str = "ROLE_";

pub const DEFAULT_ROLE_HIERARCHY: &str = "ROLE_ADMIN > ROLE_USER";

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    /// Authority string, e.g. `ROLE_ADMIN`.
    #[must_use]
    pub const fn authority(self) -> &'static str {
        match self {
            Self::Admin => "ROLE_ADMIN",
            Self::User => "ROLE_USER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.authority())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoleHierarchyError {
    #[error("unknown role: {0}")]
    UnknownRole(String),
    #[error("invalid relation, expected `HIGHER > LOWER`: {0}")]
    InvalidRelation(String),
    #[error("cycle in role hierarchy involving {0}")]
    Cycle(Role),
}

impl FromStr for Role {
    type Err = RoleHierarchyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        let name = upper.strip_prefix(ROLE_PREFIX).unwrap_or(&upper);
        match name {
            "ADMIN" => Ok(Self::Admin),
            "USER" => Ok(Self::User),
            _ => Err(RoleHierarchyError::UnknownRole(s.trim().to_string())),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.authority().to_string()
    }
}

impl TryFrom<String> for Role {
    type Error = RoleHierarchyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Directed "implies" relation between roles, stored as its transitive closure.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoleHierarchy {
    reachable: BTreeMap<Role, BTreeSet<Role>>,
}

impl RoleHierarchy {
    /// Build a hierarchy from a map of role to directly implied roles.
    ///
    /// # Errors
    /// Returns [`RoleHierarchyError::Cycle`] if a role ends up implying itself.
    pub fn from_map(direct: &BTreeMap<Role, Vec<Role>>) -> Result<Self, RoleHierarchyError> {
        let mut reachable = BTreeMap::new();

        for &role in direct.keys() {
            let mut seen = BTreeSet::new();
            let mut stack: Vec<Role> = direct.get(&role).cloned().unwrap_or_default();

            while let Some(next) = stack.pop() {
                if next == role {
                    return Err(RoleHierarchyError::Cycle(role));
                }
                if seen.insert(next) {
                    if let Some(implied) = direct.get(&next) {
                        stack.extend(implied.iter().copied());
                    }
                }
            }

            reachable.insert(role, seen);
        }

        Ok(Self { reachable })
    }

    /// Parse `HIGHER > LOWER` relations; chains such as `A > B > C` are allowed.
    ///
    /// # Errors
    /// Returns an error for unknown roles, malformed relations or cycles.
    pub fn parse(relations: &str) -> Result<Self, RoleHierarchyError> {
        let mut direct: BTreeMap<Role, Vec<Role>> = BTreeMap::new();

        for line in relations.split(['\n', ';']) {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let roles = line
                .split('>')
                .map(str::parse::<Role>)
                .collect::<Result<Vec<_>, _>>()?;

            if roles.len() < 2 {
                return Err(RoleHierarchyError::InvalidRelation(line.to_string()));
            }

            for pair in roles.windows(2) {
                direct.entry(pair[0]).or_default().push(pair[1]);
            }
        }

        Self::from_map(&direct)
    }

    /// All roles granted by `roles`, including the roles themselves.
    #[must_use]
    pub fn reachable_roles(&self, roles: &BTreeSet<Role>) -> BTreeSet<Role> {
        let mut granted = roles.clone();
        for role in roles {
            if let Some(implied) = self.reachable.get(role) {
                granted.extend(implied.iter().copied());
            }
        }
        granted
    }

    #[must_use]
    pub fn grants(&self, roles: &BTreeSet<Role>, required: Role) -> bool {
        roles.contains(&required)
            || roles
                .iter()
                .any(|role| self.reachable.get(role).is_some_and(|r| r.contains(&required)))
    }
}

impl fmt::Display for RoleHierarchy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let relations: Vec<String> = self
            .reachable
            .iter()
            .flat_map(|(higher, lower)| lower.iter().map(move |l| format!("{higher} > {l}")))
            .collect();
        f.write_str(&relations.join("; "))
    }
}
