//! Users, roles and credential verification.

pub mod authentication;
pub mod password;
pub mod role;
pub mod user;

pub use authentication::{
    AuthError, Authentication, AuthenticationManager, SecurityContext, SECURITY_CONTEXT_ATTR,
};
pub use password::{PasswordEncoder, PasswordError};
pub use role::{Role, RoleHierarchy, RoleHierarchyError, DEFAULT_ROLE_HIERARCHY};
pub use user::{User, UserStore};
