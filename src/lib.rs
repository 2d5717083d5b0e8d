//! # Portier (session authentication gateway)
//!
//! `portier` guards an HTTP API with server-side sessions. Clients log in with
//! a username and password on `/auth/login`; the resulting security context is
//! stored in a session whose identifier travels in a cookie.
//!
//! ## Filter chain
//!
//! Every request goes through the same chain: request id, tracing, session
//! resolution and the access gate. `OPTIONS` requests and anything under
//! `/auth` pass the gate; everything else needs an authenticated session and
//! is answered with an empty `401` otherwise.
//!
//! ## Roles
//!
//! Users carry `ROLE_ADMIN` and/or `ROLE_USER`. The role hierarchy
//! (`ROLE_ADMIN > ROLE_USER` by default) is applied when checking roles, so an
//! administrator passes every user check.
//!
//! ## Sessions
//!
//! Sessions live in Redis (or in process memory when no Redis URL is given)
//! and expire after two hours of inactivity.

pub mod api;
pub mod cli;
pub mod security;
pub mod session;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
