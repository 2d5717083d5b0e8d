//! Command-line argument dispatch.
//!
//! Maps validated CLI matches to the action the binary runs.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{security, session, ARG_PORT};
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);

    let session_opts = session::Options::parse(matches)?;
    let security_opts = security::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        redis_url: session_opts.redis_url,
        session_ttl_seconds: session_opts.ttl_seconds,
        session_cookie_name: session_opts.cookie_name,
        session_cookie_secure: session_opts.cookie_secure,
        role_hierarchy: security_opts.role_hierarchy,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::Role;
    use std::collections::BTreeSet;

    fn with_env<F: FnOnce()>(overrides: &[(&'static str, &'static str)], f: F) {
        let mut vars: Vec<(&str, Option<&str>)> = [
            "PORTIER_PORT",
            "PORTIER_REDIS_URL",
            "PORTIER_SESSION_TTL_SECONDS",
            "PORTIER_SESSION_COOKIE_NAME",
            "PORTIER_SESSION_COOKIE_SECURE",
            "PORTIER_ROLE_HIERARCHY",
        ]
        .into_iter()
        .map(|name| (name, None))
        .collect();
        for (name, value) in overrides {
            vars.retain(|(existing, _)| existing != name);
            vars.push((*name, Some(*value)));
        }
        temp_env::with_vars(vars, f);
    }

    #[test]
    fn defaults_build_server_action() {
        with_env(&[], || {
            let matches = crate::cli::commands::new().get_matches_from(vec!["portier"]);
            let result = handler(&matches);
            assert!(result.is_ok());
            if let Ok(Action::Server(args)) = result {
                assert_eq!(args.port, 8080);
                assert!(args.redis_url.is_none());
                assert_eq!(args.session_ttl_seconds, 7200);
                assert_eq!(args.session_cookie_name, "SESSION");
                assert!(!args.session_cookie_secure);
                let admin = BTreeSet::from([Role::Admin]);
                let user = BTreeSet::from([Role::User]);
                assert!(args.role_hierarchy.grants(&admin, Role::User));
                assert!(!args.role_hierarchy.grants(&user, Role::Admin));
            }
        });
    }

    #[test]
    fn invalid_role_hierarchy_is_rejected() {
        with_env(&[("PORTIER_ROLE_HIERARCHY", "ROLE_ADMIN > ROLE_ROOT")], || {
            let matches = crate::cli::commands::new().get_matches_from(vec!["portier"]);
            let result = handler(&matches);
            assert!(result.is_err());
            if let Err(err) = result {
                assert!(err.to_string().contains("invalid --role-hierarchy"));
            }
        });
    }

    #[test]
    fn cyclic_role_hierarchy_is_rejected() {
        with_env(
            &[(
                "PORTIER_ROLE_HIERARCHY",
                "ROLE_ADMIN > ROLE_USER; ROLE_USER > ROLE_ADMIN",
            )],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec!["portier"]);
                assert!(handler(&matches).is_err());
            },
        );
    }

    #[test]
    fn zero_ttl_is_rejected() {
        with_env(&[("PORTIER_SESSION_TTL_SECONDS", "0")], || {
            let matches = crate::cli::commands::new().get_matches_from(vec!["portier"]);
            let result = handler(&matches);
            assert!(result.is_err());
            if let Err(err) = result {
                assert!(err
                    .to_string()
                    .contains("--session-ttl-seconds must be greater than 0"));
            }
        });
    }

    #[test]
    fn ttl_above_thirty_days_is_rejected() {
        with_env(&[("PORTIER_SESSION_TTL_SECONDS", "2592001")], || {
            let matches = crate::cli::commands::new().get_matches_from(vec!["portier"]);
            let result = handler(&matches);
            assert!(result.is_err());
            if let Err(err) = result {
                assert!(err.to_string().contains("must be at most 2592000"));
            }
        });

        with_env(&[("PORTIER_SESSION_TTL_SECONDS", "2592000")], || {
            let matches = crate::cli::commands::new().get_matches_from(vec!["portier"]);
            assert!(handler(&matches).is_ok());
        });
    }

    #[test]
    fn blank_redis_url_falls_back_to_memory() {
        with_env(&[("PORTIER_REDIS_URL", "  ")], || {
            let matches = crate::cli::commands::new().get_matches_from(vec!["portier"]);
            if let Ok(Action::Server(args)) = handler(&matches) {
                assert!(args.redis_url.is_none());
            } else {
                panic!("expected server action");
            }
        });
    }
}
