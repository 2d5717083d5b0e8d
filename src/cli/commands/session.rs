use crate::session::{DEFAULT_SESSION_TTL_SECONDS, MAX_SESSION_TTL_SECONDS};
use clap::{Arg, ArgAction, ArgMatches, Command};

pub const ARG_REDIS_URL: &str = "redis-url";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_SESSION_COOKIE_NAME: &str = "session-cookie-name";
pub const ARG_SESSION_COOKIE_SECURE: &str = "session-cookie-secure";

#[derive(Debug, Clone)]
pub struct Options {
    pub redis_url: Option<String>,
    pub ttl_seconds: u64,
    pub cookie_name: String,
    pub cookie_secure: bool,
}

impl Options {
    /// Parse session arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the cookie name is empty or the TTL is zero.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let cookie_name = matches
            .get_one::<String>(ARG_SESSION_COOKIE_NAME)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --{ARG_SESSION_COOKIE_NAME}"))?;

        let ttl_seconds = matches
            .get_one::<u64>(ARG_SESSION_TTL_SECONDS)
            .copied()
            .unwrap_or(DEFAULT_SESSION_TTL_SECONDS);
        if ttl_seconds == 0 {
            return Err(anyhow::anyhow!("--{ARG_SESSION_TTL_SECONDS} must be greater than 0"));
        }
        if ttl_seconds > MAX_SESSION_TTL_SECONDS {
            return Err(anyhow::anyhow!(
                "--{ARG_SESSION_TTL_SECONDS} must be at most {MAX_SESSION_TTL_SECONDS} (30 days)"
            ));
        }

        Ok(Self {
            redis_url: matches
                .get_one::<String>(ARG_REDIS_URL)
                .cloned()
                .filter(|v| !v.trim().is_empty()),
            ttl_seconds,
            cookie_name,
            cookie_secure: matches.get_flag(ARG_SESSION_COOKIE_SECURE),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_REDIS_URL)
                .long(ARG_REDIS_URL)
                .help("Redis URL for the session store, example: redis://127.0.0.1:6379/0")
                .long_help(
                    "Redis URL for the session store. When omitted, sessions are kept in process memory and are lost on restart.",
                )
                .env("PORTIER_REDIS_URL"),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session inactivity timeout in seconds, at most 2592000 (30 days)")
                .env("PORTIER_SESSION_TTL_SECONDS")
                .default_value("7200")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_SESSION_COOKIE_NAME)
                .long(ARG_SESSION_COOKIE_NAME)
                .help("Name of the session cookie")
                .env("PORTIER_SESSION_COOKIE_NAME")
                .default_value(crate::session::layer::DEFAULT_COOKIE_NAME),
        )
        .arg(
            Arg::new(ARG_SESSION_COOKIE_SECURE)
                .long(ARG_SESSION_COOKIE_SECURE)
                .help("Mark the session cookie Secure (HTTPS only)")
                .env("PORTIER_SESSION_COOKIE_SECURE")
                .action(ArgAction::SetTrue),
        )
}
