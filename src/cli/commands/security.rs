use crate::security::{RoleHierarchy, DEFAULT_ROLE_HIERARCHY};
use anyhow::Context;
use clap::{Arg, ArgMatches, Command};

pub const ARG_ROLE_HIERARCHY: &str = "role-hierarchy";

#[derive(Debug, Clone)]
pub struct Options {
    pub role_hierarchy: RoleHierarchy,
}

impl Options {
    /// Parse security arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the role hierarchy is malformed or cyclic.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let value = matches
            .get_one::<String>(ARG_ROLE_HIERARCHY)
            .map_or(DEFAULT_ROLE_HIERARCHY, String::as_str);

        let role_hierarchy = RoleHierarchy::parse(value)
            .with_context(|| format!("invalid --{ARG_ROLE_HIERARCHY}: {value}"))?;

        Ok(Self { role_hierarchy })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_ROLE_HIERARCHY)
            .long(ARG_ROLE_HIERARCHY)
            .help("Role hierarchy, `HIGHER > LOWER` relations separated by `;`")
            .env("PORTIER_ROLE_HIERARCHY")
            .default_value(DEFAULT_ROLE_HIERARCHY),
    )
}
