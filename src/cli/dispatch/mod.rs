//! Command-line argument dispatch and server initialization.
//!
//! This module parses validated CLI arguments and maps them to the appropriate
//! action, such as starting the API server with its full configuration state.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::auth;
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let auth_opts = auth::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        jwt_secret: auth_opts.jwt_secret,
        otp_ttl_seconds: auth_opts.otp_ttl_seconds,
        session_ttl_seconds: auth_opts.session_ttl_seconds,
        email_from: auth_opts.email_from,
        email_api_url: auth_opts.email_api_url,
        email_api_token: auth_opts.email_api_token,
        google_client_id: auth_opts.google_client_id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands;

    #[test]
    fn dispatch_builds_server_action() -> Result<()> {
        let matches = commands::new().get_matches_from(vec![
            "rubrica",
            "--dsn",
            "postgres://localhost:5432/rubrica",
            "--jwt-secret",
            "sekret",
            "--google-client-id",
            "client-id.example",
        ]);

        let Action::Server(args) = handler(&matches)?;
        assert_eq!(args.port, 8080);
        assert_eq!(args.dsn, "postgres://localhost:5432/rubrica");
        assert_eq!(args.jwt_secret, "sekret");
        assert_eq!(args.otp_ttl_seconds, 600);
        assert_eq!(args.session_ttl_seconds, 2_592_000);
        assert_eq!(args.google_client_id.as_deref(), Some("client-id.example"));
        assert_eq!(args.email_api_url, None);
        Ok(())
    }
}
