use clap::{Arg, ArgMatches, Command};

pub const ARG_JWT_SECRET: &str = "jwt-secret";
pub const ARG_OTP_TTL_SECONDS: &str = "otp-ttl-seconds";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_EMAIL_FROM: &str = "email-from";
pub const ARG_EMAIL_API_URL: &str = "email-api-url";
pub const ARG_EMAIL_API_TOKEN: &str = "email-api-token";
pub const ARG_GOOGLE_CLIENT_ID: &str = "google-client-id";

#[derive(Debug, Clone)]
pub struct Options {
    pub jwt_secret: String,
    pub otp_ttl_seconds: i64,
    pub session_ttl_seconds: i64,
    pub email_from: String,
    pub email_api_url: Option<String>,
    pub email_api_token: Option<String>,
    pub google_client_id: Option<String>,
}

impl Options {
    /// Parse auth arguments from matches.
    ///
    /// # Errors
    /// Returns an error if required arguments are missing.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let jwt_secret = matches.get_one::<String>(ARG_JWT_SECRET).cloned();
        let jwt_secret = match jwt_secret {
            Some(value) if !value.trim().is_empty() => value,
            _ => anyhow::bail!("missing required argument: --{ARG_JWT_SECRET}"),
        };

        // Helper to filter empty strings which clap might pass through if env vars are set to ""
        let get_non_empty = |id: &str| {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
        };

        Ok(Self {
            jwt_secret,
            otp_ttl_seconds: matches
                .get_one::<i64>(ARG_OTP_TTL_SECONDS)
                .copied()
                .unwrap_or(600),
            session_ttl_seconds: matches
                .get_one::<i64>(ARG_SESSION_TTL_SECONDS)
                .copied()
                .unwrap_or(2_592_000),
            email_from: matches
                .get_one::<String>(ARG_EMAIL_FROM)
                .cloned()
                .unwrap_or_else(|| "no-reply@rubrica.dev".to_string()),
            email_api_url: get_non_empty(ARG_EMAIL_API_URL),
            email_api_token: get_non_empty(ARG_EMAIL_API_TOKEN),
            google_client_id: get_non_empty(ARG_GOOGLE_CLIENT_ID),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_JWT_SECRET)
                .long(ARG_JWT_SECRET)
                .help("Shared secret used to sign and verify bearer session tokens")
                .env("RUBRICA_JWT_SECRET")
                .required(true),
        )
        .arg(
            Arg::new(ARG_OTP_TTL_SECONDS)
                .long(ARG_OTP_TTL_SECONDS)
                .help("Validity window for emailed one-time codes")
                .env("RUBRICA_OTP_TTL_SECONDS")
                .default_value("600")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Bearer session token TTL in seconds")
                .env("RUBRICA_SESSION_TTL_SECONDS")
                .default_value("2592000")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_EMAIL_FROM)
                .long(ARG_EMAIL_FROM)
                .help("From address for outbound OTP email")
                .env("RUBRICA_EMAIL_FROM")
                .default_value("no-reply@rubrica.dev"),
        )
        .arg(
            Arg::new(ARG_EMAIL_API_URL)
                .long(ARG_EMAIL_API_URL)
                .help("Mail delivery API endpoint; OTP email is logged locally when unset")
                .env("RUBRICA_EMAIL_API_URL"),
        )
        .arg(
            Arg::new(ARG_EMAIL_API_TOKEN)
                .long(ARG_EMAIL_API_TOKEN)
                .help("Bearer token for the mail delivery API")
                .env("RUBRICA_EMAIL_API_TOKEN"),
        )
        .arg(
            Arg::new(ARG_GOOGLE_CLIENT_ID)
                .long(ARG_GOOGLE_CLIENT_ID)
                .help("OAuth client id expected in the audience of Google ID tokens")
                .env("RUBRICA_GOOGLE_CLIENT_ID"),
        )
}
