use crate::api::{
    self,
    email::{HttpApiMailer, Mailer},
    handlers::auth::AuthConfig,
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub jwt_secret: String,
    pub otp_ttl_seconds: i64,
    pub session_ttl_seconds: i64,
    pub email_from: String,
    pub email_api_url: Option<String>,
    pub email_api_token: Option<String>,
    pub google_client_id: Option<String>,
}

/// Handle the server action.
///
/// # Errors
/// Returns an error if configuration is inconsistent or the server fails to start.
pub async fn handle(action: super::Action) -> Result<()> {
    let super::Action::Server(args) = action;

    let auth_config = AuthConfig::new(SecretString::from(args.jwt_secret))
        .with_otp_ttl_seconds(args.otp_ttl_seconds)
        .with_session_ttl_seconds(args.session_ttl_seconds)
        .with_google_client_id(args.google_client_id);

    // Without a mail API endpoint the OTP email is logged locally, which is
    // the dev setup; production deployments pass --email-api-url.
    let mailer = match args.email_api_url {
        Some(endpoint) => {
            Url::parse(&endpoint)
                .with_context(|| format!("invalid mail API endpoint: {endpoint}"))?;
            Mailer::Http(HttpApiMailer::new(
                endpoint,
                args.email_api_token.map(SecretString::from),
                args.email_from,
            )?)
        }
        None => Mailer::log(args.email_from),
    };

    api::new(args.port, args.dsn, auth_config, mailer).await?;

    Ok(())
}
