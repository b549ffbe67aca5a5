//! Auth state and configuration.

use secrecy::SecretString;
use std::time::Duration;

use crate::api::email::Mailer;

use super::google::GoogleVerifier;
use super::pending::PendingStore;

const DEFAULT_OTP_TTL_SECONDS: i64 = 10 * 60;
const DEFAULT_SESSION_TTL_SECONDS: i64 = 30 * 24 * 60 * 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    jwt_secret: SecretString,
    otp_ttl_seconds: i64,
    session_ttl_seconds: i64,
    google_client_id: Option<String>,
}

impl AuthConfig {
    #[must_use]
    pub fn new(jwt_secret: SecretString) -> Self {
        Self {
            jwt_secret,
            otp_ttl_seconds: DEFAULT_OTP_TTL_SECONDS,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            google_client_id: None,
        }
    }

    #[must_use]
    pub fn with_otp_ttl_seconds(mut self, seconds: i64) -> Self {
        self.otp_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_google_client_id(mut self, client_id: Option<String>) -> Self {
        self.google_client_id = client_id;
        self
    }

    pub(crate) fn jwt_secret(&self) -> &SecretString {
        &self.jwt_secret
    }

    pub(super) fn otp_ttl_seconds(&self) -> i64 {
        self.otp_ttl_seconds
    }

    /// Validity window as whole minutes for the email copy; at least one.
    pub(super) fn otp_ttl_minutes(&self) -> i64 {
        (self.otp_ttl_seconds / 60).max(1)
    }

    pub(crate) fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    pub(super) fn google_client_id(&self) -> Option<&str> {
        self.google_client_id.as_deref()
    }
}

pub struct AuthState {
    config: AuthConfig,
    pending: PendingStore,
    mailer: Mailer,
    google: GoogleVerifier,
}

impl AuthState {
    #[must_use]
    pub fn new(config: AuthConfig, mailer: Mailer) -> Self {
        let ttl = Duration::from_secs(u64::try_from(config.otp_ttl_seconds()).unwrap_or(0));
        let google = GoogleVerifier::new(config.google_client_id().map(str::to_string));
        Self {
            pending: PendingStore::new(ttl),
            config,
            mailer,
            google,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub(crate) fn pending(&self) -> &PendingStore {
        &self.pending
    }

    pub(crate) fn mailer(&self) -> &Mailer {
        &self.mailer
    }

    pub(super) fn google(&self) -> &GoogleVerifier {
        &self.google
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_config_defaults_and_overrides() {
        let config = AuthConfig::new(SecretString::from("sekret"));

        assert_eq!(config.otp_ttl_seconds(), super::DEFAULT_OTP_TTL_SECONDS);
        assert_eq!(
            config.session_ttl_seconds(),
            super::DEFAULT_SESSION_TTL_SECONDS
        );
        assert_eq!(config.google_client_id(), None);

        let config = config
            .with_otp_ttl_seconds(120)
            .with_session_ttl_seconds(3600)
            .with_google_client_id(Some("client-id.example".to_string()));

        assert_eq!(config.otp_ttl_seconds(), 120);
        assert_eq!(config.otp_ttl_minutes(), 2);
        assert_eq!(config.session_ttl_seconds(), 3600);
        assert_eq!(config.google_client_id(), Some("client-id.example"));
    }

    #[test]
    fn otp_ttl_minutes_never_reports_zero() {
        let config = AuthConfig::new(SecretString::from("sekret")).with_otp_ttl_seconds(30);
        assert_eq!(config.otp_ttl_minutes(), 1);
    }

    #[test]
    fn auth_state_exposes_config() {
        let config = AuthConfig::new(SecretString::from("sekret"));
        let state = AuthState::new(config, Mailer::log("no-reply@rubrica.dev".to_string()));
        assert_eq!(state.config().otp_ttl_seconds(), 600);
    }
}
