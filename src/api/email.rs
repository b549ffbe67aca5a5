//! OTP email construction and delivery.
//!
//! Verification and password-reset flows build an [`EmailMessage`] and hand it
//! to the configured [`Mailer`]. Delivery happens inside the request that
//! triggered it; a failed send surfaces as a generic server error and the
//! caller's pending verification record is left in place.
//!
//! The default mailer for local dev is [`Mailer::log`], which logs the payload
//! and returns `Ok(())`. Production deployments configure [`HttpApiMailer`],
//! which posts the message to an HTTP mail-delivery API.

use anyhow::{Context, Result};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::info;

#[derive(Clone, Debug)]
pub struct EmailMessage {
    pub to_email: String,
    pub subject: String,
    pub body: String,
}

/// Email delivery backends.
#[derive(Debug)]
pub enum Mailer {
    Log(LogMailer),
    Http(HttpApiMailer),
}

impl Mailer {
    /// Local dev mailer that logs instead of sending real email.
    #[must_use]
    pub fn log(from: String) -> Self {
        Self::Log(LogMailer { from })
    }

    /// Deliver a message or return an error so the caller can fail the request.
    ///
    /// # Errors
    /// Returns an error when the backing delivery channel rejects the message.
    pub async fn send(&self, message: &EmailMessage) -> Result<()> {
        match self {
            Self::Log(mailer) => mailer.send(message),
            Self::Http(mailer) => mailer.send(message).await,
        }
    }
}

/// Local dev sender that logs the payload instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogMailer {
    from: String,
}

impl LogMailer {
    fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            from = %self.from,
            to_email = %message.to_email,
            subject = %message.subject,
            body = %message.body,
            "email send stub"
        );
        Ok(())
    }
}

/// Sender that posts messages to an HTTP mail-delivery API.
#[derive(Debug)]
pub struct HttpApiMailer {
    endpoint: String,
    token: Option<SecretString>,
    from: String,
    client: Client,
}

impl HttpApiMailer {
    /// Build the sender and its HTTP client.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(endpoint: String, token: Option<SecretString>, from: String) -> Result<Self> {
        let client = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .build()
            .context("failed to build mail API client")?;
        Ok(Self {
            endpoint,
            token,
            from,
            client,
        })
    }

    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let mut request = self.client.post(&self.endpoint).json(&json!({
            "from": self.from,
            "to": message.to_email,
            "subject": message.subject,
            "text": message.body,
        }));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request.send().await.context("failed to reach mail API")?;
        if !response.status().is_success() {
            anyhow::bail!("mail API returned {}", response.status());
        }
        Ok(())
    }
}

/// OTP email for a fresh signup verification session.
pub(crate) fn verification_email(to_email: &str, otp: &str, ttl_minutes: i64) -> EmailMessage {
    EmailMessage {
        to_email: to_email.to_string(),
        subject: "Email Verification OTP".to_string(),
        body: format!(
            "Thank you for signing up! Your verification code is {otp}. \
             This code will expire in {ttl_minutes} minutes. \
             If you didn't request this verification, please ignore this email."
        ),
    }
}

/// OTP email for a resend on an existing verification session.
pub(crate) fn verification_resent_email(to_email: &str, otp: &str, ttl_minutes: i64) -> EmailMessage {
    EmailMessage {
        to_email: to_email.to_string(),
        subject: "Email Verification OTP (Resent)".to_string(),
        body: format!(
            "Here is your new verification code: {otp}. \
             This code will expire in {ttl_minutes} minutes. \
             If you didn't request this verification, please ignore this email."
        ),
    }
}

/// OTP email for a password-reset session.
pub(crate) fn password_reset_email(to_email: &str, otp: &str, ttl_minutes: i64) -> EmailMessage {
    EmailMessage {
        to_email: to_email.to_string(),
        subject: "Password Reset OTP".to_string(),
        body: format!(
            "You requested to reset your password. Your verification code is {otp}. \
             This code will expire in {ttl_minutes} minutes. \
             If you didn't request this reset, please ignore this email."
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_mailer_always_delivers() -> Result<()> {
        let mailer = Mailer::log("no-reply@rubrica.dev".to_string());
        let message = verification_email("alice@example.com", "123456", 10);
        mailer.send(&message).await?;
        Ok(())
    }

    #[test]
    fn verification_email_carries_otp_and_ttl() {
        let message = verification_email("alice@example.com", "654321", 10);
        assert_eq!(message.to_email, "alice@example.com");
        assert_eq!(message.subject, "Email Verification OTP");
        assert!(message.body.contains("654321"));
        assert!(message.body.contains("10 minutes"));
    }

    #[test]
    fn resent_email_uses_resent_subject() {
        let message = verification_resent_email("alice@example.com", "111222", 10);
        assert_eq!(message.subject, "Email Verification OTP (Resent)");
        assert!(message.body.contains("111222"));
    }

    #[test]
    fn reset_email_mentions_password_reset() {
        let message = password_reset_email("bob@example.com", "999000", 10);
        assert_eq!(message.subject, "Password Reset OTP");
        assert!(message.body.contains("reset your password"));
    }
}
