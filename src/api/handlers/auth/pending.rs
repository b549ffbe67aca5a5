//! In-process table of pending OTP verification sessions.
//!
//! Each outstanding signup or password-reset session is keyed by the opaque
//! token returned to the client. Records live in one async-mutex-guarded map;
//! expiry is detected lazily when a verify or resend call touches the record.
//! Abandoned sessions persist until process restart, which is acceptable for
//! this store; a multi-process deployment needs an external TTL-capable store.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Candidate account fields held until the signup OTP is confirmed.
#[derive(Clone, Debug)]
pub(crate) struct SignupCandidate {
    pub(crate) name: String,
    pub(crate) email: String,
    pub(crate) phone: Option<String>,
    pub(crate) address: Option<String>,
    pub(crate) password: String,
}

/// What a confirmed OTP commits: a new account or a credential overwrite.
#[derive(Clone, Debug)]
pub(crate) enum PendingPayload {
    Signup(SignupCandidate),
    PasswordReset { user_id: Uuid },
}

struct PendingVerification {
    email: String,
    otp: String,
    issued_at: Instant,
    payload: PendingPayload,
}

/// Why a verify attempt was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum VerifyError {
    /// No record for the presented session token.
    UnknownSession,
    /// Record outlived the validity window; it has been discarded.
    Expired,
    /// OTP or email did not match; the record is retained for retry.
    Mismatch,
}

pub struct PendingStore {
    ttl: Duration,
    entries: Mutex<HashMap<String, PendingVerification>>,
}

impl PendingStore {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Register a fresh session. Tokens are 160-bit random hex, so an
    /// insert never collides with a live record in practice.
    pub(crate) async fn insert(
        &self,
        token: String,
        email: String,
        otp: String,
        payload: PendingPayload,
    ) {
        let mut entries = self.entries.lock().await;
        entries.insert(
            token,
            PendingVerification {
                email,
                otp,
                issued_at: Instant::now(),
                payload,
            },
        );
    }

    /// Replace the OTP and reset the clock on a live session.
    ///
    /// Returns `false` when the token is unknown or the email does not match;
    /// nothing is mutated in that case. A stale-but-present record is revived:
    /// resend carries no expiry check of its own.
    pub(crate) async fn refresh(&self, token: &str, email: &str, otp: String) -> bool {
        let mut entries = self.entries.lock().await;
        match entries.get_mut(token) {
            Some(entry) if entry.email == email => {
                entry.otp = otp;
                entry.issued_at = Instant::now();
                true
            }
            _ => false,
        }
    }

    /// Validate token + email + OTP and return the payload for commit.
    ///
    /// Expired records are deleted on sight. A mismatched OTP or email leaves
    /// the record in place so the client can retry within the window. The
    /// record itself survives a successful verify; callers [`discard`] it once
    /// the payload has been applied, keeping sessions single-use while letting
    /// a failed commit be retried.
    ///
    /// [`discard`]: Self::discard
    pub(crate) async fn verify(
        &self,
        token: &str,
        email: &str,
        otp: &str,
    ) -> Result<PendingPayload, VerifyError> {
        let mut entries = self.entries.lock().await;
        let entry = entries.get(token).ok_or(VerifyError::UnknownSession)?;

        if entry.issued_at.elapsed() >= self.ttl {
            entries.remove(token);
            return Err(VerifyError::Expired);
        }

        if entry.otp != otp || entry.email != email {
            return Err(VerifyError::Mismatch);
        }

        Ok(entry.payload.clone())
    }

    /// Drop a session after its payload has been committed.
    pub(crate) async fn discard(&self, token: &str) {
        self.entries.lock().await.remove(token);
    }

    #[cfg(test)]
    pub(crate) async fn contains(&self, token: &str) -> bool {
        self.entries.lock().await.contains_key(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signup_payload(email: &str) -> PendingPayload {
        PendingPayload::Signup(SignupCandidate {
            name: "Alice".to_string(),
            email: email.to_string(),
            phone: Some("1".to_string()),
            address: None,
            password: "hunter2".to_string(),
        })
    }

    #[tokio::test]
    async fn verify_then_discard_makes_session_single_use() {
        let store = PendingStore::new(Duration::from_secs(600));
        store
            .insert(
                "token".to_string(),
                "a@x.com".to_string(),
                "123456".to_string(),
                signup_payload("a@x.com"),
            )
            .await;

        let payload = store.verify("token", "a@x.com", "123456").await;
        assert!(matches!(payload, Ok(PendingPayload::Signup(_))));

        // The record survives until the commit is applied and discarded.
        assert!(store.contains("token").await);
        store.discard("token").await;

        let replay = store.verify("token", "a@x.com", "123456").await;
        assert_eq!(replay.unwrap_err(), VerifyError::UnknownSession);
    }

    #[tokio::test]
    async fn mismatched_otp_retains_record() {
        let store = PendingStore::new(Duration::from_secs(600));
        store
            .insert(
                "token".to_string(),
                "a@x.com".to_string(),
                "123456".to_string(),
                signup_payload("a@x.com"),
            )
            .await;

        let wrong = store.verify("token", "a@x.com", "999999").await;
        assert_eq!(wrong.unwrap_err(), VerifyError::Mismatch);
        assert!(store.contains("token").await);

        // Retry with the right code still works.
        let retry = store.verify("token", "a@x.com", "123456").await;
        assert!(retry.is_ok());
    }

    #[tokio::test]
    async fn mismatched_email_retains_record() {
        let store = PendingStore::new(Duration::from_secs(600));
        store
            .insert(
                "token".to_string(),
                "a@x.com".to_string(),
                "123456".to_string(),
                signup_payload("a@x.com"),
            )
            .await;

        let wrong = store.verify("token", "b@x.com", "123456").await;
        assert_eq!(wrong.unwrap_err(), VerifyError::Mismatch);
        assert!(store.contains("token").await);
    }

    #[tokio::test]
    async fn expired_record_is_deleted_even_with_correct_code() {
        let store = PendingStore::new(Duration::from_secs(0));
        store
            .insert(
                "token".to_string(),
                "a@x.com".to_string(),
                "123456".to_string(),
                signup_payload("a@x.com"),
            )
            .await;

        let expired = store.verify("token", "a@x.com", "123456").await;
        assert_eq!(expired.unwrap_err(), VerifyError::Expired);
        assert!(!store.contains("token").await);
    }

    #[tokio::test]
    async fn refresh_resets_clock_on_stale_record() {
        // Zero TTL: the record is stale immediately after insert.
        let store = PendingStore::new(Duration::from_secs(0));
        store
            .insert(
                "token".to_string(),
                "a@x.com".to_string(),
                "123456".to_string(),
                signup_payload("a@x.com"),
            )
            .await;

        assert!(store.refresh("token", "a@x.com", "654321".to_string()).await);

        // Old code no longer matches after the refresh.
        let store = PendingStore::new(Duration::from_secs(600));
        store
            .insert(
                "token".to_string(),
                "a@x.com".to_string(),
                "123456".to_string(),
                signup_payload("a@x.com"),
            )
            .await;
        assert!(store.refresh("token", "a@x.com", "654321".to_string()).await);
        let old = store.verify("token", "a@x.com", "123456").await;
        assert_eq!(old.unwrap_err(), VerifyError::Mismatch);
        let new = store.verify("token", "a@x.com", "654321").await;
        assert!(new.is_ok());
    }

    #[tokio::test]
    async fn refresh_rejects_unknown_token_and_email_mismatch() {
        let store = PendingStore::new(Duration::from_secs(600));
        assert!(!store.refresh("missing", "a@x.com", "654321".to_string()).await);

        store
            .insert(
                "token".to_string(),
                "a@x.com".to_string(),
                "123456".to_string(),
                signup_payload("a@x.com"),
            )
            .await;
        assert!(!store.refresh("token", "b@x.com", "654321".to_string()).await);

        // Rejected refresh left the original code in place.
        let original = store.verify("token", "a@x.com", "123456").await;
        assert!(original.is_ok());
    }

    #[tokio::test]
    async fn reset_payload_round_trips() {
        let store = PendingStore::new(Duration::from_secs(600));
        let user_id = Uuid::new_v4();
        store
            .insert(
                "token".to_string(),
                "a@x.com".to_string(),
                "123456".to_string(),
                PendingPayload::PasswordReset { user_id },
            )
            .await;

        match store.verify("token", "a@x.com", "123456").await {
            Ok(PendingPayload::PasswordReset { user_id: committed }) => {
                assert_eq!(committed, user_id);
            }
            other => panic!("unexpected commit outcome: {other:?}"),
        }
    }
}
