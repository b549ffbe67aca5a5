//! # Rubrica (Provider Directory & CRM Backend)
//!
//! `rubrica` is the backend of a provider-directory application. Users sign up
//! with email-OTP verification or Google federated login, manage a profile with
//! geolocation, and curate a favorites list of service-provider records
//! ("applicants"). An admin frontend submits and browses directory entries over
//! the same REST surface.
//!
//! ## Verification Workflow
//!
//! Signup and password reset are OTP-gated: the server issues a 6-digit code
//! over email together with an opaque session token, keeps the candidate
//! payload in an in-process pending table, and commits it to the database only
//! when the client presents the matching token, email, and code within the
//! 10-minute validity window. Expiry is detected lazily on verify/resend; there
//! is no background sweep, so the pending table is bounded by process lifetime.
//!
//! ## Sessions
//!
//! Successful verification or sign-in issues an HS256 JWT bound to the account
//! id. Protected routes accept `Authorization: Bearer <token>` and reject any
//! malformed, expired, or mis-signed token uniformly with 401.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        // Should be a hex string (full SHA-1 is 40 chars, but could be short)
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
