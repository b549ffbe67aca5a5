//! Bearer session tokens and the authenticated principal.
//!
//! Sessions are stateless HS256 JWTs signed with the shared server secret.
//! Verification failures are never distinguished to the caller: malformed,
//! expired, mis-signed, and absent tokens all collapse to 401.

use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use super::state::AuthConfig;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
}

/// Authenticated user context derived from the bearer token.
#[derive(Clone, Copy, Debug)]
pub struct Principal {
    pub user_id: Uuid,
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(0))
}

/// Sign a bearer token bound to the account identifier.
///
/// # Errors
/// Returns an error if token serialization fails.
pub(crate) fn issue_session_token(config: &AuthConfig, user_id: Uuid) -> anyhow::Result<String> {
    let now = unix_now();
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now,
        exp: now.saturating_add(config.session_ttl_seconds()),
    };
    let key = EncodingKey::from_secret(config.jwt_secret().expose_secret().as_bytes());
    jsonwebtoken::encode(&Header::default(), &claims, &key)
        .map_err(|err| anyhow::anyhow!("failed to sign session token: {err}"))
}

/// Verify signature and expiry, extracting the account identifier.
/// Any failure maps to `None`; the cause is not reported.
pub(crate) fn verify_session_token(config: &AuthConfig, token: &str) -> Option<Uuid> {
    let key = DecodingKey::from_secret(config.jwt_secret().expose_secret().as_bytes());
    let data = jsonwebtoken::decode::<Claims>(token, &key, &Validation::default()).ok()?;
    Uuid::parse_str(&data.claims.sub).ok()
}

/// Resolve the bearer header into a principal, or 401 uniformly.
pub(crate) fn require_auth(
    headers: &HeaderMap,
    config: &AuthConfig,
) -> Result<Principal, StatusCode> {
    let token = extract_bearer_token(headers).ok_or(StatusCode::UNAUTHORIZED)?;
    let user_id = verify_session_token(config, &token).ok_or(StatusCode::UNAUTHORIZED)?;
    Ok(Principal { user_id })
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use secrecy::SecretString;

    fn config(secret: &str) -> AuthConfig {
        AuthConfig::new(SecretString::from(secret))
    }

    #[test]
    fn issued_token_round_trips() {
        let config = config("sekret");
        let user_id = Uuid::new_v4();
        let token = issue_session_token(&config, user_id).expect("token");
        assert_eq!(verify_session_token(&config, &token), Some(user_id));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let user_id = Uuid::new_v4();
        let token = issue_session_token(&config("sekret"), user_id).expect("token");
        assert_eq!(verify_session_token(&config("other"), &token), None);
    }

    #[test]
    fn expired_token_is_rejected() {
        // Negative TTL pushes `exp` beyond the default validation leeway.
        let config = config("sekret").with_session_ttl_seconds(-120);
        let token = issue_session_token(&config, Uuid::new_v4()).expect("token");
        assert_eq!(verify_session_token(&config, &token), None);
    }

    #[test]
    fn malformed_token_is_rejected() {
        assert_eq!(verify_session_token(&config("sekret"), "not-a-jwt"), None);
    }

    #[test]
    fn require_auth_accepts_bearer_header() {
        let config = config("sekret");
        let user_id = Uuid::new_v4();
        let token = issue_session_token(&config, user_id).expect("token");

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).expect("header"),
        );

        let principal = require_auth(&headers, &config).expect("principal");
        assert_eq!(principal.user_id, user_id);
    }

    #[test]
    fn require_auth_is_uniformly_unauthorized() {
        let signer = config("sekret");

        // Missing header.
        assert_eq!(
            require_auth(&HeaderMap::new(), &signer).unwrap_err(),
            StatusCode::UNAUTHORIZED
        );

        // Present but not a bearer token.
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(
            require_auth(&headers, &signer).unwrap_err(),
            StatusCode::UNAUTHORIZED
        );

        // Bearer but signed with another secret.
        let token = issue_session_token(&signer, Uuid::new_v4()).expect("token");
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).expect("header"),
        );
        assert_eq!(
            require_auth(&headers, &config("other")).unwrap_err(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn extract_bearer_token_trims_and_requires_value() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer  abc "));
        assert_eq!(extract_bearer_token(&headers), Some("abc".to_string()));

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(extract_bearer_token(&headers), None);
    }
}
