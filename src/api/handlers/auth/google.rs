//! Federated login via Google ID tokens.
//!
//! Flow Overview: the client obtains an ID token from Google and posts it
//! here. We verify it against Google's `tokeninfo` endpoint, check the token
//! audience against our configured client id, and resolve it to a local
//! account: by `google_id` first, then by email with an idempotent backfill,
//! and finally by creating a fresh pre-verified account.

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use reqwest::Client;
use serde::Deserialize;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use crate::api::handlers::reject;

use super::session::issue_session_token;
use super::state::AuthState;
use super::storage::{self, AccountRecord, InsertOutcome};
use super::types::{GoogleSigninRequest, GoogleSigninResponse};
use super::utils::{generate_placeholder_password, hash_password, normalize_email, valid_email};

const TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

/// Claims asserted by Google for a verified ID token.
#[derive(Debug, Deserialize)]
pub(super) struct GoogleClaims {
    pub(super) sub: String,
    pub(super) aud: String,
    pub(super) email: Option<String>,
    pub(super) name: Option<String>,
}

#[derive(Debug)]
pub(super) enum GoogleVerifyError {
    /// No client id configured; federated login is disabled.
    Disabled,
    /// Google rejected the token or the audience does not match.
    Invalid,
    /// The verification service could not be reached.
    Unavailable,
}

/// Verifies ID tokens against Google's public verification service.
#[derive(Debug)]
pub(crate) struct GoogleVerifier {
    client_id: Option<String>,
}

impl GoogleVerifier {
    #[must_use]
    pub(crate) fn new(client_id: Option<String>) -> Self {
        Self { client_id }
    }

    pub(super) async fn verify(&self, id_token: &str) -> Result<GoogleClaims, GoogleVerifyError> {
        let Some(client_id) = self.client_id.as_deref() else {
            return Err(GoogleVerifyError::Disabled);
        };

        let client = match Client::builder().user_agent(crate::APP_USER_AGENT).build() {
            Ok(client) => client,
            Err(err) => {
                error!("Error creating reqwest client: {err:?}");
                return Err(GoogleVerifyError::Unavailable);
            }
        };

        let response = match client
            .get(TOKENINFO_URL)
            .query(&[("id_token", id_token)])
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                error!("Error validating Google ID token: {err:?}");
                return Err(GoogleVerifyError::Unavailable);
            }
        };

        if !response.status().is_success() {
            error!("Google ID token validation failed: {}", response.status());
            return Err(GoogleVerifyError::Invalid);
        }

        let claims: GoogleClaims = match response.json().await {
            Ok(claims) => claims,
            Err(err) => {
                error!("Error decoding tokeninfo response: {err:?}");
                return Err(GoogleVerifyError::Invalid);
            }
        };

        if !audience_matches(&claims, client_id) {
            error!("Google ID token audience mismatch");
            return Err(GoogleVerifyError::Invalid);
        }

        Ok(claims)
    }
}

pub(super) fn audience_matches(claims: &GoogleClaims, client_id: &str) -> bool {
    claims.aud == client_id
}

/// Federated sign-in. Always concludes by issuing the same bearer token as
/// direct sign-in.
#[utoipa::path(
    post,
    path = "/api/auth/google",
    request_body = GoogleSigninRequest,
    responses(
        (status = 200, description = "Bearer token issued", body = GoogleSigninResponse),
        (status = 400, description = "Invalid payload", body = crate::api::handlers::ErrorResponse),
        (status = 401, description = "Token rejected by Google or audience mismatch", body = crate::api::handlers::ErrorResponse),
        (status = 500, description = "Verification service or persistence failure", body = crate::api::handlers::ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn google_signin(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<GoogleSigninRequest>>,
) -> impl IntoResponse {
    let request: GoogleSigninRequest = match payload {
        Some(Json(payload)) => payload,
        None => return reject(StatusCode::BAD_REQUEST, "Missing payload"),
    };

    let id_token = request.id_token.trim();
    if id_token.is_empty() {
        return reject(StatusCode::BAD_REQUEST, "Missing idToken");
    }

    let claims = match auth_state.google().verify(id_token).await {
        Ok(claims) => claims,
        Err(GoogleVerifyError::Invalid) => {
            return reject(StatusCode::UNAUTHORIZED, "Invalid Google ID token");
        }
        Err(GoogleVerifyError::Disabled | GoogleVerifyError::Unavailable) => {
            return reject(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Server error during Google authentication",
            );
        }
    };

    // Prefer the client-supplied profile fields, falling back to Google's.
    let email = request
        .email
        .or_else(|| claims.email.clone())
        .map(|email| normalize_email(&email))
        .filter(|email| valid_email(email));
    let name = request
        .name
        .or_else(|| claims.name.clone())
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty());

    let account = match resolve_account(&pool, &claims.sub, email.as_deref(), name.as_deref()).await
    {
        Ok(account) => account,
        Err(ResolveError::MissingEmail) => {
            return reject(StatusCode::BAD_REQUEST, "Missing email");
        }
        Err(ResolveError::Storage(err)) => {
            error!("Failed to resolve federated account: {err}");
            return reject(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Server error during Google authentication",
            );
        }
    };

    if !account.is_verified {
        return reject(StatusCode::UNAUTHORIZED, "Please verify your account first");
    }

    match issue_session_token(auth_state.config(), account.id) {
        Ok(token) => (
            StatusCode::OK,
            Json(GoogleSigninResponse {
                token,
                user_id: account.id.to_string(),
                name: account.name,
                email: account.email,
            }),
        )
            .into_response(),
        Err(err) => {
            error!("Failed to issue session token: {err}");
            reject(StatusCode::INTERNAL_SERVER_ERROR, "Server error")
        }
    }
}

enum ResolveError {
    /// A brand-new federated account needs an email and none was asserted.
    MissingEmail,
    Storage(anyhow::Error),
}

/// Resolution order: federated id, then email backfill, then fresh account.
async fn resolve_account(
    pool: &PgPool,
    google_id: &str,
    email: Option<&str>,
    name: Option<&str>,
) -> Result<AccountRecord, ResolveError> {
    if let Some(account) = storage::lookup_by_google_id(pool, google_id)
        .await
        .map_err(ResolveError::Storage)?
    {
        return Ok(account);
    }

    if let Some(email) = email {
        if let Some(account) = storage::lookup_by_email(pool, email)
            .await
            .map_err(ResolveError::Storage)?
        {
            if account.google_id.is_none() {
                storage::link_google_id(pool, account.id, google_id)
                    .await
                    .map_err(ResolveError::Storage)?;
            }
            return Ok(account);
        }
    }

    let Some(email) = email else {
        return Err(ResolveError::MissingEmail);
    };
    let name = name.unwrap_or(email);

    let placeholder = generate_placeholder_password()
        .and_then(|password| hash_password(&password))
        .map_err(ResolveError::Storage)?;

    match storage::insert_google_account(pool, name, email, google_id, &placeholder)
        .await
        .map_err(ResolveError::Storage)?
    {
        InsertOutcome::Created(user_id) => Ok(AccountRecord {
            id: user_id,
            name: name.to_string(),
            email: email.to_string(),
            password_hash: Some(placeholder),
            is_verified: true,
            google_id: Some(google_id.to_string()),
        }),
        // Raced another federated login for the same account; re-read it.
        InsertOutcome::Conflict => storage::lookup_by_google_id(pool, google_id)
            .await
            .map_err(ResolveError::Storage)?
            .ok_or_else(|| {
                ResolveError::Storage(anyhow::anyhow!(
                    "federated account conflict without matching record"
                ))
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::super::state::{AuthConfig, AuthState};
    use super::*;
    use anyhow::Result;
    use crate::api::email::Mailer;
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;

    fn auth_state() -> Arc<AuthState> {
        let config = AuthConfig::new(SecretString::from("sekret"));
        Arc::new(AuthState::new(
            config,
            Mailer::log("no-reply@rubrica.dev".to_string()),
        ))
    }

    #[tokio::test]
    async fn google_signin_missing_payload() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = google_signin(Extension(pool), Extension(auth_state()), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn google_signin_blank_token_is_bad_request() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = google_signin(
            Extension(pool),
            Extension(auth_state()),
            Some(Json(GoogleSigninRequest {
                id_token: "  ".to_string(),
                name: None,
                email: None,
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn google_signin_without_client_id_is_server_error() -> Result<()> {
        // Federation disabled: no --google-client-id configured.
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = google_signin(
            Extension(pool),
            Extension(auth_state()),
            Some(Json(GoogleSigninRequest {
                id_token: "tok".to_string(),
                name: None,
                email: None,
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        Ok(())
    }

    #[test]
    fn audience_check_requires_exact_match() {
        let claims = GoogleClaims {
            sub: "sub".to_string(),
            aud: "client-id.example".to_string(),
            email: None,
            name: None,
        };
        assert!(audience_matches(&claims, "client-id.example"));
        assert!(!audience_matches(&claims, "other-client.example"));
    }

    #[tokio::test]
    async fn verifier_without_client_id_reports_disabled() {
        let verifier = GoogleVerifier::new(None);
        assert!(matches!(
            verifier.verify("tok").await,
            Err(GoogleVerifyError::Disabled)
        ));
    }
}
