//! Password sign-in by phone or email.

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use crate::api::handlers::reject;

use super::session::issue_session_token;
use super::state::AuthState;
use super::storage::{self, AccountRecord};
use super::types::{EmailSigninRequest, SessionTokenResponse, SigninRequest};
use super::utils::{normalize_email, verify_password};

/// Shared tail of both sign-in variants: verification gate, credential check,
/// token issuance. Lookup misses and bad passwords collapse to the same
/// rejection so callers cannot probe which accounts exist.
fn authenticate(
    auth_state: &AuthState,
    account: Option<AccountRecord>,
    password: &str,
) -> axum::response::Response {
    let Some(account) = account else {
        return reject(StatusCode::UNAUTHORIZED, "Invalid credentials");
    };

    if !account.is_verified {
        return reject(StatusCode::UNAUTHORIZED, "Please verify your account first");
    }

    // Accounts created through federation have no usable credential hash.
    let Some(password_hash) = account.password_hash.as_deref() else {
        return reject(StatusCode::UNAUTHORIZED, "Invalid credentials");
    };
    if !verify_password(password, password_hash) {
        return reject(StatusCode::UNAUTHORIZED, "Invalid credentials");
    }

    match issue_session_token(auth_state.config(), account.id) {
        Ok(token) => (
            StatusCode::OK,
            Json(SessionTokenResponse {
                token,
                user_id: account.id.to_string(),
            }),
        )
            .into_response(),
        Err(err) => {
            error!("Failed to issue session token: {err}");
            reject(StatusCode::INTERNAL_SERVER_ERROR, "Server error")
        }
    }
}

/// Sign in with phone + password.
#[utoipa::path(
    post,
    path = "/api/auth/signin",
    request_body = SigninRequest,
    responses(
        (status = 200, description = "Bearer token issued", body = SessionTokenResponse),
        (status = 400, description = "Invalid payload", body = crate::api::handlers::ErrorResponse),
        (status = 401, description = "Unknown account, wrong password, or unverified", body = crate::api::handlers::ErrorResponse),
        (status = 500, description = "Persistence failure", body = crate::api::handlers::ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn signin(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<SigninRequest>>,
) -> impl IntoResponse {
    let request: SigninRequest = match payload {
        Some(Json(payload)) => payload,
        None => return reject(StatusCode::BAD_REQUEST, "Missing payload"),
    };

    let phone = request.phone.trim();
    if phone.is_empty() {
        return reject(StatusCode::BAD_REQUEST, "Missing phone");
    }

    match storage::lookup_by_phone(&pool, phone).await {
        Ok(account) => authenticate(&auth_state, account, &request.password),
        Err(err) => {
            error!("Failed to lookup account by phone: {err}");
            reject(StatusCode::INTERNAL_SERVER_ERROR, "Server error")
        }
    }
}

/// Sign in with email + password.
#[utoipa::path(
    post,
    path = "/api/auth/signin-email",
    request_body = EmailSigninRequest,
    responses(
        (status = 200, description = "Bearer token issued", body = SessionTokenResponse),
        (status = 400, description = "Invalid payload", body = crate::api::handlers::ErrorResponse),
        (status = 401, description = "Unknown account, wrong password, or unverified", body = crate::api::handlers::ErrorResponse),
        (status = 500, description = "Persistence failure", body = crate::api::handlers::ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn signin_email(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<EmailSigninRequest>>,
) -> impl IntoResponse {
    let request: EmailSigninRequest = match payload {
        Some(Json(payload)) => payload,
        None => return reject(StatusCode::BAD_REQUEST, "Missing payload"),
    };

    let email = normalize_email(&request.email);
    if email.is_empty() {
        return reject(StatusCode::BAD_REQUEST, "Missing email");
    }

    match storage::lookup_by_email(&pool, &email).await {
        Ok(account) => authenticate(&auth_state, account, &request.password),
        Err(err) => {
            error!("Failed to lookup account by email: {err}");
            reject(StatusCode::INTERNAL_SERVER_ERROR, "Server error")
        }
    }
}
