//! OTP-gated password reset endpoints.

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use crate::api::email;
use crate::api::handlers::reject;

use super::pending::{PendingPayload, VerifyError};
use super::session::issue_session_token;
use super::state::AuthState;
use super::storage;
use super::types::{ForgotPasswordRequest, ResetPasswordRequest, ResetPasswordResponse, OtpIssuedResponse};
use super::utils::{generate_otp, generate_temp_token, hash_password, normalize_email, valid_email};

/// Issue a reset OTP for an existing account.
#[utoipa::path(
    post,
    path = "/api/auth/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "OTP issued, session token returned", body = OtpIssuedResponse),
        (status = 400, description = "Invalid payload", body = crate::api::handlers::ErrorResponse),
        (status = 404, description = "No account for this email", body = crate::api::handlers::ErrorResponse),
        (status = 500, description = "Persistence or email delivery failure", body = crate::api::handlers::ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn forgot_password(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<ForgotPasswordRequest>>,
) -> impl IntoResponse {
    let request: ForgotPasswordRequest = match payload {
        Some(Json(payload)) => payload,
        None => return reject(StatusCode::BAD_REQUEST, "Missing payload"),
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return reject(StatusCode::BAD_REQUEST, "Invalid email");
    }

    let account = match storage::lookup_by_email(&pool, &email).await {
        Ok(Some(account)) => account,
        Ok(None) => {
            return reject(StatusCode::NOT_FOUND, "User not found with this email");
        }
        Err(err) => {
            error!("Failed to lookup account by email: {err}");
            return reject(StatusCode::INTERNAL_SERVER_ERROR, "Server error");
        }
    };

    let otp = generate_otp();
    let temp_token = match generate_temp_token() {
        Ok(token) => token,
        Err(err) => {
            error!("Failed to generate reset session token: {err}");
            return reject(StatusCode::INTERNAL_SERVER_ERROR, "Server error");
        }
    };

    auth_state
        .pending()
        .insert(
            temp_token.clone(),
            email.clone(),
            otp.clone(),
            PendingPayload::PasswordReset {
                user_id: account.id,
            },
        )
        .await;

    // Same known gap as signup: a failed send leaves the pending record alive.
    let message = email::password_reset_email(&email, &otp, auth_state.config().otp_ttl_minutes());
    if let Err(err) = auth_state.mailer().send(&message).await {
        error!("Failed to send password reset email: {err}");
        return reject(StatusCode::INTERNAL_SERVER_ERROR, "Server error");
    }

    (
        StatusCode::OK,
        Json(OtpIssuedResponse {
            message: "OTP sent to your email for password reset".to_string(),
            temp_token,
        }),
    )
        .into_response()
}

/// Commit a password reset once the OTP checks out.
#[utoipa::path(
    post,
    path = "/api/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Credential replaced, bearer token returned", body = ResetPasswordResponse),
        (status = 400, description = "Invalid payload", body = crate::api::handlers::ErrorResponse),
        (status = 401, description = "Session unknown, expired, or OTP mismatch", body = crate::api::handlers::ErrorResponse),
        (status = 404, description = "Account no longer exists", body = crate::api::handlers::ErrorResponse),
        (status = 500, description = "Persistence failure", body = crate::api::handlers::ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn reset_password(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<ResetPasswordRequest>>,
) -> impl IntoResponse {
    let request: ResetPasswordRequest = match payload {
        Some(Json(payload)) => payload,
        None => return reject(StatusCode::BAD_REQUEST, "Missing payload"),
    };

    if request.new_password.is_empty() {
        return reject(StatusCode::BAD_REQUEST, "Missing newPassword");
    }

    let email = normalize_email(&request.email);
    let user_id = match auth_state
        .pending()
        .verify(&request.temp_token, &email, request.otp.trim())
        .await
    {
        Ok(PendingPayload::PasswordReset { user_id }) => user_id,
        // A signup session token presented here is treated like any other
        // unknown session.
        Ok(PendingPayload::Signup(_)) | Err(VerifyError::UnknownSession) => {
            return reject(StatusCode::UNAUTHORIZED, "Invalid or expired reset session");
        }
        Err(VerifyError::Expired) => {
            return reject(
                StatusCode::UNAUTHORIZED,
                "OTP has expired. Please request a new one",
            );
        }
        Err(VerifyError::Mismatch) => {
            return reject(StatusCode::UNAUTHORIZED, "Invalid OTP");
        }
    };

    let password_hash = match hash_password(&request.new_password) {
        Ok(hash) => hash,
        Err(err) => {
            error!("Failed to hash password: {err}");
            return reject(StatusCode::INTERNAL_SERVER_ERROR, "Server error");
        }
    };

    match storage::overwrite_password_hash(&pool, user_id, &password_hash).await {
        Ok(true) => {
            auth_state.pending().discard(&request.temp_token).await;
            match issue_session_token(auth_state.config(), user_id) {
                Ok(token) => (
                    StatusCode::OK,
                    Json(ResetPasswordResponse {
                        message: "Password reset successful".to_string(),
                        token,
                        user_id: user_id.to_string(),
                    }),
                )
                    .into_response(),
                Err(err) => {
                    error!("Failed to issue session token: {err}");
                    reject(StatusCode::INTERNAL_SERVER_ERROR, "Server error")
                }
            }
        }
        Ok(false) => {
            // The target account disappeared while the OTP was outstanding.
            auth_state.pending().discard(&request.temp_token).await;
            reject(StatusCode::NOT_FOUND, "User not found")
        }
        Err(err) => {
            error!("Failed to overwrite password hash: {err}");
            reject(StatusCode::INTERNAL_SERVER_ERROR, "Server error")
        }
    }
}
