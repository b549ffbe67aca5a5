//! Signup and OTP verification endpoints.

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use crate::api::email;
use crate::api::handlers::reject;

use super::pending::{PendingPayload, SignupCandidate, VerifyError};
use super::session::issue_session_token;
use super::state::AuthState;
use super::storage::{self, InsertOutcome};
use super::types::{
    ResendOtpRequest, SessionTokenResponse, SignupRequest, OtpIssuedResponse, VerifyOtpRequest,
};
use super::utils::{generate_otp, generate_temp_token, hash_password, normalize_email, valid_email};

/// Issue an OTP for a new-account candidate.
///
/// The candidate is parked in the pending table; nothing touches the `users`
/// table until the OTP is confirmed.
#[utoipa::path(
    post,
    path = "/api/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "OTP issued, session token returned", body = OtpIssuedResponse),
        (status = 400, description = "Invalid payload", body = crate::api::handlers::ErrorResponse),
        (status = 409, description = "Duplicate email or phone", body = crate::api::handlers::ErrorResponse),
        (status = 500, description = "Persistence or email delivery failure", body = crate::api::handlers::ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn signup(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<SignupRequest>>,
) -> impl IntoResponse {
    let request: SignupRequest = match payload {
        Some(Json(payload)) => payload,
        None => return reject(StatusCode::BAD_REQUEST, "Missing payload"),
    };

    let name = request.name.trim().to_string();
    if name.is_empty() {
        return reject(StatusCode::BAD_REQUEST, "Missing name");
    }
    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return reject(StatusCode::BAD_REQUEST, "Invalid email");
    }
    if request.password.is_empty() {
        return reject(StatusCode::BAD_REQUEST, "Missing password");
    }
    let phone = normalize_optional(request.phone);
    let address = normalize_optional(request.address);

    match storage::email_taken(&pool, &email).await {
        Ok(true) => {
            return reject(StatusCode::CONFLICT, "User already exists with this email");
        }
        Ok(false) => {}
        Err(err) => {
            error!("Failed to check email uniqueness: {err}");
            return reject(StatusCode::INTERNAL_SERVER_ERROR, "Server error");
        }
    }

    if let Some(phone) = &phone {
        match storage::phone_taken(&pool, phone).await {
            Ok(true) => {
                return reject(StatusCode::CONFLICT, "Phone number already registered");
            }
            Ok(false) => {}
            Err(err) => {
                error!("Failed to check phone uniqueness: {err}");
                return reject(StatusCode::INTERNAL_SERVER_ERROR, "Server error");
            }
        }
    }

    let otp = generate_otp();
    let temp_token = match generate_temp_token() {
        Ok(token) => token,
        Err(err) => {
            error!("Failed to generate verification session token: {err}");
            return reject(StatusCode::INTERNAL_SERVER_ERROR, "Server error");
        }
    };

    auth_state
        .pending()
        .insert(
            temp_token.clone(),
            email.clone(),
            otp.clone(),
            PendingPayload::Signup(SignupCandidate {
                name,
                email: email.clone(),
                phone,
                address,
                password: request.password,
            }),
        )
        .await;

    // A failed send leaves the pending record in place; the returned session
    // token is still valid for resend.
    let message = email::verification_email(&email, &otp, auth_state.config().otp_ttl_minutes());
    if let Err(err) = auth_state.mailer().send(&message).await {
        error!("Failed to send verification email: {err}");
        return reject(StatusCode::INTERNAL_SERVER_ERROR, "Server error");
    }

    (
        StatusCode::CREATED,
        Json(OtpIssuedResponse {
            message: "OTP sent to your email for verification".to_string(),
            temp_token,
        }),
    )
        .into_response()
}

/// Commit a signup candidate into an account.
#[utoipa::path(
    post,
    path = "/api/auth/verify-otp",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Account created, bearer token returned", body = SessionTokenResponse),
        (status = 400, description = "Invalid payload", body = crate::api::handlers::ErrorResponse),
        (status = 401, description = "Session unknown, expired, or OTP mismatch", body = crate::api::handlers::ErrorResponse),
        (status = 409, description = "Account already exists", body = crate::api::handlers::ErrorResponse),
        (status = 500, description = "Persistence failure", body = crate::api::handlers::ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn verify_otp(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<VerifyOtpRequest>>,
) -> impl IntoResponse {
    let request: VerifyOtpRequest = match payload {
        Some(Json(payload)) => payload,
        None => return reject(StatusCode::BAD_REQUEST, "Missing payload"),
    };

    let email = normalize_email(&request.email);
    let candidate = match auth_state
        .pending()
        .verify(&request.temp_token, &email, request.otp.trim())
        .await
    {
        Ok(PendingPayload::Signup(candidate)) => candidate,
        // A reset session token presented here is treated like any other
        // unknown session.
        Ok(PendingPayload::PasswordReset { .. }) | Err(VerifyError::UnknownSession) => {
            return reject(
                StatusCode::UNAUTHORIZED,
                "Invalid or expired verification session",
            );
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

    let password_hash = match hash_password(&candidate.password) {
        Ok(hash) => hash,
        Err(err) => {
            error!("Failed to hash password: {err}");
            return reject(StatusCode::INTERNAL_SERVER_ERROR, "Server error");
        }
    };

    match storage::insert_verified_account(&pool, &candidate, &password_hash).await {
        Ok(InsertOutcome::Created(user_id)) => {
            auth_state.pending().discard(&request.temp_token).await;
            match issue_session_token(auth_state.config(), user_id) {
                Ok(token) => (
                    StatusCode::OK,
                    Json(SessionTokenResponse {
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
        Ok(InsertOutcome::Conflict) => {
            // Lost the race against another signup for the same email/phone.
            auth_state.pending().discard(&request.temp_token).await;
            reject(StatusCode::CONFLICT, "User already exists with this email")
        }
        Err(err) => {
            error!("Failed to create account: {err}");
            reject(StatusCode::INTERNAL_SERVER_ERROR, "Server error")
        }
    }
}

/// Refresh the OTP on a live verification session. The session token is
/// reused, not reissued.
#[utoipa::path(
    post,
    path = "/api/auth/resend-otp",
    request_body = ResendOtpRequest,
    responses(
        (status = 200, description = "OTP regenerated and re-sent", body = crate::api::handlers::MessageResponse),
        (status = 400, description = "Invalid payload", body = crate::api::handlers::ErrorResponse),
        (status = 401, description = "Session unknown or email mismatch", body = crate::api::handlers::ErrorResponse),
        (status = 500, description = "Email delivery failure", body = crate::api::handlers::ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn resend_otp(
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<ResendOtpRequest>>,
) -> impl IntoResponse {
    let request: ResendOtpRequest = match payload {
        Some(Json(payload)) => payload,
        None => return reject(StatusCode::BAD_REQUEST, "Missing payload"),
    };

    let email = normalize_email(&request.email);
    let otp = generate_otp();
    if !auth_state
        .pending()
        .refresh(&request.temp_token, &email, otp.clone())
        .await
    {
        return reject(StatusCode::UNAUTHORIZED, "Invalid session");
    }

    let message =
        email::verification_resent_email(&email, &otp, auth_state.config().otp_ttl_minutes());
    if let Err(err) = auth_state.mailer().send(&message).await {
        error!("Failed to resend verification email: {err}");
        return reject(StatusCode::INTERNAL_SERVER_ERROR, "Server error");
    }

    crate::api::handlers::acknowledge(StatusCode::OK, "OTP resent successfully")
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
