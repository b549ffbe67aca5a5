//! Authenticated self-service profile endpoints.
//!
//! Flow Overview:
//! 1) Authenticate via bearer token.
//! 2) Check the path id against the caller (all routes here are self-scoped).
//! 3) Apply allow-listed updates; credential and verification fields are
//!    never writable through this surface.

use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, PgPool, Row};
use std::sync::Arc;
use tracing::{error, Instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use super::auth::session::require_auth;
use super::auth::utils::{hash_password, is_unique_violation, verify_password};
use super::auth::AuthState;
use super::favorites::fetch_favorites;
use super::{applicants::ApplicantResponse, reject, Location};

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub location: Option<Location>,
    #[serde(rename = "isVerified")]
    pub is_verified: bool,
    pub favorites: Vec<ApplicantResponse>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UserUpdateRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LocationUpdateRequest {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LocationResponse {
    pub message: String,
    pub location: Location,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PasswordChangeRequest {
    #[serde(rename = "currentPassword")]
    pub current_password: Option<String>,
    #[serde(rename = "newPassword")]
    pub new_password: String,
}

/// Parse the self-scoped path id, enforcing that it names the caller.
fn self_scoped_id(
    id: &str,
    headers: &HeaderMap,
    auth_state: &AuthState,
    denial: &'static str,
) -> Result<Uuid, axum::response::Response> {
    let principal = match require_auth(headers, auth_state.config()) {
        Ok(principal) => principal,
        Err(status) => return Err(status.into_response()),
    };
    let Ok(user_id) = Uuid::parse_str(id.trim()) else {
        return Err(reject(StatusCode::BAD_REQUEST, "Invalid user id"));
    };
    if principal.user_id != user_id {
        return Err(reject(StatusCode::FORBIDDEN, denial));
    }
    Ok(user_id)
}

/// Profile read with favorites populated.
#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(("id" = String, Path, description = "Account id; must equal the caller")),
    responses(
        (status = 200, description = "Profile with populated favorites", body = UserResponse),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 403, description = "Path id does not match the caller", body = super::ErrorResponse),
        (status = 404, description = "Account not found", body = super::ErrorResponse)
    ),
    tag = "users"
)]
pub async fn get_user(
    Path(id): Path<String>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let user_id = match self_scoped_id(&id, &headers, &auth_state, "Not authorized to view this user")
    {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };

    match load_profile(&pool, user_id).await {
        Ok(Some(profile)) => (StatusCode::OK, Json(profile)).into_response(),
        Ok(None) => reject(StatusCode::NOT_FOUND, "User not found"),
        Err(err) => {
            error!("Failed to fetch user profile: {err}");
            reject(StatusCode::INTERNAL_SERVER_ERROR, "Error fetching user")
        }
    }
}

/// Allow-listed profile update. Credential, verification, and federation
/// fields are not reachable from here.
#[utoipa::path(
    put,
    path = "/api/users/{id}",
    params(("id" = String, Path, description = "Account id; must equal the caller")),
    request_body = UserUpdateRequest,
    responses(
        (status = 200, description = "Updated profile", body = UserResponse),
        (status = 400, description = "No updates provided or invalid payload", body = super::ErrorResponse),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 403, description = "Path id does not match the caller", body = super::ErrorResponse),
        (status = 404, description = "Account not found", body = super::ErrorResponse),
        (status = 409, description = "Phone already registered", body = super::ErrorResponse)
    ),
    tag = "users"
)]
pub async fn update_user(
    Path(id): Path<String>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<UserUpdateRequest>>,
) -> impl IntoResponse {
    let user_id = match self_scoped_id(
        &id,
        &headers,
        &auth_state,
        "Not authorized to update this user",
    ) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };

    let request: UserUpdateRequest = match payload {
        Some(Json(payload)) => payload,
        None => return reject(StatusCode::BAD_REQUEST, "Missing payload"),
    };

    let name = normalize_optional(request.name);
    let phone = normalize_optional(request.phone);
    let address = normalize_optional(request.address);

    if name.is_none() && phone.is_none() && address.is_none() {
        return reject(StatusCode::BAD_REQUEST, "No updates provided");
    }

    match apply_profile_update(&pool, user_id, name, phone, address).await {
        Ok(true) => match load_profile(&pool, user_id).await {
            Ok(Some(profile)) => (StatusCode::OK, Json(profile)).into_response(),
            Ok(None) => reject(StatusCode::NOT_FOUND, "User not found"),
            Err(err) => {
                error!("Failed to reload user profile: {err}");
                reject(StatusCode::INTERNAL_SERVER_ERROR, "Error updating user")
            }
        },
        Ok(false) => reject(StatusCode::NOT_FOUND, "User not found"),
        Err(err) if is_unique_violation(&err) => {
            reject(StatusCode::CONFLICT, "Phone number already registered")
        }
        Err(err) => {
            error!("Failed to update user profile: {err}");
            reject(StatusCode::INTERNAL_SERVER_ERROR, "Error updating user")
        }
    }
}

/// Geolocation update.
#[utoipa::path(
    put,
    path = "/api/users/{id}/location",
    params(("id" = String, Path, description = "Account id; must equal the caller")),
    request_body = LocationUpdateRequest,
    responses(
        (status = 200, description = "Location stored", body = LocationResponse),
        (status = 400, description = "Invalid payload", body = super::ErrorResponse),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 403, description = "Path id does not match the caller", body = super::ErrorResponse),
        (status = 404, description = "Account not found", body = super::ErrorResponse)
    ),
    tag = "users"
)]
pub async fn update_location(
    Path(id): Path<String>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LocationUpdateRequest>>,
) -> impl IntoResponse {
    let user_id = match self_scoped_id(
        &id,
        &headers,
        &auth_state,
        "Not authorized to update this user",
    ) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };

    let request: LocationUpdateRequest = match payload {
        Some(Json(payload)) => payload,
        None => return reject(StatusCode::BAD_REQUEST, "Missing payload"),
    };

    match apply_location_update(&pool, user_id, request.latitude, request.longitude).await {
        Ok(true) => (
            StatusCode::OK,
            Json(LocationResponse {
                message: "Location updated successfully".to_string(),
                location: Location {
                    latitude: request.latitude,
                    longitude: request.longitude,
                },
            }),
        )
            .into_response(),
        Ok(false) => reject(StatusCode::NOT_FOUND, "User not found"),
        Err(err) => {
            error!("Failed to update location: {err}");
            reject(StatusCode::INTERNAL_SERVER_ERROR, "Error updating location")
        }
    }
}

/// Credential change gated on the current password when one exists.
/// Federation-only accounts may set their first password without the check.
#[utoipa::path(
    put,
    path = "/api/users/{id}/password",
    params(("id" = String, Path, description = "Account id; must equal the caller")),
    request_body = PasswordChangeRequest,
    responses(
        (status = 200, description = "Password replaced", body = super::MessageResponse),
        (status = 400, description = "Current password incorrect or invalid payload", body = super::ErrorResponse),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 403, description = "Path id does not match the caller", body = super::ErrorResponse),
        (status = 404, description = "Account not found", body = super::ErrorResponse)
    ),
    tag = "users"
)]
pub async fn change_password(
    Path(id): Path<String>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<PasswordChangeRequest>>,
) -> impl IntoResponse {
    let user_id = match self_scoped_id(
        &id,
        &headers,
        &auth_state,
        "Not authorized to update this user",
    ) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };

    let request: PasswordChangeRequest = match payload {
        Some(Json(payload)) => payload,
        None => return reject(StatusCode::BAD_REQUEST, "Missing payload"),
    };

    if request.new_password.is_empty() {
        return reject(StatusCode::BAD_REQUEST, "Missing newPassword");
    }

    let stored_hash = match fetch_password_hash(&pool, user_id).await {
        Ok(Some(hash)) => hash,
        Ok(None) => return reject(StatusCode::NOT_FOUND, "User not found"),
        Err(err) => {
            error!("Failed to fetch password hash: {err}");
            return reject(StatusCode::INTERNAL_SERVER_ERROR, "Error updating password");
        }
    };

    if let Some(hash) = stored_hash.as_deref() {
        let current = request.current_password.as_deref().unwrap_or_default();
        if !verify_password(current, hash) {
            return reject(StatusCode::BAD_REQUEST, "Current password is incorrect");
        }
    }

    let new_hash = match hash_password(&request.new_password) {
        Ok(hash) => hash,
        Err(err) => {
            error!("Failed to hash password: {err}");
            return reject(StatusCode::INTERNAL_SERVER_ERROR, "Error updating password");
        }
    };

    match super::auth::storage::overwrite_password_hash(&pool, user_id, &new_hash).await {
        Ok(true) => {
            super::acknowledge(StatusCode::OK, "Password updated successfully")
        }
        Ok(false) => reject(StatusCode::NOT_FOUND, "User not found"),
        Err(err) => {
            error!("Failed to update password: {err}");
            reject(StatusCode::INTERNAL_SERVER_ERROR, "Error updating password")
        }
    }
}

struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    phone: Option<String>,
    address: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    is_verified: bool,
}

fn user_from_row(row: &PgRow) -> UserRow {
    UserRow {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        phone: row.get("phone"),
        address: row.get("address"),
        latitude: row.get("latitude"),
        longitude: row.get("longitude"),
        is_verified: row.get("is_verified"),
    }
}

fn location_of(row: &UserRow) -> Option<Location> {
    match (row.latitude, row.longitude) {
        (Some(latitude), Some(longitude)) => Some(Location {
            latitude,
            longitude,
        }),
        _ => None,
    }
}

/// Fetch the profile plus populated favorites.
async fn load_profile(pool: &PgPool, user_id: Uuid) -> Result<Option<UserResponse>, sqlx::Error> {
    let query = "SELECT id, name, email, phone, address, latitude, longitude, is_verified \
                 FROM users WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .fetch_optional(pool)
        .instrument(span)
        .await?;
    let Some(row) = row.as_ref().map(user_from_row) else {
        return Ok(None);
    };

    let favorites = fetch_favorites(pool, user_id).await?;

    Ok(Some(UserResponse {
        id: row.id.to_string(),
        location: location_of(&row),
        name: row.name,
        email: row.email,
        phone: row.phone,
        address: row.address,
        is_verified: row.is_verified,
        favorites,
    }))
}

async fn apply_profile_update(
    pool: &PgPool,
    user_id: Uuid,
    name: Option<String>,
    phone: Option<String>,
    address: Option<String>,
) -> Result<bool, sqlx::Error> {
    let query = r"
        UPDATE users
        SET
            name = COALESCE($1, name),
            phone = COALESCE($2, phone),
            address = COALESCE($3, address)
        WHERE id = $4
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(name)
        .bind(phone)
        .bind(address)
        .bind(user_id)
        .execute(pool)
        .instrument(span)
        .await?;
    Ok(result.rows_affected() > 0)
}

async fn apply_location_update(
    pool: &PgPool,
    user_id: Uuid,
    latitude: f64,
    longitude: f64,
) -> Result<bool, sqlx::Error> {
    let query = "UPDATE users SET latitude = $1, longitude = $2 WHERE id = $3";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(latitude)
        .bind(longitude)
        .bind(user_id)
        .execute(pool)
        .instrument(span)
        .await?;
    Ok(result.rows_affected() > 0)
}

async fn fetch_password_hash(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Option<Option<String>>, sqlx::Error> {
    let query = "SELECT password_hash FROM users WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .fetch_optional(pool)
        .instrument(span)
        .await?;
    Ok(row.map(|row| row.get("password_hash")))
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::super::auth::{session::issue_session_token, AuthConfig, AuthState};
    use super::*;
    use crate::api::email::Mailer;
    use anyhow::Result;
    use axum::http::HeaderValue;
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;

    fn auth_state() -> Arc<AuthState> {
        let config = AuthConfig::new(SecretString::from("sekret"));
        Arc::new(AuthState::new(
            config,
            Mailer::log("no-reply@rubrica.dev".to_string()),
        ))
    }

    fn bearer_headers(state: &AuthState, user_id: Uuid) -> HeaderMap {
        let token = issue_session_token(state.config(), user_id).expect("token");
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).expect("header"),
        );
        headers
    }

    #[tokio::test]
    async fn get_user_without_token_is_unauthorized() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = get_user(
            Path(Uuid::new_v4().to_string()),
            HeaderMap::new(),
            Extension(pool),
            Extension(auth_state()),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn get_user_for_other_account_is_forbidden() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let state = auth_state();
        let headers = bearer_headers(&state, Uuid::new_v4());
        let response = get_user(
            Path(Uuid::new_v4().to_string()),
            headers,
            Extension(pool),
            Extension(state),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        Ok(())
    }

    #[tokio::test]
    async fn get_user_with_malformed_id_is_bad_request() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let state = auth_state();
        let headers = bearer_headers(&state, Uuid::new_v4());
        let response = get_user(
            Path("not-a-uuid".to_string()),
            headers,
            Extension(pool),
            Extension(state),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn update_user_with_empty_update_is_bad_request() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let state = auth_state();
        let user_id = Uuid::new_v4();
        let headers = bearer_headers(&state, user_id);
        let response = update_user(
            Path(user_id.to_string()),
            headers,
            Extension(pool),
            Extension(state),
            Some(Json(UserUpdateRequest {
                name: None,
                phone: Some("  ".to_string()),
                address: None,
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn change_password_requires_new_password() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let state = auth_state();
        let user_id = Uuid::new_v4();
        let headers = bearer_headers(&state, user_id);
        let response = change_password(
            Path(user_id.to_string()),
            headers,
            Extension(pool),
            Extension(state),
            Some(Json(PasswordChangeRequest {
                current_password: Some("old".to_string()),
                new_password: String::new(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[test]
    fn update_request_rejects_unknown_fields() {
        let result: std::result::Result<UserUpdateRequest, _> =
            serde_json::from_value(serde_json::json!({ "isVerified": true }));
        assert!(result.is_err());
    }
}
