//! Favorites management: a per-account ordered set of directory entries.
//!
//! Adding an existing favorite is a no-op so the set stays unique; removal of
//! the underlying directory entry cascades from the directory delete handler.

use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tracing::{error, Instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use super::applicants::{applicant_from_row, ApplicantResponse};
use super::auth::session::require_auth;
use super::auth::AuthState;
use super::reject;

#[derive(Debug, Deserialize, ToSchema)]
pub struct FavoriteAddRequest {
    #[serde(rename = "applicantId")]
    pub applicant_id: String,
}

/// Response for mutations: acknowledgement plus the updated id set.
#[derive(Debug, Serialize, ToSchema)]
pub struct FavoriteIdsResponse {
    pub message: String,
    pub favorites: Vec<String>,
}

/// Response for reads: favorites populated with their directory entries.
#[derive(Debug, Serialize, ToSchema)]
pub struct FavoritesListResponse {
    pub favorites: Vec<ApplicantResponse>,
}

fn self_scoped_id(
    id: &str,
    headers: &HeaderMap,
    auth_state: &AuthState,
) -> Result<Uuid, axum::response::Response> {
    let principal = match require_auth(headers, auth_state.config()) {
        Ok(principal) => principal,
        Err(status) => return Err(status.into_response()),
    };
    let Ok(user_id) = Uuid::parse_str(id.trim()) else {
        return Err(reject(StatusCode::BAD_REQUEST, "Invalid user id"));
    };
    if principal.user_id != user_id {
        return Err(reject(
            StatusCode::FORBIDDEN,
            "Not authorized to update favorites",
        ));
    }
    Ok(user_id)
}

/// Add a directory entry to the caller's favorites; duplicates are no-ops.
#[utoipa::path(
    post,
    path = "/api/users/{id}/favorites",
    params(("id" = String, Path, description = "Account id; must equal the caller")),
    request_body = FavoriteAddRequest,
    responses(
        (status = 200, description = "Favorite added (or already present)", body = FavoriteIdsResponse),
        (status = 400, description = "Invalid payload", body = super::ErrorResponse),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 403, description = "Path id does not match the caller", body = super::ErrorResponse),
        (status = 404, description = "Account or applicant not found", body = super::ErrorResponse)
    ),
    tag = "users"
)]
pub async fn add_favorite(
    Path(id): Path<String>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<FavoriteAddRequest>>,
) -> impl IntoResponse {
    let user_id = match self_scoped_id(&id, &headers, &auth_state) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };

    let request: FavoriteAddRequest = match payload {
        Some(Json(payload)) => payload,
        None => return reject(StatusCode::BAD_REQUEST, "Missing payload"),
    };
    let Ok(applicant_id) = Uuid::parse_str(request.applicant_id.trim()) else {
        return reject(StatusCode::BAD_REQUEST, "Invalid applicant id");
    };

    match user_exists(&pool, user_id).await {
        Ok(true) => {}
        Ok(false) => return reject(StatusCode::NOT_FOUND, "User not found"),
        Err(err) => {
            error!("Failed to check user existence: {err}");
            return reject(StatusCode::INTERNAL_SERVER_ERROR, "Failed to add favorite");
        }
    }

    match applicant_exists(&pool, applicant_id).await {
        Ok(true) => {}
        Ok(false) => return reject(StatusCode::NOT_FOUND, "Applicant not found"),
        Err(err) => {
            error!("Failed to check applicant existence: {err}");
            return reject(StatusCode::INTERNAL_SERVER_ERROR, "Failed to add favorite");
        }
    }

    if let Err(err) = insert_favorite(&pool, user_id, applicant_id).await {
        error!("Failed to add favorite: {err}");
        return reject(StatusCode::INTERNAL_SERVER_ERROR, "Failed to add favorite");
    }

    match list_favorite_ids(&pool, user_id).await {
        Ok(favorites) => (
            StatusCode::OK,
            Json(FavoriteIdsResponse {
                message: "Favorite added successfully".to_string(),
                favorites,
            }),
        )
            .into_response(),
        Err(err) => {
            error!("Failed to list favorites: {err}");
            reject(StatusCode::INTERNAL_SERVER_ERROR, "Failed to add favorite")
        }
    }
}

/// List the caller's favorites with populated directory entries.
#[utoipa::path(
    get,
    path = "/api/users/{id}/favorites",
    params(("id" = String, Path, description = "Account id; must equal the caller")),
    responses(
        (status = 200, description = "Populated favorites", body = FavoritesListResponse),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 403, description = "Path id does not match the caller", body = super::ErrorResponse),
        (status = 404, description = "Account not found", body = super::ErrorResponse)
    ),
    tag = "users"
)]
pub async fn list_favorites(
    Path(id): Path<String>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let user_id = match self_scoped_id(&id, &headers, &auth_state) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };

    match user_exists(&pool, user_id).await {
        Ok(true) => {}
        Ok(false) => return reject(StatusCode::NOT_FOUND, "User not found"),
        Err(err) => {
            error!("Failed to check user existence: {err}");
            return reject(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch favorites",
            );
        }
    }

    match fetch_favorites(&pool, user_id).await {
        Ok(favorites) => (StatusCode::OK, Json(FavoritesListResponse { favorites })).into_response(),
        Err(err) => {
            error!("Failed to fetch favorites: {err}");
            reject(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch favorites",
            )
        }
    }
}

/// Remove one favorite.
#[utoipa::path(
    delete,
    path = "/api/users/{id}/favorites/{applicant_id}",
    params(
        ("id" = String, Path, description = "Account id; must equal the caller"),
        ("applicant_id" = String, Path, description = "Directory entry id")
    ),
    responses(
        (status = 200, description = "Favorite removed", body = FavoriteIdsResponse),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 403, description = "Path id does not match the caller", body = super::ErrorResponse),
        (status = 404, description = "Entry was not a favorite", body = super::ErrorResponse)
    ),
    tag = "users"
)]
pub async fn remove_favorite(
    Path((id, applicant_id)): Path<(String, String)>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let user_id = match self_scoped_id(&id, &headers, &auth_state) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };

    let Ok(applicant_id) = Uuid::parse_str(applicant_id.trim()) else {
        return reject(StatusCode::BAD_REQUEST, "Invalid applicant id");
    };

    match delete_favorite(&pool, user_id, applicant_id).await {
        Ok(true) => match list_favorite_ids(&pool, user_id).await {
            Ok(favorites) => (
                StatusCode::OK,
                Json(FavoriteIdsResponse {
                    message: "Favorite removed successfully".to_string(),
                    favorites,
                }),
            )
                .into_response(),
            Err(err) => {
                error!("Failed to list favorites: {err}");
                reject(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to remove favorite",
                )
            }
        },
        Ok(false) => reject(StatusCode::NOT_FOUND, "Applicant not found in favorites"),
        Err(err) => {
            error!("Failed to remove favorite: {err}");
            reject(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to remove favorite",
            )
        }
    }
}

async fn user_exists(pool: &PgPool, user_id: Uuid) -> Result<bool, sqlx::Error> {
    let query = "SELECT EXISTS(SELECT 1 FROM users WHERE id = $1) AS present";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .fetch_one(pool)
        .instrument(span)
        .await?;
    Ok(row.get("present"))
}

async fn applicant_exists(pool: &PgPool, applicant_id: Uuid) -> Result<bool, sqlx::Error> {
    let query = "SELECT EXISTS(SELECT 1 FROM applicants WHERE id = $1) AS present";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(applicant_id)
        .fetch_one(pool)
        .instrument(span)
        .await?;
    Ok(row.get("present"))
}

/// Set insert: already-present pairs are ignored.
async fn insert_favorite(
    pool: &PgPool,
    user_id: Uuid,
    applicant_id: Uuid,
) -> Result<(), sqlx::Error> {
    let query = r"
        INSERT INTO favorites (user_id, applicant_id)
        VALUES ($1, $2)
        ON CONFLICT (user_id, applicant_id) DO NOTHING
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(applicant_id)
        .execute(pool)
        .instrument(span)
        .await?;
    Ok(())
}

async fn delete_favorite(
    pool: &PgPool,
    user_id: Uuid,
    applicant_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let query = "DELETE FROM favorites WHERE user_id = $1 AND applicant_id = $2";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(user_id)
        .bind(applicant_id)
        .execute(pool)
        .instrument(span)
        .await?;
    Ok(result.rows_affected() > 0)
}

async fn list_favorite_ids(pool: &PgPool, user_id: Uuid) -> Result<Vec<String>, sqlx::Error> {
    let query = "SELECT applicant_id FROM favorites WHERE user_id = $1 ORDER BY added_at";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(user_id)
        .fetch_all(pool)
        .instrument(span)
        .await?;
    Ok(rows
        .into_iter()
        .map(|row| row.get::<Uuid, _>("applicant_id").to_string())
        .collect())
}

/// Favorites joined with their directory entries, in insertion order.
pub(crate) async fn fetch_favorites(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<ApplicantResponse>, sqlx::Error> {
    let query = r"
        SELECT a.*
        FROM favorites f
        JOIN applicants a ON a.id = f.applicant_id
        WHERE f.user_id = $1
        ORDER BY f.added_at
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(user_id)
        .fetch_all(pool)
        .instrument(span)
        .await?;
    Ok(rows.iter().map(applicant_from_row).collect())
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
    async fn add_favorite_without_token_is_unauthorized() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = add_favorite(
            Path(Uuid::new_v4().to_string()),
            HeaderMap::new(),
            Extension(pool),
            Extension(auth_state()),
            None,
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn add_favorite_for_other_account_is_forbidden() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let state = auth_state();
        let headers = bearer_headers(&state, Uuid::new_v4());
        let response = add_favorite(
            Path(Uuid::new_v4().to_string()),
            headers,
            Extension(pool),
            Extension(state),
            Some(Json(FavoriteAddRequest {
                applicant_id: Uuid::new_v4().to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        Ok(())
    }

    #[tokio::test]
    async fn add_favorite_with_malformed_applicant_id_is_bad_request() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let state = auth_state();
        let user_id = Uuid::new_v4();
        let headers = bearer_headers(&state, user_id);
        let response = add_favorite(
            Path(user_id.to_string()),
            headers,
            Extension(pool),
            Extension(state),
            Some(Json(FavoriteAddRequest {
                applicant_id: "not-a-uuid".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn remove_favorite_with_malformed_applicant_id_is_bad_request() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let state = auth_state();
        let user_id = Uuid::new_v4();
        let headers = bearer_headers(&state, user_id);
        let response = remove_favorite(
            Path((user_id.to_string(), "not-a-uuid".to_string())),
            headers,
            Extension(pool),
            Extension(state),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }
}
