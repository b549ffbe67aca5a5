//! Directory-entry CRUD ("applicants", served under `/api/formdatas`).
//!
//! Reads are public; submissions, updates, and deletes require a bearer
//! token. Deleting an entry also removes it from every account's favorites,
//! inside one transaction so no dangling references survive.

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
use super::auth::AuthState;
use super::{acknowledge, reject, Location};

/// Directory-entry fields accepted from the admin frontend.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplicantPayload {
    pub name: String,
    pub occupation: String,
    pub phone_number: String,
    pub age: i32,
    pub identity_proof: Option<String>,
    pub landmarks: Option<String>,
    pub state: Option<String>,
    pub address: Option<String>,
    pub timing: Option<String>,
    pub alt_phone_number: Option<String>,
    pub id_proof_number: Option<String>,
    pub blue_ticket: Option<bool>,
    pub pin_code: Option<String>,
    pub city: Option<String>,
    pub gender: Option<String>,
    pub location: Option<Location>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplicantResponse {
    pub id: String,
    pub name: String,
    pub occupation: String,
    pub phone_number: String,
    pub age: i32,
    pub identity_proof: Option<String>,
    pub landmarks: Option<String>,
    pub state: Option<String>,
    pub address: Option<String>,
    pub timing: Option<String>,
    pub alt_phone_number: Option<String>,
    pub id_proof_number: Option<String>,
    pub blue_ticket: bool,
    pub pin_code: Option<String>,
    pub city: Option<String>,
    pub gender: Option<String>,
    pub location: Option<Location>,
}

pub(crate) fn applicant_from_row(row: &PgRow) -> ApplicantResponse {
    let latitude: Option<f64> = row.get("latitude");
    let longitude: Option<f64> = row.get("longitude");
    let location = match (latitude, longitude) {
        (Some(latitude), Some(longitude)) => Some(Location {
            latitude,
            longitude,
        }),
        _ => None,
    };
    ApplicantResponse {
        id: row.get::<Uuid, _>("id").to_string(),
        name: row.get("name"),
        occupation: row.get("occupation"),
        phone_number: row.get("phone_number"),
        age: row.get("age"),
        identity_proof: row.get("identity_proof"),
        landmarks: row.get("landmarks"),
        state: row.get("state"),
        address: row.get("address"),
        timing: row.get("timing"),
        alt_phone_number: row.get("alt_phone_number"),
        id_proof_number: row.get("id_proof_number"),
        blue_ticket: row.get("blue_ticket"),
        pin_code: row.get("pin_code"),
        city: row.get("city"),
        gender: row.get("gender"),
        location,
    }
}

fn validate(payload: &ApplicantPayload) -> Option<&'static str> {
    if payload.name.trim().is_empty() {
        return Some("Missing name");
    }
    if payload.occupation.trim().is_empty() {
        return Some("Missing occupation");
    }
    if payload.phone_number.trim().is_empty() {
        return Some("Missing phoneNumber");
    }
    if payload.age <= 0 {
        return Some("Invalid age");
    }
    None
}

/// Public directory listing.
#[utoipa::path(
    get,
    path = "/api/formdatas",
    responses(
        (status = 200, description = "All directory entries", body = [ApplicantResponse]),
        (status = 500, description = "Persistence failure", body = super::ErrorResponse)
    ),
    tag = "directory"
)]
pub async fn list_applicants(pool: Extension<PgPool>) -> impl IntoResponse {
    match fetch_all(&pool).await {
        Ok(entries) => (StatusCode::OK, Json(entries)).into_response(),
        Err(err) => {
            error!("Failed to list applicants: {err}");
            reject(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load applicants data",
            )
        }
    }
}

/// Public single-entry read.
#[utoipa::path(
    get,
    path = "/api/formdatas/{id}",
    params(("id" = String, Path, description = "Directory entry id")),
    responses(
        (status = 200, description = "Directory entry", body = ApplicantResponse),
        (status = 400, description = "Malformed id", body = super::ErrorResponse),
        (status = 404, description = "No such entry", body = super::ErrorResponse)
    ),
    tag = "directory"
)]
pub async fn get_applicant(Path(id): Path<String>, pool: Extension<PgPool>) -> impl IntoResponse {
    let Ok(applicant_id) = Uuid::parse_str(id.trim()) else {
        return reject(StatusCode::BAD_REQUEST, "Invalid applicant id");
    };

    match fetch_one(&pool, applicant_id).await {
        Ok(Some(entry)) => (StatusCode::OK, Json(entry)).into_response(),
        Ok(None) => reject(StatusCode::NOT_FOUND, "Applicant not found"),
        Err(err) => {
            error!("Failed to fetch applicant: {err}");
            reject(StatusCode::INTERNAL_SERVER_ERROR, "Server error")
        }
    }
}

/// Submit a new directory entry.
#[utoipa::path(
    post,
    path = "/api/formdatas",
    request_body = ApplicantPayload,
    responses(
        (status = 201, description = "Entry created", body = ApplicantResponse),
        (status = 400, description = "Invalid payload", body = super::ErrorResponse),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 500, description = "Persistence failure", body = super::ErrorResponse)
    ),
    tag = "directory"
)]
pub async fn create_applicant(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<ApplicantPayload>>,
) -> impl IntoResponse {
    if let Err(status) = require_auth(&headers, auth_state.config()) {
        return status.into_response();
    }

    let payload: ApplicantPayload = match payload {
        Some(Json(payload)) => payload,
        None => return reject(StatusCode::BAD_REQUEST, "Missing payload"),
    };
    if let Some(message) = validate(&payload) {
        return reject(StatusCode::BAD_REQUEST, message);
    }

    match insert(&pool, &payload).await {
        Ok(entry) => (StatusCode::CREATED, Json(entry)).into_response(),
        Err(err) => {
            error!("Failed to create applicant: {err}");
            reject(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create form data")
        }
    }
}

/// Replace a directory entry.
#[utoipa::path(
    put,
    path = "/api/formdatas/{id}",
    params(("id" = String, Path, description = "Directory entry id")),
    request_body = ApplicantPayload,
    responses(
        (status = 200, description = "Updated entry", body = ApplicantResponse),
        (status = 400, description = "Invalid payload", body = super::ErrorResponse),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 404, description = "No such entry", body = super::ErrorResponse),
        (status = 500, description = "Persistence failure", body = super::ErrorResponse)
    ),
    tag = "directory"
)]
pub async fn update_applicant(
    Path(id): Path<String>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<ApplicantPayload>>,
) -> impl IntoResponse {
    if let Err(status) = require_auth(&headers, auth_state.config()) {
        return status.into_response();
    }

    let Ok(applicant_id) = Uuid::parse_str(id.trim()) else {
        return reject(StatusCode::BAD_REQUEST, "Invalid applicant id");
    };
    let payload: ApplicantPayload = match payload {
        Some(Json(payload)) => payload,
        None => return reject(StatusCode::BAD_REQUEST, "Missing payload"),
    };
    if let Some(message) = validate(&payload) {
        return reject(StatusCode::BAD_REQUEST, message);
    }

    match replace(&pool, applicant_id, &payload).await {
        Ok(Some(entry)) => (StatusCode::OK, Json(entry)).into_response(),
        Ok(None) => reject(StatusCode::NOT_FOUND, "Form data not found"),
        Err(err) => {
            error!("Failed to update applicant: {err}");
            reject(StatusCode::INTERNAL_SERVER_ERROR, "Failed to update form data")
        }
    }
}

/// Delete a directory entry and cascade it out of every favorites list.
#[utoipa::path(
    delete,
    path = "/api/formdatas/{id}",
    params(("id" = String, Path, description = "Directory entry id")),
    responses(
        (status = 200, description = "Entry and favorite references deleted", body = super::MessageResponse),
        (status = 400, description = "Malformed id", body = super::ErrorResponse),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 404, description = "No such entry", body = super::ErrorResponse),
        (status = 500, description = "Persistence failure", body = super::ErrorResponse)
    ),
    tag = "directory"
)]
pub async fn delete_applicant(
    Path(id): Path<String>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    if let Err(status) = require_auth(&headers, auth_state.config()) {
        return status.into_response();
    }

    let Ok(applicant_id) = Uuid::parse_str(id.trim()) else {
        return reject(StatusCode::BAD_REQUEST, "Invalid applicant id");
    };

    match delete_with_cascade(&pool, applicant_id).await {
        Ok(true) => acknowledge(StatusCode::OK, "Form data deleted successfully"),
        Ok(false) => reject(StatusCode::NOT_FOUND, "Form data not found"),
        Err(err) => {
            error!("Failed to delete applicant: {err}");
            reject(StatusCode::INTERNAL_SERVER_ERROR, "Failed to delete form data")
        }
    }
}

async fn fetch_all(pool: &PgPool) -> Result<Vec<ApplicantResponse>, sqlx::Error> {
    let query = "SELECT * FROM applicants ORDER BY name";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query).fetch_all(pool).instrument(span).await?;
    Ok(rows.iter().map(applicant_from_row).collect())
}

async fn fetch_one(
    pool: &PgPool,
    applicant_id: Uuid,
) -> Result<Option<ApplicantResponse>, sqlx::Error> {
    let query = "SELECT * FROM applicants WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(applicant_id)
        .fetch_optional(pool)
        .instrument(span)
        .await?;
    Ok(row.as_ref().map(applicant_from_row))
}

async fn insert(pool: &PgPool, payload: &ApplicantPayload) -> Result<ApplicantResponse, sqlx::Error> {
    let query = r"
        INSERT INTO applicants
            (name, occupation, phone_number, age, identity_proof, landmarks, state,
             address, timing, alt_phone_number, id_proof_number, blue_ticket,
             pin_code, city, gender, latitude, longitude)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
        RETURNING *
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = bind_payload(sqlx::query(query), payload)
        .fetch_one(pool)
        .instrument(span)
        .await?;
    Ok(applicant_from_row(&row))
}

async fn replace(
    pool: &PgPool,
    applicant_id: Uuid,
    payload: &ApplicantPayload,
) -> Result<Option<ApplicantResponse>, sqlx::Error> {
    let query = r"
        UPDATE applicants
        SET name = $1, occupation = $2, phone_number = $3, age = $4,
            identity_proof = $5, landmarks = $6, state = $7, address = $8,
            timing = $9, alt_phone_number = $10, id_proof_number = $11,
            blue_ticket = $12, pin_code = $13, city = $14, gender = $15,
            latitude = $16, longitude = $17
        WHERE id = $18
        RETURNING *
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = bind_payload(sqlx::query(query), payload)
        .bind(applicant_id)
        .fetch_optional(pool)
        .instrument(span)
        .await?;
    Ok(row.as_ref().map(applicant_from_row))
}

fn bind_payload<'q>(
    query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    payload: &'q ApplicantPayload,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    let (latitude, longitude) = payload
        .location
        .as_ref()
        .map_or((None, None), |location| {
            (Some(location.latitude), Some(location.longitude))
        });
    query
        .bind(payload.name.trim())
        .bind(payload.occupation.trim())
        .bind(payload.phone_number.trim())
        .bind(payload.age)
        .bind(&payload.identity_proof)
        .bind(&payload.landmarks)
        .bind(&payload.state)
        .bind(&payload.address)
        .bind(&payload.timing)
        .bind(&payload.alt_phone_number)
        .bind(&payload.id_proof_number)
        .bind(payload.blue_ticket.unwrap_or(false))
        .bind(&payload.pin_code)
        .bind(&payload.city)
        .bind(&payload.gender)
        .bind(latitude)
        .bind(longitude)
}

/// Entry delete plus favorites cleanup in one transaction; a crash between
/// the two steps cannot leave a dangling favorite reference.
async fn delete_with_cascade(pool: &PgPool, applicant_id: Uuid) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let query = "DELETE FROM favorites WHERE applicant_id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(applicant_id)
        .execute(&mut *tx)
        .instrument(span)
        .await?;

    let query = "DELETE FROM applicants WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(applicant_id)
        .execute(&mut *tx)
        .instrument(span)
        .await?;

    if result.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    tx.commit().await?;
    Ok(true)
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

    fn bearer_headers(state: &AuthState) -> HeaderMap {
        let token = issue_session_token(state.config(), Uuid::new_v4()).expect("token");
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).expect("header"),
        );
        headers
    }

    fn payload() -> ApplicantPayload {
        ApplicantPayload {
            name: "Asha".to_string(),
            occupation: "Cook".to_string(),
            phone_number: "555".to_string(),
            age: 30,
            identity_proof: None,
            landmarks: None,
            state: None,
            address: None,
            timing: Some("Morning".to_string()),
            alt_phone_number: None,
            id_proof_number: None,
            blue_ticket: None,
            pin_code: None,
            city: None,
            gender: None,
            location: None,
        }
    }

    #[tokio::test]
    async fn create_applicant_without_token_is_unauthorized() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = create_applicant(
            HeaderMap::new(),
            Extension(pool),
            Extension(auth_state()),
            Some(Json(payload())),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn create_applicant_rejects_blank_name() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let state = auth_state();
        let headers = bearer_headers(&state);
        let mut invalid = payload();
        invalid.name = " ".to_string();
        let response = create_applicant(
            headers,
            Extension(pool),
            Extension(state),
            Some(Json(invalid)),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn create_applicant_rejects_non_positive_age() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let state = auth_state();
        let headers = bearer_headers(&state);
        let mut invalid = payload();
        invalid.age = 0;
        let response = create_applicant(
            headers,
            Extension(pool),
            Extension(state),
            Some(Json(invalid)),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn delete_applicant_with_malformed_id_is_bad_request() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let state = auth_state();
        let headers = bearer_headers(&state);
        let response = delete_applicant(
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

    #[test]
    fn payload_round_trips_camel_case() -> Result<()> {
        let decoded: ApplicantPayload = serde_json::from_value(serde_json::json!({
            "name": "Asha",
            "occupation": "Cook",
            "phoneNumber": "555",
            "age": 30,
            "blueTicket": true,
            "location": { "latitude": 12.9, "longitude": 77.6 },
        }))?;
        assert_eq!(decoded.phone_number, "555");
        assert_eq!(decoded.blue_ticket, Some(true));
        assert!(decoded.location.is_some());
        Ok(())
    }
}
