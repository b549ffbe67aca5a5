//! Database helpers for account records.

use anyhow::{Context, Result};
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::pending::SignupCandidate;
use super::utils::is_unique_violation;

/// Account fields needed by the auth flows.
pub(crate) struct AccountRecord {
    pub(crate) id: Uuid,
    pub(crate) name: String,
    pub(crate) email: String,
    pub(crate) password_hash: Option<String>,
    pub(crate) is_verified: bool,
    pub(crate) google_id: Option<String>,
}

/// Outcome when attempting to create a new account.
#[derive(Debug)]
pub(crate) enum InsertOutcome {
    Created(Uuid),
    Conflict,
}

fn account_from_row(row: &PgRow) -> AccountRecord {
    AccountRecord {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        is_verified: row.get("is_verified"),
        google_id: row.get("google_id"),
    }
}

pub(crate) async fn email_taken(pool: &PgPool, email: &str) -> Result<bool> {
    let query = "SELECT EXISTS(SELECT 1 FROM users WHERE email = $1) AS present";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to check email uniqueness")?;
    Ok(row.get("present"))
}

pub(crate) async fn phone_taken(pool: &PgPool, phone: &str) -> Result<bool> {
    let query = "SELECT EXISTS(SELECT 1 FROM users WHERE phone = $1) AS present";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(phone)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to check phone uniqueness")?;
    Ok(row.get("present"))
}

pub(crate) async fn lookup_by_email(pool: &PgPool, email: &str) -> Result<Option<AccountRecord>> {
    let query = "SELECT id, name, email, password_hash, is_verified, google_id \
                 FROM users WHERE email = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup account by email")?;
    Ok(row.as_ref().map(account_from_row))
}

pub(crate) async fn lookup_by_phone(pool: &PgPool, phone: &str) -> Result<Option<AccountRecord>> {
    let query = "SELECT id, name, email, password_hash, is_verified, google_id \
                 FROM users WHERE phone = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(phone)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup account by phone")?;
    Ok(row.as_ref().map(account_from_row))
}

pub(crate) async fn lookup_by_google_id(
    pool: &PgPool,
    google_id: &str,
) -> Result<Option<AccountRecord>> {
    let query = "SELECT id, name, email, password_hash, is_verified, google_id \
                 FROM users WHERE google_id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(google_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup account by google id")?;
    Ok(row.as_ref().map(account_from_row))
}

/// Commit a verified signup candidate.
///
/// Uniqueness races between the pre-issue check and this insert resolve here:
/// a duplicate email/phone surfaces as [`InsertOutcome::Conflict`].
pub(crate) async fn insert_verified_account(
    pool: &PgPool,
    candidate: &SignupCandidate,
    password_hash: &str,
) -> Result<InsertOutcome> {
    let query = r"
        INSERT INTO users (name, email, phone, address, password_hash, is_verified)
        VALUES ($1, $2, $3, $4, $5, TRUE)
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(&candidate.name)
        .bind(&candidate.email)
        .bind(&candidate.phone)
        .bind(&candidate.address)
        .bind(password_hash)
        .fetch_one(pool)
        .instrument(span)
        .await;

    match row {
        Ok(row) => Ok(InsertOutcome::Created(row.get("id"))),
        Err(err) if is_unique_violation(&err) => Ok(InsertOutcome::Conflict),
        Err(err) => Err(err).context("failed to insert account"),
    }
}

/// Overwrite the stored credential hash; `false` when the account is gone.
pub(crate) async fn overwrite_password_hash(
    pool: &PgPool,
    user_id: Uuid,
    password_hash: &str,
) -> Result<bool> {
    let query = "UPDATE users SET password_hash = $2 WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(user_id)
        .bind(password_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to overwrite password hash")?;
    Ok(result.rows_affected() > 0)
}

/// Idempotent backfill of the federated identifier onto an existing account.
pub(crate) async fn link_google_id(pool: &PgPool, user_id: Uuid, google_id: &str) -> Result<()> {
    let query = "UPDATE users SET google_id = $2 WHERE id = $1 AND google_id IS NULL";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(google_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to link google id")?;
    Ok(())
}

/// First federated login: create a pre-verified account with an unusable
/// placeholder credential.
pub(crate) async fn insert_google_account(
    pool: &PgPool,
    name: &str,
    email: &str,
    google_id: &str,
    placeholder_hash: &str,
) -> Result<InsertOutcome> {
    let query = r"
        INSERT INTO users (name, email, google_id, password_hash, is_verified)
        VALUES ($1, $2, $3, $4, TRUE)
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(name)
        .bind(email)
        .bind(google_id)
        .bind(placeholder_hash)
        .fetch_one(pool)
        .instrument(span)
        .await;

    match row {
        Ok(row) => Ok(InsertOutcome::Created(row.get("id"))),
        Err(err) if is_unique_violation(&err) => Ok(InsertOutcome::Conflict),
        Err(err) => Err(err).context("failed to insert federated account"),
    }
}
