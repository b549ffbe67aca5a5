//! API handlers and shared response types.
//!
//! This module organizes the service's route handlers. Every error leaves the
//! service as JSON `{"message": ...}` with an HTTP status; server-side detail
//! stays in the logs.

pub mod applicants;
pub mod auth;
pub mod favorites;
pub mod health;
pub mod root;
pub mod users;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Error body shared by every endpoint.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub message: String,
}

/// Geolocation pair shared by accounts and directory entries.
#[derive(ToSchema, Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

/// Plain acknowledgement body for operations with nothing else to return.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MessageResponse {
    pub message: String,
}

pub(crate) fn reject(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            message: message.to_string(),
        }),
    )
        .into_response()
}

pub(crate) fn acknowledge(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(MessageResponse {
            message: message.to_string(),
        }),
    )
        .into_response()
}
