//! API endpoint handlers.
//!
//! Handlers stay thin: they open a connection, call the service modules
//! and shape the JSON response.

pub mod accounts;
pub mod assistants;
pub mod auth;
pub mod health;
pub mod patients;
pub mod transfer;
pub mod visits;

use uuid::Uuid;

use crate::api::error::ApiError;

/// Parse a path identifier.
pub(crate) fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest("Invalid ID format".into()))
}

/// Current time in the stored (UTC, naive) representation.
pub(crate) fn now() -> chrono::NaiveDateTime {
    chrono::Utc::now().naive_utc()
}
