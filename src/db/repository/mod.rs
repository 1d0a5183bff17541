//! Repository layer: entity-scoped database operations.
//!
//! One sub-module per table. All public functions are re-exported here.

mod account;
mod audit;
mod diagnosis;
mod patient;
mod visit;

use chrono::{NaiveDate, NaiveDateTime};
use uuid::Uuid;

use super::{DatabaseError, DATE_FORMAT, TIMESTAMP_FORMAT};

pub use account::*;
pub use audit::*;
pub use diagnosis::*;
pub use patient::*;
pub use visit::*;

pub(crate) fn parse_uuid(value: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(value).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))
}

pub(crate) fn parse_optional_uuid(value: Option<String>) -> Result<Option<Uuid>, DatabaseError> {
    value.as_deref().map(parse_uuid).transpose()
}

pub(crate) fn parse_timestamp(value: &str) -> Result<NaiveDateTime, DatabaseError> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .map_err(|e| DatabaseError::ConstraintViolation(format!("timestamp {value}: {e}")))
}

pub(crate) fn parse_optional_date(value: Option<String>) -> Option<NaiveDate> {
    value.and_then(|d| NaiveDate::parse_from_str(&d, DATE_FORMAT).ok())
}

pub(crate) fn format_timestamp(value: &NaiveDateTime) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

/// `?1, ?2, ...` placeholders starting after `offset` bound parameters.
pub(crate) fn placeholders(count: usize, offset: usize) -> String {
    (1..=count)
        .map(|i| format!("?{}", i + offset))
        .collect::<Vec<_>>()
        .join(", ")
}
