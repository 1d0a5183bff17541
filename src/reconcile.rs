//! Duplicate patient reconciliation.
//!
//! Decides whether a candidate (name, phone) under an owning doctor refers
//! to an existing patient record. Matching is exact after trimming, and is
//! limited to the doctor's practice (the doctor and its assistants).
//!
//! Same name with two different phone numbers is never a match: two people
//! can share a name, and merging them is worse than a duplicate row.

use rusqlite::Connection;
use uuid::Uuid;

use crate::db::repository;
use crate::db::DatabaseError;
use crate::models::Patient;
use crate::scoping::practice_members;

/// Trim a name; the result may be empty.
pub fn normalize_name(full_name: &str) -> &str {
    full_name.trim()
}

/// Trim a phone number, mapping blank to absent.
pub fn normalize_phone(phone: Option<&str>) -> Option<&str> {
    phone.map(str::trim).filter(|p| !p.is_empty())
}

/// Find an existing patient the candidate duplicates, if any.
///
/// 1. With a phone: exact name + exact phone.
/// 2. Otherwise, or when step 1 finds nothing: exact name, taking the oldest
///    record where at least one side has no phone.
///
/// `exclude_id` drops the record being edited from consideration.
pub fn find_duplicate(
    conn: &Connection,
    full_name: &str,
    phone: Option<&str>,
    owning_doctor: &Uuid,
    exclude_id: Option<&Uuid>,
) -> Result<Option<Patient>, DatabaseError> {
    let name = normalize_name(full_name);
    if name.is_empty() {
        return Ok(None);
    }
    let phone = normalize_phone(phone);
    let owners = practice_members(conn, owning_doctor)?;

    if let Some(phone) = phone {
        let exact = repository::find_patients_by_name_and_phone(conn, name, phone, &owners, exclude_id)?;
        if let Some(existing) = exact.into_iter().next() {
            tracing::debug!(patient_id = %existing.id, "Duplicate matched on name and phone");
            return Ok(Some(existing));
        }
    }

    let same_name = repository::find_patients_by_name(conn, name, &owners, exclude_id)?;
    let duplicate = same_name.into_iter().find(|existing| {
        let existing_phone = normalize_phone(existing.phone.as_deref());
        existing_phone.is_none() || phone.is_none()
    });

    if let Some(existing) = &duplicate {
        tracing::debug!(patient_id = %existing.id, "Duplicate matched on name with a missing phone");
    }
    Ok(duplicate)
}
