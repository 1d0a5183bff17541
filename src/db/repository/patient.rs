use rusqlite::types::ToSql;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use uuid::Uuid;

use super::{
    format_timestamp, parse_optional_date, parse_optional_uuid, parse_timestamp, parse_uuid,
    placeholders,
};
use crate::db::DatabaseError;
use crate::models::Patient;

const PATIENT_COLUMNS: &str = "p.id, p.full_name, p.phone, p.date_of_birth, p.created_at, p.doctor_id";

type PatientRow = (String, String, Option<String>, Option<String>, String, Option<String>);

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PatientRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn into_patient(row: PatientRow) -> Result<Patient, DatabaseError> {
    let (id, full_name, phone, date_of_birth, created_at, doctor_id) = row;
    Ok(Patient {
        id: parse_uuid(&id)?,
        full_name,
        phone,
        date_of_birth: parse_optional_date(date_of_birth),
        created_at: parse_timestamp(&created_at)?,
        doctor_id: parse_optional_uuid(doctor_id)?,
    })
}

/// Run a patient SELECT with the given `WHERE` clause, ordered by name.
///
/// `clause` must reference the patients table as `p`.
pub fn query_patients(
    conn: &Connection,
    clause: &str,
    args: &[&dyn ToSql],
) -> Result<Vec<Patient>, DatabaseError> {
    let sql = format!(
        "SELECT {PATIENT_COLUMNS} FROM patients p WHERE {clause}
         ORDER BY p.full_name ASC, p.created_at ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(args, read_row)?;
    let mut patients = Vec::new();
    for row in rows {
        patients.push(into_patient(row?)?);
    }
    Ok(patients)
}

pub fn insert_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO patients (id, full_name, phone, date_of_birth, created_at, doctor_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            patient.id.to_string(),
            patient.full_name,
            patient.phone,
            patient.date_of_birth.map(|d| d.to_string()),
            format_timestamp(&patient.created_at),
            patient.doctor_id.map(|id| id.to_string()),
        ],
    )?;
    Ok(())
}

pub fn update_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE patients SET full_name = ?2, phone = ?3, date_of_birth = ?4, doctor_id = ?5
         WHERE id = ?1",
        params![
            patient.id.to_string(),
            patient.full_name,
            patient.phone,
            patient.date_of_birth.map(|d| d.to_string()),
            patient.doctor_id.map(|id| id.to_string()),
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Patient".into(),
            id: patient.id.to_string(),
        });
    }
    Ok(())
}

pub fn get_patient(conn: &Connection, id: &Uuid) -> Result<Option<Patient>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {PATIENT_COLUMNS} FROM patients p WHERE p.id = ?1"),
            params![id.to_string()],
            read_row,
        )
        .optional()?;
    row.map(into_patient).transpose()
}

/// Delete a patient. Visits and their diagnoses go with it (ON DELETE CASCADE).
pub fn delete_patient(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let deleted = conn.execute("DELETE FROM patients WHERE id = ?1", params![id.to_string()])?;
    Ok(deleted > 0)
}

pub fn list_all_patients(conn: &Connection) -> Result<Vec<Patient>, DatabaseError> {
    query_patients(conn, "1 = 1", &[])
}

/// Case-insensitive substring search over name and phone, across all owners.
///
/// SQLite's `lower()` only folds ASCII, so matching happens here.
pub fn search_patients(conn: &Connection, query: &str) -> Result<Vec<Patient>, DatabaseError> {
    let needle = query.trim().to_lowercase();
    let mut patients = list_all_patients(conn)?;
    patients.retain(|p| {
        p.full_name.to_lowercase().contains(&needle)
            || p.phone.as_deref().is_some_and(|phone| phone.to_lowercase().contains(&needle))
    });
    Ok(patients)
}

/// Patients owned by any of `owners` with exactly this name and phone.
pub fn find_patients_by_name_and_phone(
    conn: &Connection,
    full_name: &str,
    phone: &str,
    owners: &[Uuid],
    exclude_id: Option<&Uuid>,
) -> Result<Vec<Patient>, DatabaseError> {
    find_patients_by_owner(conn, "p.full_name = ?1 AND p.phone = ?2", &[full_name, phone], owners, exclude_id)
}

/// Patients owned by any of `owners` with exactly this name.
pub fn find_patients_by_name(
    conn: &Connection,
    full_name: &str,
    owners: &[Uuid],
    exclude_id: Option<&Uuid>,
) -> Result<Vec<Patient>, DatabaseError> {
    find_patients_by_owner(conn, "p.full_name = ?1", &[full_name], owners, exclude_id)
}

fn find_patients_by_owner(
    conn: &Connection,
    match_clause: &str,
    match_args: &[&str],
    owners: &[Uuid],
    exclude_id: Option<&Uuid>,
) -> Result<Vec<Patient>, DatabaseError> {
    if owners.is_empty() {
        return Ok(Vec::new());
    }

    let mut args: Vec<String> = match_args.iter().map(|s| s.to_string()).collect();
    let owner_slots = placeholders(owners.len(), args.len());
    args.extend(owners.iter().map(Uuid::to_string));

    let mut sql = format!(
        "SELECT {PATIENT_COLUMNS} FROM patients p
         WHERE {match_clause} AND p.doctor_id IN ({owner_slots})"
    );
    if let Some(excluded) = exclude_id {
        args.push(excluded.to_string());
        sql.push_str(&format!(" AND p.id != ?{}", args.len()));
    }
    sql.push_str(" ORDER BY p.created_at ASC, p.rowid ASC");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(args.iter()), read_row)?;
    let mut patients = Vec::new();
    for row in rows {
        patients.push(into_patient(row?)?);
    }
    Ok(patients)
}
