use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{format_timestamp, parse_optional_uuid, parse_timestamp, parse_uuid};
use crate::db::DatabaseError;
use crate::models::Visit;

type VisitRow = (String, String, String, Option<String>, Option<String>, Option<String>);

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<VisitRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn into_visit(row: VisitRow) -> Result<Visit, DatabaseError> {
    let (id, patient_id, visit_date, clinician, notes, created_by) = row;
    Ok(Visit {
        id: parse_uuid(&id)?,
        patient_id: parse_uuid(&patient_id)?,
        visit_date: parse_timestamp(&visit_date)?,
        clinician,
        notes,
        created_by: parse_optional_uuid(created_by)?,
    })
}

pub fn insert_visit(conn: &Connection, visit: &Visit) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO visits (id, patient_id, visit_date, clinician, notes, created_by)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            visit.id.to_string(),
            visit.patient_id.to_string(),
            format_timestamp(&visit.visit_date),
            visit.clinician,
            visit.notes,
            visit.created_by.map(|id| id.to_string()),
        ],
    )?;
    Ok(())
}

pub fn get_visit(conn: &Connection, id: &Uuid) -> Result<Option<Visit>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, patient_id, visit_date, clinician, notes, created_by
             FROM visits WHERE id = ?1",
            params![id.to_string()],
            read_row,
        )
        .optional()?;
    row.map(into_visit).transpose()
}

/// Visits of one patient, newest first.
pub fn list_visits_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<Visit>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, visit_date, clinician, notes, created_by
         FROM visits WHERE patient_id = ?1
         ORDER BY visit_date DESC, rowid DESC",
    )?;
    let rows = stmt.query_map(params![patient_id.to_string()], read_row)?;
    let mut visits = Vec::new();
    for row in rows {
        visits.push(into_visit(row?)?);
    }
    Ok(visits)
}

/// Visit count and most recent visit date for one patient.
pub fn visit_stats_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<(u32, Option<NaiveDateTime>), DatabaseError> {
    let (count, last): (u32, Option<String>) = conn.query_row(
        "SELECT COUNT(*), MAX(visit_date) FROM visits WHERE patient_id = ?1",
        params![patient_id.to_string()],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    let last = last.as_deref().map(parse_timestamp).transpose()?;
    Ok((count, last))
}

/// Delete a visit. Its diagnoses go with it (ON DELETE CASCADE).
pub fn delete_visit(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let deleted = conn.execute("DELETE FROM visits WHERE id = ?1", params![id.to_string()])?;
    Ok(deleted > 0)
}
