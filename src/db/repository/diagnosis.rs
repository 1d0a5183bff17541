use rusqlite::{params, Connection};
use uuid::Uuid;

use super::parse_uuid;
use crate::db::DatabaseError;
use crate::models::Diagnosis;

pub fn insert_diagnosis(conn: &Connection, diag: &Diagnosis) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO diagnoses (id, visit_id, code, description)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            diag.id.to_string(),
            diag.visit_id.to_string(),
            diag.code,
            diag.description,
        ],
    )?;
    Ok(())
}

pub fn list_diagnoses_for_visit(
    conn: &Connection,
    visit_id: &Uuid,
) -> Result<Vec<Diagnosis>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, visit_id, code, description
         FROM diagnoses WHERE visit_id = ?1 ORDER BY rowid ASC",
    )?;

    let rows = stmt.query_map(params![visit_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Option<String>>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;

    let mut diagnoses = Vec::new();
    for row in rows {
        let (id, visit_id, code, description) = row?;
        diagnoses.push(Diagnosis {
            id: parse_uuid(&id)?,
            visit_id: parse_uuid(&visit_id)?,
            code,
            description,
        });
    }
    Ok(diagnoses)
}
