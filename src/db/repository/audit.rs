use rusqlite::{params, Connection};

use crate::db::DatabaseError;

/// A flushed audit row: (timestamp, source, action, entity, account_id).
pub type AuditRow = (String, String, String, String, Option<String>);

/// Insert a batch of audit entries into the audit_log table.
pub fn insert_audit_entries(conn: &Connection, entries: &[AuditRow]) -> Result<(), DatabaseError> {
    let mut stmt = conn.prepare(
        "INSERT INTO audit_log (timestamp, source, action, entity, account_id) VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for (timestamp, source, action, entity, account_id) in entries {
        stmt.execute(params![timestamp, source, action, entity, account_id])?;
    }
    Ok(())
}

/// Prune audit entries older than the given number of days.
pub fn prune_audit_log(conn: &Connection, retention_days: i64) -> Result<usize, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM audit_log WHERE timestamp < datetime('now', ?1)",
        params![format!("-{retention_days} days")],
    )?;
    Ok(deleted)
}

/// Audit entries recorded for one account, newest first.
/// Returns (timestamp, source, action, entity) tuples.
pub fn query_audit_by_account(
    conn: &Connection,
    account_id: &str,
) -> Result<Vec<(String, String, String, String)>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT timestamp, source, action, entity FROM audit_log
         WHERE account_id = ?1
         ORDER BY timestamp DESC, id DESC",
    )?;
    let rows = stmt
        .query_map(params![account_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
