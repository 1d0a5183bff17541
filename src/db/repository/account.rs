use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{format_timestamp, parse_optional_uuid, parse_timestamp, parse_uuid};
use crate::db::DatabaseError;
use crate::models::enums::Role;
use crate::models::Account;

const ACCOUNT_COLUMNS: &str =
    "id, username, password_hash, role, full_name, email, location, created_at, is_active, doctor_id";

type AccountRow = (
    String,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    String,
    bool,
    Option<String>,
);

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AccountRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
    ))
}

fn into_account(row: AccountRow) -> Result<Account, DatabaseError> {
    let (id, username, password_hash, role, full_name, email, location, created_at, is_active, doctor_id) =
        row;
    Ok(Account {
        id: parse_uuid(&id)?,
        username,
        password_hash,
        role: Role::from_str(&role)?,
        full_name,
        email,
        location,
        created_at: parse_timestamp(&created_at)?,
        is_active,
        doctor_id: parse_optional_uuid(doctor_id)?,
    })
}

fn collect_accounts(
    conn: &Connection,
    sql: &str,
    args: impl rusqlite::Params,
) -> Result<Vec<Account>, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(args, read_row)?;
    let mut accounts = Vec::new();
    for row in rows {
        accounts.push(into_account(row?)?);
    }
    Ok(accounts)
}

pub fn insert_account(conn: &Connection, account: &Account) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO accounts (id, username, password_hash, role, full_name, email, location,
                               created_at, is_active, doctor_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            account.id.to_string(),
            account.username,
            account.password_hash,
            account.role.as_str(),
            account.full_name,
            account.email,
            account.location,
            format_timestamp(&account.created_at),
            account.is_active,
            account.doctor_id.map(|id| id.to_string()),
        ],
    )?;
    Ok(())
}

/// Update profile fields, role, active flag and supervisor. The password hash is untouched.
pub fn update_account(conn: &Connection, account: &Account) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE accounts SET username = ?2, role = ?3, full_name = ?4, email = ?5,
                location = ?6, is_active = ?7, doctor_id = ?8
         WHERE id = ?1",
        params![
            account.id.to_string(),
            account.username,
            account.role.as_str(),
            account.full_name,
            account.email,
            account.location,
            account.is_active,
            account.doctor_id.map(|id| id.to_string()),
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Account".into(),
            id: account.id.to_string(),
        });
    }
    Ok(())
}

pub fn update_password_hash(
    conn: &Connection,
    id: &Uuid,
    password_hash: &str,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE accounts SET password_hash = ?2 WHERE id = ?1",
        params![id.to_string(), password_hash],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Account".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

pub fn get_account(conn: &Connection, id: &Uuid) -> Result<Option<Account>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1"),
            params![id.to_string()],
            read_row,
        )
        .optional()?;
    row.map(into_account).transpose()
}

pub fn get_account_by_username(
    conn: &Connection,
    username: &str,
) -> Result<Option<Account>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE username = ?1"),
            params![username],
            read_row,
        )
        .optional()?;
    row.map(into_account).transpose()
}

pub fn username_taken(
    conn: &Connection,
    username: &str,
    exclude_id: Option<&Uuid>,
) -> Result<bool, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM accounts WHERE username = ?1 AND id != ?2",
        params![username, exclude_id.map(|id| id.to_string()).unwrap_or_default()],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn list_accounts(conn: &Connection) -> Result<Vec<Account>, DatabaseError> {
    collect_accounts(
        conn,
        &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY username ASC"),
        [],
    )
}

/// Assistants supervised by `doctor_id`, by username.
pub fn list_assistants(conn: &Connection, doctor_id: &Uuid) -> Result<Vec<Account>, DatabaseError> {
    collect_accounts(
        conn,
        &format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts
             WHERE role = 'assistant' AND doctor_id = ?1 ORDER BY username ASC"
        ),
        params![doctor_id.to_string()],
    )
}

/// Every assistant account, by username.
pub fn list_all_assistants(conn: &Connection) -> Result<Vec<Account>, DatabaseError> {
    collect_accounts(
        conn,
        &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE role = 'assistant' ORDER BY username ASC"),
        [],
    )
}

pub fn assistant_ids(conn: &Connection, doctor_id: &Uuid) -> Result<Vec<Uuid>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id FROM accounts WHERE role = 'assistant' AND doctor_id = ?1",
    )?;
    let rows = stmt.query_map(params![doctor_id.to_string()], |row| row.get::<_, String>(0))?;
    let mut ids = Vec::new();
    for row in rows {
        ids.push(parse_uuid(&row?)?);
    }
    Ok(ids)
}
