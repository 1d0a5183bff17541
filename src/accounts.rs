//! Account service: login, password changes, user and assistant management,
//! and the default admin bootstrap.

use chrono::Utc;
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::core_state::{CoreError, CoreState};
use crate::crypto::{hash_password, verify_password, CryptoError};
use crate::db::repository;
use crate::db::DatabaseError;
use crate::models::enums::Role;
use crate::models::Account;
use crate::validation::{self, FieldError};

pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 80;
pub const FULL_NAME_MAX: usize = 120;
pub const EMAIL_MAX: usize = 120;
pub const LOCATION_MAX: usize = 255;

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Current password is incorrect")]
    WrongPassword,

    #[error("Username already exists. Please choose a different one.")]
    UsernameTaken,

    #[error("An assistant must be supervised by an active doctor")]
    InvalidSupervisor,

    #[error("This doctor still supervises assistants; reassign them first")]
    SupervisesAssistants,

    #[error("Account not found")]
    NotFound,

    #[error(transparent)]
    Validation(#[from] FieldError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Password hash error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("State error: {0}")]
    State(#[from] CoreError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAccount {
    pub username: String,
    pub full_name: String,
    pub email: Option<String>,
    pub location: Option<String>,
    pub password: String,
    pub confirm_password: String,
    pub role: Role,
    /// Supervising doctor, required for assistants.
    pub doctor_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountUpdate {
    pub username: String,
    pub full_name: String,
    pub email: Option<String>,
    pub location: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub doctor_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAssistant {
    pub username: String,
    pub full_name: String,
    pub email: Option<String>,
    pub password: String,
    pub confirm_password: String,
    /// Supervising doctor; required when an admin creates the assistant.
    #[serde(default)]
    pub doctor_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssistantUpdate {
    pub username: String,
    pub full_name: String,
    pub email: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

// ── Login ───────────────────────────────────────────────────

/// Check credentials. Unknown usernames, wrong passwords and inactive
/// accounts all fail the same way.
pub fn authenticate(conn: &Connection, username: &str, password: &str) -> Result<Account, AccountError> {
    let Some(account) = repository::get_account_by_username(conn, username.trim())? else {
        tracing::info!("Login failed: unknown username");
        return Err(AccountError::InvalidCredentials);
    };
    if !verify_password(password, &account.password_hash)? || !account.is_active {
        tracing::info!(account_id = %account.id, "Login failed");
        return Err(AccountError::InvalidCredentials);
    }
    Ok(account)
}

/// Authenticate and open a session; returns the account and its bearer token.
pub fn login(
    state: &CoreState,
    conn: &Connection,
    username: &str,
    password: &str,
) -> Result<(Account, String), AccountError> {
    let account = authenticate(conn, username, password)?;
    let token = state.start_session(account.id)?;
    tracing::info!(account_id = %account.id, role = %account.role, "Login succeeded");
    Ok((account, token))
}

pub fn logout(state: &CoreState, token: &str) -> Result<(), AccountError> {
    state.end_session(token)?;
    Ok(())
}

pub fn change_password(
    conn: &Connection,
    account: &Account,
    change: &PasswordChange,
) -> Result<(), AccountError> {
    if !verify_password(&change.current_password, &account.password_hash)? {
        return Err(AccountError::WrongPassword);
    }
    validation::new_password(&change.new_password, &change.confirm_password)?;
    repository::update_password_hash(conn, &account.id, &hash_password(&change.new_password))?;
    tracing::info!(account_id = %account.id, "Password changed");
    Ok(())
}

// ── Admin user management ───────────────────────────────────

pub fn register_account(conn: &Connection, input: &NewAccount) -> Result<Account, AccountError> {
    let username = validate_username(conn, &input.username, None)?;
    let full_name = validation::required("full_name", &input.full_name, 1, FULL_NAME_MAX)?;
    let email = validation::optional_email("email", input.email.as_deref(), EMAIL_MAX)?;
    let location = validation::optional("location", input.location.as_deref(), LOCATION_MAX)?;
    validation::new_password(&input.password, &input.confirm_password)?;
    let doctor_id = supervisor_for(conn, input.role, input.doctor_id)?;

    let account = Account {
        id: Uuid::new_v4(),
        username,
        password_hash: hash_password(&input.password),
        role: input.role,
        full_name: Some(full_name),
        email,
        location,
        created_at: Utc::now().naive_utc(),
        is_active: true,
        doctor_id,
    };
    repository::insert_account(conn, &account)?;
    tracing::info!(account_id = %account.id, role = %account.role, "Account registered");
    Ok(account)
}

pub fn update_account(conn: &Connection, id: &Uuid, input: &AccountUpdate) -> Result<Account, AccountError> {
    let mut account = repository::get_account(conn, id)?.ok_or(AccountError::NotFound)?;

    account.username = validate_username(conn, &input.username, Some(id))?;
    account.full_name = Some(validation::required("full_name", &input.full_name, 1, FULL_NAME_MAX)?);
    account.email = validation::optional_email("email", input.email.as_deref(), EMAIL_MAX)?;
    account.location = validation::optional("location", input.location.as_deref(), LOCATION_MAX)?;
    account.doctor_id = supervisor_for(conn, input.role, input.doctor_id.or(account.doctor_id))?;
    if account.is_doctor()
        && input.role != Role::Doctor
        && !repository::assistant_ids(conn, &account.id)?.is_empty()
    {
        return Err(AccountError::SupervisesAssistants);
    }
    account.role = input.role;
    account.is_active = input.is_active;

    repository::update_account(conn, &account)?;
    tracing::info!(account_id = %account.id, role = %account.role, active = account.is_active, "Account updated");
    Ok(account)
}

pub fn list_accounts(conn: &Connection) -> Result<Vec<Account>, AccountError> {
    Ok(repository::list_accounts(conn)?)
}

// ── Assistant management ────────────────────────────────────

/// Create an assistant. A doctor supervises it directly; an admin must name
/// the supervising doctor.
pub fn create_assistant(
    conn: &Connection,
    caller: &Account,
    input: &NewAssistant,
) -> Result<Account, AccountError> {
    let supervisor = assistant_supervisor(conn, caller, input.doctor_id)?;
    let username = validate_username(conn, &input.username, None)?;
    let full_name = validation::required("full_name", &input.full_name, 1, FULL_NAME_MAX)?;
    let email = validation::optional_email("email", input.email.as_deref(), EMAIL_MAX)?;
    validation::new_password(&input.password, &input.confirm_password)?;

    let account = Account {
        id: Uuid::new_v4(),
        username,
        password_hash: hash_password(&input.password),
        role: Role::Assistant,
        full_name: Some(full_name),
        email,
        location: None,
        created_at: Utc::now().naive_utc(),
        is_active: true,
        doctor_id: Some(supervisor),
    };
    repository::insert_account(conn, &account)?;
    tracing::info!(account_id = %account.id, %supervisor, "Assistant created");
    Ok(account)
}

/// Edit an assistant. Doctors reach only their own; anyone else's is not found.
pub fn update_assistant(
    conn: &Connection,
    caller: &Account,
    id: &Uuid,
    input: &AssistantUpdate,
) -> Result<Account, AccountError> {
    let mut account = repository::get_account(conn, id)?
        .filter(|a| a.is_assistant() && supervises(caller, a))
        .ok_or(AccountError::NotFound)?;

    account.username = validate_username(conn, &input.username, Some(id))?;
    account.full_name = Some(validation::required("full_name", &input.full_name, 1, FULL_NAME_MAX)?);
    account.email = validation::optional_email("email", input.email.as_deref(), EMAIL_MAX)?;
    account.is_active = input.is_active;

    repository::update_account(conn, &account)?;
    tracing::info!(account_id = %account.id, active = account.is_active, "Assistant updated");
    Ok(account)
}

/// Assistants the caller manages: all of them for an admin.
pub fn list_assistants(conn: &Connection, caller: &Account) -> Result<Vec<Account>, AccountError> {
    if caller.is_admin() {
        return Ok(repository::list_all_assistants(conn)?);
    }
    Ok(repository::list_assistants(conn, &caller.id)?)
}

// ── Bootstrap ───────────────────────────────────────────────

/// Create the admin account if no account holds `username`. Returns whether
/// one was created.
pub fn ensure_default_admin(conn: &Connection, username: &str, password: &str) -> Result<bool, AccountError> {
    if repository::get_account_by_username(conn, username)?.is_some() {
        return Ok(false);
    }
    let account = Account {
        id: Uuid::new_v4(),
        username: username.to_string(),
        password_hash: hash_password(password),
        role: Role::Admin,
        full_name: Some("Administrator".to_string()),
        email: None,
        location: None,
        created_at: Utc::now().naive_utc(),
        is_active: true,
        doctor_id: None,
    };
    repository::insert_account(conn, &account)?;
    tracing::info!(username, "Default admin account created");
    Ok(true)
}

// ── Helpers ─────────────────────────────────────────────────

fn validate_username(conn: &Connection, raw: &str, exclude_id: Option<&Uuid>) -> Result<String, AccountError> {
    let username = validation::required("username", raw, USERNAME_MIN, USERNAME_MAX)?;
    if repository::username_taken(conn, &username, exclude_id)? {
        return Err(AccountError::UsernameTaken);
    }
    Ok(username)
}

/// Supervisor to store for `role`: an active doctor for assistants, none otherwise.
fn supervisor_for(conn: &Connection, role: Role, doctor_id: Option<Uuid>) -> Result<Option<Uuid>, AccountError> {
    if role != Role::Assistant {
        return Ok(None);
    }
    let doctor_id = doctor_id.ok_or(AccountError::InvalidSupervisor)?;
    match repository::get_account(conn, &doctor_id)? {
        Some(doctor) if doctor.is_doctor() && doctor.is_active => Ok(Some(doctor.id)),
        _ => Err(AccountError::InvalidSupervisor),
    }
}

/// Doctor who supervises an assistant created by `caller`.
fn assistant_supervisor(conn: &Connection, caller: &Account, requested: Option<Uuid>) -> Result<Uuid, AccountError> {
    if caller.is_admin() {
        return supervisor_for(conn, Role::Assistant, requested)?.ok_or(AccountError::InvalidSupervisor);
    }
    if caller.is_doctor() && caller.is_active {
        return Ok(caller.id);
    }
    Err(AccountError::InvalidSupervisor)
}

fn supervises(caller: &Account, assistant: &Account) -> bool {
    caller.is_admin() || (caller.is_doctor() && assistant.doctor_id == Some(caller.id))
}
