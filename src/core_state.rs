//! Shared application state.
//!
//! `CoreState` holds configuration, the session store and the audit buffer.
//! It is wrapped in `Arc` at startup and shared by every request; each
//! request opens its own database connection through [`CoreState::open_db`].

use std::sync::{Mutex, RwLock};
use std::time::Duration;

use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::db::{self, TIMESTAMP_FORMAT};
use crate::models::enums::ScopePolicy;
use crate::session::SessionStore;

/// Maximum audit buffer size before flush.
const AUDIT_BUFFER_CAPACITY: usize = 100;

/// Audit rows older than this are pruned on flush.
const AUDIT_RETENTION_DAYS: i64 = 90;

// ═══════════════════════════════════════════════════════════
// CoreState
// ═══════════════════════════════════════════════════════════

pub struct CoreState {
    pub config: AppConfig,
    sessions: RwLock<SessionStore>,
    audit: AuditLogger,
}

impl CoreState {
    pub fn new(config: AppConfig) -> Self {
        let ttl = Duration::from_secs(config.session_ttl_secs);
        Self {
            config,
            sessions: RwLock::new(SessionStore::new(ttl)),
            audit: AuditLogger::new(),
        }
    }

    /// Open a database connection (migrations applied, foreign keys on).
    pub fn open_db(&self) -> Result<rusqlite::Connection, CoreError> {
        Ok(db::open_database(&self.config.database_path)?)
    }

    pub fn scope_policy(&self) -> ScopePolicy {
        self.config.scope_policy
    }

    // ── Sessions ────────────────────────────────────────────

    /// Start a session; returns the bearer token.
    pub fn start_session(&self, account_id: Uuid) -> Result<String, CoreError> {
        let mut sessions = self.sessions.write().map_err(|_| CoreError::LockPoisoned)?;
        Ok(sessions.create(account_id))
    }

    /// Account behind a live token.
    ///
    /// Takes the write lock: resolving drops an expired session.
    pub fn resolve_session(&self, token: &str) -> Result<Option<Uuid>, CoreError> {
        let mut sessions = self.sessions.write().map_err(|_| CoreError::LockPoisoned)?;
        Ok(sessions.resolve(token))
    }

    pub fn end_session(&self, token: &str) -> Result<bool, CoreError> {
        let mut sessions = self.sessions.write().map_err(|_| CoreError::LockPoisoned)?;
        Ok(sessions.revoke(token))
    }

    /// End every session of an account (deactivation).
    pub fn end_account_sessions(&self, account_id: &Uuid) -> Result<usize, CoreError> {
        let mut sessions = self.sessions.write().map_err(|_| CoreError::LockPoisoned)?;
        Ok(sessions.revoke_account(account_id))
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    // ── Audit ───────────────────────────────────────────────

    /// Record an access event; flushes to the database when the buffer fills.
    pub fn log_access(&self, source: AccessSource, action: &str, entity: &str) {
        let needs_flush = self.audit.log(source, action, entity);
        if needs_flush {
            if let Err(e) = self.flush_and_prune_audit() {
                tracing::warn!("Auto-flush audit failed: {e}");
            }
        }
    }

    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.audit.entries()
    }

    /// Flush audit buffer to DB and prune entries past retention.
    pub fn flush_and_prune_audit(&self) -> Result<usize, CoreError> {
        let conn = self.open_db()?;
        let flushed = self.audit.flush_to_db(&conn)?;
        if let Err(e) = db::repository::prune_audit_log(&conn, AUDIT_RETENTION_DAYS) {
            tracing::warn!("Failed to prune audit log: {e}");
        }
        Ok(flushed)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Internal lock error")]
    LockPoisoned,
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
}

// ═══════════════════════════════════════════════════════════
// Access source
// ═══════════════════════════════════════════════════════════

/// Who issued a request, as recorded in the audit trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessSource {
    /// No valid session (login attempts, health checks, rejected tokens).
    Anonymous,
    Account { account_id: Uuid, username: String },
}

impl std::fmt::Display for AccessSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Anonymous => write!(f, "anonymous"),
            Self::Account { username, .. } => write!(f, "account:{username}"),
        }
    }
}

impl AccessSource {
    pub fn account_id(&self) -> Option<Uuid> {
        match self {
            Self::Anonymous => None,
            Self::Account { account_id, .. } => Some(*account_id),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Audit logger
// ═══════════════════════════════════════════════════════════

/// In-memory audit log buffer. Entries are flushed to SQLite
/// when the buffer reaches capacity or on explicit flush.
pub struct AuditLogger {
    buffer: Mutex<Vec<AuditEntry>>,
}

#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub timestamp: NaiveDateTime,
    pub source: AccessSource,
    pub action: String,
    pub entity: String,
}

impl AuditLogger {
    pub fn new() -> Self {
        Self {
            buffer: Mutex::new(Vec::with_capacity(AUDIT_BUFFER_CAPACITY)),
        }
    }

    /// Log an access event to the in-memory buffer.
    /// Returns `true` if the buffer has reached flush threshold.
    pub fn log(&self, source: AccessSource, action: &str, entity: &str) -> bool {
        if let Ok(mut buf) = self.buffer.lock() {
            buf.push(AuditEntry {
                timestamp: chrono::Utc::now().naive_utc(),
                source,
                action: action.to_string(),
                entity: entity.to_string(),
            });
            buf.len() >= AUDIT_BUFFER_CAPACITY
        } else {
            false
        }
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.buffer
            .lock()
            .map(|buf| buf.clone())
            .unwrap_or_default()
    }

    pub fn drain(&self) -> Vec<AuditEntry> {
        self.buffer
            .lock()
            .map(|mut buf| buf.drain(..).collect())
            .unwrap_or_default()
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.lock().map(|buf| buf.len()).unwrap_or(0)
    }

    /// Write buffered entries to the audit_log table.
    pub fn flush_to_db(&self, conn: &rusqlite::Connection) -> Result<usize, CoreError> {
        let entries = self.drain();
        if entries.is_empty() {
            return Ok(0);
        }

        let rows: Vec<db::repository::AuditRow> = entries
            .iter()
            .map(|e| {
                (
                    e.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                    e.source.to_string(),
                    e.action.clone(),
                    e.entity.clone(),
                    e.source.account_id().map(|id| id.to_string()),
                )
            })
            .collect();

        let count = rows.len();
        db::repository::insert_audit_entries(conn, &rows)?;

        tracing::debug!(count, "Flushed audit entries to database");
        Ok(count)
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
