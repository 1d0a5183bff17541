use std::net::SocketAddr;
use std::path::PathBuf;

use crate::models::enums::ScopePolicy;

/// Application-level constants
pub const APP_NAME: &str = "ClinicDesk";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5000";
pub const DEFAULT_SESSION_TTL_SECS: u64 = 12 * 60 * 60;
pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

/// Get the application data directory.
/// Platform data dir (e.g. ~/.local/share/ClinicDesk), or ./ClinicDesk when
/// no data dir can be determined.
pub fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Default SQLite database location.
pub fn default_database_path() -> PathBuf {
    app_data_dir().join("clinic.db")
}

/// Log filter used when RUST_LOG is not set.
pub fn default_log_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "clinicdesk_lib=debug,tower_http=debug,info"
    } else {
        "clinicdesk_lib=info,tower_http=info,warn"
    }
}

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub bind_addr: SocketAddr,
    pub session_ttl_secs: u64,
    pub scope_policy: ScopePolicy,
    pub admin_username: String,
    pub admin_password: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            scope_policy: ScopePolicy::Ownership,
            admin_username: DEFAULT_ADMIN_USERNAME.to_string(),
            admin_password: DEFAULT_ADMIN_PASSWORD.to_string(),
        }
    }
}

impl AppConfig {
    /// Read `CLINIC_*` environment variables over the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unparseable values keep the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(path) = lookup("CLINIC_DATABASE_PATH").filter(|v| !v.trim().is_empty()) {
            config.database_path = PathBuf::from(path);
        }

        if let Some(raw) = lookup("CLINIC_BIND_ADDR") {
            match raw.parse() {
                Ok(addr) => config.bind_addr = addr,
                Err(_) => tracing::warn!(value = %raw, "Invalid CLINIC_BIND_ADDR, using {DEFAULT_BIND_ADDR}"),
            }
        }

        if let Some(raw) = lookup("CLINIC_SESSION_TTL_SECS") {
            match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => config.session_ttl_secs = secs,
                _ => tracing::warn!(value = %raw, "Invalid CLINIC_SESSION_TTL_SECS, using default"),
            }
        }

        if let Some(raw) = lookup("CLINIC_PATIENT_SCOPE") {
            match raw.parse::<ScopePolicy>() {
                Ok(policy) => config.scope_policy = policy,
                Err(_) => tracing::warn!(value = %raw, "Unknown CLINIC_PATIENT_SCOPE, using ownership"),
            }
        }

        if let Some(username) = lookup("CLINIC_ADMIN_USERNAME").filter(|v| !v.trim().is_empty()) {
            config.admin_username = username.trim().to_string();
        }
        if let Some(password) = lookup("CLINIC_ADMIN_PASSWORD").filter(|v| !v.is_empty()) {
            config.admin_password = password;
        }

        config
    }

    pub fn uses_default_admin_password(&self) -> bool {
        self.admin_password == DEFAULT_ADMIN_PASSWORD
    }
}
