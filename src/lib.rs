pub mod accounts;
pub mod api;
pub mod authorization;
pub mod config;
pub mod core_state;
pub mod crypto;
pub mod db;
pub mod models;
pub mod patients;
pub mod pipeline;
pub mod reconcile;
pub mod scoping;
pub mod session;
pub mod validation;
pub mod visits;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::core_state::{CoreError, CoreState};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Cannot create data directory {path}: {source}")]
    DataDir {
        path: String,
        source: std::io::Error,
    },
    #[error(transparent)]
    State(#[from] CoreError),
    #[error("Cannot create admin account: {0}")]
    Bootstrap(#[from] accounts::AccountError),
    #[error("{0}")]
    Server(String),
    #[error("Signal handler failed: {0}")]
    Signal(std::io::Error),
}

/// Open the database, make sure an admin exists and return shared state.
pub fn prepare(config: AppConfig) -> Result<Arc<CoreState>, StartupError> {
    if let Some(parent) = config.database_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| StartupError::DataDir {
            path: parent.display().to_string(),
            source,
        })?;
    }

    let core = Arc::new(CoreState::new(config));
    let conn = core.open_db()?;
    let created = accounts::ensure_default_admin(&conn, &core.config.admin_username, &core.config.admin_password)?;
    if created && core.config.uses_default_admin_password() {
        tracing::warn!(
            username = %core.config.admin_username,
            "Admin account created with the default password; change it after first login"
        );
    }
    Ok(core)
}

/// Run the service until Ctrl-C.
pub async fn run() -> Result<(), StartupError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    let config = AppConfig::from_env();
    tracing::info!(
        version = config::APP_VERSION,
        database = %config.database_path.display(),
        scope = %config.scope_policy,
        "{} starting",
        config::APP_NAME
    );

    let bind_addr = config.bind_addr;
    let core = prepare(config)?;
    let server = api::start_api_server(core.clone(), bind_addr)
        .await
        .map_err(StartupError::Server)?;
    tracing::info!(addr = %server.addr, "Listening");

    tokio::signal::ctrl_c().await.map_err(StartupError::Signal)?;
    tracing::info!("Shutdown requested");
    server.stop().await;

    match core.flush_and_prune_audit() {
        Ok(flushed) => tracing::info!(flushed, "Audit log flushed"),
        Err(e) => tracing::warn!("Final audit flush failed: {e}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::get_account_by_username;
    use crate::models::enums::Role;

    #[test]
    fn prepare_creates_directory_and_admin_once() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            database_path: dir.path().join("nested").join("clinic.db"),
            ..AppConfig::default()
        };

        let core = prepare(config.clone()).unwrap();
        let conn = core.open_db().unwrap();
        let admin = get_account_by_username(&conn, "admin").unwrap().unwrap();
        assert_eq!(admin.role, Role::Admin);

        prepare(config).unwrap();
        let admins: i64 = conn
            .query_row("SELECT COUNT(*) FROM accounts WHERE role = 'admin'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(admins, 1);
    }
}
