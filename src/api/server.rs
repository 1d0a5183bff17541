//! API server lifecycle: bind, spawn the axum server in a background task
//! and hand back a handle with a shutdown channel.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::api::router::api_router;
use crate::core_state::CoreState;

/// Handle to a running API server.
#[derive(Debug)]
pub struct ApiServer {
    pub addr: SocketAddr,
    pub started_at: chrono::NaiveDateTime,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ApiServer {
    /// Send the graceful shutdown signal. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            tracing::info!("API server shutdown signal sent");
        }
    }

    /// Signal shutdown and wait for in-flight requests to finish.
    pub async fn stop(mut self) {
        self.shutdown();
        if let Err(e) = (&mut self.task).await {
            tracing::error!("API server task failed: {e}");
        }
    }
}

/// Start the API server on `addr`.
///
/// Port 0 binds an ephemeral port; the bound address is on the handle.
pub async fn start_api_server(core: Arc<CoreState>, addr: SocketAddr) -> Result<ApiServer, String> {
    // 1. Bind
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind API server on {addr}: {e}"))?;

    let addr = listener
        .local_addr()
        .map_err(|e| format!("Failed to get server address: {e}"))?;

    // 2. Build the router (full middleware stack)
    let app = api_router(core);

    // 3. Set up shutdown signal
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    // 4. Spawn server in background task
    let task = tokio::spawn(async move {
        let shutdown_signal = async move {
            let _ = shutdown_rx.await;
            tracing::info!("API server received shutdown signal");
        };

        tracing::info!(%addr, "API server started");

        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
        {
            tracing::error!("API server error: {e}");
        }

        tracing::info!("API server stopped");
    });

    Ok(ApiServer {
        addr,
        started_at: chrono::Utc::now().naive_utc(),
        shutdown_tx: Some(shutdown_tx),
        task,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use crate::config::AppConfig;

    fn test_core(dir: &tempfile::TempDir) -> Arc<CoreState> {
        Arc::new(CoreState::new(AppConfig {
            database_path: dir.path().join("clinic.db"),
            ..AppConfig::default()
        }))
    }

    fn localhost() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
    }

    /// Minimal HTTP/1.1 GET; returns the raw response text.
    async fn http_get(addr: SocketAddr, path: &str) -> String {
        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        let request = format!("GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn start_and_stop_server() {
        let dir = tempfile::tempdir().unwrap();
        let server = start_api_server(test_core(&dir), localhost())
            .await
            .expect("server should start");
        assert!(server.addr.port() > 0);

        let response = http_get(server.addr, "/api/health").await;
        assert!(response.starts_with("HTTP/1.1 200"), "got: {response}");
        assert!(response.contains("\"status\":\"ok\""));

        server.stop().await;
    }

    #[tokio::test]
    async fn server_rejects_anonymous_patient_list() {
        let dir = tempfile::tempdir().unwrap();
        let server = start_api_server(test_core(&dir), localhost())
            .await
            .expect("server should start");

        let response = http_get(server.addr, "/api/patients").await;
        assert!(response.starts_with("HTTP/1.1 401"), "got: {response}");

        server.stop().await;
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut server = start_api_server(test_core(&dir), localhost())
            .await
            .expect("server should start");

        server.shutdown();
        server.shutdown(); // Second call should be safe
        server.stop().await;
    }

    #[tokio::test]
    async fn bind_conflict_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let first = start_api_server(test_core(&dir), localhost()).await.unwrap();
        let err = start_api_server(test_core(&dir), first.addr).await.unwrap_err();
        assert!(err.contains("Failed to bind"));
        first.stop().await;
    }
}
