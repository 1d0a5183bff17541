//! HTTP API.
//!
//! All routes live under `/api/`. Protected routes run through
//! Auth → Authorize → Audit → Handler; `/health` and `/auth/login` skip
//! authentication.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{start_api_server, ApiServer};
pub use types::ApiContext;
