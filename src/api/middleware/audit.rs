//! Audit logging middleware.
//!
//! Logs every API request with the account, method, path and response
//! status. Runs inside auth, so `AccountContext` is present for
//! authenticated requests.

use axum::extract::OriginalUri;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::types::{AccountContext, ApiContext};
use crate::core_state::AccessSource;

/// Log API access for audit trail.
/// Accesses `ApiContext` from request extensions.
pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().to_string();
    // Nested routers see a stripped URI; record the full path.
    let path = req
        .extensions()
        .get::<OriginalUri>()
        .map(|uri| uri.path().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let ctx = req.extensions().get::<ApiContext>().cloned();
    let source = req
        .extensions()
        .get::<AccountContext>()
        .map(AccountContext::source)
        .unwrap_or(AccessSource::Anonymous);

    let response = next.run(req).await;

    if let Some(ctx) = ctx {
        let status = response.status().as_u16();
        ctx.core
            .log_access(source, &format!("{method} {path}"), &format!("status:{status}"));
    }

    response
}
