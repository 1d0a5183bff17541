//! Bearer token authentication middleware.
//!
//! Extracts `Authorization: Bearer <token>`, resolves it against the
//! session store, loads the account and injects `AccountContext` into
//! request extensions for downstream handlers.

use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::types::{AccountContext, ApiContext};
use crate::db::repository;

/// Require a live session for an active account.
///
/// Accesses `ApiContext` from request extensions (injected by Extension layer).
pub async fn require_auth(req: Request<axum::body::Body>, next: Next) -> Response {
    match require_auth_inner(req, next).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

async fn require_auth_inner(
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    // 1. Extract bearer token
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?
        .to_string();

    // 2. Resolve session
    let account_id = ctx.core.resolve_session(&token)?.ok_or(ApiError::Unauthorized)?;

    // 3. Load account; a deactivated or removed account loses its session
    let account = {
        let conn = ctx.core.open_db()?;
        repository::get_account(&conn, &account_id)?
    };
    let account = match account {
        Some(account) if account.is_active => account,
        _ => {
            tracing::info!(%account_id, "Session dropped for inactive account");
            ctx.core.end_session(&token)?;
            return Err(ApiError::Unauthorized);
        }
    };

    // 4. Inject account context for downstream handlers
    req.extensions_mut().insert(AccountContext { account, token });

    Ok(next.run(req).await)
}
