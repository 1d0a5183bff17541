//! Per-route authorization.
//!
//! Each protected route is bound to an [`Operation`] through
//! `route_layer(from_fn_with_state(op, permit))`. The role table in
//! [`crate::authorization`] decides before the handler runs, so a denied
//! request never reaches a mutation.

use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::types::AccountContext;
use crate::authorization::{authorize_account, Operation};

pub async fn permit(
    State(operation): State<Operation>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let Some(ctx) = req.extensions().get::<AccountContext>() else {
        return ApiError::Unauthorized.into_response();
    };

    let decision = authorize_account(&ctx.account, operation);
    if !decision.allowed {
        tracing::warn!(
            account_id = %ctx.account.id,
            role = %ctx.account.role,
            operation = operation.as_str(),
            reason = ?decision.reason,
            "Operation denied"
        );
        return ApiError::Forbidden.into_response();
    }

    next.run(req).await
}
