//! Assistant management for the calling account.
//!
//! - `GET /api/assistants`: assistants supervised by the caller (all for admins)
//! - `POST /api/assistants`: create one; admins pass the supervising `doctor_id`
//! - `PUT /api/assistants/:id`: edit one of the caller's own

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};

use crate::accounts::{self, AssistantUpdate, NewAssistant};
use crate::api::endpoints::parse_id;
use crate::api::error::ApiError;
use crate::api::types::{AccountContext, ApiContext};
use crate::models::Account;

/// `GET /api/assistants`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AccountContext>,
) -> Result<Json<Vec<Account>>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(accounts::list_assistants(&conn, &auth.account)?))
}

/// `POST /api/assistants`
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AccountContext>,
    Json(body): Json<NewAssistant>,
) -> Result<(StatusCode, Json<Account>), ApiError> {
    let conn = ctx.core.open_db()?;
    let account = accounts::create_assistant(&conn, &auth.account, &body)?;
    Ok((StatusCode::CREATED, Json(account)))
}

/// `PUT /api/assistants/:id`
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AccountContext>,
    Path(id): Path<String>,
    Json(body): Json<AssistantUpdate>,
) -> Result<Json<Account>, ApiError> {
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let account = accounts::update_assistant(&conn, &auth.account, &id, &body)?;
    if !account.is_active {
        ctx.core.end_account_sessions(&account.id)?;
    }
    Ok(Json(account))
}
