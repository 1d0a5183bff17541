//! Admin user management.
//!
//! - `GET /api/accounts`: every account
//! - `POST /api/accounts`: register an account of any role
//! - `PUT /api/accounts/:id`: edit, including role and active flag

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::accounts::{self, AccountUpdate, NewAccount};
use crate::api::endpoints::parse_id;
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::models::Account;

/// `GET /api/accounts`
pub async fn list(State(ctx): State<ApiContext>) -> Result<Json<Vec<Account>>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(accounts::list_accounts(&conn)?))
}

/// `POST /api/accounts`
pub async fn create(
    State(ctx): State<ApiContext>,
    Json(body): Json<NewAccount>,
) -> Result<(StatusCode, Json<Account>), ApiError> {
    let conn = ctx.core.open_db()?;
    let account = accounts::register_account(&conn, &body)?;
    Ok((StatusCode::CREATED, Json(account)))
}

/// `PUT /api/accounts/:id`
pub async fn update(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
    Json(body): Json<AccountUpdate>,
) -> Result<Json<Account>, ApiError> {
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let account = accounts::update_account(&conn, &id, &body)?;
    if !account.is_active {
        let ended = ctx.core.end_account_sessions(&account.id)?;
        tracing::info!(account_id = %account.id, ended, "Sessions ended for deactivated account");
    }
    Ok(Json(account))
}
