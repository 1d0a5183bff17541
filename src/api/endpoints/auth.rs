//! Session endpoints.
//!
//! - `POST /api/auth/login`: credentials → bearer token
//! - `POST /api/auth/logout`: end the current session
//! - `GET /api/auth/me`: current account and its capabilities
//! - `POST /api/auth/password`: change own password

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::accounts::{self, PasswordChange};
use crate::api::error::ApiError;
use crate::api::types::{AccountContext, ApiContext};
use crate::authorization::Capabilities;
use crate::models::Account;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub account: Account,
    pub capabilities: Capabilities,
}

#[derive(Serialize)]
pub struct MeResponse {
    pub account: Account,
    pub capabilities: Capabilities,
}

/// `POST /api/auth/login`
pub async fn login(
    State(ctx): State<ApiContext>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let (account, token) = accounts::login(&ctx.core, &conn, &body.username, &body.password)?;
    Ok(Json(LoginResponse {
        token,
        capabilities: Capabilities::for_role(account.role),
        account,
    }))
}

/// `POST /api/auth/logout`
pub async fn logout(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AccountContext>,
) -> Result<StatusCode, ApiError> {
    accounts::logout(&ctx.core, &auth.token)?;
    tracing::info!(account_id = %auth.account.id, "Logged out");
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/auth/me`
pub async fn me(Extension(auth): Extension<AccountContext>) -> Json<MeResponse> {
    Json(MeResponse {
        capabilities: Capabilities::for_role(auth.account.role),
        account: auth.account,
    })
}

/// `POST /api/auth/password`
pub async fn change_password(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AccountContext>,
    Json(body): Json<PasswordChange>,
) -> Result<StatusCode, ApiError> {
    let conn = ctx.core.open_db()?;
    accounts::change_password(&conn, &auth.account, &body)?;
    Ok(StatusCode::NO_CONTENT)
}
