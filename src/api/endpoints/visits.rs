//! Visit endpoints.
//!
//! - `GET /api/visits/:id`: visit with its patient and diagnoses
//! - `POST /api/visits/:id/diagnoses`: add a diagnosis
//! - `DELETE /api/visits/:id`: delete a visit and its diagnoses

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Serialize;
use uuid::Uuid;

use crate::api::endpoints::parse_id;
use crate::api::error::ApiError;
use crate::api::types::{AccountContext, ApiContext};
use crate::models::Diagnosis;
use crate::visits::{self, DiagnosisInput, VisitDetail};

#[derive(Serialize)]
pub struct VisitDeletedResponse {
    pub patient_id: Uuid,
}

/// `GET /api/visits/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AccountContext>,
    Path(id): Path<String>,
) -> Result<Json<VisitDetail>, ApiError> {
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    Ok(Json(visits::visit_detail(&conn, &auth.account, ctx.core.scope_policy(), &id)?))
}

/// `POST /api/visits/:id/diagnoses`
pub async fn add_diagnosis(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AccountContext>,
    Path(id): Path<String>,
    Json(body): Json<DiagnosisInput>,
) -> Result<(StatusCode, Json<Diagnosis>), ApiError> {
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let diagnosis = visits::add_diagnosis(&conn, &auth.account, ctx.core.scope_policy(), &id, &body)?;
    Ok((StatusCode::CREATED, Json(diagnosis)))
}

/// `DELETE /api/visits/:id`: returns the patient the visit belonged to.
pub async fn delete(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AccountContext>,
    Path(id): Path<String>,
) -> Result<Json<VisitDeletedResponse>, ApiError> {
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let patient_id = visits::delete_visit(&conn, &auth.account, ctx.core.scope_policy(), &id)?;
    Ok(Json(VisitDeletedResponse { patient_id }))
}
