//! Patient endpoints.
//!
//! - `GET /api/patients?q=`: scoped list, or a global search with `q`
//! - `POST /api/patients`: create
//! - `GET /api/patients/:id`: detail with visits and diagnoses
//! - `PUT /api/patients/:id`: edit
//! - `DELETE /api/patients/:id`: delete with visits and diagnoses
//! - `POST /api/patients/:id/visits`: record a visit

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::api::endpoints::{now, parse_id};
use crate::api::error::ApiError;
use crate::api::types::{AccountContext, ApiContext};
use crate::models::{Patient, Visit};
use crate::patients::{self, PatientDetail, PatientInput};
use crate::visits::{self, VisitInput};

#[derive(Deserialize)]
pub struct PatientListQuery {
    pub q: Option<String>,
}

#[derive(Serialize)]
pub struct PatientListResponse {
    pub patients: Vec<Patient>,
    pub total: usize,
    /// True when the list came from a global search rather than the scope.
    pub search: bool,
}

/// `GET /api/patients`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AccountContext>,
    Query(query): Query<PatientListQuery>,
) -> Result<Json<PatientListResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let q = query.q.as_deref();
    let patients = patients::list_patients(&conn, &auth.account, ctx.core.scope_policy(), q)?;
    Ok(Json(PatientListResponse {
        total: patients.len(),
        search: q.is_some_and(|q| !q.trim().is_empty()),
        patients,
    }))
}

/// `POST /api/patients`
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AccountContext>,
    Json(body): Json<PatientInput>,
) -> Result<(StatusCode, Json<Patient>), ApiError> {
    let conn = ctx.core.open_db()?;
    let patient = patients::create_patient(&conn, &auth.account, &body, now().date())?;
    Ok((StatusCode::CREATED, Json(patient)))
}

/// `GET /api/patients/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AccountContext>,
    Path(id): Path<String>,
) -> Result<Json<PatientDetail>, ApiError> {
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let detail = patients::patient_detail(&conn, &auth.account, ctx.core.scope_policy(), &id, now().date())?;
    Ok(Json(detail))
}

/// `PUT /api/patients/:id`
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AccountContext>,
    Path(id): Path<String>,
    Json(body): Json<PatientInput>,
) -> Result<Json<Patient>, ApiError> {
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let patient = patients::update_patient(
        &conn,
        &auth.account,
        ctx.core.scope_policy(),
        &id,
        &body,
        now().date(),
    )?;
    Ok(Json(patient))
}

/// `DELETE /api/patients/:id`
pub async fn delete(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AccountContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    patients::delete_patient(&conn, &auth.account, ctx.core.scope_policy(), &id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/patients/:id/visits`
pub async fn create_visit(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AccountContext>,
    Path(id): Path<String>,
    Json(body): Json<VisitInput>,
) -> Result<(StatusCode, Json<Visit>), ApiError> {
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let visit = visits::create_visit(&conn, &auth.account, ctx.core.scope_policy(), &id, &body, now())?;
    Ok((StatusCode::CREATED, Json(visit)))
}
