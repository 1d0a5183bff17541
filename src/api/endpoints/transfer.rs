//! Spreadsheet transfer endpoints.
//!
//! - `POST /api/patients/import`: multipart upload (`file` field) of an
//!   `.xlsx`/`.xls` workbook; admins name the receiving doctor with
//!   `?doctor_id=`
//! - `GET /api/patients/export`: the caller's accessible patients as an
//!   `.xlsx` download

use axum::extract::{Multipart, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::endpoints::{now, parse_id};
use crate::api::error::ApiError;
use crate::api::types::{AccountContext, ApiContext};
use crate::db::repository;
use crate::models::Account;
use crate::pipeline::export::{export_patients, XLSX_CONTENT_TYPE};
use crate::pipeline::import::{detect_spreadsheet, import_rows, read_rows, sanitize_filename, ImportReport};
use crate::scoping::accessible_patients;

/// Multipart field carrying the workbook.
const UPLOAD_FIELD: &str = "file";

#[derive(Deserialize)]
pub struct ImportQuery {
    pub doctor_id: Option<String>,
}

/// Doctor whose practice receives the imported patients.
fn receiving_doctor(
    ctx: &ApiContext,
    account: &Account,
    requested: Option<&str>,
) -> Result<Uuid, ApiError> {
    if !account.is_admin() {
        return account
            .owning_doctor_id()
            .ok_or_else(|| ApiError::BadRequest("Account has no practice to import into".into()));
    }

    let raw = requested
        .filter(|r| !r.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("doctor_id is required when an admin imports".into()))?;
    let doctor_id = parse_id(raw.trim())?;
    let conn = ctx.core.open_db()?;
    match repository::get_account(&conn, &doctor_id)? {
        Some(doctor) if doctor.is_doctor() && doctor.is_active => Ok(doctor.id),
        _ => Err(ApiError::Validation {
            field: "doctor_id",
            message: "Unknown or inactive doctor".into(),
        }),
    }
}

/// `POST /api/patients/import`
pub async fn import(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AccountContext>,
    Query(query): Query<ImportQuery>,
    mut multipart: Multipart,
) -> Result<Json<ImportReport>, ApiError> {
    let owning_doctor = receiving_doctor(&ctx, &auth.account, query.doctor_id.as_deref())?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed upload: {e}")))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Could not read upload: {e}")))?;
        upload = Some((filename, bytes));
        break;
    }
    let (filename, bytes) = upload.ok_or_else(|| ApiError::BadRequest("No file uploaded".into()))?;

    let format = detect_spreadsheet(&filename, &bytes)?;
    tracing::info!(
        file = %sanitize_filename(&filename),
        format = format.as_str(),
        size = bytes.len(),
        "Import upload received"
    );

    let core = ctx.core.clone();
    let importer = auth.account;
    let summary = tokio::task::spawn_blocking(move || -> Result<_, ApiError> {
        let rows = read_rows(&bytes)?;
        let mut conn = core.open_db()?;
        Ok(import_rows(&mut conn, &rows, &importer, &owning_doctor)?)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("import task failed: {e}")))??;

    Ok(Json(summary.report()))
}

/// `GET /api/patients/export`
pub async fn export(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AccountContext>,
) -> Result<impl IntoResponse, ApiError> {
    let conn = ctx.core.open_db()?;
    let patients = accessible_patients(&conn, &auth.account, ctx.core.scope_policy())?;
    let (filename, bytes) = export_patients(&conn, &patients, now())?;

    let headers = [
        (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        ),
    ];
    Ok((headers, bytes))
}
