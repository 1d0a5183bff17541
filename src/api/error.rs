//! API error types with structured JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::accounts::AccountError;
use crate::core_state::CoreError;
use crate::patients::PatientError;
use crate::pipeline::export::ExportError;
use crate::pipeline::import::ImportError;
use crate::validation::FieldError;
use crate::visits::VisitError;

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing_id: Option<Uuid>,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication required")]
    Unauthorized,
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("Permission denied")]
    Forbidden,
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("{field}: {message}")]
    Validation { field: &'static str, message: String },
    #[error("{message}")]
    Duplicate { existing_id: Uuid, message: String },
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut field = None;
        let mut existing_id = None;
        let (status, code, message) = match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "AUTH_REQUIRED",
                "Authentication required".to_string(),
            ),
            ApiError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "AUTH_REQUIRED",
                "Invalid username or password".to_string(),
            ),
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                "You do not have permission to perform this action".to_string(),
            ),
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, "NOT_FOUND", detail),
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail),
            ApiError::Validation { field: f, message } => {
                field = Some(f);
                (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION", message)
            }
            ApiError::Duplicate { existing_id: id, message } => {
                existing_id = Some(id);
                (StatusCode::CONFLICT, "DUPLICATE_PATIENT", message)
            }
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code,
                message,
                field,
                existing_id,
            },
        };
        (status, Json(body)).into_response()
    }
}

impl From<FieldError> for ApiError {
    fn from(err: FieldError) -> Self {
        ApiError::Validation {
            field: err.field,
            message: err.message,
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::LockPoisoned => ApiError::Internal("lock poisoned".into()),
            CoreError::Database(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(err: rusqlite::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<crate::db::DatabaseError> for ApiError {
    fn from(err: crate::db::DatabaseError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::InvalidCredentials => ApiError::InvalidCredentials,
            AccountError::WrongPassword => ApiError::Validation {
                field: "current_password",
                message: err.to_string(),
            },
            AccountError::UsernameTaken => ApiError::Validation {
                field: "username",
                message: err.to_string(),
            },
            AccountError::InvalidSupervisor => ApiError::Validation {
                field: "doctor_id",
                message: err.to_string(),
            },
            AccountError::SupervisesAssistants => ApiError::Validation {
                field: "role",
                message: err.to_string(),
            },
            AccountError::NotFound => ApiError::NotFound(err.to_string()),
            AccountError::Validation(e) => e.into(),
            AccountError::Database(e) => e.into(),
            AccountError::Crypto(e) => ApiError::Internal(e.to_string()),
            AccountError::State(e) => e.into(),
        }
    }
}

impl From<PatientError> for ApiError {
    fn from(err: PatientError) -> Self {
        match err {
            PatientError::NotFound => ApiError::NotFound(err.to_string()),
            PatientError::Forbidden => ApiError::Forbidden,
            PatientError::Duplicate { existing_id, .. } => ApiError::Duplicate {
                existing_id,
                message: err.to_string(),
            },
            PatientError::Validation(e) => e.into(),
            PatientError::Database(e) => e.into(),
        }
    }
}

impl From<VisitError> for ApiError {
    fn from(err: VisitError) -> Self {
        match err {
            VisitError::NotFound | VisitError::PatientNotFound => ApiError::NotFound(err.to_string()),
            VisitError::Forbidden => ApiError::Forbidden,
            VisitError::Validation(e) => e.into(),
            VisitError::Database(e) => e.into(),
        }
    }
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::Database(e) => e.into(),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl From<ExportError> for ApiError {
    fn from(err: ExportError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
