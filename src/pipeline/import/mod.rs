//! Spreadsheet import of patients, visits and diagnoses.
//!
//! `format` validates the upload, `sheet` turns the first worksheet into
//! positional rows, `dates` parses the accepted date layouts, and
//! `importer` reconciles each row against existing patients.

pub mod dates;
pub mod format;
pub mod importer;
pub mod sheet;

pub use dates::*;
pub use format::*;
pub use importer::*;
pub use sheet::*;

use thiserror::Error;

use crate::db::DatabaseError;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Unsupported file format: {0}. Only Excel files (.xlsx, .xls) are allowed")]
    UnsupportedFormat(String),

    #[error("File too large: {size_mb:.1}MB exceeds {max_mb}MB limit")]
    FileTooLarge { size_mb: f64, max_mb: u64 },

    #[error("The uploaded file is empty")]
    EmptyFile,

    #[error("Workbook has no worksheets")]
    NoWorksheet,

    #[error("Could not read workbook: {0}")]
    Workbook(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl From<rusqlite::Error> for ImportError {
    fn from(err: rusqlite::Error) -> Self {
        ImportError::Database(DatabaseError::Sqlite(err))
    }
}

impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::Workbook(err.to_string())
    }
}
