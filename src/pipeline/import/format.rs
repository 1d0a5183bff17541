use std::path::Path;

use serde::{Deserialize, Serialize};

use super::ImportError;

/// Workbook formats accepted for import.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SpreadsheetFormat {
    /// Office Open XML workbook (zip container).
    Xlsx,
    /// Legacy BIFF workbook (OLE2 compound file).
    Xls,
}

impl SpreadsheetFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Xlsx => "xlsx",
            Self::Xls => "xls",
        }
    }
}

pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024; // 20MB

const ZIP_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];
const OLE2_MAGIC: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Validate an upload: allowed extension, size limit, and magic bytes that
/// agree with the extension.
pub fn detect_spreadsheet(filename: &str, bytes: &[u8]) -> Result<SpreadsheetFormat, ImportError> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    let expected = match extension.as_deref() {
        Some("xlsx") => SpreadsheetFormat::Xlsx,
        Some("xls") => SpreadsheetFormat::Xls,
        _ => return Err(ImportError::UnsupportedFormat(sanitize_filename(filename))),
    };

    if bytes.is_empty() {
        return Err(ImportError::EmptyFile);
    }
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(ImportError::FileTooLarge {
            size_mb: bytes.len() as f64 / (1024.0 * 1024.0),
            max_mb: (MAX_UPLOAD_BYTES / (1024 * 1024)) as u64,
        });
    }

    let detected = if bytes.starts_with(&ZIP_MAGIC) {
        Some(SpreadsheetFormat::Xlsx)
    } else if bytes.starts_with(&OLE2_MAGIC) {
        Some(SpreadsheetFormat::Xls)
    } else {
        None
    };

    match detected {
        Some(format) if format == expected => Ok(format),
        _ => Err(ImportError::UnsupportedFormat(sanitize_filename(filename))),
    }
}

/// Strip path components and control characters from a client-supplied filename.
pub fn sanitize_filename(original: &str) -> String {
    let name = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("upload");

    let clean: String = name
        .chars()
        .filter(|c| !c.is_control())
        .take(255)
        .collect();

    if clean.is_empty() {
        "upload".to_string()
    } else {
        clean
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xlsx_bytes() -> Vec<u8> {
        let mut bytes = ZIP_MAGIC.to_vec();
        bytes.extend_from_slice(&[0u8; 32]);
        bytes
    }

    #[test]
    fn xlsx_with_zip_header_accepted() {
        assert_eq!(
            detect_spreadsheet("patients.XLSX", &xlsx_bytes()).unwrap(),
            SpreadsheetFormat::Xlsx
        );
    }

    #[test]
    fn xls_with_ole2_header_accepted() {
        let mut bytes = OLE2_MAGIC.to_vec();
        bytes.extend_from_slice(&[0u8; 32]);
        assert_eq!(
            detect_spreadsheet("old.xls", &bytes).unwrap(),
            SpreadsheetFormat::Xls
        );
    }

    #[test]
    fn csv_extension_rejected() {
        let err = detect_spreadsheet("patients.csv", b"a,b,c").unwrap_err();
        assert!(matches!(err, ImportError::UnsupportedFormat(_)));
    }

    #[test]
    fn mismatched_content_rejected() {
        let err = detect_spreadsheet("patients.xlsx", b"%PDF-1.7 not a workbook").unwrap_err();
        assert!(matches!(err, ImportError::UnsupportedFormat(_)));
    }

    #[test]
    fn empty_upload_rejected() {
        assert!(matches!(
            detect_spreadsheet("patients.xlsx", &[]),
            Err(ImportError::EmptyFile)
        ));
    }

    #[test]
    fn sanitize_strips_directories() {
        assert_eq!(sanitize_filename("../../etc/passwd.xlsx"), "passwd.xlsx");
        assert_eq!(sanitize_filename("C:\\Users\\me\\book.xls"), "book.xls");
        assert_eq!(sanitize_filename("dir/"), "upload");
    }
}
