//! Two-sheet workbook export of patients and their visit history.
//!
//! Building the rows is kept apart from writing them, so the layout can be
//! checked without decoding a workbook.

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use rust_xlsxwriter::{Color, Format, FormatAlign, Workbook, Worksheet, XlsxError};
use serde::Serialize;
use thiserror::Error;

use crate::db::repository;
use crate::db::{DatabaseError, DATE_FORMAT};
use crate::models::Patient;

pub const SUMMARY_SHEET: &str = "Patient Summary";
pub const VISITS_SHEET: &str = "Visits by Patient";

pub const SUMMARY_HEADERS: [&str; 8] = [
    "#",
    "Full Name",
    "Phone",
    "Date of Birth",
    "Age",
    "Total Visits",
    "Last Visit",
    "Created Date",
];

pub const VISIT_HEADERS: [&str; 6] = [
    "Visit Date",
    "Time",
    "Clinician",
    "Diagnosis Code",
    "Diagnosis",
    "Notes",
];

pub const NO_DIAGNOSIS: &str = "No diagnosis";

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

const HEADER_BLUE: u32 = 0x0070C0;
const LIGHT_GRAY: u32 = 0xD3D3D3;
const SUMMARY_MAX_WIDTH: usize = 50;
const VISITS_MAX_WIDTH: usize = 60;
const BANNER_LAST_COLUMN: u16 = 7;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Workbook error: {0}")]
    Workbook(#[from] XlsxError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatientSummaryRow {
    pub index: u32,
    pub full_name: String,
    pub phone: Option<String>,
    pub date_of_birth: Option<String>,
    pub age: Option<i32>,
    pub total_visits: u32,
    pub last_visit: Option<String>,
    pub created: String,
}

/// One line under a patient's banner: a diagnosis, or a bare visit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisitLine {
    pub date: String,
    pub time: String,
    pub clinician: String,
    pub code: String,
    pub diagnosis: String,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatientGroup {
    pub full_name: String,
    pub phone: String,
    pub date_of_birth: String,
    pub lines: Vec<VisitLine>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportData {
    pub summary: Vec<PatientSummaryRow>,
    pub groups: Vec<PatientGroup>,
}

/// Gather summary rows and visit groups for `patients`, sorted by name.
pub fn collect_export(
    conn: &Connection,
    patients: &[Patient],
    today: NaiveDate,
) -> Result<ExportData, DatabaseError> {
    let mut sorted: Vec<&Patient> = patients.iter().collect();
    sorted.sort_by(|a, b| a.full_name.cmp(&b.full_name).then(a.created_at.cmp(&b.created_at)));

    let mut data = ExportData::default();
    for (position, patient) in sorted.into_iter().enumerate() {
        let (total_visits, last_visit) = repository::visit_stats_for_patient(conn, &patient.id)?;
        let date_of_birth = patient.date_of_birth.map(|d| d.format(DATE_FORMAT).to_string());

        data.summary.push(PatientSummaryRow {
            index: position as u32 + 1,
            full_name: patient.full_name.clone(),
            phone: patient.phone.clone(),
            date_of_birth: date_of_birth.clone(),
            age: patient.age_on(today),
            total_visits,
            last_visit: last_visit.map(|d| d.format(DATE_FORMAT).to_string()),
            created: patient.created_at.format(DATE_FORMAT).to_string(),
        });

        if total_visits == 0 {
            continue;
        }

        let mut lines = Vec::new();
        for visit in repository::list_visits_for_patient(conn, &patient.id)? {
            let date = visit.visit_date.format(DATE_FORMAT).to_string();
            let time = visit.visit_date.format("%H:%M").to_string();
            let clinician = visit.clinician.clone().unwrap_or_default();
            let notes = visit.notes.clone().unwrap_or_default();

            let diagnoses = repository::list_diagnoses_for_visit(conn, &visit.id)?;
            if diagnoses.is_empty() {
                lines.push(VisitLine {
                    date,
                    time,
                    clinician,
                    code: String::new(),
                    diagnosis: NO_DIAGNOSIS.to_string(),
                    notes,
                });
                continue;
            }
            for diagnosis in diagnoses {
                lines.push(VisitLine {
                    date: date.clone(),
                    time: time.clone(),
                    clinician: clinician.clone(),
                    code: diagnosis.code.unwrap_or_default(),
                    diagnosis: diagnosis.description,
                    notes: notes.clone(),
                });
            }
        }

        data.groups.push(PatientGroup {
            full_name: patient.full_name.clone(),
            phone: patient.phone.clone().unwrap_or_else(|| "N/A".to_string()),
            date_of_birth: date_of_birth.unwrap_or_else(|| "N/A".to_string()),
            lines,
        });
    }

    Ok(data)
}

/// Tracks the widest value per column for auto-sizing.
struct ColumnWidths {
    widths: Vec<usize>,
    max: usize,
}

impl ColumnWidths {
    fn new(max: usize) -> Self {
        Self { widths: Vec::new(), max }
    }

    fn observe(&mut self, col: u16, value: &str) {
        let col = col as usize;
        if self.widths.len() <= col {
            self.widths.resize(col + 1, 0);
        }
        self.widths[col] = self.widths[col].max(value.chars().count());
    }

    fn apply(&self, sheet: &mut Worksheet) -> Result<(), XlsxError> {
        for (col, width) in self.widths.iter().enumerate() {
            sheet.set_column_width(col as u16, ((width + 2).min(self.max)) as f64)?;
        }
        Ok(())
    }
}

fn write_summary_sheet(data: &ExportData) -> Result<Worksheet, XlsxError> {
    let mut sheet = Worksheet::new();
    sheet.set_name(SUMMARY_SHEET)?;
    let header = Format::new()
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(HEADER_BLUE))
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter);

    let mut widths = ColumnWidths::new(SUMMARY_MAX_WIDTH);
    for (col, title) in SUMMARY_HEADERS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *title, &header)?;
        widths.observe(col as u16, title);
    }

    for (offset, row) in data.summary.iter().enumerate() {
        let r = offset as u32 + 1;
        sheet.write_number(r, 0, row.index)?;
        widths.observe(0, &row.index.to_string());

        let texts = [
            (1, Some(row.full_name.as_str())),
            (2, row.phone.as_deref()),
            (3, row.date_of_birth.as_deref()),
            (6, row.last_visit.as_deref()),
            (7, Some(row.created.as_str())),
        ];
        for (col, value) in texts {
            if let Some(value) = value {
                sheet.write_string(r, col, value)?;
                widths.observe(col, value);
            }
        }

        if let Some(age) = row.age {
            sheet.write_number(r, 4, age)?;
            widths.observe(4, &age.to_string());
        }
        sheet.write_number(r, 5, row.total_visits)?;
        widths.observe(5, &row.total_visits.to_string());
    }

    widths.apply(&mut sheet)?;
    Ok(sheet)
}

fn write_visits_sheet(data: &ExportData) -> Result<Worksheet, XlsxError> {
    let mut sheet = Worksheet::new();
    sheet.set_name(VISITS_SHEET)?;
    let banner = Format::new()
        .set_bold()
        .set_font_size(14)
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(HEADER_BLUE));
    let header = Format::new()
        .set_bold()
        .set_background_color(Color::RGB(LIGHT_GRAY));

    let mut widths = ColumnWidths::new(VISITS_MAX_WIDTH);
    let mut r: u32 = 0;
    for group in &data.groups {
        // Spacer row, then the banner.
        r += 1;
        let title = format!("Patient: {}", group.full_name);
        sheet.merge_range(r, 0, r, BANNER_LAST_COLUMN, &title, &banner)?;
        widths.observe(0, &title);
        r += 1;

        let info = ["Phone:", group.phone.as_str(), "DOB:", group.date_of_birth.as_str()];
        for (col, value) in info.iter().enumerate() {
            sheet.write_string(r, col as u16, *value)?;
            widths.observe(col as u16, value);
        }
        r += 2;

        for (col, title) in VISIT_HEADERS.iter().enumerate() {
            sheet.write_string_with_format(r, col as u16, *title, &header)?;
            widths.observe(col as u16, title);
        }
        r += 1;

        for line in &group.lines {
            let cells = [
                &line.date,
                &line.time,
                &line.clinician,
                &line.code,
                &line.diagnosis,
                &line.notes,
            ];
            for (col, value) in cells.iter().enumerate() {
                if !value.is_empty() {
                    sheet.write_string(r, col as u16, value.as_str())?;
                    widths.observe(col as u16, value);
                }
            }
            r += 1;
        }
    }

    widths.apply(&mut sheet)?;
    Ok(sheet)
}

/// Serialize export data into an xlsx workbook.
pub fn write_workbook(data: &ExportData) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    workbook.push_worksheet(write_summary_sheet(data)?);
    workbook.push_worksheet(write_visits_sheet(data)?);
    Ok(workbook.save_to_buffer()?)
}

/// Download name for an export taken at `now`.
pub fn export_filename(now: NaiveDateTime) -> String {
    format!("patients_complete_export_{}.xlsx", now.format("%Y%m%d_%H%M%S"))
}

/// Build the workbook for `patients`; returns (filename, bytes).
pub fn export_patients(
    conn: &Connection,
    patients: &[Patient],
    now: NaiveDateTime,
) -> Result<(String, Vec<u8>), ExportError> {
    let data = collect_export(conn, patients, now.date())?;
    let bytes = write_workbook(&data)?;
    tracing::info!(
        patients = data.summary.len(),
        groups = data.groups.len(),
        bytes = bytes.len(),
        "Patient export built"
    );
    Ok((export_filename(now), bytes))
}
