//! Worksheet reading: first sheet of an xlsx/xls workbook into positional rows.

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::NaiveDateTime;

use super::ImportError;

/// A single cell value, independent of the workbook library.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
    Error(String),
}

impl Cell {
    /// Trimmed text rendering; `None` for empty, blank or error cells.
    ///
    /// Whole numbers render without a fractional part, so a phone typed as a
    /// number reads back as `5551111`, not `5551111.0`.
    pub fn text(&self) -> Option<String> {
        let rendered = match self {
            Cell::Empty | Cell::Error(_) => return None,
            Cell::Text(s) => s.trim().to_string(),
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            Cell::Number(n) => n.to_string(),
            Cell::Bool(b) => b.to_string(),
            Cell::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        };
        if rendered.is_empty() {
            None
        } else {
            Some(rendered)
        }
    }

    pub fn is_blank(&self) -> bool {
        self.text().is_none()
    }
}

impl From<&Data> for Cell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty => Cell::Empty,
            Data::String(s) => Cell::Text(s.clone()),
            Data::Float(f) => Cell::Number(*f),
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Bool(b) => Cell::Bool(*b),
            Data::DateTime(dt) => dt
                .as_datetime()
                .map(Cell::DateTime)
                .unwrap_or(Cell::Number(dt.as_f64())),
            Data::DateTimeIso(s) => NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
                .map(Cell::DateTime)
                .unwrap_or_else(|_| Cell::Text(s.clone())),
            Data::DurationIso(s) => Cell::Text(s.clone()),
            Data::Error(e) => Cell::Error(e.to_string()),
        }
    }
}

/// One worksheet row with its 1-based sheet row number.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetRow {
    pub number: usize,
    pub cells: Vec<Cell>,
}

const EMPTY: Cell = Cell::Empty;

impl SheetRow {
    pub fn new(number: usize, cells: Vec<Cell>) -> Self {
        Self { number, cells }
    }

    /// Cell at a 0-based column; missing trailing cells read as empty.
    pub fn cell(&self, column: usize) -> &Cell {
        self.cells.get(column).unwrap_or(&EMPTY)
    }

    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(Cell::is_blank)
    }
}

/// Read the first worksheet, skipping the header (sheet row 1).
///
/// Rows are positional from column A even when leading columns are empty.
/// Fully empty rows are dropped.
pub fn read_rows(bytes: &[u8]) -> Result<Vec<SheetRow>, ImportError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(ImportError::NoWorksheet)??;

    let Some((start_row, start_col)) = range.start() else {
        return Ok(Vec::new());
    };

    let mut rows = Vec::new();
    for (offset, data) in range.rows().enumerate() {
        let number = start_row as usize + offset + 1;
        if number == 1 {
            continue;
        }
        let mut cells = vec![Cell::Empty; start_col as usize];
        cells.extend(data.iter().map(Cell::from));
        let row = SheetRow::new(number, cells);
        if !row.is_empty() {
            rows.push(row);
        }
    }

    tracing::debug!(rows = rows.len(), "Worksheet rows read");
    Ok(rows)
}
