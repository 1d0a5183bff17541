//! Date parsing for imported cells.
//!
//! Native spreadsheet dates are used as-is. Text is tried against a fixed
//! list of layouts; the first that parses wins. Anything else is absent.

use chrono::{NaiveDate, NaiveDateTime};

use super::sheet::Cell;

/// Accepted date layouts, in priority order. Month-first wins over
/// day-first when both parse.
pub const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y", "%Y/%m/%d"];

/// Extra layouts accepted for visit timestamps, tried after [`DATE_FORMATS`].
pub const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%m/%d/%Y %H:%M:%S"];

pub fn parse_date_text(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
}

pub fn parse_datetime_text(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    parse_date_text(text)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        })
}

/// Date of birth from a cell; unparseable values are absent.
pub fn cell_date(cell: &Cell) -> Option<NaiveDate> {
    match cell {
        Cell::DateTime(dt) => Some(dt.date()),
        Cell::Text(text) => parse_date_text(text),
        _ => None,
    }
}

/// Visit timestamp from a cell; unparseable values are absent.
pub fn cell_datetime(cell: &Cell) -> Option<NaiveDateTime> {
    match cell {
        Cell::DateTime(dt) => Some(*dt),
        Cell::Text(text) => parse_datetime_text(text),
        _ => None,
    }
}
