use chrono::{NaiveDate, NaiveDateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use super::dates::{cell_date, cell_datetime};
use super::sheet::SheetRow;
use super::ImportError;
use crate::db::repository;
use crate::db::DatabaseError;
use crate::models::{check_birth_date, Account, Diagnosis, Patient, Visit};
use crate::reconcile::find_duplicate;

/// Positional columns of an import sheet.
pub mod column {
    pub const FULL_NAME: usize = 0;
    pub const PHONE: usize = 1;
    pub const DATE_OF_BIRTH: usize = 2;
    pub const VISIT_DATE: usize = 3;
    pub const CLINICIAN: usize = 4;
    pub const NOTES: usize = 5;
    pub const DIAGNOSIS_CODE: usize = 6;
    pub const DIAGNOSIS_DESCRIPTION: usize = 7;
}

/// Sample errors carried in a report.
pub const MAX_SAMPLE_ERRORS: usize = 5;

/// Per-batch outcome counts plus every row error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub created: u32,
    pub updated: u32,
    pub duplicate: u32,
    pub skipped: u32,
    pub errors: Vec<String>,
}

/// What a client sees: counts, a few sample errors and how many were left out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub created: u32,
    pub updated: u32,
    pub duplicate: u32,
    pub skipped: u32,
    pub sample_errors: Vec<String>,
    pub omitted_errors: usize,
}

impl ImportSummary {
    pub fn report(&self) -> ImportReport {
        ImportReport {
            created: self.created,
            updated: self.updated,
            duplicate: self.duplicate,
            skipped: self.skipped,
            sample_errors: self.errors.iter().take(MAX_SAMPLE_ERRORS).cloned().collect(),
            omitted_errors: self.errors.len().saturating_sub(MAX_SAMPLE_ERRORS),
        }
    }

    fn record(&mut self, outcome: PatientOutcome) {
        match outcome {
            PatientOutcome::Created => self.created += 1,
            PatientOutcome::Updated => self.updated += 1,
            PatientOutcome::Duplicate => self.duplicate += 1,
        }
    }

    fn skip(&mut self, row_number: usize, message: impl std::fmt::Display) {
        self.skipped += 1;
        self.errors.push(format!("Row {row_number}: {message}"));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PatientOutcome {
    Created,
    Updated,
    Duplicate,
}

#[derive(Debug, thiserror::Error)]
enum RowError {
    #[error("Missing full name")]
    MissingName,

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

struct RowContext<'a> {
    importer: &'a Account,
    owning_doctor: &'a Uuid,
    today: NaiveDate,
    now: NaiveDateTime,
}

/// Import rows into the practice of `owning_doctor`.
///
/// The batch runs in one transaction; every row gets its own savepoint, so a
/// failing row leaves no partial writes and the rest of the batch carries on.
pub fn import_rows(
    conn: &mut Connection,
    rows: &[SheetRow],
    importer: &Account,
    owning_doctor: &Uuid,
) -> Result<ImportSummary, ImportError> {
    let now = Utc::now().naive_utc();
    let ctx = RowContext {
        importer,
        owning_doctor,
        today: now.date(),
        now,
    };

    tracing::info!(
        rows = rows.len(),
        importer = %importer.username,
        owning_doctor = %owning_doctor,
        "Starting patient import"
    );

    let mut summary = ImportSummary::default();
    let mut tx = conn.transaction()?;

    for row in rows {
        let sp = tx.savepoint()?;
        match import_row(&sp, row, &ctx) {
            Ok(outcome) => {
                sp.commit()?;
                summary.record(outcome);
            }
            Err(err) => {
                // Dropping the savepoint rolls the row back.
                drop(sp);
                tracing::warn!(row = row.number, error = %err, "Import row skipped");
                summary.skip(row.number, err);
            }
        }
    }

    tx.commit()?;

    tracing::info!(
        created = summary.created,
        updated = summary.updated,
        duplicate = summary.duplicate,
        skipped = summary.skipped,
        "Patient import finished"
    );
    Ok(summary)
}

fn import_row(conn: &Connection, row: &SheetRow, ctx: &RowContext<'_>) -> Result<PatientOutcome, RowError> {
    let full_name = row.cell(column::FULL_NAME).text().ok_or(RowError::MissingName)?;
    let phone = row.cell(column::PHONE).text();
    let date_of_birth = birth_date(row, ctx.today);

    let (patient_id, outcome) = match find_duplicate(conn, &full_name, phone.as_deref(), ctx.owning_doctor, None)? {
        Some(mut existing) => {
            let mut changed = false;
            if date_of_birth.is_some() && date_of_birth != existing.date_of_birth {
                existing.date_of_birth = date_of_birth;
                changed = true;
            }
            if phone.is_some() && phone != existing.phone {
                existing.phone = phone;
                changed = true;
            }
            if changed {
                repository::update_patient(conn, &existing)?;
                (existing.id, PatientOutcome::Updated)
            } else {
                (existing.id, PatientOutcome::Duplicate)
            }
        }
        None => {
            let patient = Patient {
                id: Uuid::new_v4(),
                full_name,
                phone,
                date_of_birth,
                created_at: ctx.now,
                doctor_id: Some(*ctx.owning_doctor),
            };
            repository::insert_patient(conn, &patient)?;
            (patient.id, PatientOutcome::Created)
        }
    };

    let visit_cell = row.cell(column::VISIT_DATE);
    let description = row.cell(column::DIAGNOSIS_DESCRIPTION).text();

    if !visit_cell.is_blank() || description.is_some() {
        let visit = Visit {
            id: Uuid::new_v4(),
            patient_id,
            visit_date: cell_datetime(visit_cell).unwrap_or(ctx.now),
            clinician: row.cell(column::CLINICIAN).text(),
            notes: row.cell(column::NOTES).text(),
            created_by: Some(ctx.importer.id),
        };
        repository::insert_visit(conn, &visit)?;

        if let Some(description) = description {
            repository::insert_diagnosis(conn, &Diagnosis {
                id: Uuid::new_v4(),
                visit_id: visit.id,
                code: row.cell(column::DIAGNOSIS_CODE).text(),
                description,
            })?;
        }
    }

    Ok(outcome)
}

/// Parsed date of birth, dropped when implausible.
fn birth_date(row: &SheetRow, today: NaiveDate) -> Option<NaiveDate> {
    let dob = cell_date(row.cell(column::DATE_OF_BIRTH))?;
    match check_birth_date(dob, today) {
        Ok(()) => Some(dob),
        Err(reason) => {
            tracing::warn!(row = row.number, %dob, %reason, "Ignoring implausible date of birth");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::{insert_account, list_all_patients, list_diagnoses_for_visit, list_visits_for_patient};
    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::Role;
    use crate::pipeline::import::sheet::Cell;

    fn doctor(conn: &Connection) -> Account {
        let account = Account {
            id: Uuid::new_v4(),
            username: "house".into(),
            password_hash: "hash".into(),
            role: Role::Doctor,
            full_name: None,
            email: None,
            location: None,
            created_at: NaiveDateTime::default(),
            is_active: true,
            doctor_id: None,
        };
        insert_account(conn, &account).unwrap();
        account
    }

    fn text(s: &str) -> Cell {
        if s.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(s.into())
        }
    }

    fn row(number: usize, values: [&str; 8]) -> SheetRow {
        SheetRow::new(number, values.iter().map(|v| text(v)).collect())
    }

    fn setup() -> (Connection, Account) {
        let conn = open_memory_database().unwrap();
        let account = doctor(&conn);
        (conn, account)
    }

    #[test]
    fn creates_patient_visit_and_diagnosis() {
        let (mut conn, house) = setup();
        let rows = vec![row(2, [
            "Jane Doe", "555-1111", "1985-07-21", "2024-02-10 14:30:00", "Dr. House", "Follow-up", "J06", "Upper respiratory infection",
        ])];

        let summary = import_rows(&mut conn, &rows, &house, &house.id).unwrap();
        assert_eq!(summary.created, 1);
        assert!(summary.errors.is_empty());

        let patients = list_all_patients(&conn).unwrap();
        assert_eq!(patients.len(), 1);
        assert_eq!(patients[0].doctor_id, Some(house.id));
        assert_eq!(patients[0].date_of_birth, NaiveDate::from_ymd_opt(1985, 7, 21));

        let visits = list_visits_for_patient(&conn, &patients[0].id).unwrap();
        assert_eq!(visits.len(), 1);
        assert_eq!(visits[0].clinician.as_deref(), Some("Dr. House"));
        assert_eq!(visits[0].created_by, Some(house.id));

        let diagnoses = list_diagnoses_for_visit(&conn, &visits[0].id).unwrap();
        assert_eq!(diagnoses.len(), 1);
        assert_eq!(diagnoses[0].code.as_deref(), Some("J06"));
    }

    #[test]
    fn missing_name_row_is_skipped_with_sheet_row_number() {
        let (mut conn, house) = setup();
        let rows = vec![
            row(2, ["Jane Doe", "", "", "", "", "", "", ""]),
            row(3, ["  ", "555-0000", "", "", "", "", "", ""]),
            row(4, ["John Roe", "", "", "", "", "", "", ""]),
        ];

        let summary = import_rows(&mut conn, &rows, &house, &house.id).unwrap();
        assert_eq!(summary.created, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.errors, vec!["Row 3: Missing full name".to_string()]);
    }

    #[test]
    fn reimport_counts_duplicates_not_creations() {
        let (mut conn, house) = setup();
        let rows = vec![
            row(2, ["Jane Doe", "555-1111", "1985-07-21", "", "", "", "", ""]),
            row(3, ["John Roe", "", "", "", "", "", "", ""]),
        ];

        let first = import_rows(&mut conn, &rows, &house, &house.id).unwrap();
        assert_eq!(first.created, 2);

        let second = import_rows(&mut conn, &rows, &house, &house.id).unwrap();
        assert_eq!(second.created, 0);
        assert_eq!(second.duplicate, 2);
        assert_eq!(list_all_patients(&conn).unwrap().len(), 2);
    }

    #[test]
    fn new_phone_for_phoneless_patient_counts_as_update() {
        let (mut conn, house) = setup();
        import_rows(&mut conn, &[row(2, ["John Roe", "", "", "", "", "", "", ""])], &house, &house.id).unwrap();

        let summary = import_rows(
            &mut conn,
            &[row(2, ["John Roe", "555-3333", "1990-01-01", "", "", "", "", ""])],
            &house,
            &house.id,
        )
        .unwrap();
        assert_eq!(summary.updated, 1);

        let patients = list_all_patients(&conn).unwrap();
        assert_eq!(patients.len(), 1);
        assert_eq!(patients[0].phone.as_deref(), Some("555-3333"));
        assert_eq!(patients[0].date_of_birth, NaiveDate::from_ymd_opt(1990, 1, 1));
    }

    #[test]
    fn same_name_different_phone_creates_second_patient() {
        let (mut conn, house) = setup();
        let rows = vec![
            row(2, ["Jane Doe", "555-1111", "", "", "", "", "", ""]),
            row(3, ["Jane Doe", "555-2222", "", "", "", "", "", ""]),
        ];
        let summary = import_rows(&mut conn, &rows, &house, &house.id).unwrap();
        assert_eq!(summary.created, 2);
    }

    #[test]
    fn implausible_birth_date_is_dropped() {
        let (mut conn, house) = setup();
        let rows = vec![row(2, ["Old Timer", "", "1700-01-01", "", "", "", "", ""])];
        let summary = import_rows(&mut conn, &rows, &house, &house.id).unwrap();
        assert_eq!(summary.created, 1);
        assert_eq!(list_all_patients(&conn).unwrap()[0].date_of_birth, None);
    }

    #[test]
    fn numeric_phone_and_native_dates_accepted() {
        let (mut conn, house) = setup();
        let dob = NaiveDate::from_ymd_opt(1970, 5, 4).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let rows = vec![SheetRow::new(2, vec![
            Cell::Text("Ann Lee".into()),
            Cell::Number(5554444.0),
            Cell::DateTime(dob),
        ])];
        import_rows(&mut conn, &rows, &house, &house.id).unwrap();

        let patient = &list_all_patients(&conn).unwrap()[0];
        assert_eq!(patient.phone.as_deref(), Some("5554444"));
        assert_eq!(patient.date_of_birth, Some(dob.date()));
    }

    #[test]
    fn diagnosis_without_visit_date_creates_visit_now() {
        let (mut conn, house) = setup();
        let rows = vec![row(2, ["Jane Doe", "", "", "", "", "", "", "Headache"])];
        import_rows(&mut conn, &rows, &house, &house.id).unwrap();

        let patient = &list_all_patients(&conn).unwrap()[0];
        let visits = list_visits_for_patient(&conn, &patient.id).unwrap();
        assert_eq!(visits.len(), 1);
        assert!(visits[0].visit_date.date() <= Utc::now().date_naive());
        let diagnoses = list_diagnoses_for_visit(&conn, &visits[0].id).unwrap();
        assert_eq!(diagnoses[0].code, None);
    }

    #[test]
    fn failing_row_rolls_back_its_own_writes_only() {
        let (mut conn, house) = setup();
        conn.execute_batch(
            "CREATE TRIGGER reject_boom BEFORE INSERT ON diagnoses
             WHEN NEW.description = 'boom'
             BEGIN SELECT RAISE(ABORT, 'diagnosis rejected'); END;",
        )
        .unwrap();

        let rows = vec![
            row(2, ["Jane Doe", "", "", "2024-01-01", "", "", "", "Fine"]),
            row(3, ["Bad Row", "", "", "2024-01-01", "", "", "", "boom"]),
            row(4, ["John Roe", "", "", "", "", "", "", ""]),
        ];
        let summary = import_rows(&mut conn, &rows, &house, &house.id).unwrap();

        assert_eq!(summary.created, 2);
        assert_eq!(summary.skipped, 1);
        assert!(summary.errors[0].starts_with("Row 3: "));

        let names: Vec<String> = list_all_patients(&conn).unwrap().into_iter().map(|p| p.full_name).collect();
        assert_eq!(names, vec!["Jane Doe", "John Roe"]);
        let visit_count: i64 = conn.query_row("SELECT COUNT(*) FROM visits", [], |r| r.get(0)).unwrap();
        assert_eq!(visit_count, 1);
    }

    #[test]
    fn report_keeps_five_sample_errors() {
        let summary = ImportSummary {
            skipped: 7,
            errors: (2..9).map(|n| format!("Row {n}: Missing full name")).collect(),
            ..Default::default()
        };
        let report = summary.report();
        assert_eq!(report.sample_errors.len(), MAX_SAMPLE_ERRORS);
        assert_eq!(report.omitted_errors, 2);
        assert_eq!(report.sample_errors[0], "Row 2: Missing full name");
    }
}
