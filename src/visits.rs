//! Visit service: recording visits, diagnoses, and visit removal.

use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::authorization::can_delete_patient;
use crate::db::repository;
use crate::db::DatabaseError;
use crate::models::enums::ScopePolicy;
use crate::models::{Account, Diagnosis, Patient, Visit};
use crate::scoping::can_access_patient;
use crate::validation::{self, FieldError};

pub const CLINICIAN_MAX: usize = 120;
pub const DIAGNOSIS_CODE_MAX: usize = 20;
pub const DIAGNOSIS_DESCRIPTION_MIN: usize = 3;
pub const DIAGNOSIS_DESCRIPTION_MAX: usize = 255;

#[derive(Debug, thiserror::Error)]
pub enum VisitError {
    #[error("Visit not found")]
    NotFound,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("Your role does not allow deleting visits")]
    Forbidden,

    #[error(transparent)]
    Validation(#[from] FieldError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VisitInput {
    pub clinician: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiagnosisInput {
    pub code: Option<String>,
    pub description: String,
}

/// A visit with its diagnoses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisitRecord {
    #[serde(flatten)]
    pub visit: Visit,
    pub diagnoses: Vec<Diagnosis>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisitDetail {
    pub patient: Patient,
    #[serde(flatten)]
    pub record: VisitRecord,
}

/// Visits of a patient, newest first, each with its diagnoses.
pub fn visit_records(conn: &Connection, patient_id: &Uuid) -> Result<Vec<VisitRecord>, DatabaseError> {
    repository::list_visits_for_patient(conn, patient_id)?
        .into_iter()
        .map(|visit| {
            let diagnoses = repository::list_diagnoses_for_visit(conn, &visit.id)?;
            Ok(VisitRecord { visit, diagnoses })
        })
        .collect()
}

/// Record a visit at `now` for an in-scope patient.
pub fn create_visit(
    conn: &Connection,
    account: &Account,
    policy: ScopePolicy,
    patient_id: &Uuid,
    input: &VisitInput,
    now: NaiveDateTime,
) -> Result<Visit, VisitError> {
    if !can_access_patient(conn, account, policy, patient_id)? {
        return Err(VisitError::PatientNotFound);
    }
    let visit = Visit {
        id: Uuid::new_v4(),
        patient_id: *patient_id,
        visit_date: now,
        clinician: validation::optional("clinician", input.clinician.as_deref(), CLINICIAN_MAX)?,
        notes: input
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string),
        created_by: Some(account.id),
    };
    repository::insert_visit(conn, &visit)?;
    tracing::info!(visit_id = %visit.id, patient_id = %patient_id, "Visit recorded");
    Ok(visit)
}

/// Load a visit whose patient is in the caller's scope.
fn visit_in_scope(
    conn: &Connection,
    account: &Account,
    policy: ScopePolicy,
    visit_id: &Uuid,
) -> Result<Visit, VisitError> {
    let visit = repository::get_visit(conn, visit_id)?.ok_or(VisitError::NotFound)?;
    if !can_access_patient(conn, account, policy, &visit.patient_id)? {
        return Err(VisitError::NotFound);
    }
    Ok(visit)
}

pub fn visit_detail(
    conn: &Connection,
    account: &Account,
    policy: ScopePolicy,
    visit_id: &Uuid,
) -> Result<VisitDetail, VisitError> {
    let visit = visit_in_scope(conn, account, policy, visit_id)?;
    let patient = repository::get_patient(conn, &visit.patient_id)?.ok_or(VisitError::NotFound)?;
    let diagnoses = repository::list_diagnoses_for_visit(conn, &visit.id)?;
    Ok(VisitDetail {
        patient,
        record: VisitRecord { visit, diagnoses },
    })
}

pub fn add_diagnosis(
    conn: &Connection,
    account: &Account,
    policy: ScopePolicy,
    visit_id: &Uuid,
    input: &DiagnosisInput,
) -> Result<Diagnosis, VisitError> {
    let visit = visit_in_scope(conn, account, policy, visit_id)?;
    let diagnosis = Diagnosis {
        id: Uuid::new_v4(),
        visit_id: visit.id,
        code: validation::optional("code", input.code.as_deref(), DIAGNOSIS_CODE_MAX)?,
        description: validation::required(
            "description",
            &input.description,
            DIAGNOSIS_DESCRIPTION_MIN,
            DIAGNOSIS_DESCRIPTION_MAX,
        )?,
    };
    repository::insert_diagnosis(conn, &diagnosis)?;
    tracing::info!(diagnosis_id = %diagnosis.id, visit_id = %visit.id, "Diagnosis added");
    Ok(diagnosis)
}

/// Delete a visit and its diagnoses; returns the patient it belonged to.
pub fn delete_visit(
    conn: &Connection,
    account: &Account,
    policy: ScopePolicy,
    visit_id: &Uuid,
) -> Result<Uuid, VisitError> {
    if !can_delete_patient(account.role) {
        return Err(VisitError::Forbidden);
    }
    let visit = visit_in_scope(conn, account, policy, visit_id)?;
    repository::delete_visit(conn, &visit.id)?;
    tracing::info!(visit_id = %visit.id, patient_id = %visit.patient_id, "Visit deleted");
    Ok(visit.patient_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::{insert_account, insert_patient};
    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::Role;

    const POLICY: ScopePolicy = ScopePolicy::Ownership;

    fn account(conn: &Connection, username: &str, role: Role, doctor_id: Option<Uuid>) -> Account {
        let account = Account {
            id: Uuid::new_v4(),
            username: username.into(),
            password_hash: "hash".into(),
            role,
            full_name: None,
            email: None,
            location: None,
            created_at: NaiveDateTime::default(),
            is_active: true,
            doctor_id,
        };
        insert_account(conn, &account).unwrap();
        account
    }

    fn patient(conn: &Connection, owner: &Account) -> Uuid {
        let id = Uuid::new_v4();
        insert_patient(conn, &Patient {
            id,
            full_name: "Jane Doe".into(),
            phone: None,
            date_of_birth: None,
            created_at: NaiveDateTime::default(),
            doctor_id: Some(owner.id),
        })
        .unwrap();
        id
    }

    fn now() -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    struct Fixture {
        conn: Connection,
        house: Account,
        chase: Account,
        wilson: Account,
        patient_id: Uuid,
    }

    fn fixture() -> Fixture {
        let conn = open_memory_database().unwrap();
        let house = account(&conn, "house", Role::Doctor, None);
        let chase = account(&conn, "chase", Role::Assistant, Some(house.id));
        let wilson = account(&conn, "wilson", Role::Doctor, None);
        let patient_id = patient(&conn, &chase);
        Fixture {
            conn,
            house,
            chase,
            wilson,
            patient_id,
        }
    }

    fn input(clinician: &str) -> VisitInput {
        VisitInput {
            clinician: Some(clinician.into()),
            notes: Some("  ".into()),
        }
    }

    #[test]
    fn create_visit_records_author_and_trims() {
        let f = fixture();
        let visit = create_visit(&f.conn, &f.chase, POLICY, &f.patient_id, &input(" Dr. House "), now()).unwrap();
        assert_eq!(visit.clinician.as_deref(), Some("Dr. House"));
        assert_eq!(visit.notes, None);
        assert_eq!(visit.created_by, Some(f.chase.id));
        assert_eq!(visit.visit_date, now());
    }

    #[test]
    fn out_of_scope_patient_is_not_found() {
        let f = fixture();
        let err = create_visit(&f.conn, &f.wilson, POLICY, &f.patient_id, &input("x"), now()).unwrap_err();
        assert!(matches!(err, VisitError::PatientNotFound));
    }

    #[test]
    fn long_clinician_rejected() {
        let f = fixture();
        let err = create_visit(&f.conn, &f.house, POLICY, &f.patient_id, &input(&"x".repeat(121)), now())
            .unwrap_err();
        assert!(matches!(err, VisitError::Validation(_)));
    }

    #[test]
    fn diagnosis_rules_enforced() {
        let f = fixture();
        let visit = create_visit(&f.conn, &f.house, POLICY, &f.patient_id, &input("x"), now()).unwrap();

        let too_short = DiagnosisInput {
            code: None,
            description: "ab".into(),
        };
        assert!(matches!(
            add_diagnosis(&f.conn, &f.house, POLICY, &visit.id, &too_short),
            Err(VisitError::Validation(_))
        ));

        let long_code = DiagnosisInput {
            code: Some("X".repeat(21)),
            description: "Influenza".into(),
        };
        assert!(matches!(
            add_diagnosis(&f.conn, &f.house, POLICY, &visit.id, &long_code),
            Err(VisitError::Validation(_))
        ));

        let ok = DiagnosisInput {
            code: Some(" J10 ".into()),
            description: " Influenza ".into(),
        };
        let diagnosis = add_diagnosis(&f.conn, &f.chase, POLICY, &visit.id, &ok).unwrap();
        assert_eq!(diagnosis.code.as_deref(), Some("J10"));
        assert_eq!(diagnosis.description, "Influenza");

        let detail = visit_detail(&f.conn, &f.house, POLICY, &visit.id).unwrap();
        assert_eq!(detail.record.diagnoses.len(), 1);
        assert_eq!(detail.patient.id, f.patient_id);
    }

    #[test]
    fn visit_detail_hidden_outside_scope() {
        let f = fixture();
        let visit = create_visit(&f.conn, &f.house, POLICY, &f.patient_id, &input("x"), now()).unwrap();
        assert!(matches!(
            visit_detail(&f.conn, &f.wilson, POLICY, &visit.id),
            Err(VisitError::NotFound)
        ));
    }

    #[test]
    fn assistant_cannot_delete_visit() {
        let f = fixture();
        let visit = create_visit(&f.conn, &f.chase, POLICY, &f.patient_id, &input("x"), now()).unwrap();
        assert!(matches!(
            delete_visit(&f.conn, &f.chase, POLICY, &visit.id),
            Err(VisitError::Forbidden)
        ));
    }

    #[test]
    fn delete_visit_keeps_siblings() {
        let f = fixture();
        let first = create_visit(&f.conn, &f.house, POLICY, &f.patient_id, &input("a"), now()).unwrap();
        let second = create_visit(&f.conn, &f.house, POLICY, &f.patient_id, &input("b"), now()).unwrap();
        add_diagnosis(&f.conn, &f.house, POLICY, &first.id, &DiagnosisInput {
            code: None,
            description: "Migraine".into(),
        })
        .unwrap();

        let patient_id = delete_visit(&f.conn, &f.house, POLICY, &first.id).unwrap();
        assert_eq!(patient_id, f.patient_id);

        let remaining = visit_records(&f.conn, &f.patient_id).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].visit.id, second.id);
        let orphans: i64 = f
            .conn
            .query_row("SELECT COUNT(*) FROM diagnoses", [], |r| r.get(0))
            .unwrap();
        assert_eq!(orphans, 0);
    }
}
