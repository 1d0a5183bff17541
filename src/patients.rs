//! Patient service: scoped listing, interactive create/edit with duplicate
//! rejection, deletion and detail.

use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::authorization::can_delete_patient;
use crate::db::repository;
use crate::db::DatabaseError;
use crate::models::enums::ScopePolicy;
use crate::models::{check_birth_date, Account, Patient};
use crate::reconcile::find_duplicate;
use crate::scoping::{accessible_patients, can_access_patient, owning_doctor_of};
use crate::validation::{self, FieldError};
use crate::visits::{visit_records, VisitRecord};

pub const FULL_NAME_MAX: usize = 120;
pub const PHONE_MAX: usize = 30;

#[derive(Debug, thiserror::Error)]
pub enum PatientError {
    #[error("Patient not found")]
    NotFound,

    #[error("Your role does not allow deleting patients")]
    Forbidden,

    #[error("A patient named '{full_name}' already exists")]
    Duplicate { existing_id: Uuid, full_name: String },

    #[error(transparent)]
    Validation(#[from] FieldError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatientInput {
    pub full_name: String,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    /// Owning doctor chosen by an admin on create; ignored otherwise.
    #[serde(default)]
    pub doctor_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientDetail {
    pub patient: Patient,
    pub age: Option<i32>,
    pub visits: Vec<VisitRecord>,
}

struct ValidPatient {
    full_name: String,
    phone: Option<String>,
    date_of_birth: Option<NaiveDate>,
}

fn validate(input: &PatientInput, today: NaiveDate) -> Result<ValidPatient, PatientError> {
    let full_name = validation::required("full_name", &input.full_name, 1, FULL_NAME_MAX)?;
    let phone = validation::optional("phone", input.phone.as_deref(), PHONE_MAX)?;
    if let Some(dob) = input.date_of_birth {
        check_birth_date(dob, today).map_err(|reason| FieldError::new("date_of_birth", reason.to_string()))?;
    }
    Ok(ValidPatient {
        full_name,
        phone,
        date_of_birth: input.date_of_birth,
    })
}

fn reject_duplicate(
    conn: &Connection,
    candidate: &ValidPatient,
    owning_doctor: Option<Uuid>,
    exclude_id: Option<&Uuid>,
) -> Result<(), PatientError> {
    let Some(owning_doctor) = owning_doctor else {
        return Ok(());
    };
    if let Some(existing) = find_duplicate(
        conn,
        &candidate.full_name,
        candidate.phone.as_deref(),
        &owning_doctor,
        exclude_id,
    )? {
        tracing::info!(existing_id = %existing.id, "Rejected duplicate patient");
        return Err(PatientError::Duplicate {
            existing_id: existing.id,
            full_name: existing.full_name,
        });
    }
    Ok(())
}

/// Load a patient in the caller's scope; anything else is not found.
pub fn patient_in_scope(
    conn: &Connection,
    account: &Account,
    policy: ScopePolicy,
    id: &Uuid,
) -> Result<Patient, PatientError> {
    if !can_access_patient(conn, account, policy, id)? {
        return Err(PatientError::NotFound);
    }
    repository::get_patient(conn, id)?.ok_or(PatientError::NotFound)
}

/// Scoped listing, or a global search when `query` is non-blank.
pub fn list_patients(
    conn: &Connection,
    account: &Account,
    policy: ScopePolicy,
    query: Option<&str>,
) -> Result<Vec<Patient>, PatientError> {
    match query.map(str::trim).filter(|q| !q.is_empty()) {
        Some(q) => {
            tracing::debug!(account_id = %account.id, "Global patient search");
            Ok(repository::search_patients(conn, q)?)
        }
        None => Ok(accessible_patients(conn, account, policy)?),
    }
}

pub fn create_patient(
    conn: &Connection,
    account: &Account,
    input: &PatientInput,
    today: NaiveDate,
) -> Result<Patient, PatientError> {
    let valid = validate(input, today)?;

    let owner_id = match input.doctor_id.filter(|_| account.is_admin()) {
        Some(doctor_id) => match repository::get_account(conn, &doctor_id)? {
            Some(doctor) if doctor.is_doctor() => doctor.id,
            _ => return Err(FieldError::new("doctor_id", "Unknown doctor").into()),
        },
        None => account.id,
    };
    reject_duplicate(conn, &valid, owning_doctor_of(conn, &owner_id)?, None)?;

    let patient = Patient {
        id: Uuid::new_v4(),
        full_name: valid.full_name,
        phone: valid.phone,
        date_of_birth: valid.date_of_birth,
        created_at: Utc::now().naive_utc(),
        doctor_id: Some(owner_id),
    };
    repository::insert_patient(conn, &patient)?;
    tracing::info!(patient_id = %patient.id, owner = %owner_id, "Patient created");
    Ok(patient)
}

pub fn update_patient(
    conn: &Connection,
    account: &Account,
    policy: ScopePolicy,
    id: &Uuid,
    input: &PatientInput,
    today: NaiveDate,
) -> Result<Patient, PatientError> {
    let mut patient = patient_in_scope(conn, account, policy, id)?;
    let valid = validate(input, today)?;

    let owning_doctor = match patient.doctor_id {
        Some(owner_id) => owning_doctor_of(conn, &owner_id)?,
        None => None,
    };
    reject_duplicate(conn, &valid, owning_doctor, Some(id))?;

    patient.full_name = valid.full_name;
    patient.phone = valid.phone;
    patient.date_of_birth = valid.date_of_birth;
    repository::update_patient(conn, &patient)?;
    tracing::info!(patient_id = %patient.id, "Patient updated");
    Ok(patient)
}

/// Delete a patient with all visits and diagnoses.
pub fn delete_patient(
    conn: &Connection,
    account: &Account,
    policy: ScopePolicy,
    id: &Uuid,
) -> Result<(), PatientError> {
    if !can_delete_patient(account.role) {
        return Err(PatientError::Forbidden);
    }
    let patient = patient_in_scope(conn, account, policy, id)?;
    repository::delete_patient(conn, &patient.id)?;
    tracing::info!(patient_id = %patient.id, "Patient deleted");
    Ok(())
}

pub fn patient_detail(
    conn: &Connection,
    account: &Account,
    policy: ScopePolicy,
    id: &Uuid,
    today: NaiveDate,
) -> Result<PatientDetail, PatientError> {
    let patient = patient_in_scope(conn, account, policy, id)?;
    let visits = visit_records(conn, &patient.id)?;
    Ok(PatientDetail {
        age: patient.age_on(today),
        patient,
        visits,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::insert_account;
    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::Role;
    use crate::visits::{create_visit, VisitInput};
    use chrono::NaiveDateTime;

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

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn input(name: &str, phone: Option<&str>) -> PatientInput {
        PatientInput {
            full_name: name.into(),
            phone: phone.map(Into::into),
            date_of_birth: None,
            doctor_id: None,
        }
    }

    #[test]
    fn create_assigns_creator_as_owner() {
        let conn = open_memory_database().unwrap();
        let house = account(&conn, "house", Role::Doctor, None);
        let patient = create_patient(&conn, &house, &input(" Jane Doe ", Some(" ")), today()).unwrap();
        assert_eq!(patient.full_name, "Jane Doe");
        assert_eq!(patient.phone, None);
        assert_eq!(patient.doctor_id, Some(house.id));
    }

    #[test]
    fn admin_can_create_for_a_doctor() {
        let conn = open_memory_database().unwrap();
        let admin = account(&conn, "admin", Role::Admin, None);
        let house = account(&conn, "house", Role::Doctor, None);
        let mut req = input("Jane Doe", None);
        req.doctor_id = Some(house.id);
        let patient = create_patient(&conn, &admin, &req, today()).unwrap();
        assert_eq!(patient.doctor_id, Some(house.id));

        req.doctor_id = Some(admin.id);
        assert!(matches!(
            create_patient(&conn, &admin, &req, today()),
            Err(PatientError::Validation(_))
        ));
    }

    #[test]
    fn doctor_chosen_owner_ignored_for_non_admins() {
        let conn = open_memory_database().unwrap();
        let house = account(&conn, "house", Role::Doctor, None);
        let wilson = account(&conn, "wilson", Role::Doctor, None);
        let mut req = input("Jane Doe", None);
        req.doctor_id = Some(wilson.id);
        let patient = create_patient(&conn, &house, &req, today()).unwrap();
        assert_eq!(patient.doctor_id, Some(house.id));
    }

    #[test]
    fn duplicate_in_practice_rejected() {
        let conn = open_memory_database().unwrap();
        let house = account(&conn, "house", Role::Doctor, None);
        let chase = account(&conn, "chase", Role::Assistant, Some(house.id));
        let jane = create_patient(&conn, &house, &input("Jane Doe", Some("555-1111")), today()).unwrap();

        let err = create_patient(&conn, &chase, &input("Jane Doe", Some("555-1111")), today()).unwrap_err();
        match err {
            PatientError::Duplicate { existing_id, .. } => assert_eq!(existing_id, jane.id),
            other => panic!("expected duplicate, got {other}"),
        }

        assert!(create_patient(&conn, &house, &input("Jane Doe", Some("555-2222")), today()).is_ok());
    }

    #[test]
    fn other_practice_may_hold_same_patient() {
        let conn = open_memory_database().unwrap();
        let house = account(&conn, "house", Role::Doctor, None);
        let wilson = account(&conn, "wilson", Role::Doctor, None);
        create_patient(&conn, &house, &input("Jane Doe", None), today()).unwrap();
        assert!(create_patient(&conn, &wilson, &input("Jane Doe", None), today()).is_ok());
    }

    #[test]
    fn future_birth_date_rejected() {
        let conn = open_memory_database().unwrap();
        let house = account(&conn, "house", Role::Doctor, None);
        let mut req = input("Jane Doe", None);
        req.date_of_birth = NaiveDate::from_ymd_opt(2030, 1, 1);
        let err = create_patient(&conn, &house, &req, today()).unwrap_err();
        assert!(matches!(err, PatientError::Validation(f) if f.field == "date_of_birth"));
    }

    #[test]
    fn update_excludes_itself_from_duplicate_check() {
        let conn = open_memory_database().unwrap();
        let house = account(&conn, "house", Role::Doctor, None);
        let jane = create_patient(&conn, &house, &input("Jane Doe", Some("555-1111")), today()).unwrap();
        let john = create_patient(&conn, &house, &input("John Roe", None), today()).unwrap();

        let mut req = input("Jane Doe", Some("555-1111"));
        req.date_of_birth = NaiveDate::from_ymd_opt(1980, 2, 29);
        let updated = update_patient(&conn, &house, POLICY, &jane.id, &req, today()).unwrap();
        assert_eq!(updated.date_of_birth, NaiveDate::from_ymd_opt(1980, 2, 29));

        let err = update_patient(&conn, &house, POLICY, &john.id, &input("Jane Doe", None), today()).unwrap_err();
        assert!(matches!(err, PatientError::Duplicate { .. }));
    }

    #[test]
    fn out_of_scope_patient_not_found() {
        let conn = open_memory_database().unwrap();
        let house = account(&conn, "house", Role::Doctor, None);
        let wilson = account(&conn, "wilson", Role::Doctor, None);
        let jane = create_patient(&conn, &house, &input("Jane Doe", None), today()).unwrap();

        assert!(matches!(
            patient_detail(&conn, &wilson, POLICY, &jane.id, today()),
            Err(PatientError::NotFound)
        ));
        assert!(matches!(
            update_patient(&conn, &wilson, POLICY, &jane.id, &input("X", None), today()),
            Err(PatientError::NotFound)
        ));
        assert!(matches!(
            delete_patient(&conn, &wilson, POLICY, &jane.id),
            Err(PatientError::NotFound)
        ));
    }

    #[test]
    fn assistant_cannot_delete() {
        let conn = open_memory_database().unwrap();
        let house = account(&conn, "house", Role::Doctor, None);
        let chase = account(&conn, "chase", Role::Assistant, Some(house.id));
        let jane = create_patient(&conn, &chase, &input("Jane Doe", None), today()).unwrap();
        assert!(matches!(
            delete_patient(&conn, &chase, POLICY, &jane.id),
            Err(PatientError::Forbidden)
        ));
        delete_patient(&conn, &house, POLICY, &jane.id).unwrap();
        assert!(repository::get_patient(&conn, &jane.id).unwrap().is_none());
    }

    #[test]
    fn search_bypasses_scope() {
        let conn = open_memory_database().unwrap();
        let house = account(&conn, "house", Role::Doctor, None);
        let wilson = account(&conn, "wilson", Role::Doctor, None);
        create_patient(&conn, &house, &input("Jane Doe", Some("555-1111")), today()).unwrap();

        assert!(list_patients(&conn, &wilson, POLICY, None).unwrap().is_empty());
        assert!(list_patients(&conn, &wilson, POLICY, Some("   ")).unwrap().is_empty());
        assert_eq!(list_patients(&conn, &wilson, POLICY, Some("jane")).unwrap().len(), 1);
        assert_eq!(list_patients(&conn, &wilson, POLICY, Some("1111")).unwrap().len(), 1);
    }

    #[test]
    fn detail_includes_age_and_visits() {
        let conn = open_memory_database().unwrap();
        let house = account(&conn, "house", Role::Doctor, None);
        let mut req = input("Jane Doe", None);
        req.date_of_birth = NaiveDate::from_ymd_opt(1990, 6, 2);
        let jane = create_patient(&conn, &house, &req, today()).unwrap();
        create_visit(&conn, &house, POLICY, &jane.id, &VisitInput::default(), NaiveDateTime::default()).unwrap();

        let detail = patient_detail(&conn, &house, POLICY, &jane.id, today()).unwrap();
        assert_eq!(detail.age, Some(33));
        assert_eq!(detail.visits.len(), 1);
    }
}
