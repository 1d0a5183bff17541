//! Patient access scoping.
//!
//! Each role variant is a [`PatientScope`] strategy producing a
//! [`ScopePredicate`]; the predicate is rendered to SQL for listing and
//! for single-patient checks. Two policies exist:
//!
//! - [`ScopePolicy::Ownership`]: admins see everything, doctors see patients
//!   owned by themselves or their assistants, assistants see patients they
//!   own.
//! - [`ScopePolicy::OwnershipAndAuthoredVisits`]: non-admins see their
//!   practice's patients plus every patient they recorded a visit for.

use rusqlite::types::ToSql;
use rusqlite::Connection;
use uuid::Uuid;

use crate::db::repository::{self, placeholders};
use crate::db::DatabaseError;
use crate::models::enums::{Role, ScopePolicy};
use crate::models::{Account, Patient};

/// Which patient rows a scope admits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopePredicate {
    All,
    OwnedBy(Vec<Uuid>),
    OwnedByOrAuthored { owners: Vec<Uuid>, author: Uuid },
}

impl ScopePredicate {
    /// Render as a SQL condition over `patients p`, numbering parameters after `offset`.
    fn to_sql(&self, offset: usize) -> (String, Vec<String>) {
        match self {
            Self::All => ("1 = 1".to_string(), Vec::new()),
            Self::OwnedBy(owners) if owners.is_empty() => ("0 = 1".to_string(), Vec::new()),
            Self::OwnedBy(owners) => (
                format!("p.doctor_id IN ({})", placeholders(owners.len(), offset)),
                owners.iter().map(Uuid::to_string).collect(),
            ),
            Self::OwnedByOrAuthored { owners, author } => {
                let mut args: Vec<String> = owners.iter().map(Uuid::to_string).collect();
                let owned = if owners.is_empty() {
                    "0 = 1".to_string()
                } else {
                    format!("p.doctor_id IN ({})", placeholders(owners.len(), offset))
                };
                args.push(author.to_string());
                let clause = format!(
                    "({owned} OR p.id IN (SELECT v.patient_id FROM visits v WHERE v.created_by = ?{}))",
                    offset + args.len()
                );
                (clause, args)
            }
        }
    }

    pub fn list(&self, conn: &Connection) -> Result<Vec<Patient>, DatabaseError> {
        let (clause, args) = self.to_sql(0);
        let refs: Vec<&dyn ToSql> = args.iter().map(|a| a as &dyn ToSql).collect();
        repository::query_patients(conn, &clause, &refs)
    }

    pub fn admits(&self, conn: &Connection, patient_id: &Uuid) -> Result<bool, DatabaseError> {
        let (clause, args) = self.to_sql(1);
        let sql = format!("SELECT COUNT(*) FROM patients p WHERE p.id = ?1 AND {clause}");
        let id = patient_id.to_string();
        let mut refs: Vec<&dyn ToSql> = vec![&id];
        refs.extend(args.iter().map(|a| a as &dyn ToSql));
        let count: i64 = conn.query_row(&sql, refs.as_slice(), |row| row.get(0))?;
        Ok(count > 0)
    }
}

/// A role-specific strategy for computing visible patients.
pub trait PatientScope {
    fn predicate(&self, conn: &Connection) -> Result<ScopePredicate, DatabaseError>;
}

pub struct AdminScope;

impl PatientScope for AdminScope {
    fn predicate(&self, _conn: &Connection) -> Result<ScopePredicate, DatabaseError> {
        Ok(ScopePredicate::All)
    }
}

/// Patients owned by the doctor or any of its assistants.
pub struct DoctorScope {
    pub doctor_id: Uuid,
}

impl PatientScope for DoctorScope {
    fn predicate(&self, conn: &Connection) -> Result<ScopePredicate, DatabaseError> {
        Ok(ScopePredicate::OwnedBy(practice_members(conn, &self.doctor_id)?))
    }
}

/// Patients owned by the assistant itself.
pub struct AssistantScope {
    pub assistant_id: Uuid,
}

impl PatientScope for AssistantScope {
    fn predicate(&self, _conn: &Connection) -> Result<ScopePredicate, DatabaseError> {
        Ok(ScopePredicate::OwnedBy(vec![self.assistant_id]))
    }
}

/// The practice of the account's effective doctor, plus patients the account
/// recorded at least one visit for.
pub struct AuthoredVisitsScope {
    pub owning_doctor_id: Option<Uuid>,
    pub author_id: Uuid,
}

impl PatientScope for AuthoredVisitsScope {
    fn predicate(&self, conn: &Connection) -> Result<ScopePredicate, DatabaseError> {
        let owners = match &self.owning_doctor_id {
            Some(doctor_id) => practice_members(conn, doctor_id)?,
            None => Vec::new(),
        };
        Ok(ScopePredicate::OwnedByOrAuthored {
            owners,
            author: self.author_id,
        })
    }
}

/// The doctor followed by its assistants.
pub fn practice_members(conn: &Connection, doctor_id: &Uuid) -> Result<Vec<Uuid>, DatabaseError> {
    let mut members = vec![*doctor_id];
    members.extend(repository::assistant_ids(conn, doctor_id)?);
    Ok(members)
}

/// The owning doctor of a patient owned by `owner_id`: the owner's effective doctor.
pub fn owning_doctor_of(conn: &Connection, owner_id: &Uuid) -> Result<Option<Uuid>, DatabaseError> {
    Ok(repository::get_account(conn, owner_id)?.and_then(|owner| owner.owning_doctor_id()))
}

/// Pick the strategy for an account under the configured policy.
pub fn scope_for(account: &Account, policy: ScopePolicy) -> Box<dyn PatientScope> {
    match (account.role, policy) {
        (Role::Admin, _) => Box::new(AdminScope),
        (Role::Doctor, ScopePolicy::Ownership) => Box::new(DoctorScope {
            doctor_id: account.id,
        }),
        (Role::Assistant, ScopePolicy::Ownership) => Box::new(AssistantScope {
            assistant_id: account.id,
        }),
        (Role::Doctor | Role::Assistant, ScopePolicy::OwnershipAndAuthoredVisits) => {
            Box::new(AuthoredVisitsScope {
                owning_doctor_id: account.owning_doctor_id(),
                author_id: account.id,
            })
        }
    }
}

/// All patients visible to `account`, ordered by name.
pub fn accessible_patients(
    conn: &Connection,
    account: &Account,
    policy: ScopePolicy,
) -> Result<Vec<Patient>, DatabaseError> {
    scope_for(account, policy).predicate(conn)?.list(conn)
}

pub fn can_access_patient(
    conn: &Connection,
    account: &Account,
    policy: ScopePolicy,
    patient_id: &Uuid,
) -> Result<bool, DatabaseError> {
    scope_for(account, policy).predicate(conn)?.admits(conn, patient_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::{insert_account, insert_patient, insert_visit};
    use crate::db::sqlite::open_memory_database;
    use crate::models::Visit;
    use chrono::NaiveDateTime;

    struct Clinic {
        conn: Connection,
        admin: Account,
        house: Account,
        chase: Account,
        wilson: Account,
        amber: Account,
    }

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

    fn patient(conn: &Connection, name: &str, owner: &Account) -> Uuid {
        let id = Uuid::new_v4();
        insert_patient(conn, &Patient {
            id,
            full_name: name.into(),
            phone: None,
            date_of_birth: None,
            created_at: NaiveDateTime::default(),
            doctor_id: Some(owner.id),
        })
        .unwrap();
        id
    }

    fn clinic() -> Clinic {
        let conn = open_memory_database().unwrap();
        let admin = account(&conn, "admin", Role::Admin, None);
        let house = account(&conn, "house", Role::Doctor, None);
        let chase = account(&conn, "chase", Role::Assistant, Some(house.id));
        let wilson = account(&conn, "wilson", Role::Doctor, None);
        let amber = account(&conn, "amber", Role::Assistant, Some(wilson.id));
        patient(&conn, "House Patient", &house);
        patient(&conn, "Chase Patient", &chase);
        patient(&conn, "Wilson Patient", &wilson);
        patient(&conn, "Amber Patient", &amber);
        Clinic {
            conn,
            admin,
            house,
            chase,
            wilson,
            amber,
        }
    }

    fn names(patients: Vec<Patient>) -> Vec<String> {
        patients.into_iter().map(|p| p.full_name).collect()
    }

    #[test]
    fn admin_sees_every_patient() {
        let c = clinic();
        let visible = accessible_patients(&c.conn, &c.admin, ScopePolicy::Ownership).unwrap();
        assert_eq!(visible.len(), 4);
    }

    #[test]
    fn doctor_sees_own_and_assistants_patients_only() {
        let c = clinic();
        let visible = accessible_patients(&c.conn, &c.house, ScopePolicy::Ownership).unwrap();
        assert_eq!(names(visible), vec!["Chase Patient", "House Patient"]);

        let visible = accessible_patients(&c.conn, &c.wilson, ScopePolicy::Ownership).unwrap();
        assert_eq!(names(visible), vec!["Amber Patient", "Wilson Patient"]);
    }

    #[test]
    fn assistant_sees_only_patients_it_owns() {
        let c = clinic();
        let visible = accessible_patients(&c.conn, &c.chase, ScopePolicy::Ownership).unwrap();
        assert_eq!(names(visible), vec!["Chase Patient"]);
    }

    #[test]
    fn doctor_without_patients_sees_nothing() {
        let c = clinic();
        let cuddy = account(&c.conn, "cuddy", Role::Doctor, None);
        assert!(accessible_patients(&c.conn, &cuddy, ScopePolicy::Ownership)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn authored_visits_extend_visibility_under_alternate_policy() {
        let c = clinic();
        let wilson_patient = repository::search_patients(&c.conn, "Wilson Patient")
            .unwrap()
            .remove(0);
        insert_visit(&c.conn, &Visit {
            id: Uuid::new_v4(),
            patient_id: wilson_patient.id,
            visit_date: NaiveDateTime::default(),
            clinician: None,
            notes: None,
            created_by: Some(c.chase.id),
        })
        .unwrap();

        let strict = accessible_patients(&c.conn, &c.chase, ScopePolicy::Ownership).unwrap();
        assert_eq!(names(strict), vec!["Chase Patient"]);

        let shared =
            accessible_patients(&c.conn, &c.chase, ScopePolicy::OwnershipAndAuthoredVisits).unwrap();
        assert_eq!(
            names(shared),
            vec!["Chase Patient", "House Patient", "Wilson Patient"]
        );
    }

    #[test]
    fn alternate_policy_keeps_admin_unrestricted() {
        let c = clinic();
        let visible =
            accessible_patients(&c.conn, &c.admin, ScopePolicy::OwnershipAndAuthoredVisits).unwrap();
        assert_eq!(visible.len(), 4);
    }

    #[test]
    fn single_patient_check_matches_listing() {
        let c = clinic();
        for patient in repository::list_all_patients(&c.conn).unwrap() {
            for account in [&c.admin, &c.house, &c.chase, &c.wilson, &c.amber] {
                let listed = accessible_patients(&c.conn, account, ScopePolicy::Ownership)
                    .unwrap()
                    .iter()
                    .any(|p| p.id == patient.id);
                let admitted =
                    can_access_patient(&c.conn, account, ScopePolicy::Ownership, &patient.id).unwrap();
                assert_eq!(listed, admitted, "{} / {}", account.username, patient.full_name);
            }
        }
    }

    #[test]
    fn owning_doctor_resolves_through_assistant() {
        let c = clinic();
        assert_eq!(owning_doctor_of(&c.conn, &c.chase.id).unwrap(), Some(c.house.id));
        assert_eq!(owning_doctor_of(&c.conn, &c.house.id).unwrap(), Some(c.house.id));
        assert_eq!(owning_doctor_of(&c.conn, &Uuid::new_v4()).unwrap(), None);
    }

    #[test]
    fn orphan_assistant_sees_only_authored_under_alternate_policy() {
        let c = clinic();
        let orphan = account(&c.conn, "orphan", Role::Assistant, None);
        assert!(
            accessible_patients(&c.conn, &orphan, ScopePolicy::OwnershipAndAuthoredVisits)
                .unwrap()
                .is_empty()
        );
    }
}
