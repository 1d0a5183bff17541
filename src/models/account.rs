use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::Role;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub location: Option<String>,
    pub created_at: NaiveDateTime,
    pub is_active: bool,
    /// Supervising doctor (assistants only).
    pub doctor_id: Option<Uuid>,
}

impl Account {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_doctor(&self) -> bool {
        self.role == Role::Doctor
    }

    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }

    /// The doctor whose practice this account works in.
    ///
    /// Assistants resolve to their supervisor; everyone else to themselves.
    /// An assistant without a supervisor has no owning doctor.
    pub fn owning_doctor_id(&self) -> Option<Uuid> {
        match self.role {
            Role::Assistant => self.doctor_id,
            Role::Admin | Role::Doctor => Some(self.id),
        }
    }
}
