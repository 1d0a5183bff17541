use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visit {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub visit_date: NaiveDateTime,
    pub clinician: Option<String>,
    pub notes: Option<String>,
    /// Account that recorded the visit.
    pub created_by: Option<Uuid>,
}
