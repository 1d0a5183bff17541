use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub id: Uuid,
    pub visit_id: Uuid,
    pub code: Option<String>,
    pub description: String,
}
