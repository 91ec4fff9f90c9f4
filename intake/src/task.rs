use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::record::{CaseRecord, RuleHit};

/// Office code stamped on every task this service creates.
pub const CREATED_BY_OFFICE: &str = "9999";
/// Office that picks up tasks when no responsible office can be resolved.
pub const FALLBACK_OFFICE: &str = "0393";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskPriority {
    Normal,
}

/// Work item for the office that has to look at a MANUAL_PROCESSING verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualTask {
    pub task_id: Uuid,
    pub message_id: String,
    pub subject_id: String,
    pub registry_number: Option<String>,
    pub assigned_office: String,
    pub created_by_office: String,
    pub description: String,
    pub priority: TaskPriority,
    pub active_date: NaiveDate,
    pub due_date: NaiveDate,
}

impl ManualTask {
    pub fn new(
        record: &CaseRecord,
        hits: &[RuleHit],
        assigned_office: String,
        today: NaiveDate,
    ) -> ManualTask {
        let description = if hits.is_empty() {
            "Manual review of attestation".to_owned()
        } else {
            let messages: Vec<&str> = hits.iter().map(|hit| hit.message.as_str()).collect();
            format!("Manual review of attestation: {}", messages.join(", "))
        };
        ManualTask {
            task_id: Uuid::now_v7(),
            message_id: record.message_id.clone(),
            subject_id: record.patient_id.clone(),
            registry_number: record.registry_number.clone(),
            assigned_office,
            created_by_office: CREATED_BY_OFFICE.to_owned(),
            description,
            priority: TaskPriority::Normal,
            active_date: today,
            due_date: today,
        }
    }
}
