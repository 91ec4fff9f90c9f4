use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::{Attestation, Envelope};

/// Verdict classes the rule service can hand back. The destination topic
/// mapping is a match over this enum, so there is no unmapped status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Ok,
    ManualProcessing,
    Invalid,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuleHit {
    pub rule: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub status: Status,
    #[serde(default)]
    pub rule_hits: Vec<RuleHit>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchedPractice {
    pub practice_id: String,
    pub name: String,
}

/// The enriched record published to the processing topics. Downstream
/// consumers get the resolved identities and the untouched original message
/// next to the decoded content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseRecord {
    pub attestation_id: Uuid,
    pub log_id: String,
    pub message_id: String,
    pub patient_id: String,
    pub practitioner_id: String,
    pub patient_nid: String,
    pub practitioner_nid: String,
    pub org_name: String,
    pub registry_number: Option<String>,
    pub directory_id: Option<String>,
    pub facility_id: Option<String>,
    pub practice: Option<MatchedPractice>,
    pub received_at: DateTime<Utc>,
    pub signed_at: DateTime<Utc>,
    pub ruleset_version: Option<String>,
    pub attestation: Attestation,
    pub original_message: String,
}

impl CaseRecord {
    pub fn assemble(
        envelope: &Envelope,
        patient_id: String,
        practitioner_id: String,
        practice: Option<MatchedPractice>,
        original_message: &str,
    ) -> CaseRecord {
        CaseRecord {
            attestation_id: Uuid::now_v7(),
            log_id: envelope.log_id.clone(),
            message_id: envelope.message_id.clone(),
            patient_id,
            practitioner_id,
            patient_nid: envelope.patient_nid.clone(),
            practitioner_nid: envelope.practitioner_nid.clone(),
            org_name: envelope.sender.name.clone(),
            registry_number: envelope.sender.registry_number.clone(),
            directory_id: envelope.sender.directory_id.clone(),
            facility_id: envelope.sender.facility_id.clone(),
            practice,
            received_at: envelope.received_at,
            signed_at: envelope.signed_at,
            ruleset_version: envelope.ruleset_version.clone(),
            attestation: envelope.attestation.clone(),
            original_message: original_message.to_owned(),
        }
    }
}
