use base64::Engine;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ParseError;
use crate::message::Envelope;
use crate::record::RuleHit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReceiptDisposition {
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    Duplicate,
    PatientNotRegistered,
    PractitionerNotRegistered,
    RuleViolation,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReceiptReason {
    pub code: ReasonCode,
    pub detail: String,
}

/// Acknowledgement sent back towards the sender for every message that made
/// it past parsing, accepted or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub receipt_id: Uuid,
    pub log_id: String,
    pub message_id: String,
    pub disposition: ReceiptDisposition,
    pub reasons: Vec<ReceiptReason>,
    pub issued_at: DateTime<Utc>,
}

impl Receipt {
    pub fn accepted(envelope: &Envelope) -> Receipt {
        Receipt {
            receipt_id: Uuid::now_v7(),
            log_id: envelope.log_id.clone(),
            message_id: envelope.message_id.clone(),
            disposition: ReceiptDisposition::Accepted,
            reasons: Vec::new(),
            issued_at: Utc::now(),
        }
    }

    pub fn rejected(envelope: &Envelope, reasons: Vec<ReceiptReason>) -> Receipt {
        Receipt {
            receipt_id: Uuid::now_v7(),
            log_id: envelope.log_id.clone(),
            message_id: envelope.message_id.clone(),
            disposition: ReceiptDisposition::Rejected,
            reasons,
            issued_at: Utc::now(),
        }
    }
}

/// Maps rule hits onto rejection reasons for the receipt.
pub fn rule_violation_reasons(hits: &[RuleHit]) -> Vec<ReceiptReason> {
    hits.iter()
        .map(|hit| ReceiptReason {
            code: ReasonCode::RuleViolation,
            detail: format!("{}: {}", hit.rule, hit.message),
        })
        .collect()
}

/// Heads-up for the case system that a new attestation is on its way, with
/// the form itself riding along base64-encoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseNotification {
    pub log_id: String,
    pub message_id: String,
    pub episode_start: NaiveDate,
    pub form_b64: String,
}

impl CaseNotification {
    pub fn new(envelope: &Envelope) -> Result<CaseNotification, ParseError> {
        let form = serde_json::to_vec(&envelope.attestation).map_err(ParseError::Fingerprint)?;
        Ok(CaseNotification {
            log_id: envelope.log_id.clone(),
            message_id: envelope.message_id.clone(),
            episode_start: envelope.attestation.episode_start,
            form_b64: base64::engine::general_purpose::STANDARD.encode(form),
        })
    }
}
