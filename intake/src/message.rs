use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ParseError;

/// Payload kinds the transport knows how to hand over. Anything else is
/// rejected at the boundary as a `TransportError`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
}

impl Payload {
    pub fn text(&self) -> &str {
        match self {
            Payload::Text(text) => text,
        }
    }
}

/// A message as it comes off the input topic, before any decoding.
#[derive(Debug, Clone)]
pub struct RawMessage {
    /// Transport-assigned identity, used for logging and dead-letter keys.
    pub delivery_tag: String,
    pub payload: Payload,
}

/// The organization the attestation was submitted on behalf of.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SenderOrg {
    pub name: String,
    #[serde(default)]
    pub registry_number: Option<String>,
    #[serde(default)]
    pub directory_id: Option<String>,
    #[serde(default)]
    pub facility_id: Option<String>,
}

/// The clinical content of the message. Everything beyond the episode start
/// is carried opaquely; this service routes it but never interprets it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attestation {
    pub episode_start: NaiveDate,
    #[serde(default)]
    pub content: serde_json::Value,
}

/// The decoded form of an input message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Log id assigned by the upstream gateway, the id receipts answer to.
    pub log_id: String,
    /// Business message id assigned by the sender.
    pub message_id: String,
    pub sender: SenderOrg,
    pub patient_nid: String,
    pub practitioner_nid: String,
    pub received_at: DateTime<Utc>,
    pub signed_at: DateTime<Utc>,
    #[serde(default)]
    pub ruleset_version: Option<String>,
    pub attestation: Attestation,
}

impl Envelope {
    pub fn parse(text: &str) -> Result<Envelope, ParseError> {
        serde_json::from_str(text).map_err(ParseError::Envelope)
    }
}

/// SHA-256 over the attestation content only. Envelope ids and timestamps are
/// excluded so a retransmission of the same content hashes identically.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentFingerprint(String);

impl ContentFingerprint {
    pub fn of(attestation: &Attestation) -> Result<ContentFingerprint, ParseError> {
        // serde_json keeps object keys sorted, so field order in the source
        // document does not change the hash
        let canonical = serde_json::to_vec(attestation).map_err(ParseError::Fingerprint)?;
        let digest = Sha256::digest(&canonical);
        Ok(ContentFingerprint(format!("{digest:x}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json(log_id: &str, diagnosis: &str) -> String {
        format!(
            r#"{{
                "log_id": "{log_id}",
                "message_id": "msg-1001",
                "sender": {{
                    "name": "Acme Clinic",
                    "registry_number": "987654321"
                }},
                "patient_nid": "01017012345",
                "practitioner_nid": "02027054321",
                "received_at": "2026-08-20T08:30:00Z",
                "signed_at": "2026-08-20T08:00:00Z",
                "ruleset_version": "2",
                "attestation": {{
                    "episode_start": "2026-08-18",
                    "content": {{"diagnosis": "{diagnosis}", "grade": 100}}
                }}
            }}"#
        )
    }

    #[test]
    fn parses_an_envelope() {
        let envelope = Envelope::parse(&sample_json("edi-1", "L87")).unwrap();
        assert_eq!(envelope.log_id, "edi-1");
        assert_eq!(envelope.sender.name, "Acme Clinic");
        assert_eq!(envelope.sender.directory_id, None);
        assert_eq!(envelope.ruleset_version.as_deref(), Some("2"));
        assert_eq!(
            envelope.attestation.episode_start,
            NaiveDate::from_ymd_opt(2026, 8, 18).unwrap()
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(Envelope::parse("not json").is_err());
        assert!(Envelope::parse(r#"{"log_id": "edi-1"}"#).is_err());
    }

    #[test]
    fn fingerprint_ignores_envelope_identity() {
        let first = Envelope::parse(&sample_json("edi-1", "L87")).unwrap();
        let resent = Envelope::parse(&sample_json("edi-2", "L87")).unwrap();

        let a = ContentFingerprint::of(&first.attestation).unwrap();
        let b = ContentFingerprint::of(&resent.attestation).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_tracks_content() {
        let first = Envelope::parse(&sample_json("edi-1", "L87")).unwrap();
        let changed = Envelope::parse(&sample_json("edi-1", "M54")).unwrap();

        let a = ContentFingerprint::of(&first.attestation).unwrap();
        let b = ContentFingerprint::of(&changed.attestation).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn fingerprint_is_insensitive_to_key_order() {
        let ordered: Attestation = serde_json::from_str(
            r#"{"episode_start": "2026-08-18", "content": {"a": 1, "b": 2}}"#,
        )
        .unwrap();
        let shuffled: Attestation = serde_json::from_str(
            r#"{"content": {"b": 2, "a": 1}, "episode_start": "2026-08-18"}"#,
        )
        .unwrap();

        assert_eq!(
            ContentFingerprint::of(&ordered).unwrap(),
            ContentFingerprint::of(&shuffled).unwrap()
        );
    }
}
