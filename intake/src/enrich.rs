use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::warn;

use crate::clients::identity::{IdentityLookup, IdentityResolver};
use crate::clients::practice::PracticeDirectory;
use crate::error::DependencyError;
use crate::matching;
use crate::message::Envelope;
use crate::receipt::{ReasonCode, ReceiptReason};
use crate::record::MatchedPractice;
use crate::retry::retry_with_backoff;

/// Everything a message needs resolved before it can go to rule validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentResult {
    pub patient_id: String,
    pub practitioner_id: String,
    pub practice: Option<MatchedPractice>,
}

/// Outcome of the fan-out. A rejection is an ordinary business answer here,
/// not an error; only upstream transport failures surface as errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Enrichment {
    Complete(EnrichmentResult),
    Rejected(ReceiptReason),
}

pub struct Enricher {
    identities: Arc<dyn IdentityResolver>,
    practices: Arc<dyn PracticeDirectory>,
    backoff: Vec<Duration>,
}

impl Enricher {
    pub fn new(
        identities: Arc<dyn IdentityResolver>,
        practices: Arc<dyn PracticeDirectory>,
        backoff: Vec<Duration>,
    ) -> Enricher {
        Enricher {
            identities,
            practices,
            backoff,
        }
    }

    /// Resolves both identities and the practice match for one message.
    ///
    /// The identity batch (patient and practitioner in one call) and the
    /// practice directory lookup are issued concurrently and joined. The
    /// practice lookup keys on the practitioner's natural key, not the
    /// resolved identity, which is what lets it run alongside resolution.
    ///
    /// The patient is checked before the practitioner, so a message missing
    /// both rejects on the patient. A failed or empty practice lookup is
    /// logged and carried as no match.
    pub async fn enrich(&self, envelope: &Envelope) -> Result<Enrichment, DependencyError> {
        let keys = vec![
            envelope.patient_nid.clone(),
            envelope.practitioner_nid.clone(),
        ];
        let identity_call = retry_with_backoff("resolve_identities", &self.backoff, || {
            self.identities.resolve(&keys, &envelope.message_id)
        });
        let practice_call = retry_with_backoff("practice_lookup", &self.backoff, || {
            self.practices.practices_for(&envelope.practitioner_nid)
        });

        let (lookups, candidates) = tokio::join!(identity_call, practice_call);
        let lookups = lookups?;

        let patient_id = match resolution_of(lookups.get(&envelope.patient_nid)) {
            Ok(id) => id,
            Err(detail) => {
                return Ok(Enrichment::Rejected(ReceiptReason {
                    code: ReasonCode::PatientNotRegistered,
                    detail,
                }))
            }
        };
        let practitioner_id = match resolution_of(lookups.get(&envelope.practitioner_nid)) {
            Ok(id) => id,
            Err(detail) => {
                return Ok(Enrichment::Rejected(ReceiptReason {
                    code: ReasonCode::PractitionerNotRegistered,
                    detail,
                }))
            }
        };

        let practice = match candidates {
            Ok(candidates) => matching::best_match(
                &candidates,
                &envelope.sender.name,
                Utc::now().date_naive(),
            ),
            Err(err) => {
                warn!(
                    log_id = %envelope.log_id,
                    message_id = %envelope.message_id,
                    error = %err,
                    "practice lookup failed, continuing without a match"
                );
                None
            }
        };

        Ok(Enrichment::Complete(EnrichmentResult {
            patient_id,
            practitioner_id,
            practice,
        }))
    }
}

fn resolution_of(lookup: Option<&IdentityLookup>) -> Result<String, String> {
    let Some(lookup) = lookup else {
        return Err("no answer from the national registry".to_owned());
    };
    if let Some(error) = &lookup.error {
        return Err(error.clone());
    }
    match &lookup.identity {
        Some(record) => Ok(record.id.clone()),
        None => Err("not found in the national registry".to_owned()),
    }
}
