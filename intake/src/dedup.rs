use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tracing::warn;

use crate::message::ContentFingerprint;
use crate::metrics_consts::{DEDUP_STORE_ERRORS, DUPLICATES_DROPPED};
use crate::redis::Client;

/// How long a fingerprint blocks retransmissions of the same content.
pub const DEDUP_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Duplicate { original_log_id: String },
}

/// Content-level duplicate gate over the redis store.
///
/// The gate is best-effort: when the store cannot be reached the message is
/// admitted anyway, since holding up intake on the dedup store would stall
/// every sender behind it.
pub struct DedupGate {
    store: Arc<dyn Client>,
    ttl: Duration,
}

impl DedupGate {
    pub fn new(store: Arc<dyn Client>) -> DedupGate {
        DedupGate {
            store,
            ttl: DEDUP_TTL,
        }
    }

    pub async fn admit(&self, fingerprint: &ContentFingerprint, log_id: &str) -> Admission {
        match self.store.get(fingerprint.as_str().to_owned()).await {
            Ok(Some(original_log_id)) => {
                counter!(DUPLICATES_DROPPED).increment(1);
                Admission::Duplicate { original_log_id }
            }
            Ok(None) => {
                if let Err(err) = self
                    .store
                    .setex(
                        fingerprint.as_str().to_owned(),
                        log_id.to_owned(),
                        self.ttl,
                    )
                    .await
                {
                    counter!(DEDUP_STORE_ERRORS).increment(1);
                    warn!(
                        log_id,
                        error = %err,
                        "dedup store write failed, admitting message unchecked"
                    );
                }
                Admission::Admitted
            }
            Err(err) => {
                counter!(DEDUP_STORE_ERRORS).increment(1);
                warn!(
                    log_id,
                    error = %err,
                    "dedup store unavailable, admitting message unchecked"
                );
                Admission::Admitted
            }
        }
    }
}
