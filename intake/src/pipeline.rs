use std::sync::Arc;
use std::time::{Duration, Instant};

use health::HealthHandle;
use metrics::{counter, histogram};
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{error, info};

use crate::clients::rules::RuleValidator;
use crate::dedup::{Admission, DedupGate};
use crate::enrich::{Enricher, Enrichment};
use crate::error::PipelineError;
use crate::message::{ContentFingerprint, Envelope, RawMessage};
use crate::metrics_consts::{
    DEAD_LETTERS, DEAD_LETTER_FAILURES, MESSAGES_RECEIVED, MESSAGE_OUTCOMES,
    MESSAGE_PROCESSING_TIME, RECEIVE_ERRORS,
};
use crate::receipt::{ReasonCode, ReceiptReason};
use crate::record::{CaseRecord, Status};
use crate::routing::Router;
use crate::sinks::RecordSink;
use crate::transport::QueueTransport;

/// Observable end state of one message's trip through the stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Accepted,
    ManualProcessing,
    Invalid,
    Duplicate,
    IdentityRejected,
    DeadLettered,
}

impl Disposition {
    pub fn as_label(&self) -> &'static str {
        match self {
            Disposition::Accepted => "accepted",
            Disposition::ManualProcessing => "manual_processing",
            Disposition::Invalid => "invalid",
            Disposition::Duplicate => "duplicate",
            Disposition::IdentityRejected => "identity_rejected",
            Disposition::DeadLettered => "dead_lettered",
        }
    }

    fn of_status(status: Status) -> Disposition {
        match status {
            Status::Ok => Disposition::Accepted,
            Status::ManualProcessing => Disposition::ManualProcessing,
            Status::Invalid => Disposition::Invalid,
        }
    }
}

/// The single-message pipeline, shared by every worker. Workers differ only
/// in their liveness handle; the transport arbitrates who gets which message.
pub struct Pipeline {
    transport: Arc<dyn QueueTransport>,
    sink: Arc<dyn RecordSink>,
    gate: DedupGate,
    enricher: Enricher,
    validator: Arc<dyn RuleValidator>,
    router: Router,
    dead_letter_topic: String,
    poll_interval: Duration,
}

impl Pipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        transport: Arc<dyn QueueTransport>,
        sink: Arc<dyn RecordSink>,
        gate: DedupGate,
        enricher: Enricher,
        validator: Arc<dyn RuleValidator>,
        router: Router,
        dead_letter_topic: String,
        poll_interval: Duration,
    ) -> Pipeline {
        Pipeline {
            transport,
            sink,
            gate,
            enricher,
            validator,
            router,
            dead_letter_topic,
            poll_interval,
        }
    }

    /// Poll-process loop for one worker. Exits only when the shutdown flag is
    /// observed at the top of an iteration; an in-flight message finishes.
    pub async fn run_worker(
        self: Arc<Self>,
        worker: usize,
        liveness: HealthHandle,
        shutdown: watch::Receiver<bool>,
    ) {
        info!(worker, "worker started");
        loop {
            if *shutdown.borrow() {
                info!(worker, "shutdown flag observed, worker stopping");
                break;
            }
            liveness.report_healthy().await;

            match self.transport.receive().await {
                Ok(Some(message)) => {
                    _ = self.handle(message).await;
                }
                Ok(None) => sleep(self.poll_interval).await,
                Err(err) => {
                    counter!(RECEIVE_ERRORS).increment(1);
                    error!(worker, error = %err, "failed to receive from input topic");
                    sleep(self.poll_interval).await;
                }
            }
        }
    }

    /// Runs one message through every stage. Never fails the caller: an
    /// unclassified failure is dead-lettered here and the worker moves on.
    pub async fn handle(&self, message: RawMessage) -> Disposition {
        counter!(MESSAGES_RECEIVED).increment(1);
        let start = Instant::now();

        let disposition = match self.process(&message).await {
            Ok(disposition) => disposition,
            Err(err) => {
                error!(
                    delivery_tag = message.delivery_tag,
                    error = %err,
                    "message processing failed, redirecting the original to the dead-letter topic"
                );
                self.dead_letter(&message).await;
                Disposition::DeadLettered
            }
        };

        let labels = [("outcome", disposition.as_label())];
        counter!(MESSAGE_OUTCOMES, &labels).increment(1);
        histogram!(MESSAGE_PROCESSING_TIME, &labels).record(start.elapsed().as_secs_f64());
        disposition
    }

    async fn process(&self, message: &RawMessage) -> Result<Disposition, PipelineError> {
        let envelope = Envelope::parse(message.payload.text())?;
        let fingerprint = ContentFingerprint::of(&envelope.attestation)?;
        info!(
            log_id = %envelope.log_id,
            message_id = %envelope.message_id,
            org = %envelope.sender.name,
            "message received"
        );

        if let Admission::Duplicate { original_log_id } =
            self.gate.admit(&fingerprint, &envelope.log_id).await
        {
            info!(
                log_id = %envelope.log_id,
                original_log_id,
                "duplicate content, rejecting"
            );
            self.router
                .reject(
                    &envelope,
                    vec![ReceiptReason {
                        code: ReasonCode::Duplicate,
                        detail: format!("already processed as {original_log_id}"),
                    }],
                )
                .await?;
            return Ok(Disposition::Duplicate);
        }

        match self.enricher.enrich(&envelope).await? {
            Enrichment::Rejected(reason) => {
                info!(
                    log_id = %envelope.log_id,
                    code = ?reason.code,
                    "identity could not be resolved, rejecting"
                );
                self.router.reject(&envelope, vec![reason]).await?;
                Ok(Disposition::IdentityRejected)
            }
            Enrichment::Complete(enrichment) => {
                let record = CaseRecord::assemble(
                    &envelope,
                    enrichment.patient_id,
                    enrichment.practitioner_id,
                    enrichment.practice,
                    message.payload.text(),
                );
                let verdict = self.validator.validate(&record).await?;
                self.router.route(&envelope, &record, &verdict).await?;
                Ok(Disposition::of_status(verdict.status))
            }
        }
    }

    /// Redirects the verbatim original to the dead-letter topic. A failure
    /// here is logged and swallowed; it must not take the worker down.
    async fn dead_letter(&self, message: &RawMessage) {
        counter!(DEAD_LETTERS).increment(1);
        if let Err(err) = self
            .sink
            .send(
                &self.dead_letter_topic,
                &message.delivery_tag,
                message.payload.text().to_owned(),
            )
            .await
        {
            counter!(DEAD_LETTER_FAILURES).increment(1);
            error!(
                delivery_tag = message.delivery_tag,
                error = %err,
                "failed to dead-letter message, dropping it"
            );
        }
    }
}
