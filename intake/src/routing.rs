use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use metrics::counter;
use serde::Serialize;
use tracing::{info, warn};

use crate::clients::region::RegionDirectory;
use crate::config::KafkaConfig;
use crate::error::{PipelineError, SinkError};
use crate::message::Envelope;
use crate::metrics_consts::{MANUAL_TASKS_CREATED, NOTIFICATIONS_SENT, RECEIPTS_SENT};
use crate::receipt::{rule_violation_reasons, CaseNotification, Receipt, ReceiptDisposition, ReceiptReason};
use crate::record::{CaseRecord, Status, ValidationResult};
use crate::retry::retry_with_backoff;
use crate::sinks::RecordSink;
use crate::task::{ManualTask, FALLBACK_OFFICE};

/// Output topic names, resolved from config once at startup.
#[derive(Debug, Clone)]
pub struct Topics {
    pub receipt: String,
    pub notification: String,
    pub accepted: String,
    pub manual: String,
    pub invalid: String,
    pub task: String,
    pub dead_letter: String,
}

impl Topics {
    pub fn from_config(config: &KafkaConfig) -> Topics {
        Topics {
            receipt: config.receipt_topic.clone(),
            notification: config.notification_topic.clone(),
            accepted: config.accepted_topic.clone(),
            manual: config.manual_topic.clone(),
            invalid: config.invalid_topic.clone(),
            task: config.task_topic.clone(),
            dead_letter: config.dead_letter_topic.clone(),
        }
    }

    /// Destination for a validated record. Total over the status enum, so an
    /// unmapped status cannot exist at runtime.
    pub fn destination(&self, status: Status) -> &str {
        match status {
            Status::Ok => &self.accepted,
            Status::ManualProcessing => &self.manual,
            Status::Invalid => &self.invalid,
        }
    }
}

pub struct Router {
    sink: Arc<dyn RecordSink>,
    regions: Arc<dyn RegionDirectory>,
    topics: Topics,
    backoff: Vec<Duration>,
}

impl Router {
    pub fn new(
        sink: Arc<dyn RecordSink>,
        regions: Arc<dyn RegionDirectory>,
        topics: Topics,
        backoff: Vec<Duration>,
    ) -> Router {
        Router {
            sink,
            regions,
            topics,
            backoff,
        }
    }

    /// Rejection for messages that never reach validation (duplicates,
    /// unresolved identities). Exactly one receipt, nothing else.
    pub async fn reject(
        &self,
        envelope: &Envelope,
        reasons: Vec<ReceiptReason>,
    ) -> Result<(), PipelineError> {
        self.send_receipt(Receipt::rejected(envelope, reasons)).await
    }

    /// Emits the side effects for a validated message: receipt first, then
    /// the notification, the record publish last. A crash part-way leaves the
    /// input unacknowledged upstream instead of half-delivered downstream.
    pub async fn route(
        &self,
        envelope: &Envelope,
        record: &CaseRecord,
        verdict: &ValidationResult,
    ) -> Result<(), PipelineError> {
        match verdict.status {
            Status::Invalid => {
                let reasons = rule_violation_reasons(&verdict.rule_hits);
                self.send_receipt(Receipt::rejected(envelope, reasons)).await?;
            }
            Status::Ok | Status::ManualProcessing => {
                self.send_receipt(Receipt::accepted(envelope)).await?;
                let notification = CaseNotification::new(envelope)?;
                self.send_json(&self.topics.notification, &record.log_id, &notification)
                    .await?;
                counter!(NOTIFICATIONS_SENT).increment(1);
            }
        }

        if verdict.status == Status::ManualProcessing {
            let office = self.office_for_patient(record).await;
            let task = ManualTask::new(record, &verdict.rule_hits, office, Utc::now().date_naive());
            self.send_json(&self.topics.task, &record.patient_id, &task)
                .await?;
            counter!(MANUAL_TASKS_CREATED).increment(1);
        }

        let destination = self.topics.destination(verdict.status);
        self.send_json(destination, &record.log_id, record).await?;
        info!(
            log_id = %record.log_id,
            message_id = %record.message_id,
            status = ?verdict.status,
            topic = destination,
            "message routed"
        );
        Ok(())
    }

    /// Two-step office resolution for manual tasks, best-effort: any miss or
    /// failure lands the task at the fallback office rather than failing the
    /// message.
    async fn office_for_patient(&self, record: &CaseRecord) -> String {
        let geography = retry_with_backoff("geography_lookup", &self.backoff, || {
            self.regions
                .geography_for(&record.patient_nid, &record.message_id)
        })
        .await;
        let geography = match geography {
            Ok(Some(geography)) => geography,
            Ok(None) => return FALLBACK_OFFICE.to_owned(),
            Err(err) => {
                warn!(
                    log_id = %record.log_id,
                    error = %err,
                    "geography lookup failed, assigning the fallback office"
                );
                return FALLBACK_OFFICE.to_owned();
            }
        };

        let office = retry_with_backoff("office_lookup", &self.backoff, || {
            self.regions.office_for(&geography)
        })
        .await;
        match office {
            Ok(Some(office)) => office,
            Ok(None) => FALLBACK_OFFICE.to_owned(),
            Err(err) => {
                warn!(
                    log_id = %record.log_id,
                    geography,
                    error = %err,
                    "office lookup failed, assigning the fallback office"
                );
                FALLBACK_OFFICE.to_owned()
            }
        }
    }

    async fn send_receipt(&self, receipt: Receipt) -> Result<(), PipelineError> {
        let disposition = match receipt.disposition {
            ReceiptDisposition::Accepted => "accepted",
            ReceiptDisposition::Rejected => "rejected",
        };
        let log_id = receipt.log_id.clone();
        self.send_json(&self.topics.receipt, &log_id, &receipt).await?;
        counter!(RECEIPTS_SENT, &[("disposition", disposition)]).increment(1);
        Ok(())
    }

    async fn send_json<T: Serialize>(
        &self,
        topic: &str,
        key: &str,
        document: &T,
    ) -> Result<(), PipelineError> {
        let payload = serde_json::to_string(document).map_err(SinkError::Serialize)?;
        self.sink.send(topic, key, payload).await?;
        Ok(())
    }
}
