use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::SinkError;

pub mod kafka;

/// Producer seam every outgoing document goes through: receipts, case
/// notifications, routed records, manual tasks and dead letters.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn send(&self, topic: &str, key: &str, payload: String) -> Result<(), SinkError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentRecord {
    pub topic: String,
    pub key: String,
    pub payload: String,
}

/// In-memory sink recording everything in arrival order, for tests.
#[derive(Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<SentRecord>>>,
    fail_topics: HashSet<String>,
}

impl MemorySink {
    pub fn new() -> MemorySink {
        Default::default()
    }

    /// Makes every send to `topic` fail, for exercising sink error paths.
    pub fn fail_topic(&mut self, topic: &str) -> Self {
        self.fail_topics.insert(topic.to_owned());
        self.clone()
    }

    pub fn records(&self) -> Vec<SentRecord> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn records_for(&self, topic: &str) -> Vec<SentRecord> {
        self.records()
            .into_iter()
            .filter(|record| record.topic == topic)
            .collect()
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn send(&self, topic: &str, key: &str, payload: String) -> Result<(), SinkError> {
        if self.fail_topics.contains(topic) {
            return Err(SinkError::Canceled {
                topic: topic.to_owned(),
            });
        }
        let record = SentRecord {
            topic: topic.to_owned(),
            key: key.to_owned(),
            payload,
        };
        match self.records.lock() {
            Ok(mut records) => records.push(record),
            Err(poisoned) => poisoned.into_inner().push(record),
        }
        Ok(())
    }
}
