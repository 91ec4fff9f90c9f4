use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::ClientConfig;
use tokio::time::timeout;
use tracing::info;

use crate::config::KafkaConfig;
use crate::error::TransportError;
use crate::message::{Payload, RawMessage};

// recv wakes up at least this often so workers keep observing the shutdown flag
const RECEIVE_POLL_TIMEOUT: Duration = Duration::from_millis(50);

/// Input side of the pipeline. `receive` is a poll: `Ok(None)` means nothing
/// is available right now and the caller decides how long to idle.
#[async_trait]
pub trait QueueTransport: Send + Sync {
    async fn receive(&self) -> Result<Option<RawMessage>, TransportError>;
}

/// Kafka consumer shared by all workers. Offsets auto-commit on read; a
/// message that fails processing is preserved through the dead-letter topic,
/// not through redelivery.
pub struct KafkaTransport {
    consumer: StreamConsumer,
}

impl KafkaTransport {
    pub fn new(config: &KafkaConfig) -> anyhow::Result<KafkaTransport> {
        let mut client_config = ClientConfig::new();
        client_config
            .set("group.id", &config.kafka_consumer_group)
            .set("bootstrap.servers", &config.kafka_hosts)
            .set("enable.auto.commit", "true")
            .set("auto.offset.reset", "earliest")
            .set("fetch.wait.max.ms", "100");

        if config.kafka_tls {
            client_config
                .set("security.protocol", "ssl")
                .set("enable.ssl.certificate.verification", "false");
        };

        let consumer: StreamConsumer = client_config.create()?;
        consumer.subscribe(&[&config.input_topic])?;

        info!(
            topic = config.input_topic,
            group_id = config.kafka_consumer_group,
            "input consumer subscribed"
        );

        Ok(KafkaTransport { consumer })
    }
}

#[async_trait]
impl QueueTransport for KafkaTransport {
    async fn receive(&self) -> Result<Option<RawMessage>, TransportError> {
        match timeout(RECEIVE_POLL_TIMEOUT, self.consumer.recv()).await {
            Err(_) => Ok(None),
            Ok(Err(err)) => Err(TransportError::Receive(err)),
            Ok(Ok(message)) => {
                let bytes = message.payload().ok_or(TransportError::EmptyPayload)?;
                let text = std::str::from_utf8(bytes)?.to_owned();
                Ok(Some(RawMessage {
                    delivery_tag: format!(
                        "{}:{}:{}",
                        message.topic(),
                        message.partition(),
                        message.offset()
                    ),
                    payload: Payload::Text(text),
                }))
            }
        }
    }
}

/// In-memory transport for tests: hand-fed messages, drained in order.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    queue: Arc<Mutex<VecDeque<RawMessage>>>,
}

impl MemoryTransport {
    pub fn new() -> MemoryTransport {
        Default::default()
    }

    pub fn push(&self, message: RawMessage) {
        match self.queue.lock() {
            Ok(mut queue) => queue.push_back(message),
            Err(poisoned) => poisoned.into_inner().push_back(message),
        }
    }
}

#[async_trait]
impl QueueTransport for MemoryTransport {
    async fn receive(&self) -> Result<Option<RawMessage>, TransportError> {
        let message = match self.queue.lock() {
            Ok(mut queue) => queue.pop_front(),
            Err(poisoned) => poisoned.into_inner().pop_front(),
        };
        Ok(message)
    }
}
