use std::time::Duration;

use async_trait::async_trait;
use health::HealthHandle;
use metrics::gauge;
use rdkafka::error::KafkaError;
use rdkafka::producer::{DeliveryFuture, FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use rdkafka::ClientConfig;
use tracing::{debug, info};

use crate::config::KafkaConfig;
use crate::error::SinkError;
use crate::sinks::RecordSink;

pub struct KafkaContext {
    liveness: HealthHandle,
}

impl rdkafka::ClientContext for KafkaContext {
    fn stats(&self, stats: rdkafka::Statistics) {
        // The main rdkafka loop is alive as long as it keeps calling us
        self.liveness.report_healthy_blocking();

        gauge!("intake_kafka_callback_queue_depth").set(stats.replyq as f64);
        gauge!("intake_kafka_producer_queue_depth").set(stats.msg_cnt as f64);
        gauge!("intake_kafka_producer_queue_depth_limit").set(stats.msg_max as f64);
    }
}

/// Shared producer behind every output topic. One instance serves all
/// workers; the broker arbitrates delivery.
#[derive(Clone)]
pub struct KafkaSink {
    producer: FutureProducer<KafkaContext>,
}

impl KafkaSink {
    pub fn new(config: &KafkaConfig, liveness: HealthHandle) -> anyhow::Result<KafkaSink> {
        info!("connecting to Kafka brokers at {}...", config.kafka_hosts);

        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &config.kafka_hosts)
            .set("statistics.interval.ms", "10000")
            .set("linger.ms", config.kafka_producer_linger_ms.to_string())
            .set(
                "message.timeout.ms",
                config.kafka_message_timeout_ms.to_string(),
            )
            .set("compression.codec", &config.kafka_compression_codec)
            .set(
                "queue.buffering.max.kbytes",
                (config.kafka_producer_queue_mib * 1024).to_string(),
            );

        if config.kafka_tls {
            client_config
                .set("security.protocol", "ssl")
                .set("enable.ssl.certificate.verification", "false");
        };

        debug!("rdkafka configuration: {:?}", client_config);
        let producer: FutureProducer<KafkaContext> =
            client_config.create_with_context(KafkaContext { liveness })?;

        // Ping the cluster to make sure we can reach brokers, fail after 10 seconds
        let _metadata = producer.client().fetch_metadata(
            Some("__consumer_offsets"),
            Timeout::After(Duration::new(10, 0)),
        )?;
        info!("connected to Kafka brokers");

        Ok(KafkaSink { producer })
    }

    pub fn flush(&self) -> Result<(), KafkaError> {
        self.producer.flush(Duration::new(30, 0))
    }

    async fn await_delivery(topic: &str, delivery: DeliveryFuture) -> Result<(), SinkError> {
        match delivery.await {
            // Cancelled due to timeout while retrying
            Err(_) => Err(SinkError::Canceled {
                topic: topic.to_owned(),
            }),
            Ok(Err((source, _))) => Err(SinkError::Delivery {
                topic: topic.to_owned(),
                source,
            }),
            Ok(Ok(_)) => Ok(()),
        }
    }
}

#[async_trait]
impl RecordSink for KafkaSink {
    async fn send(&self, topic: &str, key: &str, payload: String) -> Result<(), SinkError> {
        let record = FutureRecord::to(topic).key(key).payload(&payload);
        let ack = self
            .producer
            .send_result(record)
            .map_err(|(source, _)| SinkError::Enqueue {
                topic: topic.to_owned(),
                source,
            })?;
        Self::await_delivery(topic, ack).await
    }
}
