use std::num::ParseIntError;
use std::str::FromStr;

use envconfig::Envconfig;

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(default = "::")]
    pub host: String,

    #[envconfig(default = "8901")]
    pub port: u16,

    #[envconfig(default = "redis://localhost:6379/")]
    pub redis_url: String,

    #[envconfig(nested = true)]
    pub kafka: KafkaConfig,

    pub token_url: String,
    pub identity_url: String,
    pub practice_directory_url: String,
    pub rules_url: String,
    pub geography_url: String,
    pub office_url: String,

    pub service_username: String,
    pub service_password: String,

    #[envconfig(default = "attestation-intake")]
    pub caller_id: String,

    #[envconfig(default = "4")]
    pub worker_count: usize,

    #[envconfig(default = "100")]
    pub poll_interval_ms: EnvMsDuration,

    #[envconfig(default = "10000")]
    pub request_timeout_ms: EnvMsDuration,

    #[envconfig(default = "500,1000,3000,5000,10000")]
    pub retry_backoff_ms: EnvMsSchedule,
}

#[derive(Envconfig, Clone)]
pub struct KafkaConfig {
    #[envconfig(default = "kafka:9092")]
    pub kafka_hosts: String,

    #[envconfig(default = "false")]
    pub kafka_tls: bool,

    #[envconfig(default = "attestation-intake")]
    pub kafka_consumer_group: String,

    #[envconfig(default = "attestation.input")]
    pub input_topic: String,

    #[envconfig(default = "attestation.input.deadletter")]
    pub dead_letter_topic: String,

    #[envconfig(default = "attestation.receipts")]
    pub receipt_topic: String,

    #[envconfig(default = "attestation.case-updates")]
    pub notification_topic: String,

    #[envconfig(default = "attestation.processing.automatic")]
    pub accepted_topic: String,

    #[envconfig(default = "attestation.processing.manual")]
    pub manual_topic: String,

    #[envconfig(default = "attestation.processing.invalid")]
    pub invalid_topic: String,

    #[envconfig(default = "attestation.manual-tasks")]
    pub task_topic: String,

    #[envconfig(default = "20")]
    pub kafka_producer_linger_ms: u32,

    #[envconfig(default = "400")]
    pub kafka_producer_queue_mib: u32,

    #[envconfig(default = "20000")]
    pub kafka_message_timeout_ms: u32,

    #[envconfig(default = "none")]
    pub kafka_compression_codec: String,
}

#[derive(Debug, Clone, Copy)]
pub struct EnvMsDuration(pub time::Duration);

impl FromStr for EnvMsDuration {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ms = s.parse::<i64>()?;
        Ok(EnvMsDuration(time::Duration::milliseconds(ms)))
    }
}

impl EnvMsDuration {
    pub fn duration(&self) -> std::time::Duration {
        self.0.unsigned_abs()
    }
}

/// Comma-separated list of millisecond delays, shortest first.
#[derive(Debug, Clone)]
pub struct EnvMsSchedule(pub Vec<time::Duration>);

impl FromStr for EnvMsSchedule {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut schedule = Vec::new();
        for part in s.split(',').filter(|part| !part.trim().is_empty()) {
            schedule.push(time::Duration::milliseconds(part.trim().parse::<i64>()?));
        }
        Ok(EnvMsSchedule(schedule))
    }
}

impl EnvMsSchedule {
    pub fn durations(&self) -> Vec<std::time::Duration> {
        self.0.iter().map(|delay| delay.unsigned_abs()).collect()
    }
}

impl Config {
    pub fn bind(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
