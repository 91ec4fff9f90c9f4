use reqwest::StatusCode;
use thiserror::Error;

/// Errors raised while pulling messages off the input topic.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to receive from input topic: {0}")]
    Receive(#[from] rdkafka::error::KafkaError),
    #[error("message carries no payload")]
    EmptyPayload,
    #[error("unsupported payload kind, body is not valid utf-8: {0}")]
    NonTextPayload(#[from] std::str::Utf8Error),
}

/// Errors raised while decoding an admitted payload.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("failed to decode message envelope: {0}")]
    Envelope(serde_json::Error),
    #[error("failed to canonicalize attestation content: {0}")]
    Fingerprint(serde_json::Error),
}

/// Failure of a call to one of the upstream services. The transient flag is
/// decided where the error is constructed, so the retry engine never has to
/// inspect error causes.
#[derive(Error, Debug)]
pub enum DependencyError {
    #[error("{call} request failed: {source}")]
    Request {
        call: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{call} returned status {status}")]
    Status {
        call: &'static str,
        status: StatusCode,
    },
    #[error("failed to decode {call} response: {source}")]
    Decode {
        call: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

/// Errors that the retry engine may act on.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

impl Transient for DependencyError {
    fn is_transient(&self) -> bool {
        match self {
            DependencyError::Request { source, .. } => {
                source.is_timeout() || source.is_connect()
            }
            DependencyError::Status { status, .. } => is_retryable_status(*status),
            DependencyError::Decode { .. } => false,
        }
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Errors raised while producing documents to Kafka.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("failed to serialize outgoing document: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to enqueue record for {topic}: {source}")]
    Enqueue {
        topic: String,
        #[source]
        source: rdkafka::error::KafkaError,
    },
    #[error("delivery to {topic} failed: {source}")]
    Delivery {
        topic: String,
        #[source]
        source: rdkafka::error::KafkaError,
    },
    #[error("delivery report for {topic} was dropped before resolving")]
    Canceled { topic: String },
}

/// Anything that can take down the processing of a single message. The worker
/// loop catches this at its top level and dead-letters the original message.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Dependency(#[from] DependencyError),
    #[error(transparent)]
    Sink(#[from] SinkError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_transience() {
        let transient = DependencyError::Status {
            call: "resolve_identities",
            status: StatusCode::INTERNAL_SERVER_ERROR,
        };
        assert!(transient.is_transient());

        let throttled = DependencyError::Status {
            call: "resolve_identities",
            status: StatusCode::TOO_MANY_REQUESTS,
        };
        assert!(throttled.is_transient());

        let terminal = DependencyError::Status {
            call: "resolve_identities",
            status: StatusCode::BAD_REQUEST,
        };
        assert!(!terminal.is_transient());

        let unauthorized = DependencyError::Status {
            call: "fetch_token",
            status: StatusCode::UNAUTHORIZED,
        };
        assert!(!unauthorized.is_transient());
    }
}
