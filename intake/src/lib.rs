//! Attestation intake pipeline: consume, deduplicate, enrich, validate,
//! route, acknowledge. The binary crate wires this up; everything here is
//! testable behind seams.

pub mod clients;
pub mod config;
pub mod dedup;
pub mod enrich;
pub mod error;
pub mod matching;
pub mod message;
pub mod metrics_consts;
pub mod pipeline;
pub mod receipt;
pub mod record;
pub mod redis;
pub mod retry;
pub mod routing;
pub mod sinks;
pub mod task;
pub mod transport;
