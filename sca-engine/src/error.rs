use thiserror::Error;

/// Errors surfaced across the engine's component boundaries.
///
/// Only the kinds named in §7 of the design are represented here; rule-level
/// failures (bad literal, missing variable, probe timeout) are caught and
/// folded into [`crate::api::types::Tristate::Invalid`] before they would
/// otherwise need to propagate as an error value.
#[derive(Debug, Error)]
pub enum ScaError {
    #[error("policy '{policy_id}' malformed: {reason}")]
    PolicyMalformed { policy_id: String, reason: String },

    #[error("probe inconclusive: {0}")]
    ProbeInconclusive(String),

    #[error("sink unavailable: {0}")]
    SinkUnavailable(String),

    #[error("dump queue overflow, request for policy index {0} dropped")]
    DumpQueueOverflow(usize),

    #[error("fatal engine error: {0}")]
    Fatal(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(String),
}
