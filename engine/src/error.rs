//! Request-level errors on the IPC surface

use lancea_model::EnvelopeError;
use thiserror::Error;

/// Errors decoding or dispatching one client request
///
/// These become `Failure` replies; the connection stays open.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid envelope: {0}")]
    Envelope(#[from] EnvelopeError),

    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    #[error("Message too large: {size} bytes (limit {limit})")]
    MessageTooLarge { size: usize, limit: usize },

    #[error("Malformed request: {0}")]
    Malformed(#[from] serde_json::Error),
}
