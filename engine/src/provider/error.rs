//! Provider error types

use lancea_model::{Epoch, ErrorPayload};
use thiserror::Error;

/// The sink was cancelled or its receiver is gone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Result sink closed")]
pub struct SinkClosed;

/// Errors that can occur at the provider boundary
///
/// Every variant maps to a stable `code()` that is what clients see in a
/// `ProviderError` event or an error `Outcome`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("Provider does not support {operation}")]
    Unsupported { operation: &'static str },

    #[error("Unknown provider: {provider_id}")]
    UnknownProvider { provider_id: String },

    #[error("Unknown key: {key}")]
    UnknownKey { key: String },

    #[error("Key {key} was not delivered in epoch {epoch}")]
    StaleKey { key: String, epoch: Epoch },

    #[error("Unknown action: {action}")]
    UnknownAction { action: String },

    #[error("Provider timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Provider panicked: {0}")]
    Panicked(String),

    #[error("Provider failed: {0}")]
    Failed(String),

    #[error("Cancelled")]
    Cancelled,
}

impl ProviderError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unsupported { .. } => "unsupported",
            Self::UnknownProvider { .. } => "unknown-provider",
            Self::UnknownKey { .. } => "unknown-key",
            Self::StaleKey { .. } => "stale-key",
            Self::UnknownAction { .. } => "unknown-action",
            Self::Timeout { .. } => "timeout",
            Self::Panicked(_) => "panicked",
            Self::Failed(_) => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn to_payload(&self) -> ErrorPayload {
        ErrorPayload::new(self.code(), self.to_string())
    }
}

impl From<SinkClosed> for ProviderError {
    fn from(_: SinkClosed) -> Self {
        Self::Cancelled
    }
}

impl From<eyre::Report> for ProviderError {
    fn from(report: eyre::Report) -> Self {
        Self::Failed(format!("{:#}", report))
    }
}

impl From<std::io::Error> for ProviderError {
    fn from(err: std::io::Error) -> Self {
        Self::Failed(err.to_string())
    }
}
