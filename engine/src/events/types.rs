//! Push event types
//!
//! These are the three signals a connected client can observe:
//! - `ResultsUpdated`: a stamped batch from one provider for one epoch
//! - `PreviewUpdated`: the preview for one result key
//! - `ProviderError`: a failure scoped to one provider and epoch

use chrono::{DateTime, Utc};
use lancea_model::{BatchPayload, Envelope, Epoch, ErrorPayload, Preview};
use serde::{Deserialize, Serialize};

/// Events pushed to every subscriber of the bus
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum EngineEvent {
    ResultsUpdated {
        epoch: Epoch,
        provider_id: String,
        token: u64,
        batch: Envelope<BatchPayload>,
    },
    PreviewUpdated {
        epoch: Epoch,
        provider_id: String,
        key: String,
        preview: Envelope<Preview>,
    },
    ProviderError {
        epoch: Epoch,
        provider_id: String,
        error: Envelope<ErrorPayload>,
    },
}

impl EngineEvent {
    pub fn results(epoch: Epoch, provider_id: impl Into<String>, token: u64, batch: BatchPayload) -> Self {
        Self::ResultsUpdated {
            epoch,
            provider_id: provider_id.into(),
            token,
            batch: Envelope::wrap(batch),
        }
    }

    pub fn preview(epoch: Epoch, provider_id: impl Into<String>, key: impl Into<String>, preview: Preview) -> Self {
        Self::PreviewUpdated {
            epoch,
            provider_id: provider_id.into(),
            key: key.into(),
            preview: Envelope::wrap(preview),
        }
    }

    pub fn provider_error(epoch: Epoch, provider_id: impl Into<String>, error: ErrorPayload) -> Self {
        Self::ProviderError {
            epoch,
            provider_id: provider_id.into(),
            error: Envelope::wrap(error),
        }
    }

    /// Get the event type as a string (for logging)
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ResultsUpdated { .. } => "ResultsUpdated",
            Self::PreviewUpdated { .. } => "PreviewUpdated",
            Self::ProviderError { .. } => "ProviderError",
        }
    }

    pub fn epoch(&self) -> Epoch {
        match self {
            Self::ResultsUpdated { epoch, .. } | Self::PreviewUpdated { epoch, .. } | Self::ProviderError { epoch, .. } => {
                *epoch
            }
        }
    }

    pub fn provider_id(&self) -> &str {
        match self {
            Self::ResultsUpdated { provider_id, .. }
            | Self::PreviewUpdated { provider_id, .. }
            | Self::ProviderError { provider_id, .. } => provider_id,
        }
    }

    /// Token of a results batch, None for other events
    pub fn token(&self) -> Option<u64> {
        match self {
            Self::ResultsUpdated { token, .. } => Some(*token),
            _ => None,
        }
    }
}

/// A journal line: an event with the time it was observed
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JournalEntry {
    pub timestamp: DateTime<Utc>,
    pub event: EngineEvent,
}

impl JournalEntry {
    pub fn new(event: EngineEvent) -> Self {
        Self {
            timestamp: Utc::now(),
            event,
        }
    }
}
