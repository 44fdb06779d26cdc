//! Versioned envelope wrapping every request and reply payload

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Schema version stamped on every outgoing envelope
pub const API_VERSION: &str = "1.0";

/// Major version this build understands
const SUPPORTED_MAJOR: &str = "1";

/// Errors from unwrapping an envelope
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("Malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Unsupported schema version '{found}' (expected 1.x)")]
    UnsupportedVersion { found: String },
}

/// `{ "v": "1.0", "data": { ... } }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub v: String,
    pub data: T,
}

impl<T> Envelope<T> {
    /// Wrap a payload with the current schema version
    pub fn wrap(data: T) -> Self {
        Self {
            v: API_VERSION.to_string(),
            data,
        }
    }

    /// Check the major version; minor bumps only ever add fields
    pub fn check_version(&self) -> Result<(), EnvelopeError> {
        let major = self.v.split('.').next().unwrap_or_default();
        if major == SUPPORTED_MAJOR {
            Ok(())
        } else {
            Err(EnvelopeError::UnsupportedVersion { found: self.v.clone() })
        }
    }

    /// Unwrap the payload after validating the version
    pub fn into_data(self) -> Result<T, EnvelopeError> {
        self.check_version()?;
        Ok(self.data)
    }
}

impl<T: DeserializeOwned> Envelope<T> {
    /// Decode an envelope from a raw JSON value and unwrap its payload
    pub fn decode(value: serde_json::Value) -> Result<T, EnvelopeError> {
        let envelope: Envelope<T> = serde_json::from_value(value)?;
        envelope.into_data()
    }
}

impl<T: Serialize> Envelope<T> {
    /// Wrap and convert to a JSON value in one step
    pub fn to_value(data: T) -> Result<serde_json::Value, EnvelopeError> {
        Ok(serde_json::to_value(Envelope::wrap(data))?)
    }
}
