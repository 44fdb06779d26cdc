//! Result items and the batches that carry them

use serde::{Deserialize, Serialize};

/// A single match produced by a provider
///
/// `key` is unique within its provider for one epoch and is the handle
/// used later for preview and execute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultItem {
    pub key: String,
    pub provider_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    /// Passed through untouched; the engine does not rank
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
    /// Provider-specific display data
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub display: serde_json::Value,
}

impl ResultItem {
    pub fn new(provider_id: impl Into<String>, key: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            provider_id: provider_id.into(),
            title: title.into(),
            subtitle: None,
            score: None,
            display: serde_json::Value::Null,
        }
    }

    pub fn with_subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = Some(subtitle.into());
        self
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_display(mut self, display: serde_json::Value) -> Self {
        self.display = display;
        self
    }
}

/// Body of a `ResultsUpdated` push
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BatchPayload {
    /// Replace everything delivered so far for this provider and epoch
    Reset { items: Vec<ResultItem> },
    /// Add items after the ones already delivered
    Append { items: Vec<ResultItem> },
    /// Splice items in at position `at` of the list delivered so far
    Insert { at: usize, items: Vec<ResultItem> },
    /// The provider finished cleanly for this epoch
    End,
}

impl BatchPayload {
    pub fn items(&self) -> &[ResultItem] {
        match self {
            BatchPayload::Reset { items } | BatchPayload::Append { items } | BatchPayload::Insert { items, .. } => items,
            BatchPayload::End => &[],
        }
    }

    pub fn is_end(&self) -> bool {
        matches!(self, BatchPayload::End)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            BatchPayload::Reset { .. } => "reset",
            BatchPayload::Append { .. } => "append",
            BatchPayload::Insert { .. } => "insert",
            BatchPayload::End => "end",
        }
    }
}
