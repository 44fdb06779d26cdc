//! Request payloads carried inside envelopes

use serde::{Deserialize, Serialize};

use crate::Epoch;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolveRequest {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    #[serde(default)]
    pub text: String,
    /// Empty selects every registered provider
    #[serde(default)]
    pub provider_ids: Vec<String>,
    /// Absent or 0 starts a new epoch
    #[serde(default)]
    pub epoch: Epoch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRequest {
    pub provider_id: String,
    pub key: String,
    #[serde(default)]
    pub epoch: Epoch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    pub provider_id: String,
    #[serde(alias = "action")]
    pub action_id: String,
    pub key: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub epoch: Epoch,
}
