//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use lancea::events::EngineEvent;
use lancea::provider::{BatchSink, Provider, ProviderError, Query};
use lancea_model::{Epoch, Outcome, Preview, ResultItem};
use serde_json::json;
use tokio::sync::broadcast;

/// What a [`FakeProvider`] does for each search
#[derive(Clone)]
pub enum Script {
    /// Sleep, then reset with these keys
    Delayed(u64, Vec<&'static str>),
    /// Report an error, then still deliver these keys
    ErrorThen(Vec<&'static str>),
    /// Echo the query text back as a single key
    Echo,
}

pub struct FakeProvider {
    id: &'static str,
    script: Script,
    preview_delay_ms: u64,
    pub executions: AtomicUsize,
}

impl FakeProvider {
    pub fn new(id: &'static str, script: Script) -> Self {
        Self {
            id,
            script,
            preview_delay_ms: 0,
            executions: AtomicUsize::new(0),
        }
    }

    pub fn with_preview_delay(mut self, ms: u64) -> Self {
        self.preview_delay_ms = ms;
        self
    }

    fn items(&self, keys: &[&str]) -> Vec<ResultItem> {
        keys.iter().map(|k| ResultItem::new(self.id, *k, *k)).collect()
    }
}

#[async_trait]
impl Provider for FakeProvider {
    fn id(&self) -> &str {
        self.id
    }

    async fn search(&self, query: &Query, sink: BatchSink) -> Result<(), ProviderError> {
        match &self.script {
            Script::Delayed(ms, keys) => {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
                sink.reset(self.items(keys)).await?;
            }
            Script::ErrorThen(keys) => {
                sink.error(ProviderError::failed("first batch failed")).await?;
                sink.reset(self.items(keys)).await?;
            }
            Script::Echo => {
                let key = format!("{}:{}", self.id, query.text);
                sink.reset(vec![ResultItem::new(self.id, key, query.text.clone())]).await?;
            }
        }
        Ok(())
    }

    async fn preview(&self, key: &str) -> Result<Preview, ProviderError> {
        tokio::time::sleep(Duration::from_millis(self.preview_delay_ms)).await;
        Ok(Preview::card(json!({ "key": key })))
    }

    async fn execute(&self, action: &str, key: &str) -> Result<Outcome, ProviderError> {
        let count = self.executions.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Outcome::ok_with(json!({ "action": action, "key": key, "count": count })))
    }
}

/// Receive events until `done` holds or `timeout` passes
pub async fn collect_until(
    rx: &mut broadcast::Receiver<EngineEvent>,
    timeout: Duration,
    mut done: impl FnMut(&[EngineEvent]) -> bool,
) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    let deadline = tokio::time::Instant::now() + timeout;
    while !done(&events) {
        match tokio::time::timeout_at(deadline, rx.recv()).await {
            Ok(Ok(event)) => events.push(event),
            Ok(Err(broadcast::error::RecvError::Lagged(_))) => continue,
            Ok(Err(broadcast::error::RecvError::Closed)) | Err(_) => break,
        }
    }
    events
}

/// True once an `end` batch for (epoch, provider) was seen
pub fn ended(events: &[EngineEvent], epoch: Epoch, provider_id: &str) -> bool {
    events.iter().any(|e| match e {
        EngineEvent::ResultsUpdated {
            epoch: ev,
            provider_id: p,
            batch,
            ..
        } => *ev == epoch && p == provider_id && batch.data.is_end(),
        _ => false,
    })
}

/// Keys of every non-end batch for (epoch, provider), in delivery order
pub fn delivered_keys(events: &[EngineEvent], epoch: Epoch, provider_id: &str) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::ResultsUpdated {
                epoch: ev,
                provider_id: p,
                batch,
                ..
            } if *ev == epoch && p == provider_id => Some(batch.data.items().iter().map(|i| i.key.clone())),
            _ => None,
        })
        .flatten()
        .collect()
}
