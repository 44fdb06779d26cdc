//! Scripted provider shared by the unit tests

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use lancea_model::{Epoch, Outcome, Preview, ResultItem};
use serde_json::json;
use tokio::sync::{Semaphore, broadcast};

use crate::events::EngineEvent;
use crate::provider::{BatchSink, Capabilities, Provider, ProviderError, Query};

/// One step of a scripted search
#[derive(Clone)]
pub enum Step {
    Reset(Vec<&'static str>),
    Append(Vec<&'static str>),
    Insert(usize, Vec<&'static str>),
    Error(&'static str),
    Sleep(u64),
    /// Park until the gate hands out a permit
    Wait(Arc<Semaphore>),
    Fail(&'static str),
    Panic(&'static str),
}

pub struct ScriptedProvider {
    id: &'static str,
    steps: Vec<Step>,
    capabilities: Capabilities,
    preview_delay: Duration,
    pub executions: AtomicUsize,
    pub searches: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(id: &'static str, steps: Vec<Step>) -> Self {
        Self {
            id,
            steps,
            capabilities: Capabilities::ALL,
            preview_delay: Duration::ZERO,
            executions: AtomicUsize::new(0),
            searches: AtomicUsize::new(0),
        }
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_preview_delay(mut self, delay: Duration) -> Self {
        self.preview_delay = delay;
        self
    }

    pub fn items(&self, keys: &[&str]) -> Vec<ResultItem> {
        keys.iter()
            .map(|k| ResultItem::new(self.id, *k, k.to_uppercase()))
            .collect()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn id(&self) -> &str {
        self.id
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    async fn search(&self, _query: &Query, sink: BatchSink) -> Result<(), ProviderError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        for step in &self.steps {
            match step {
                Step::Reset(keys) => sink.reset(self.items(keys)).await?,
                Step::Append(keys) => sink.append(self.items(keys)).await?,
                Step::Insert(at, keys) => sink.insert(*at, self.items(keys)).await?,
                Step::Error(message) => sink.error(ProviderError::failed(*message)).await?,
                Step::Sleep(ms) => tokio::time::sleep(Duration::from_millis(*ms)).await,
                Step::Wait(gate) => {
                    if let Ok(permit) = gate.acquire().await {
                        permit.forget();
                    }
                }
                Step::Fail(message) => return Err(ProviderError::failed(*message)),
                Step::Panic(message) => panic!("{}", message),
            }
        }
        Ok(())
    }

    async fn preview(&self, key: &str) -> Result<Preview, ProviderError> {
        if !self.preview_delay.is_zero() {
            tokio::time::sleep(self.preview_delay).await;
        }
        Ok(Preview::card(json!({ "key": key })))
    }

    async fn execute(&self, action: &str, key: &str) -> Result<Outcome, ProviderError> {
        let count = self.executions.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Outcome::ok_with(json!({ "action": action, "key": key, "count": count })))
    }
}

/// Receive events until `done` returns true or the deadline passes
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
            epoch: ev, provider_id: p, batch, ..
        } => *ev == epoch && p == provider_id && batch.data.is_end(),
        _ => false,
    })
}
