//! Dispatcher - routes preview and execute requests to one provider
//!
//! Neither call is gated by the epoch lifecycle: a preview is tagged with
//! the epoch it was requested against and delivered even if that epoch has
//! since been superseded.

use std::sync::Arc;
use std::time::Duration;

use lancea_model::{Epoch, Outcome, Preview};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::coordinator::SearchCoordinator;
use crate::epoch::EpochManager;
use crate::events::{EventBus, EventEmitter};
use crate::provider::{Provider, ProviderError, ProviderRegistry};
use crate::task::contained;

#[derive(Clone)]
pub struct Dispatcher {
    epochs: Arc<EpochManager>,
    providers: Arc<ProviderRegistry>,
    coordinator: SearchCoordinator,
    bus: Arc<EventBus>,
    preview_timeout: Duration,
    execute_timeout: Duration,
    strict_keys: bool,
}

impl Dispatcher {
    pub fn new(
        epochs: Arc<EpochManager>,
        providers: Arc<ProviderRegistry>,
        coordinator: SearchCoordinator,
        bus: Arc<EventBus>,
        config: &EngineConfig,
    ) -> Self {
        debug!(strict_keys = config.strict_keys, "Dispatcher::new");
        Self {
            epochs,
            providers,
            coordinator,
            bus,
            preview_timeout: config.preview_timeout(),
            execute_timeout: config.execute_timeout(),
            strict_keys: config.strict_keys,
        }
    }

    /// Fire-and-forget preview; the answer arrives on the bus
    ///
    /// Epoch 0 means the current epoch. Returns the epoch the resulting
    /// event will be tagged with.
    pub fn request_preview(&self, provider_id: &str, key: &str, epoch: Epoch) -> Epoch {
        let tag = if epoch.is_none() { self.epochs.current() } else { epoch };
        debug!(%provider_id, %key, requested = %epoch, %tag, "Dispatcher::request_preview: called");
        let emitter = self.bus.emitter_for(tag, provider_id);

        let provider = match self.target(provider_id, "preview", |p| p.capabilities().preview) {
            Ok(provider) => provider,
            Err(err) => {
                emitter.provider_error(err.to_payload());
                return tag;
            }
        };

        // Only keys for the current (or a not yet issued) epoch can be checked
        if self.strict_keys && !self.epochs.is_superseded(tag) && !self.coordinator.is_key_live(tag, provider_id, key) {
            warn!(%provider_id, %key, epoch = %tag, "Preview for key not delivered in this epoch");
            emitter.provider_error(ProviderError::StaleKey { key: key.to_string(), epoch: tag }.to_payload());
            return tag;
        }

        let key = key.to_string();
        let timeout = self.preview_timeout;
        tokio::spawn(run_preview(provider, key, timeout, emitter));
        tag
    }

    /// Run one action on one result and wait for its outcome
    ///
    /// Every failure comes back as an error `Outcome` with `data.code` set.
    pub async fn execute(&self, provider_id: &str, action: &str, key: &str) -> Outcome {
        debug!(%provider_id, %action, %key, "Dispatcher::execute: called");
        match self.try_execute(provider_id, action, key).await {
            Ok(outcome) => {
                info!(%provider_id, %action, %key, status = ?outcome.status, "Executed action");
                outcome
            }
            Err(err) => {
                warn!(%provider_id, %action, %key, code = err.code(), error = %err, "Execute failed");
                Outcome::error(err.to_string()).with_data(json!({ "code": err.code() }))
            }
        }
    }

    async fn try_execute(&self, provider_id: &str, action: &str, key: &str) -> Result<Outcome, ProviderError> {
        let provider = self.target(provider_id, "execute", |p| p.capabilities().execute)?;

        let current = self.epochs.current();
        if self.strict_keys && !self.coordinator.is_key_live(current, provider_id, key) {
            return Err(ProviderError::StaleKey {
                key: key.to_string(),
                epoch: current,
            });
        }

        let action = action.to_string();
        let key = key.to_string();
        contained(self.execute_timeout, async move { provider.execute(&action, &key).await }).await
    }

    fn target(
        &self,
        provider_id: &str,
        operation: &'static str,
        supports: impl Fn(&dyn Provider) -> bool,
    ) -> Result<Arc<dyn Provider>, ProviderError> {
        let provider = self
            .providers
            .get(provider_id)
            .ok_or_else(|| ProviderError::UnknownProvider {
                provider_id: provider_id.to_string(),
            })?;
        if !supports(provider.as_ref()) {
            return Err(ProviderError::Unsupported { operation });
        }
        Ok(provider)
    }
}

async fn run_preview(provider: Arc<dyn Provider>, key: String, timeout: Duration, emitter: EventEmitter) {
    let lookup = key.clone();
    let result: Result<Preview, ProviderError> =
        contained(timeout, async move { provider.preview(&lookup).await }).await;
    match result {
        Ok(preview) => emitter.preview(&key, preview),
        Err(err) => {
            warn!(provider_id = emitter.provider_id(), %key, code = err.code(), error = %err, "Preview failed");
            emitter.provider_error(err.to_payload());
        }
    }
}
