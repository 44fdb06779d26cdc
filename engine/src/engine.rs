//! Engine - the root object the IPC surface talks to
//!
//! Owns the epoch clock, the event bus, the provider registry and the
//! command registry, and wires the coordinator and dispatcher over them.

use std::sync::Arc;

use lancea_model::{Epoch, Outcome, ResolvedCommand};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::coordinator::SearchCoordinator;
use crate::dispatcher::Dispatcher;
use crate::epoch::EpochManager;
use crate::events::{EngineEvent, EventBus};
use crate::provider::{CommandsProvider, Provider, ProviderRegistry};
use crate::resolver::{CommandRegistry, CommandResolver};

/// Builder for [`Engine`]
pub struct EngineBuilder {
    config: EngineConfig,
    commands: CommandRegistry,
    providers: Vec<Arc<dyn Provider>>,
    builtin_providers: bool,
}

impl EngineBuilder {
    /// Command registry to resolve against (defaults to the built-ins)
    pub fn commands(mut self, commands: CommandRegistry) -> Self {
        self.commands = commands;
        self
    }

    pub fn provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Leave out the built-in `commands` provider
    pub fn without_builtin_providers(mut self) -> Self {
        self.builtin_providers = false;
        self
    }

    pub fn build(self) -> Engine {
        let resolver = Arc::new(CommandResolver::new(self.commands));

        let mut registry = ProviderRegistry::new();
        if self.builtin_providers {
            registry.register(Arc::new(CommandsProvider::new(resolver.clone())));
        }
        for provider in self.providers {
            registry.register(provider);
        }
        let providers = Arc::new(registry);

        let epochs = Arc::new(EpochManager::new());
        let bus = Arc::new(EventBus::new(self.config.event_capacity));
        let coordinator = SearchCoordinator::new(epochs.clone(), providers.clone(), bus.clone(), &self.config);
        let dispatcher = Dispatcher::new(
            epochs.clone(),
            providers.clone(),
            coordinator.clone(),
            bus.clone(),
            &self.config,
        );

        info!(providers = ?providers.ids(), commands = resolver.snapshot().len(), "Engine built");
        Engine {
            config: self.config,
            epochs,
            bus,
            providers,
            resolver,
            coordinator,
            dispatcher,
        }
    }
}

pub struct Engine {
    config: EngineConfig,
    epochs: Arc<EpochManager>,
    bus: Arc<EventBus>,
    providers: Arc<ProviderRegistry>,
    resolver: Arc<CommandResolver>,
    coordinator: SearchCoordinator,
    dispatcher: Dispatcher,
}

impl Engine {
    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder {
            config,
            commands: CommandRegistry::with_builtins(),
            providers: Vec::new(),
            builtin_providers: true,
        }
    }

    /// Map free text to a command; never fails
    pub fn resolve_command(&self, text: &str) -> ResolvedCommand {
        self.resolver.resolve(text)
    }

    /// See [`SearchCoordinator::search`]
    pub fn search(&self, text: &str, provider_ids: &[String], epoch: Epoch) -> Epoch {
        self.coordinator.search(text, provider_ids, epoch)
    }

    pub fn cancel(&self, epoch: Epoch) -> bool {
        self.coordinator.cancel(epoch)
    }

    /// See [`Dispatcher::request_preview`]
    pub fn request_preview(&self, provider_id: &str, key: &str, epoch: Epoch) -> Epoch {
        self.dispatcher.request_preview(provider_id, key, epoch)
    }

    pub async fn execute(&self, provider_id: &str, action: &str, key: &str) -> Outcome {
        self.dispatcher.execute(provider_id, action, key).await
    }

    /// Receive every push event emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.bus.subscribe()
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn current_epoch(&self) -> Epoch {
        self.epochs.current()
    }

    pub fn provider_ids(&self) -> Vec<String> {
        self.providers.ids()
    }

    pub fn commands(&self) -> Arc<CommandRegistry> {
        self.resolver.snapshot()
    }

    /// Swap the command registry; providers are fixed for the engine's life
    pub fn reload_commands(&self, commands: CommandRegistry) {
        info!(commands = commands.len(), "Reloading command registry");
        self.resolver.replace(commands);
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Cancel in-flight searches
    pub fn shutdown(&self) {
        debug!("Engine::shutdown: called");
        self.coordinator.shutdown();
    }
}
