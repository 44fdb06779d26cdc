//! Lancea - asynchronous multi-provider search and command engine
//!
//! The engine sits between a launcher UI and a set of providers. It resolves
//! typed text to commands, fans searches out to providers concurrently, and
//! streams their results back as push events.
//!
//! # Core Concepts
//!
//! - **Epochs**: every search runs under an epoch; only the newest epoch's
//!   output ever reaches a client
//! - **Stamped batches**: each provider's batches carry a token that grows
//!   strictly within one epoch, so a client can drop anything out of order
//! - **Scoped failure**: a provider that errors, panics or times out gets a
//!   `ProviderError` event and nothing else is affected
//!
//! # Modules
//!
//! - [`resolver`] - slash-command and wildcard resolution
//! - [`provider`] - the provider trait, registry and built-in providers
//! - [`coordinator`] - epoch-gated search fan-out
//! - [`dispatcher`] - preview and execute routing
//! - [`events`] - push events, the broadcast bus and the journal
//! - [`ipc`] - the Unix socket surface
//! - [`config`] - configuration types and loading

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod dispatcher;
pub mod engine;
pub mod epoch;
pub mod error;
pub mod events;
pub mod ipc;
pub mod provider;
pub mod resolver;
pub mod task;

#[cfg(test)]
mod test_support;

pub use config::{Config, EngineConfig, JournalConfig};
pub use coordinator::SearchCoordinator;
pub use dispatcher::Dispatcher;
pub use engine::{Engine, EngineBuilder};
pub use epoch::EpochManager;
pub use error::EngineError;
pub use events::{EngineEvent, EventBus, EventEmitter, EventJournal, JournalEntry, read_journal, spawn_journal};
pub use ipc::{EngineClient, EngineConnection};
pub use provider::{BatchSink, Capabilities, CommandsProvider, Provider, ProviderError, ProviderRegistry, Query};
pub use resolver::{CommandRegistry, CommandResolver, CommandSpec};

/// Version reported by `Ping`
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
