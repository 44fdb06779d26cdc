//! Event bus for engine push events
//!
//! Every observable result of asynchronous work leaves the engine as an
//! [`EngineEvent`] on the bus. Consumers (socket connections, the journal,
//! tests) subscribe and receive their own copy.
//!
//! ```text
//!  SearchCoordinator        Dispatcher
//!   ResultsUpdated        PreviewUpdated
//!   ProviderError         ProviderError
//!          \                  /
//!           v                v
//!  ┌──────────────────────────────────┐
//!  │            EVENT BUS             │
//!  │  (tokio::sync::broadcast channel)│
//!  └──────────────────────────────────┘
//!       |            |            |
//!       v            v            v
//!   connection   connection    journal
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use lancea::events::EventBus;
//!
//! let bus = EventBus::with_default_capacity();
//! let mut rx = bus.subscribe();
//!
//! let emitter = bus.emitter_for(epoch, "emoji");
//! emitter.preview("emoji:joy", preview);
//!
//! while let Ok(event) = rx.recv().await {
//!     println!("{}: {}", event.event_type(), event.provider_id());
//! }
//! ```

mod bus;
mod journal;
mod types;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, EventBus, EventEmitter};
pub use journal::{EventJournal, default_journal_path, read_journal, spawn_journal};
pub use types::{EngineEvent, JournalEntry};
