//! Provider boundary
//!
//! A provider is the only typed contract between the engine and the things
//! that actually produce results. Display and preview payloads stay opaque
//! JSON.

mod commands;
mod error;
mod registry;
mod traits;

pub use commands::{CommandsProvider, SELECT_ACTION};
pub use error::{ProviderError, SinkClosed};
pub use registry::ProviderRegistry;
pub use traits::{BatchSink, Capabilities, Provider, Query, SinkItem};
