//! Lancea data model
//!
//! Types shared by the engine and its clients. Everything that crosses the
//! socket is wrapped in an [`Envelope`] carrying the schema version, so
//! fields can be added without breaking older peers.
//!
//! Provider-specific payloads (`display`, preview `data`, outcome `data`)
//! stay opaque JSON; the engine core never looks inside them.

mod envelope;
mod epoch;
mod payload;
mod requests;
mod result;

pub use envelope::{API_VERSION, Envelope, EnvelopeError};
pub use epoch::Epoch;
pub use payload::{ErrorPayload, Outcome, OutcomeStatus, Preview, ResolvedCommand};
pub use requests::{CancelRequest, ExecuteRequest, PreviewRequest, ResolveRequest, SearchRequest};
pub use result::{BatchPayload, ResultItem};
