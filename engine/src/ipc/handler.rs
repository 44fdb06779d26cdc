//! Maps decoded requests onto engine calls

use lancea_model::Envelope;
use serde_json::{Value, json};
use tracing::debug;

use super::messages::Request;
use crate::VERSION;
use crate::engine::Engine;
use crate::error::EngineError;

/// Run one request and produce the `result` of its reply
///
/// Only `Execute` actually waits on a provider; everything else returns
/// immediately.
pub async fn handle_request(engine: &Engine, request: Request) -> Result<Value, EngineError> {
    debug!(method = %request.method(), "handle_request: called");
    let result = match request {
        Request::ResolveCommand(req) => Envelope::to_value(engine.resolve_command(&req.text))?,
        Request::Search(req) => json!(engine.search(&req.text, &req.provider_ids, req.epoch)),
        Request::Cancel(req) => json!(engine.cancel(req.epoch)),
        Request::RequestPreview(req) => json!(engine.request_preview(&req.provider_id, &req.key, req.epoch)),
        Request::Execute(req) => {
            Envelope::to_value(engine.execute(&req.provider_id, &req.action_id, &req.key).await)?
        }
        Request::Ping => Envelope::to_value(json!({ "version": VERSION }))?,
    };
    Ok(result)
}
