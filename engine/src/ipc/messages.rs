//! IPC message types for the engine socket
//!
//! Newline-delimited JSON. Clients send requests; the engine sends replies
//! to those requests and, interleaved with them, every push event.

use std::fmt;
use std::str::FromStr;

use lancea_model::{CancelRequest, Envelope, ExecuteRequest, PreviewRequest, ResolveRequest, SearchRequest};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EngineError;
use crate::events::EngineEvent;

/// Maximum length of one line in either direction
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Calls a client can make
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    ResolveCommand,
    Search,
    Cancel,
    RequestPreview,
    Execute,
    Ping,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::ResolveCommand => "ResolveCommand",
            Method::Search => "Search",
            Method::Cancel => "Cancel",
            Method::RequestPreview => "RequestPreview",
            Method::Execute => "Execute",
            Method::Ping => "Ping",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ResolveCommand" => Ok(Method::ResolveCommand),
            "Search" => Ok(Method::Search),
            "Cancel" => Ok(Method::Cancel),
            "RequestPreview" => Ok(Method::RequestPreview),
            "Execute" => Ok(Method::Execute),
            "Ping" => Ok(Method::Ping),
            other => Err(EngineError::UnknownMethod(other.to_string())),
        }
    }
}

/// `{"id": 1, "method": "Search", "params": {"v": "1.0", "data": {...}}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientMessage {
    pub id: u64,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl ClientMessage {
    pub fn new(id: u64, method: Method, params: Value) -> Self {
        Self {
            id,
            method: method.as_str().to_string(),
            params,
        }
    }
}

/// A decoded, validated request
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    ResolveCommand(ResolveRequest),
    Search(SearchRequest),
    Cancel(CancelRequest),
    RequestPreview(PreviewRequest),
    Execute(ExecuteRequest),
    Ping,
}

impl Request {
    /// Decode `params` for `method`, checking the envelope version
    pub fn decode(method: &str, params: Value) -> Result<Self, EngineError> {
        let request = match method.parse::<Method>()? {
            Method::ResolveCommand => Request::ResolveCommand(Envelope::decode(params)?),
            Method::Search => Request::Search(Envelope::decode(params)?),
            Method::Cancel => Request::Cancel(Envelope::decode(params)?),
            Method::RequestPreview => Request::RequestPreview(Envelope::decode(params)?),
            Method::Execute => Request::Execute(Envelope::decode(params)?),
            Method::Ping => Request::Ping,
        };
        Ok(request)
    }

    pub fn method(&self) -> Method {
        match self {
            Request::ResolveCommand(_) => Method::ResolveCommand,
            Request::Search(_) => Method::Search,
            Request::Cancel(_) => Method::Cancel,
            Request::RequestPreview(_) => Method::RequestPreview,
            Request::Execute(_) => Method::Execute,
            Request::Ping => Method::Ping,
        }
    }
}

/// Answer to one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    Reply {
        id: u64,
        result: Value,
    },
    /// The request could not be decoded or dispatched; `id` is absent when
    /// the line did not parse far enough to have one
    Failure {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<u64>,
        message: String,
    },
}

/// Anything the engine writes to a connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerMessage {
    Response(Response),
    Event(EngineEvent),
}

impl ServerMessage {
    pub fn reply(id: u64, result: Value) -> Self {
        Self::Response(Response::Reply { id, result })
    }

    pub fn failure(id: Option<u64>, message: impl Into<String>) -> Self {
        Self::Response(Response::Failure {
            id,
            message: message.into(),
        })
    }
}
