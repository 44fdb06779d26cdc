//! IPC client for talking to a running engine
//!
//! [`EngineClient`] holds where and how long; [`EngineConnection`] is one open
//! socket. Events that arrive while a call waits for its reply are queued and
//! handed out later by [`EngineConnection::next_event`].

use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::Duration;

use eyre::{Context, Result};
use lancea_model::{
    CancelRequest, Envelope, Epoch, ExecuteRequest, Outcome, PreviewRequest, ResolveRequest, ResolvedCommand,
    SearchRequest,
};
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tracing::debug;

use super::get_socket_path;
use super::frame::{LineRead, read_line_bounded};
use super::messages::{ClientMessage, MAX_MESSAGE_SIZE, Method, Response, ServerMessage};
use crate::events::EngineEvent;

/// Default timeout for IPC operations
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for connecting to the engine socket
#[derive(Debug, Clone)]
pub struct EngineClient {
    socket_path: PathBuf,
    timeout: Duration,
}

impl Default for EngineClient {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineClient {
    /// Create a new client with the default socket path
    pub fn new() -> Self {
        Self::with_socket_path(get_socket_path())
    }

    pub fn with_socket_path(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn socket_path(&self) -> &PathBuf {
        &self.socket_path
    }

    pub fn socket_exists(&self) -> bool {
        self.socket_path.exists()
    }

    /// Open a connection; events start flowing immediately
    pub async fn connect(&self) -> Result<EngineConnection> {
        debug!(?self.socket_path, "EngineClient: connecting");
        let stream = tokio::time::timeout(self.timeout, UnixStream::connect(&self.socket_path))
            .await
            .context("Connection timeout")?
            .context("Failed to connect to engine socket")?;
        let (read_half, write_half) = stream.into_split();
        Ok(EngineConnection {
            reader: BufReader::new(read_half),
            writer: write_half,
            next_id: 1,
            pending: VecDeque::new(),
            timeout: self.timeout,
        })
    }

    /// Connect, ping, disconnect; returns the engine version
    pub async fn ping(&self) -> Result<String> {
        self.connect().await?.ping().await
    }
}

/// One open connection to the engine
pub struct EngineConnection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    next_id: u64,
    pending: VecDeque<EngineEvent>,
    timeout: Duration,
}

impl EngineConnection {
    pub async fn resolve_command(&mut self, text: &str) -> Result<ResolvedCommand> {
        let result = self
            .call(Method::ResolveCommand, ResolveRequest { text: text.to_string() })
            .await?;
        Ok(Envelope::decode(result)?)
    }

    /// Returns the epoch the search runs under
    pub async fn search(&mut self, text: &str, provider_ids: &[String], epoch: Epoch) -> Result<Epoch> {
        let request = SearchRequest {
            text: text.to_string(),
            provider_ids: provider_ids.to_vec(),
            epoch,
        };
        let result = self.call(Method::Search, request).await?;
        serde_json::from_value(result).context("Failed to parse search epoch")
    }

    pub async fn cancel(&mut self, epoch: Epoch) -> Result<bool> {
        let result = self.call(Method::Cancel, CancelRequest { epoch }).await?;
        serde_json::from_value(result).context("Failed to parse cancel result")
    }

    /// Returns the epoch the preview event will carry
    pub async fn request_preview(&mut self, provider_id: &str, key: &str, epoch: Epoch) -> Result<Epoch> {
        let request = PreviewRequest {
            provider_id: provider_id.to_string(),
            key: key.to_string(),
            epoch,
        };
        let result = self.call(Method::RequestPreview, request).await?;
        serde_json::from_value(result).context("Failed to parse preview epoch")
    }

    pub async fn execute(&mut self, provider_id: &str, action_id: &str, key: &str) -> Result<Outcome> {
        let request = ExecuteRequest {
            provider_id: provider_id.to_string(),
            action_id: action_id.to_string(),
            key: key.to_string(),
        };
        let result = self.call(Method::Execute, request).await?;
        Ok(Envelope::decode(result)?)
    }

    pub async fn ping(&mut self) -> Result<String> {
        let result = self.call(Method::Ping, Value::Null).await?;
        let data: Value = Envelope::decode(result)?;
        data.get("version")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| eyre::eyre!("Ping reply missing version"))
    }

    /// Next push event, or None if none arrives within `timeout`
    pub async fn next_event(&mut self, timeout: Duration) -> Result<Option<EngineEvent>> {
        if let Some(event) = self.pending.pop_front() {
            return Ok(Some(event));
        }
        match tokio::time::timeout(timeout, self.read_message()).await {
            Err(_) => Ok(None),
            Ok(Ok(ServerMessage::Event(event))) => Ok(Some(event)),
            Ok(Ok(ServerMessage::Response(response))) => {
                debug!(?response, "EngineConnection: unsolicited response dropped");
                Ok(None)
            }
            Ok(Err(e)) => Err(e),
        }
    }

    /// Send one request and wait for its reply
    ///
    /// `Ping` carries no payload; everything else is wrapped in an envelope.
    pub async fn call<P: Serialize>(&mut self, method: Method, params: P) -> Result<Value> {
        let id = self.next_id;
        self.next_id += 1;

        let params = match method {
            Method::Ping => Value::Null,
            _ => Envelope::to_value(params)?,
        };
        let line = serde_json::to_string(&ClientMessage::new(id, method, params)).context("Failed to serialize request")?;
        if line.len() > MAX_MESSAGE_SIZE {
            return Err(eyre::eyre!("Message too large: {} bytes", line.len()));
        }
        debug!(id, %method, "EngineConnection: sending request");

        tokio::time::timeout(self.timeout, async {
            self.writer
                .write_all(line.as_bytes())
                .await
                .context("Failed to write message")?;
            self.writer.write_all(b"\n").await.context("Failed to write newline")?;
            self.writer.flush().await.context("Failed to flush stream")?;
            Ok::<_, eyre::Error>(())
        })
        .await
        .context("Write timeout")??;

        let timeout = self.timeout;
        tokio::time::timeout(timeout, async {
            loop {
                match self.read_message().await? {
                    ServerMessage::Event(event) => self.pending.push_back(event),
                    ServerMessage::Response(Response::Reply { id: got, result }) if got == id => return Ok(result),
                    ServerMessage::Response(Response::Failure { id: got, message }) if got.is_none_or(|g| g == id) => {
                        return Err(eyre::eyre!("Engine error: {}", message));
                    }
                    ServerMessage::Response(other) => {
                        debug!(?other, "EngineConnection: response for another request dropped");
                    }
                }
            }
        })
        .await
        .context("Read timeout")?
    }

    async fn read_message(&mut self) -> Result<ServerMessage> {
        let mut line = Vec::new();
        match read_line_bounded(&mut self.reader, &mut line, MAX_MESSAGE_SIZE)
            .await
            .context("Failed to read from engine")?
        {
            LineRead::Eof => Err(eyre::eyre!("Engine closed the connection")),
            LineRead::TooLarge { size } => Err(eyre::eyre!("Response too large: {} bytes", size)),
            LineRead::Line => serde_json::from_slice(line.trim_ascii()).context("Failed to parse engine message"),
        }
    }
}
