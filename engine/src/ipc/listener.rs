//! IPC listener for the engine side
//!
//! Every accepted connection gets three pieces:
//! - a reader that decodes requests and answers them
//! - a forwarder that copies every bus event to the connection
//! - a writer that owns the socket's write half
//!
//! Replies and events share one outbound queue, so a client sees them in the
//! order the engine produced them.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use eyre::{Context, Result};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::frame::{LineRead, read_line_bounded};
use super::handler::handle_request;
use super::messages::{ClientMessage, MAX_MESSAGE_SIZE, Request, ServerMessage};
use crate::engine::Engine;
use crate::error::EngineError;

/// Outbound messages queued per connection before the forwarder waits
const OUTBOUND_QUEUE: usize = 1024;

/// Create a listener at a specific path
///
/// Handles cleanup of stale socket files from previous runs.
pub fn create_listener_at(socket_path: &Path) -> Result<(UnixListener, PathBuf)> {
    debug!(?socket_path, "create_listener_at: creating IPC socket");

    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create socket directory")?;
    }

    if socket_path.exists() {
        debug!(?socket_path, "create_listener_at: removing stale socket");
        std::fs::remove_file(socket_path).context("Failed to remove stale socket")?;
    }

    let listener = UnixListener::bind(socket_path).context("Failed to bind IPC socket")?;
    debug!(?socket_path, "create_listener_at: socket bound successfully");

    Ok((listener, socket_path.to_path_buf()))
}

/// Remove the socket file on shutdown
pub fn cleanup_socket(socket_path: &Path) {
    if socket_path.exists() {
        debug!(?socket_path, "cleanup_socket: removing socket file");
        if let Err(e) = std::fs::remove_file(socket_path) {
            warn!(?socket_path, error = %e, "Failed to remove socket file");
        }
    }
}

/// Accept connections until `shutdown` fires
pub async fn serve(listener: UnixListener, engine: Arc<Engine>, shutdown: CancellationToken) {
    info!("IPC server accepting connections");
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("serve: shutdown requested");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => {
                    tokio::spawn(handle_connection(stream, engine.clone(), shutdown.child_token()));
                }
                Err(e) => warn!(error = %e, "serve: accept failed"),
            },
        }
    }
    info!("IPC server stopped");
}

/// Serve one client until it disconnects or `shutdown` fires
pub async fn handle_connection(stream: UnixStream, engine: Arc<Engine>, shutdown: CancellationToken) {
    let conn_id = Uuid::now_v7();
    info!(%conn_id, "Client connected");

    let (read_half, write_half) = stream.into_split();
    let (out_tx, out_rx) = mpsc::channel::<ServerMessage>(OUTBOUND_QUEUE);

    // Subscribe before reading so no event caused by this client is missed
    let events = engine.subscribe();
    let forwarder = tokio::spawn(forward_events(conn_id, events, out_tx.clone(), shutdown.clone()));
    let writer = tokio::spawn(write_messages(conn_id, write_half, out_rx));

    let mut reader = BufReader::new(read_half);
    let mut line = Vec::new();
    loop {
        let read = tokio::select! {
            _ = shutdown.cancelled() => break,
            read = read_line_bounded(&mut reader, &mut line, MAX_MESSAGE_SIZE) => read,
        };
        match read {
            Ok(LineRead::Eof) => break,
            Ok(LineRead::TooLarge { size }) => {
                let err = EngineError::MessageTooLarge {
                    size,
                    limit: MAX_MESSAGE_SIZE,
                };
                warn!(%conn_id, error = %err, "Rejecting request");
                if out_tx.send(ServerMessage::failure(None, err.to_string())).await.is_err() {
                    break;
                }
            }
            Ok(LineRead::Line) => {
                let line = line.trim_ascii();
                if line.is_empty() {
                    continue;
                }
                if let Some(reply) = dispatch_line(conn_id, line, &engine, &out_tx).await
                    && out_tx.send(reply).await.is_err()
                {
                    break;
                }
            }
            Err(e) => {
                warn!(%conn_id, error = %e, "Failed to read from client");
                break;
            }
        }
    }

    shutdown.cancel();
    let _ = forwarder.await;
    drop(out_tx);
    let _ = writer.await;
    info!(%conn_id, "Client disconnected");
}

/// Decode one line and run it
///
/// Returns the message to send now; `Execute` is answered later from its
/// own task and returns None.
async fn dispatch_line(
    conn_id: Uuid,
    line: &[u8],
    engine: &Arc<Engine>,
    out_tx: &mpsc::Sender<ServerMessage>,
) -> Option<ServerMessage> {
    let msg: ClientMessage = match serde_json::from_slice(line) {
        Ok(msg) => msg,
        Err(e) => {
            let err = EngineError::Malformed(e);
            warn!(%conn_id, error = %err, "Rejecting request");
            return Some(ServerMessage::failure(None, err.to_string()));
        }
    };
    let id = msg.id;
    debug!(%conn_id, id, method = %msg.method, "dispatch_line: request received");

    let request = match Request::decode(&msg.method, msg.params) {
        Ok(request) => request,
        Err(err) => {
            warn!(%conn_id, id, error = %err, "Rejecting request");
            return Some(ServerMessage::failure(Some(id), err.to_string()));
        }
    };

    if matches!(request, Request::Execute(_)) {
        let engine = engine.clone();
        let out_tx = out_tx.clone();
        tokio::spawn(async move {
            let reply = to_reply(id, handle_request(&engine, request).await);
            if out_tx.send(reply).await.is_err() {
                debug!(%conn_id, id, "dispatch_line: client gone before execute finished");
            }
        });
        return None;
    }

    Some(to_reply(id, handle_request(engine, request).await))
}

fn to_reply(id: u64, result: Result<serde_json::Value, EngineError>) -> ServerMessage {
    match result {
        Ok(result) => ServerMessage::reply(id, result),
        Err(err) => ServerMessage::failure(Some(id), err.to_string()),
    }
}

async fn forward_events(
    conn_id: Uuid,
    mut events: broadcast::Receiver<crate::events::EngineEvent>,
    out_tx: mpsc::Sender<ServerMessage>,
    shutdown: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = shutdown.cancelled() => break,
            event = events.recv() => event,
        };
        match event {
            Ok(event) => {
                if out_tx.send(ServerMessage::Event(event)).await.is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(%conn_id, missed = n, "Client lagged behind, events dropped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    debug!(%conn_id, "forward_events: stopped");
}

async fn write_messages(conn_id: Uuid, mut write_half: OwnedWriteHalf, mut out_rx: mpsc::Receiver<ServerMessage>) {
    while let Some(msg) = out_rx.recv().await {
        let json = match serde_json::to_string(&msg) {
            Ok(json) => json,
            Err(e) => {
                warn!(%conn_id, error = %e, "Failed to serialize message");
                continue;
            }
        };
        let written = async {
            write_half.write_all(json.as_bytes()).await?;
            write_half.write_all(b"\n").await?;
            write_half.flush().await
        };
        if let Err(e) = written.await {
            debug!(%conn_id, error = %e, "write_messages: client closed");
            break;
        }
    }
    let _ = write_half.shutdown().await;
}
