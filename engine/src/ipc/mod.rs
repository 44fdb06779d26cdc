//! Unix domain socket surface of the engine
//!
//! Newline-delimited JSON in both directions. A launcher UI connects once,
//! issues requests, and receives every push event on the same stream.

use std::path::PathBuf;

pub mod client;
pub mod frame;
pub mod handler;
pub mod listener;
pub mod messages;

pub use client::{EngineClient, EngineConnection};
pub use handler::handle_request;
pub use listener::{cleanup_socket, create_listener_at, handle_connection, serve};
pub use messages::{ClientMessage, MAX_MESSAGE_SIZE, Method, Request, Response, ServerMessage};

/// Default socket path when config does not set one
pub fn get_socket_path() -> PathBuf {
    dirs::runtime_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("lancea")
        .join("engine.sock")
}
