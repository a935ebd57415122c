//! Multi-room Line Chat Server Library
//!
//! A line-oriented chat server built on tokio. Clients connect over any
//! byte stream, get a unique display name, join and leave named rooms,
//! and broadcast text lines to every member of a room.
//!
//! # Features
//! - Unique usernames with `/user` renames
//! - Lazily created rooms (`/join`, `/leave`, `/rooms`, `/list`)
//! - Chat to every joined room, or to one room with `/say`
//! - Best-effort fan-out: a slow client misses lines instead of
//!   stalling the sender
//!
//! # Architecture
//! Shared state lives in two registries guarded by `RwLock`s:
//! - `UsernameRegistry` keeps names unique
//! - `RoomRegistry` owns every `Room`, each with its own member lock
//!
//! Each connection runs a read loop and a write loop joined by a
//! `CancellationToken`. Rooms push formatted lines onto a member's bounded
//! queue with a timeout; the write loop drains that queue to the socket.
//!
//! # Example
//! ```ignore
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//! use room_chat::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ServerConfig::default();
//!     let listener = TcpListener::bind(&config.bind_addr).await.unwrap();
//!     let server = Arc::new(Server::new(config));
//!     server.run(listener).await.unwrap();
//! }
//! ```

pub mod client;
pub mod command;
pub mod config;
pub mod error;
pub mod handler;
pub mod message;
pub mod room;
pub mod server;
pub mod session;
pub mod types;
pub mod username;

// Re-export main types for convenience
pub use client::Client;
pub use command::Command;
pub use config::ServerConfig;
pub use error::{ChatError, ConfigError, DeliveryError};
pub use handler::handle_connection;
pub use room::{BroadcastReport, Room, RoomRegistry};
pub use server::{Server, ServerContext};
pub use session::{Flow, Session};
pub use types::{SessionId, SessionState};
pub use username::UsernameRegistry;
