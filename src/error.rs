//! Error types for the chat server
//!
//! Defines session-level errors, per-recipient delivery errors and
//! configuration errors. Uses thiserror for ergonomic error definitions.
//!
//! The `Display` text of a [`ChatError`] is exactly what the issuing
//! client sees when a command fails.

use thiserror::Error;
use tokio_util::codec::LinesCodecError;

use crate::types::SessionId;

/// Session-level errors
///
/// State and usage errors are rendered inline to the issuing client by
/// the command dispatcher. `Io` and `Lines` only come out of the read
/// loop and end the session.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Name already belongs to another session
    #[error("username already exists")]
    DuplicateUsername(String),

    /// Session already holds a name
    #[error("connection {0} already has a username")]
    IdentityAlreadyRegistered(SessionId),

    /// Session holds no name
    #[error("connection {0} does not have a username")]
    NotRegistered(SessionId),

    /// Session is not a member of the room
    #[error("you are not currently in room '{0}'")]
    NotInRoom(String),

    /// Membership points at a room the registry does not know
    #[error("you were in room '{0}' that does not exist")]
    RoomVanished(String),

    /// Attempt to take the name used for system announcements
    #[error("Username cannot be 'server'")]
    ReservedUsername,

    /// Wrong number of command arguments
    #[error("Usage is {0}")]
    Usage(&'static str),

    /// IO error (fatal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Line framing error (fatal)
    #[error("line error: {0}")]
    Lines(#[from] LinesCodecError),
}

/// Result of one enqueue attempt onto a recipient's outbound queue
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    /// Queue stayed full for the whole send timeout
    #[error("outbound queue full")]
    Timeout,

    /// The receiving end of the queue has been closed
    #[error("outbound queue closed")]
    Closed,
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(&'static str),
}
