//! Client handle definition
//!
//! The cheap, cloneable handle a room keeps for each member: the session
//! id plus the sending side of that session's outbound queue.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;

use crate::error::DeliveryError;
use crate::types::SessionId;

/// Outbound handle of a connected client
#[derive(Debug, Clone)]
pub struct Client {
    /// Session this handle belongs to
    pub id: SessionId,
    /// Room/server -> client line queue
    sender: mpsc::Sender<String>,
}

impl Client {
    /// Create a new handle with the given ID and sender channel
    pub fn new(id: SessionId, sender: mpsc::Sender<String>) -> Self {
        Self { id, sender }
    }

    /// Enqueue a line, waiting at most `timeout` for queue space
    pub async fn deliver(&self, line: String, timeout: Duration) -> Result<(), DeliveryError> {
        self.sender
            .send_timeout(line, timeout)
            .await
            .map_err(|e| match e {
                SendTimeoutError::Timeout(_) => DeliveryError::Timeout,
                SendTimeoutError::Closed(_) => DeliveryError::Closed,
            })
    }

    /// Enqueue a line, waiting as long as needed for queue space
    ///
    /// Only used for a session's replies to itself, where waiting on our
    /// own write loop is fine.
    pub async fn send(&self, line: String) -> Result<(), DeliveryError> {
        self.sender
            .send(line)
            .await
            .map_err(|_| DeliveryError::Closed)
    }
}
