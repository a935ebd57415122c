//! Room and room registry definitions
//!
//! A room is a named broadcast group. Rooms are created lazily on first
//! reference and live for as long as the server does.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::client::Client;
use crate::error::DeliveryError;
use crate::message;
use crate::types::SessionId;

/// Outcome of one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Members whose queue accepted the line
    pub delivered: usize,
    /// Members skipped because their queue stayed full or was closed
    pub dropped: usize,
}

/// Multi-member chat room
///
/// Membership is guarded by a `RwLock`: joins and leaves take the write
/// lock, broadcasts take the read lock just long enough to copy the
/// current member handles.
#[derive(Debug)]
pub struct Room {
    /// Room name, unique in the registry
    name: String,
    /// Current members: SessionId -> Client
    members: RwLock<HashMap<SessionId, Client>>,
    /// How long one member's queue may stay full before we drop
    send_timeout: Duration,
}

impl Room {
    /// Create an empty room
    pub fn new(name: impl Into<String>, send_timeout: Duration) -> Self {
        Self {
            name: name.into(),
            members: RwLock::new(HashMap::new()),
            send_timeout,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a member; joining twice is a no-op
    pub async fn join(&self, client: Client) {
        let id = client.id;
        self.members.write().await.insert(id, client);
        debug!("Session {} joined room {}", id, self.name);
    }

    /// Remove a member; leaving twice is a no-op
    pub async fn leave(&self, id: SessionId) {
        if self.members.write().await.remove(&id).is_some() {
            debug!("Session {} left room {}", id, self.name);
        }
    }

    pub async fn contains(&self, id: SessionId) -> bool {
        self.members.read().await.contains_key(&id)
    }

    pub async fn member_count(&self) -> usize {
        self.members.read().await.len()
    }

    /// Send `text` from `sender` to every current member
    ///
    /// The line is formatted once, then offered to each member's queue with
    /// the room's send timeout. A member whose queue stays full (or is
    /// closed) misses this line; the sender is never told.
    pub async fn broadcast(&self, text: &str, sender: &str) -> BroadcastReport {
        let line = message::room_line(Local::now(), &self.name, sender, text);
        debug!("{} {}: {}", self.name, sender, text);

        // Snapshot so no lock is held while waiting on a slow queue
        let recipients: Vec<Client> = self.members.read().await.values().cloned().collect();

        let mut report = BroadcastReport::default();
        for client in recipients {
            match client.deliver(line.clone(), self.send_timeout).await {
                Ok(()) => report.delivered += 1,
                Err(DeliveryError::Timeout) => {
                    warn!(
                        "Timeout sending to session {} in room {}, message dropped",
                        client.id, self.name
                    );
                    report.dropped += 1;
                }
                // Session is closing; its queue is already gone
                Err(DeliveryError::Closed) => {
                    debug!("Session {} in room {} is closed", client.id, self.name);
                    report.dropped += 1;
                }
            }
        }
        report
    }
}

/// All rooms by name
///
/// Rooms are never removed, so a handle obtained here stays valid.
#[derive(Debug)]
pub struct RoomRegistry {
    rooms: RwLock<HashMap<String, Arc<Room>>>,
    send_timeout: Duration,
}

impl RoomRegistry {
    /// Create an empty registry; new rooms get `send_timeout`
    pub fn new(send_timeout: Duration) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            send_timeout,
        }
    }

    /// Create a registry that already holds the given (empty) rooms
    pub fn with_rooms<I, S>(send_timeout: Duration, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let rooms = names
            .into_iter()
            .map(|name| {
                let name: String = name.into();
                let room = Arc::new(Room::new(name.clone(), send_timeout));
                (name, room)
            })
            .collect();
        Self {
            rooms: RwLock::new(rooms),
            send_timeout,
        }
    }

    /// Return the named room, creating it if needed
    ///
    /// Concurrent callers for the same name always get the same room.
    pub async fn get_or_create(&self, name: &str) -> Arc<Room> {
        if let Some(room) = self.rooms.read().await.get(name) {
            return Arc::clone(room);
        }

        let mut rooms = self.rooms.write().await;
        let room = rooms.entry(name.to_string()).or_insert_with(|| {
            debug!("Room {} created", name);
            Arc::new(Room::new(name, self.send_timeout))
        });
        Arc::clone(room)
    }

    /// Look up a room without creating it
    pub async fn get(&self, name: &str) -> Option<Arc<Room>> {
        self.rooms.read().await.get(name).cloned()
    }

    /// All room names, sorted
    pub async fn list_all(&self) -> Vec<String> {
        let mut names: Vec<String> = self.rooms.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn len(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
