//! Per-connection session state
//!
//! A `Session` owns one client's identity, the set of rooms it is in and
//! the sending side of its outbound queue. It is driven by exactly one
//! task (see [`crate::handler`]), so its own fields need no locking; only
//! the registries and rooms it talks to are shared.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::client::Client;
use crate::command::Command;
use crate::error::ChatError;
use crate::message;
use crate::server::ServerContext;
use crate::types::{SessionId, SessionState, SERVER_NAME};

/// What the read loop should do after a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Terminate,
}

/// Server-side state of one connected client
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    username: String,
    /// Rooms this session is in; mirrors `Room::members`
    memberships: BTreeSet<String>,
    /// Handle onto our own outbound queue, also handed to rooms
    outbound: Client,
    ctx: Arc<ServerContext>,
    state: SessionState,
}

impl Session {
    /// Register the default username and create the outbound queue
    ///
    /// Returns the session together with the receiving side of its
    /// outbound queue, which the write loop drains. Nothing is sent until
    /// [`Session::start`].
    pub async fn open(
        ctx: Arc<ServerContext>,
        id: SessionId,
    ) -> Result<(Self, mpsc::Receiver<String>), ChatError> {
        let username = id.default_username();
        ctx.usernames.add(id, &username).await?;

        let (tx, rx) = mpsc::channel(ctx.config.outbound_capacity);
        let session = Self {
            id,
            username,
            memberships: BTreeSet::new(),
            outbound: Client::new(id, tx),
            ctx,
            state: SessionState::Active,
        };
        Ok((session, rx))
    }

    /// Greet the client and join the default room
    ///
    /// Call once the write loop is draining the outbound queue, otherwise
    /// a small queue can stall our own join notice.
    pub async fn start(&mut self) {
        self.reply(message::welcome(&self.username)).await;
        let default_room = self.ctx.config.default_room.clone();
        self.join_room(&default_room).await;
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn in_room(&self, room: &str) -> bool {
        self.memberships.contains(room)
    }

    /// Rooms this session is in, sorted
    pub fn memberships(&self) -> Vec<String> {
        self.memberships.iter().cloned().collect()
    }

    /// Join (creating if needed) a room and announce it there
    pub async fn join_room(&mut self, name: &str) {
        let room = self.ctx.rooms.get_or_create(name).await;
        room.join(self.outbound.clone()).await;
        self.memberships.insert(name.to_string());
        room.broadcast(&message::joined(&self.username), SERVER_NAME)
            .await;
    }

    /// Announce departure to a room, then leave it
    pub async fn leave_room(&mut self, name: &str) -> Result<(), ChatError> {
        if !self.memberships.remove(name) {
            return Err(ChatError::NotInRoom(name.to_string()));
        }
        let Some(room) = self.ctx.rooms.get(name).await else {
            return Err(ChatError::RoomVanished(name.to_string()));
        };
        room.broadcast(&message::left(&self.username), SERVER_NAME)
            .await;
        room.leave(self.id).await;
        Ok(())
    }

    /// Send `text` to one room we are in
    pub async fn say(&self, room: &str, text: &str) -> Result<(), ChatError> {
        if !self.in_room(room) {
            return Err(ChatError::NotInRoom(room.to_string()));
        }
        let Some(target) = self.ctx.rooms.get(room).await else {
            return Err(ChatError::RoomVanished(room.to_string()));
        };
        target.broadcast(text, &self.username).await;
        Ok(())
    }

    /// Send `text` under our own name to every room we are in
    pub async fn announce_to_all_rooms(&self, text: &str) {
        self.broadcast_to_all_rooms(text, &self.username).await;
    }

    async fn broadcast_to_all_rooms(&self, text: &str, sender: &str) {
        for name in &self.memberships {
            match self.ctx.rooms.get(name).await {
                Some(room) => {
                    room.broadcast(text, sender).await;
                }
                None => debug!("Session {} is in unknown room {}", self.id, name),
            }
        }
    }

    /// Change username; announced to every joined room as `server`
    pub async fn rename(&mut self, new_name: &str) -> Result<(), ChatError> {
        if new_name == SERVER_NAME {
            return Err(ChatError::ReservedUsername);
        }
        self.ctx.usernames.rename(self.id, new_name).await?;
        if new_name == self.username {
            return Ok(());
        }

        let old_name = std::mem::replace(&mut self.username, new_name.to_string());
        info!("Session {} renamed '{}' -> '{}'", self.id, old_name, new_name);
        self.broadcast_to_all_rooms(&message::renamed(&old_name, new_name), SERVER_NAME)
            .await;
        Ok(())
    }

    /// Handle one inbound line: ignore, dispatch a command, or chat
    pub async fn handle_line(&mut self, line: &str) -> Flow {
        if line.is_empty() {
            return Flow::Continue;
        }
        if line.starts_with('/') {
            return self.handle_command(line).await;
        }
        self.announce_to_all_rooms(line).await;
        Flow::Continue
    }

    /// Run a `/` command; failures are shown to this client only
    pub async fn handle_command(&mut self, line: &str) -> Flow {
        match self.dispatch(line).await {
            Ok(flow) => flow,
            Err(e) => {
                self.reply(e.to_string()).await;
                Flow::Continue
            }
        }
    }

    async fn dispatch(&mut self, line: &str) -> Result<Flow, ChatError> {
        match Command::parse(line)? {
            Command::Help => self.reply(message::HELP_TEXT.to_string()).await,
            Command::Quit => {
                info!("{} has disconnected", self.username);
                return Ok(Flow::Terminate);
            }
            Command::User(name) => self.rename(name).await?,
            Command::Join(room) => self.join_room(room).await,
            Command::Leave(room) => self.leave_room(room).await?,
            Command::Rooms => {
                let rooms = self.ctx.rooms.list_all().await;
                self.reply(message::listing(message::ROOMS_HEADER, rooms))
                    .await;
            }
            Command::List => {
                let text = message::listing(message::MEMBERSHIPS_HEADER, &self.memberships);
                self.reply(text).await;
            }
            Command::Say { room, message } => self.say(room, message).await?,
            Command::Unknown(token) => self.reply(message::unknown_command(token)).await,
        }
        Ok(Flow::Continue)
    }

    /// Queue text for this client only
    async fn reply(&self, text: String) {
        if self.outbound.send(text).await.is_err() {
            debug!("Session {} reply dropped, write loop gone", self.id);
        }
    }

    /// Tear the session down: leave every room, release the username,
    /// then run `close_stream`
    ///
    /// Every step runs even if an earlier one fails; the failures are
    /// returned for the caller to log. The write loop must already be
    /// stopped.
    pub async fn close<F>(&mut self, close_stream: F) -> Vec<ChatError>
    where
        F: Future<Output = Result<(), ChatError>>,
    {
        self.state = SessionState::Closing;
        let mut errors = Vec::new();

        for name in self.memberships() {
            if let Err(e) = self.leave_room(&name).await {
                errors.push(e);
            }
        }
        if let Err(e) = self.ctx.usernames.remove(self.id).await {
            errors.push(e);
        }
        if let Err(e) = close_stream.await {
            errors.push(e);
        }

        self.state = SessionState::Closed;
        errors
    }
}
