//! Chat server
//!
//! Owns the shared registries and hands them to every session it starts.
//! There is no ambient global state: everything a session can reach goes
//! through the [`ServerContext`] it was given.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::ServerConfig;
use crate::error::ChatError;
use crate::handler::handle_connection;
use crate::room::RoomRegistry;
use crate::session::Session;
use crate::types::SessionIdAllocator;
use crate::username::UsernameRegistry;

/// State shared by every session of one server
#[derive(Debug)]
pub struct ServerContext {
    pub config: ServerConfig,
    pub usernames: UsernameRegistry,
    pub rooms: RoomRegistry,
}

impl ServerContext {
    /// Build empty registries; the default room exists from the start
    pub fn new(config: ServerConfig) -> Self {
        let rooms = RoomRegistry::with_rooms(config.send_timeout(), [config.default_room.clone()]);
        Self {
            usernames: UsernameRegistry::new(),
            rooms,
            config,
        }
    }
}

/// The chat server
pub struct Server {
    ctx: Arc<ServerContext>,
    ids: SessionIdAllocator,
    /// Parent of every session's stop token
    shutdown: CancellationToken,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            ctx: Arc::new(ServerContext::new(config)),
            ids: SessionIdAllocator::new(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn context(&self) -> &Arc<ServerContext> {
        &self.ctx
    }

    /// Start a session on `stream`
    ///
    /// Only the username registration happens here; greeting, the default
    /// room join and all I/O run on the spawned connection task, whose
    /// handle is returned. If the session cannot be opened the stream is
    /// dropped (closing it) and the error is returned.
    pub async fn connect<S>(&self, stream: S) -> Result<JoinHandle<()>, ChatError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let id = self.ids.next_id();
        let (session, outbound) = match Session::open(Arc::clone(&self.ctx), id).await {
            Ok(opened) => opened,
            Err(e) => {
                error!("Failed to open session {}: {}", id, e);
                return Err(e);
            }
        };
        info!("Session {} connected as {}", id, session.username());

        let stop = self.shutdown.child_token();
        let max_line_length = self.ctx.config.max_line_length;
        Ok(tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, session, outbound, stop, max_line_length).await {
                error!("Connection handler error for session {}: {}", id, e);
            }
        }))
    }

    /// Accept connections until [`Server::shutdown`] is called
    pub async fn run(&self, listener: TcpListener) -> Result<(), ChatError> {
        info!("Chat server listening on {}", listener.local_addr()?);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("Chat server shutting down");
                    return Ok(());
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        info!("New connection from {}", addr);
                        if let Err(e) = self.connect(stream).await {
                            debug!("Dropped connection from {}: {}", addr, e);
                        }
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                    }
                },
            }
        }
    }

    /// Stop accepting and close every session
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use tokio::io::DuplexStream;
    use tokio::net::TcpStream;
    use tokio_util::codec::{Framed, LinesCodec};

    use super::*;
    use crate::types::SessionId;

    type Peer<S> = Framed<S, LinesCodec>;

    fn server() -> Server {
        Server::new(ServerConfig {
            send_timeout_ms: 50,
            ..ServerConfig::default()
        })
    }

    async fn connect(server: &Server) -> (Peer<DuplexStream>, JoinHandle<()>) {
        let (client, server_side) = tokio::io::duplex(4096);
        let task = server.connect(server_side).await.unwrap();
        (Framed::new(client, LinesCodec::new()), task)
    }

    async fn recv_line<S>(peer: &mut Peer<S>) -> String
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        tokio::time::timeout(Duration::from_secs(2), peer.next())
            .await
            .expect("timed out waiting for a line")
            .expect("stream ended")
            .unwrap()
    }

    /// Read lines until one ends with `suffix`
    async fn recv_until<S>(peer: &mut Peer<S>, suffix: &str) -> String
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        loop {
            let line = recv_line(peer).await;
            if line.ends_with(suffix) {
                return line;
            }
        }
    }

    async fn finish(task: JoinHandle<()>) {
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("session did not finish")
            .unwrap();
    }

    #[tokio::test]
    async fn test_taken_default_name_closes_stream() {
        let server = server();
        server
            .context()
            .usernames
            .add(SessionId(99), "Anonymous1")
            .await
            .unwrap();

        let (client, server_side) = tokio::io::duplex(4096);
        let err = server.connect(server_side).await.unwrap_err();
        assert!(matches!(err, ChatError::DuplicateUsername(name) if name == "Anonymous1"));

        let mut peer = Framed::new(client, LinesCodec::new());
        let next = tokio::time::timeout(Duration::from_secs(2), peer.next())
            .await
            .unwrap();
        assert!(next.is_none());
        assert!(!server
            .context()
            .rooms
            .get("lobby")
            .await
            .unwrap()
            .contains(SessionId(1))
            .await);
    }

    #[tokio::test]
    async fn test_connect_does_not_wait_on_stalled_members() {
        let server = Server::new(ServerConfig {
            send_timeout_ms: 5000,
            ..ServerConfig::default()
        });
        // a lobby member whose queue never drains
        let (tx, _rx) = tokio::sync::mpsc::channel(1);
        let stalled = crate::client::Client::new(SessionId(99), tx);
        stalled.send("backlog".to_string()).await.unwrap();
        server
            .context()
            .rooms
            .get("lobby")
            .await
            .unwrap()
            .join(stalled)
            .await;

        let (_client, server_side) = tokio::io::duplex(4096);
        let task = tokio::time::timeout(Duration::from_millis(500), server.connect(server_side))
            .await
            .expect("connect blocked on a stalled lobby member")
            .unwrap();

        server.shutdown();
        task.abort();
    }

    #[tokio::test]
    async fn test_default_room_exists_at_start() {
        let server = server();
        assert_eq!(server.context().rooms.list_all().await, vec!["lobby"]);
    }

    #[tokio::test]
    async fn test_sessions_get_sequential_names() {
        let server = server();
        let (mut first, _t1) = connect(&server).await;
        let (mut second, _t2) = connect(&server).await;

        recv_until(&mut first, "Your username is currently: Anonymous1").await;
        recv_until(&mut second, "Your username is currently: Anonymous2").await;
        assert_eq!(
            server.context().usernames.id_of("Anonymous2").await,
            Some(SessionId(2))
        );
    }

    #[tokio::test]
    async fn test_say_reaches_room_members_only() {
        let server = server();
        let (mut alice, _ta) = connect(&server).await;
        let (mut bob, _tb) = connect(&server).await;
        recv_until(&mut alice, "Anonymous2 has joined the room").await;
        recv_until(&mut bob, "Anonymous2 has joined the room").await;

        alice.send("/join general").await.unwrap();
        recv_until(&mut alice, "general server: Anonymous1 has joined the room").await;
        alice.send("/say general hello there").await.unwrap();
        let line = recv_line(&mut alice).await;
        assert!(line.ends_with(" general Anonymous1: hello there"));

        // bob only ever sees lobby traffic
        bob.send("/rooms").await.unwrap();
        assert_eq!(recv_line(&mut bob).await, "Here is a list of the current rooms:");
        assert_eq!(recv_line(&mut bob).await, "general");
        assert_eq!(recv_line(&mut bob).await, "lobby");
        assert_eq!(recv_line(&mut bob).await, "");
    }

    #[tokio::test]
    async fn test_closed_session_frees_its_name() {
        let server = server();
        let (mut alice, alice_task) = connect(&server).await;
        alice.send("/user alice").await.unwrap();
        recv_until(&mut alice, "Anonymous1 is now known as alice").await;

        alice.send("/quit").await.unwrap();
        finish(alice_task).await;
        assert!(server.context().usernames.id_of("alice").await.is_none());

        let (mut next, _t) = connect(&server).await;
        next.send("/user alice").await.unwrap();
        recv_until(&mut next, "Anonymous2 is now known as alice").await;
        assert_eq!(
            server.context().usernames.id_of("alice").await,
            Some(SessionId(2))
        );
    }

    #[tokio::test]
    async fn test_shutdown_closes_sessions() {
        let server = server();
        let (mut alice, alice_task) = connect(&server).await;
        let (mut bob, bob_task) = connect(&server).await;
        recv_until(&mut alice, "Anonymous2 has joined the room").await;
        recv_until(&mut bob, "Anonymous2 has joined the room").await;

        server.shutdown();
        finish(alice_task).await;
        finish(bob_task).await;

        let ctx = server.context();
        assert!(ctx.usernames.is_empty().await);
        assert_eq!(ctx.rooms.get("lobby").await.unwrap().member_count().await, 0);
    }

    #[tokio::test]
    async fn test_run_accepts_tcp_clients() {
        let server = Arc::new(server());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accept_loop = tokio::spawn({
            let server = Arc::clone(&server);
            async move { server.run(listener).await }
        });

        let stream = TcpStream::connect(addr).await.unwrap();
        let mut peer = Framed::new(stream, LinesCodec::new());
        assert_eq!(recv_line(&mut peer).await, "Welcome to the chat server!");
        recv_until(&mut peer, "lobby server: Anonymous1 has joined the room").await;

        peer.send("/help").await.unwrap();
        assert_eq!(recv_line(&mut peer).await, "Commands:");

        server.shutdown();
        tokio::time::timeout(Duration::from_secs(2), accept_loop)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}
