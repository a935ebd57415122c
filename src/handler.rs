//! Connection handler
//!
//! Drives one session over a byte stream: splits it into a line reader and
//! a line writer, runs the read loop on the current task and the write loop
//! on a spawned one, and tears everything down in order when either side
//! stops.

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::ChatError;
use crate::session::{Flow, Session};
use crate::types::SessionId;

type LineReader<S> = FramedRead<ReadHalf<S>, LinesCodec>;
type LineWriter<S> = FramedWrite<WriteHalf<S>, LinesCodec>;

/// Run a session until it quits, its stream fails, or `stop` fires
///
/// `outbound` is the receiving side of the session's queue, as returned by
/// [`Session::open`]. The session is started (greeting, default room) once
/// the write loop is running. Teardown always runs: the write loop is
/// stopped and joined first, then the session leaves its rooms, releases
/// its name and the stream is shut down. A read error is returned, not
/// logged.
pub async fn handle_connection<S>(
    stream: S,
    mut session: Session,
    outbound: mpsc::Receiver<String>,
    stop: CancellationToken,
    max_line_length: usize,
) -> Result<(), ChatError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let id = session.id();
    let (read_half, write_half) = tokio::io::split(stream);
    let mut reader = FramedRead::new(read_half, LinesCodec::new_with_max_length(max_line_length));
    let writer = FramedWrite::new(write_half, LinesCodec::new());

    // Spawn write task (outbound queue -> stream)
    let write_task = tokio::spawn(write_loop(id, writer, outbound, stop.clone()));

    session.start().await;
    let result = read_loop(&mut session, &mut reader, &stop).await;

    // Stop the writer and wait for it before touching shared state
    stop.cancel();
    let writer = write_task.await;

    let errors = session
        .close(async move {
            match writer {
                Ok(mut writer) => SinkExt::<String>::close(&mut writer).await.map_err(ChatError::from),
                Err(e) => {
                    warn!("Write task for session {} did not finish cleanly: {}", id, e);
                    Ok(())
                }
            }
        })
        .await;
    for e in &errors {
        warn!("Error closing session {}: {}", id, e);
    }

    info!("Session {} closed", id);
    result
}

/// Stream -> session; returns on quit, EOF, read error or stop
async fn read_loop<S>(
    session: &mut Session,
    reader: &mut LineReader<S>,
    stop: &CancellationToken,
) -> Result<(), ChatError>
where
    S: AsyncRead,
{
    loop {
        let next = tokio::select! {
            _ = stop.cancelled() => {
                debug!("Session {} asked to close", session.id());
                return Ok(());
            }
            next = reader.next() => next,
        };

        match next {
            Some(Ok(line)) => {
                if session.handle_line(&line).await == Flow::Terminate {
                    return Ok(());
                }
            }
            Some(Err(e)) => return Err(e.into()),
            None => {
                debug!("Session {} reached end of stream", session.id());
                return Ok(());
            }
        }
    }
}

/// Outbound queue -> stream; hands the writer back for shutdown
async fn write_loop<S>(
    id: SessionId,
    mut writer: LineWriter<S>,
    mut outbound: mpsc::Receiver<String>,
    stop: CancellationToken,
) -> LineWriter<S>
where
    S: AsyncWrite,
{
    loop {
        tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            msg = outbound.recv() => {
                let Some(line) = msg else { break };
                if let Err(e) = writer.send(line).await {
                    error!("Error writing to session {}: {}", id, e);
                    // Wake the read loop so the session tears down
                    stop.cancel();
                    break;
                }
            }
        }
    }
    debug!("Write task ended for session {}", id);
    writer
}
