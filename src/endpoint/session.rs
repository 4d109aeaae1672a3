use std::time::Duration;

use bytes::Bytes;
use tokio::net::TcpStream;
use tokio::time;
use tracing::{debug, warn};

use crate::endpoint::LinkEvent;
use crate::network::{Connection, FrameWriter};
use crate::service::{AppError, Shutdown};

/// Why a connected session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionEnd {
    /// The outbound queue was closed by the user and fully drained.
    Drained,
    /// The reactor is shutting down.
    Shutdown,
    /// The socket was lost: I/O error, remote close, stall or protocol
    /// error. Clients reconnect after this; accepted endpoints close.
    Lost,
}

/// Drives one connected session until the socket is lost, the outbound
/// queue drains shut, or the reactor shuts down.
///
/// The read loop and the write loop run concurrently; neither cancels the
/// other mid-operation. `pending` holds the single in-flight outbound
/// frame and is cleared only after a successful write and flush, so a
/// frame interrupted by a disconnect is retransmitted from its start on
/// the next session.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn run_session(
    id: u64,
    stream: TcpStream,
    inbound: &async_channel::Sender<LinkEvent>,
    outbound: &async_channel::Receiver<Bytes>,
    pending: &mut Option<Bytes>,
    heartbeat_period: Duration,
    heartbeat_timeout: Duration,
    max_frame_size: usize,
    shutdown: &mut Shutdown,
) -> SessionEnd {
    let (reader, writer) = stream.into_split();
    let mut connection = Connection::new(reader, max_frame_size, heartbeat_timeout);
    let mut writer = FrameWriter::new(writer);

    tokio::select! {
        end = read_loop(id, &mut connection, inbound) => end,
        end = write_loop(id, &mut writer, outbound, pending, heartbeat_period) => end,
        _ = shutdown.recv() => SessionEnd::Shutdown,
    }
}

async fn read_loop(
    id: u64,
    connection: &mut Connection,
    inbound: &async_channel::Sender<LinkEvent>,
) -> SessionEnd {
    loop {
        match connection.read_frame().await {
            Ok(Some(payload)) => {
                if inbound.send(LinkEvent::Payload(payload)).await.is_err() {
                    // the user dropped the inbound queue; keep the socket
                    // alive and discard further payloads
                    debug!(endpoint = id, "inbound queue gone, payload discarded");
                }
            }
            Ok(None) => {
                debug!(endpoint = id, "peer closed the connection");
                return SessionEnd::Lost;
            }
            Err(AppError::Stalled(_)) => {
                warn!(endpoint = id, "no bytes read within the heartbeat window, socket is stuck");
                return SessionEnd::Lost;
            }
            Err(e) => {
                warn!(endpoint = id, error = %e, "read failed");
                return SessionEnd::Lost;
            }
        }
    }
}

async fn write_loop(
    id: u64,
    writer: &mut FrameWriter,
    outbound: &async_channel::Receiver<Bytes>,
    pending: &mut Option<Bytes>,
    heartbeat_period: Duration,
) -> SessionEnd {
    loop {
        if pending.is_none() {
            match time::timeout(heartbeat_period, outbound.recv()).await {
                Ok(Ok(payload)) => {
                    if payload.is_empty() {
                        // zero length on the wire is the heartbeat encoding
                        warn!(endpoint = id, "empty outbound payload dropped");
                        continue;
                    }
                    if payload.len() > i32::MAX as usize {
                        warn!(
                            endpoint = id,
                            len = payload.len(),
                            "outbound payload exceeds the wire length field, dropped"
                        );
                        continue;
                    }
                    *pending = Some(payload);
                }
                Ok(Err(_)) => {
                    debug!(endpoint = id, "outbound queue closed and drained");
                    return SessionEnd::Drained;
                }
                Err(_elapsed) => {
                    if let Err(e) = writer.write_heartbeat().await {
                        warn!(endpoint = id, error = %e, "heartbeat write failed");
                        return SessionEnd::Lost;
                    }
                    continue;
                }
            }
        }
        if let Some(frame) = pending.as_ref() {
            if let Err(e) = writer.write_frame(frame).await {
                // `pending` keeps the frame for retransmission
                warn!(endpoint = id, error = %e, "write failed");
                return SessionEnd::Lost;
            }
        }
        *pending = None;
    }
}
