use std::net::SocketAddr;

use bytes::Bytes;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::debug;

use crate::endpoint::session::{run_session, SessionEnd};
use crate::endpoint::{next_endpoint_id, LinkEvent};
use crate::service::{AcceptOptions, Shutdown};

/// Server-side endpoint created per inbound connection.
///
/// Identical surface to a client endpoint, but with no target address:
/// when the socket is lost the endpoint closes instead of reconnecting.
pub(crate) struct AcceptedEndpoint {
    id: u64,
    peer: SocketAddr,
    stream: TcpStream,
    opts: AcceptOptions,
    inbound: async_channel::Sender<LinkEvent>,
    outbound: async_channel::Receiver<Bytes>,
    shutdown: Shutdown,
    _shutdown_complete: mpsc::Sender<()>,
}

impl AcceptedEndpoint {
    pub(crate) fn new(
        stream: TcpStream,
        peer: SocketAddr,
        opts: AcceptOptions,
        inbound: async_channel::Sender<LinkEvent>,
        outbound: async_channel::Receiver<Bytes>,
        shutdown: Shutdown,
        shutdown_complete: mpsc::Sender<()>,
    ) -> Self {
        Self {
            id: next_endpoint_id(),
            peer,
            stream,
            opts,
            inbound,
            outbound,
            shutdown,
            _shutdown_complete: shutdown_complete,
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) async fn run(mut self) {
        debug!(endpoint = self.id, peer = %self.peer, "accepted endpoint started");
        let _ = self.inbound.send(LinkEvent::Connected).await;
        let mut pending = None;
        let end = run_session(
            self.id,
            self.stream,
            &self.inbound,
            &self.outbound,
            &mut pending,
            self.opts.heartbeat_period(),
            self.opts.heartbeat_timeout(),
            self.opts.max_frame_size(),
            &mut self.shutdown,
        )
        .await;
        match end {
            SessionEnd::Drained => debug!(endpoint = self.id, "outbound queue closed"),
            SessionEnd::Lost => debug!(endpoint = self.id, "socket lost"),
            SessionEnd::Shutdown => debug!(endpoint = self.id, "reactor shutdown"),
        }
        let _ = self.inbound.send(LinkEvent::Closed).await;
        self.inbound.close();
        self.outbound.close();
        debug!(endpoint = self.id, peer = %self.peer, "accepted endpoint closed");
    }
}
