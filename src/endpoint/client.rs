use bytes::Bytes;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time;
use tracing::debug;

use crate::endpoint::session::{run_session, SessionEnd};
use crate::endpoint::{next_endpoint_id, LinkEvent};
use crate::service::{LinkOptions, Shutdown};

/// Client endpoint driver: connect, run a session, reconnect on loss.
pub(crate) struct ClientEndpoint {
    id: u64,
    target: String,
    opts: LinkOptions,
    inbound: async_channel::Sender<LinkEvent>,
    outbound: async_channel::Receiver<Bytes>,
    /// In-flight outbound frame carried across sessions for retransmission.
    pending: Option<Bytes>,
    shutdown: Shutdown,
    _shutdown_complete: mpsc::Sender<()>,
}

impl ClientEndpoint {
    pub(crate) fn new(
        target: String,
        opts: LinkOptions,
        inbound: async_channel::Sender<LinkEvent>,
        outbound: async_channel::Receiver<Bytes>,
        shutdown: Shutdown,
        shutdown_complete: mpsc::Sender<()>,
    ) -> Self {
        Self {
            id: next_endpoint_id(),
            target,
            opts,
            inbound,
            outbound,
            pending: None,
            shutdown,
            _shutdown_complete: shutdown_complete,
        }
    }

    pub(crate) async fn run(mut self) {
        debug!(endpoint = self.id, target = %self.target, "client endpoint started");
        self.drive().await;
        let _ = self.inbound.send(LinkEvent::Closed).await;
        self.inbound.close();
        self.outbound.close();
        debug!(endpoint = self.id, "client endpoint closed");
    }

    async fn drive(&mut self) {
        loop {
            // connecting
            let connect = tokio::select! {
                res = TcpStream::connect(self.target.as_str()) => res,
                _ = self.shutdown.recv() => return,
            };
            match connect {
                Ok(stream) => {
                    debug!(endpoint = self.id, target = %self.target, "connected");
                    let _ = self.inbound.send(LinkEvent::Connected).await;
                    let end = run_session(
                        self.id,
                        stream,
                        &self.inbound,
                        &self.outbound,
                        &mut self.pending,
                        self.opts.heartbeat_period(),
                        self.opts.heartbeat_timeout(),
                        self.opts.max_frame_size(),
                        &mut self.shutdown,
                    )
                    .await;
                    match end {
                        SessionEnd::Shutdown | SessionEnd::Drained => return,
                        SessionEnd::Lost => {
                            let _ = self.inbound.send(LinkEvent::Disconnected).await;
                        }
                    }
                }
                Err(e) => {
                    debug!(endpoint = self.id, target = %self.target, error = %e, "connect failed");
                    let _ = self.inbound.send(LinkEvent::Disconnected).await;
                }
            }

            // disconnected: wait out the reconnect period
            tokio::select! {
                _ = time::sleep(self.opts.reconnect_period()) => {}
                _ = self.shutdown.recv() => return,
            }

            // the user closed the outbound queue while we had nothing left
            // to deliver; there is no point reconnecting
            if self.outbound.is_closed() && self.outbound.is_empty() && self.pending.is_none() {
                debug!(endpoint = self.id, "outbound queue closed while disconnected");
                return;
            }
        }
    }
}
