use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::time;
use tracing::{debug, error};

use crate::endpoint::{next_endpoint_id, AcceptedEndpoint, ClientHandle};
use crate::service::{AcceptOptions, AppError, AppResult, Shutdown};

/// Listener endpoint driver: accept, spawn a child endpoint, hand its
/// queue handle to the accept queue, repeat.
///
/// The listener does not go back to accepting until the handle push has
/// completed, so a slow accept-queue consumer throttles the accept rate
/// instead of piling up children.
pub(crate) struct ListenerEndpoint {
    id: u64,
    listener: TcpListener,
    opts: AcceptOptions,
    accept_tx: async_channel::Sender<ClientHandle>,
    notify_shutdown: broadcast::Sender<()>,
    shutdown: Shutdown,
    shutdown_complete_tx: mpsc::Sender<()>,
}

impl ListenerEndpoint {
    pub(crate) fn new(
        listener: TcpListener,
        opts: AcceptOptions,
        accept_tx: async_channel::Sender<ClientHandle>,
        notify_shutdown: broadcast::Sender<()>,
        shutdown: Shutdown,
        shutdown_complete_tx: mpsc::Sender<()>,
    ) -> Self {
        Self {
            id: next_endpoint_id(),
            listener,
            opts,
            accept_tx,
            notify_shutdown,
            shutdown,
            shutdown_complete_tx,
        }
    }

    pub(crate) async fn run(mut self) {
        debug!(endpoint = self.id, "listener started");
        loop {
            let accepted = tokio::select! {
                res = Self::accept_next(&self.listener) => res,
                _ = self.shutdown.recv() => break,
            };
            match accepted {
                Ok((stream, peer)) => {
                    let (handle, child) = self.install_child(stream, peer);
                    debug!(endpoint = self.id, child = child.id(), peer = %peer, "connection accepted");
                    tokio::spawn(child.run());
                    // not accepting again until the push lands
                    if self.accept_tx.send(handle).await.is_err() {
                        debug!(endpoint = self.id, "accept queue closed, handle discarded");
                    }
                }
                Err(e) => {
                    error!(endpoint = self.id, error = %e, "accept failed");
                    break;
                }
            }
        }
        self.accept_tx.close();
        // dropping the listener releases the bound address
        debug!(endpoint = self.id, "listener closed");
    }

    /// Accepts the next connection, backing off on transient errors.
    async fn accept_next(listener: &TcpListener) -> AppResult<(TcpStream, SocketAddr)> {
        let mut backoff = 1;

        loop {
            match listener.accept().await {
                Ok(pair) => return Ok(pair),
                Err(err) => {
                    if backoff > 64 {
                        return Err(AppError::Accept(format!("accept tcp error: {}", err)));
                    }
                    debug!(error = %err, backoff, "accept failed, backing off");
                }
            }

            time::sleep(Duration::from_secs(backoff)).await;
            backoff *= 2;
        }
    }

    fn install_child(&self, stream: TcpStream, peer: SocketAddr) -> (ClientHandle, AcceptedEndpoint) {
        let (inbound_tx, inbound_rx) = self.opts.inbound_queue().channel();
        let (outbound_tx, outbound_rx) = self.opts.outbound_queue().channel();
        let child = AcceptedEndpoint::new(
            stream,
            peer,
            self.opts.clone(),
            inbound_tx,
            outbound_rx,
            Shutdown::new(self.notify_shutdown.subscribe()),
            self.shutdown_complete_tx.clone(),
        );
        let handle = ClientHandle {
            events: inbound_rx,
            sender: outbound_tx,
        };
        (handle, child)
    }
}
