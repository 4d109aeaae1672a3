use std::net::SocketAddr;
use std::thread;

use bytes::Bytes;
use tokio::net::{TcpListener, TcpSocket};
use tokio::runtime;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info};

use crate::endpoint::{ClientEndpoint, ClientHandle, LinkEvent, ListenerEndpoint, ServerHandle};
use crate::service::{AcceptOptions, AppError, AppResult, LinkOptions, Shutdown};

struct ConnectRequest {
    target: String,
    opts: LinkOptions,
    inbound: async_channel::Sender<LinkEvent>,
    outbound: async_channel::Receiver<Bytes>,
    shutdown: Shutdown,
}

struct BindRequest {
    addr: SocketAddr,
    opts: AcceptOptions,
    reply: oneshot::Sender<AppResult<ServerHandle>>,
    shutdown: Shutdown,
}

enum Command {
    Connect(ConnectRequest),
    Bind(BindRequest),
}

/// Handle to a running I/O loop.
///
/// The reactor owns a dedicated `reactor-io` OS thread; every socket and
/// every endpoint driver lives on that thread. User code interacts with
/// endpoints only through the queue handles returned by [`connect`] and
/// [`accept`]. Multiple reactors may coexist in one process.
///
/// [`connect`]: Reactor::connect
/// [`accept`]: Reactor::accept
#[derive(Debug)]
pub struct Reactor {
    cmd_tx: mpsc::UnboundedSender<Command>,
    notify_shutdown: broadcast::Sender<()>,
    io_thread: Option<thread::JoinHandle<()>>,
}

impl Reactor {
    /// Starts the I/O thread.
    ///
    /// Fails if the runtime or the thread cannot be created.
    pub fn start() -> AppResult<Reactor> {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (notify_shutdown, _) = broadcast::channel(1);

        let rt = runtime::Builder::new_current_thread().enable_all().build()?;
        // subscribe before the thread runs so a signal sent right after
        // `start` returns is never missed
        let supervisor_signal = Shutdown::new(notify_shutdown.subscribe());
        let supervisor_sender = notify_shutdown.clone();
        let io_thread = thread::Builder::new()
            .name("reactor-io".into())
            .spawn(move || rt.block_on(supervise(cmd_rx, supervisor_sender, supervisor_signal)))?;

        Ok(Reactor {
            cmd_tx,
            notify_shutdown,
            io_thread: Some(io_thread),
        })
    }

    /// Creates a client endpoint targeting `addr`.
    ///
    /// The returned queues are live immediately; the first event is either
    /// `Connected` or `Disconnected`. The endpoint reconnects on its own
    /// until the outbound queue is closed or the reactor shuts down.
    pub fn connect(&self, addr: impl Into<String>, opts: LinkOptions) -> ClientHandle {
        let (inbound_tx, inbound_rx) = opts.inbound_queue().channel();
        let (outbound_tx, outbound_rx) = opts.outbound_queue().channel();
        let request = ConnectRequest {
            target: addr.into(),
            opts,
            inbound: inbound_tx.clone(),
            outbound: outbound_rx,
            shutdown: Shutdown::new(self.notify_shutdown.subscribe()),
        };
        if self.cmd_tx.send(Command::Connect(request)).is_err() {
            // the reactor is already gone; the endpoint closes before it
            // ever connected
            let _ = inbound_tx.try_send(LinkEvent::Closed);
            inbound_tx.close();
        }
        ClientHandle {
            events: inbound_rx,
            sender: outbound_tx,
        }
    }

    /// Creates a listener endpoint bound to `addr`.
    ///
    /// The bind happens on the I/O thread with address-reuse enabled;
    /// failures surface here so the caller can react.
    pub async fn accept(&self, addr: &str, opts: AcceptOptions) -> AppResult<ServerHandle> {
        let addr: SocketAddr = addr
            .parse()
            .map_err(|_| AppError::InvalidValue(format!("listen address: {}", addr)))?;
        let (reply_tx, reply_rx) = oneshot::channel();
        let request = BindRequest {
            addr,
            opts,
            reply: reply_tx,
            shutdown: Shutdown::new(self.notify_shutdown.subscribe()),
        };
        self.cmd_tx
            .send(Command::Bind(request))
            .map_err(|e| AppError::ChannelSendError(e.to_string()))?;
        reply_rx
            .await
            .map_err(|_| AppError::IllegalStateError("reactor exited before binding".into()))?
    }

    /// Shuts the reactor down.
    ///
    /// Every endpoint it owns posts a final `Closed` and closes its
    /// queues; the I/O thread is then joined.
    pub fn shutdown(mut self) {
        info!("reactor shutdown requested");
        let _ = self.notify_shutdown.send(());
        // replace the sender so a receiver that raced past the signal still
        // observes the channel closing once the supervisor lets go
        self.notify_shutdown = broadcast::channel(1).0;
        if let Some(handle) = self.io_thread.take() {
            if handle.join().is_err() {
                error!("reactor I/O thread panicked");
            }
        }
    }
}

impl Drop for Reactor {
    fn drop(&mut self) {
        let _ = self.notify_shutdown.send(());
        debug!("reactor dropped");
    }
}

/// Supervisor task: dispatches commands and tracks endpoint teardown.
///
/// Graceful shutdown sequence:
/// 1. The loop stops on the shutdown signal (or when every `Reactor`
///    handle is gone).
/// 2. Commands that raced the signal are refused: their queues are closed
///    so no caller is left waiting.
/// 3. Every endpoint driver holds a clone of `shutdown_complete_tx`; the
///    supervisor drops its own clone and waits for the channel to close,
///    which happens once the last driver has posted `Closed` and exited.
async fn supervise(
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    notify_shutdown: broadcast::Sender<()>,
    mut shutdown: Shutdown,
) {
    let (shutdown_complete_tx, mut shutdown_complete_rx) = mpsc::channel::<()>(1);
    debug!("reactor I/O loop started");

    loop {
        let cmd = tokio::select! {
            cmd = cmd_rx.recv() => cmd,
            _ = shutdown.recv() => break,
        };
        match cmd {
            Some(Command::Connect(request)) => {
                let endpoint = ClientEndpoint::new(
                    request.target,
                    request.opts,
                    request.inbound,
                    request.outbound,
                    request.shutdown,
                    shutdown_complete_tx.clone(),
                );
                tokio::spawn(endpoint.run());
            }
            Some(Command::Bind(request)) => {
                let reply = match bind_listener(request.addr) {
                    Ok(listener) => install_listener(
                        listener,
                        request.opts,
                        request.shutdown,
                        &notify_shutdown,
                        &shutdown_complete_tx,
                    ),
                    Err(e) => {
                        error!(addr = %request.addr, error = %e, "failed to bind listener");
                        Err(e)
                    }
                };
                let _ = request.reply.send(reply);
            }
            None => {
                debug!("all reactor handles dropped");
                break;
            }
        }
    }

    // refuse commands that raced the shutdown signal
    cmd_rx.close();
    while let Ok(cmd) = cmd_rx.try_recv() {
        match cmd {
            Command::Connect(request) => {
                let _ = request.inbound.try_send(LinkEvent::Closed);
                request.inbound.close();
            }
            Command::Bind(request) => {
                let _ = request
                    .reply
                    .send(Err(AppError::IllegalStateError("reactor is shutting down".into())));
            }
        }
    }

    // release the broadcast sender before waiting: a driver that never saw
    // the signal still unblocks when the last sender is gone
    drop(notify_shutdown);
    drop(shutdown_complete_tx);
    let _ = shutdown_complete_rx.recv().await;
    debug!("reactor shutdown complete");
}

fn bind_listener(addr: SocketAddr) -> AppResult<TcpListener> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()
    } else {
        TcpSocket::new_v6()
    }?;
    socket.set_reuseaddr(true)?;
    socket
        .bind(addr)
        .map_err(|e| AppError::DetailedIoError(format!("failed to bind {}: {}", addr, e)))?;
    Ok(socket.listen(1024)?)
}

fn install_listener(
    listener: TcpListener,
    opts: AcceptOptions,
    shutdown: Shutdown,
    notify_shutdown: &broadcast::Sender<()>,
    shutdown_complete_tx: &mpsc::Sender<()>,
) -> AppResult<ServerHandle> {
    let local_addr = listener.local_addr()?;
    let (accept_tx, accept_rx) = opts.accept_queue().channel();
    let endpoint = ListenerEndpoint::new(
        listener,
        opts,
        accept_tx,
        notify_shutdown.clone(),
        shutdown,
        shutdown_complete_tx.clone(),
    );
    tokio::spawn(endpoint.run());
    info!(addr = %local_addr, "listener bound");
    Ok(ServerHandle {
        local_addr,
        accepted: accept_rx,
    })
}
