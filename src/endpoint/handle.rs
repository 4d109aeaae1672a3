use std::net::SocketAddr;

use bytes::Bytes;

use crate::endpoint::LinkEvent;

/// Queue surface of a client or accepted endpoint.
///
/// The handle stays valid for the lifetime of the endpoint regardless of
/// the socket's state. `events` delivers payloads and lifecycle events in
/// order; `sender` enqueues outbound payloads. Closing `sender` (or
/// dropping every clone of it) asks the endpoint to drain in-flight writes
/// and shut down.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    pub events: async_channel::Receiver<LinkEvent>,
    pub sender: async_channel::Sender<Bytes>,
}

/// Queue surface of a listener endpoint.
///
/// `accepted` yields one `ClientHandle` per inbound connection. Closing it
/// only discards further handles; the listener keeps accepting until its
/// reactor shuts down.
#[derive(Debug, Clone)]
pub struct ServerHandle {
    pub local_addr: SocketAddr,
    pub accepted: async_channel::Receiver<ClientHandle>,
}
