//! Endpoint lifecycle drivers.
//!
//! An endpoint is a single managed connection or listener together with its
//! user-facing queues. Each endpoint is driven by one task on the reactor's
//! I/O thread:
//!
//! - `ClientEndpoint`: connects to a target address, reconnects after
//!   `reconnect_period` on loss, reports transitions in-band.
//! - `AcceptedEndpoint`: server-side child created per inbound connection;
//!   same surface as a client but closed (never reconnected) on loss.
//! - `ListenerEndpoint`: owns the listening socket, spawns accepted
//!   children and hands their queue handles to the accept queue.
//!
//! All drivers race their I/O against the reactor shutdown signal and end
//! by posting `Closed` and closing their queues.

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;

pub use handle::{ClientHandle, ServerHandle};
pub(crate) use accepted::AcceptedEndpoint;
pub(crate) use client::ClientEndpoint;
pub(crate) use listener::ListenerEndpoint;

mod accepted;
mod client;
mod handle;
mod listener;
mod session;

static NEXT_ENDPOINT_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_endpoint_id() -> u64 {
    NEXT_ENDPOINT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Items delivered on an endpoint's inbound queue.
///
/// Lifecycle is observed in-band: `Connected` always precedes the first
/// payload, `Disconnected` may alternate with `Connected` on client
/// endpoints, and `Closed` appears exactly once as the final item before
/// the queue is closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Connected,
    Disconnected,
    Closed,
    Payload(Bytes),
}

impl LinkEvent {
    /// Returns the payload bytes if this is a payload item.
    pub fn payload(&self) -> Option<&Bytes> {
        match self {
            LinkEvent::Payload(bytes) => Some(bytes),
            _ => None,
        }
    }
}
