use std::time::Duration;

use getset::CopyGetters;

pub const DEFAULT_RECONNECT_PERIOD: Duration = Duration::from_millis(1000);
pub const DEFAULT_HEARTBEAT_PERIOD: Duration = Duration::from_millis(5000);
/// Default declared-length ceiling. The wire format itself allows up to
/// `i32::MAX`, anything above this limit is treated as a protocol error.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

const HEARTBEAT_TIMEOUT_FACTOR: u32 = 4;

/// Buffering policy for a user-facing queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueuePolicy {
    Unbounded,
    Bounded(usize),
}

impl QueuePolicy {
    pub(crate) fn channel<T>(&self) -> (async_channel::Sender<T>, async_channel::Receiver<T>) {
        match self {
            QueuePolicy::Unbounded => async_channel::unbounded(),
            QueuePolicy::Bounded(capacity) => async_channel::bounded(*capacity),
        }
    }
}

impl Default for QueuePolicy {
    fn default() -> Self {
        QueuePolicy::Unbounded
    }
}

/// Timing, framing and queue options for a client endpoint.
///
/// `with_heartbeat_period` derives the heartbeat timeout as four times the
/// period; call `with_heartbeat_timeout` afterwards to override it.
#[derive(Debug, Clone, CopyGetters)]
#[get_copy = "pub"]
pub struct LinkOptions {
    /// Delay between a disconnect and the next connect attempt.
    reconnect_period: Duration,
    /// Idle-write interval after which a heartbeat frame is emitted.
    heartbeat_period: Duration,
    /// Silent-read duration after which the socket is declared stuck.
    heartbeat_timeout: Duration,
    /// Declared-length ceiling for inbound frames.
    max_frame_size: usize,
    inbound_queue: QueuePolicy,
    outbound_queue: QueuePolicy,
}

impl Default for LinkOptions {
    fn default() -> Self {
        Self {
            reconnect_period: DEFAULT_RECONNECT_PERIOD,
            heartbeat_period: DEFAULT_HEARTBEAT_PERIOD,
            heartbeat_timeout: DEFAULT_HEARTBEAT_PERIOD * HEARTBEAT_TIMEOUT_FACTOR,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            inbound_queue: QueuePolicy::default(),
            outbound_queue: QueuePolicy::default(),
        }
    }
}

impl LinkOptions {
    pub fn with_reconnect_period(mut self, period: Duration) -> Self {
        self.reconnect_period = period;
        self
    }

    pub fn with_heartbeat_period(mut self, period: Duration) -> Self {
        self.heartbeat_period = period;
        self.heartbeat_timeout = period * HEARTBEAT_TIMEOUT_FACTOR;
        self
    }

    pub fn with_heartbeat_timeout(mut self, timeout: Duration) -> Self {
        self.heartbeat_timeout = timeout;
        self
    }

    pub fn with_max_frame_size(mut self, limit: usize) -> Self {
        self.max_frame_size = limit;
        self
    }

    pub fn with_inbound_queue(mut self, policy: QueuePolicy) -> Self {
        self.inbound_queue = policy;
        self
    }

    pub fn with_outbound_queue(mut self, policy: QueuePolicy) -> Self {
        self.outbound_queue = policy;
        self
    }
}

/// Options for a listener endpoint and the endpoints it accepts.
///
/// Accepted endpoints inherit the timing and framing options. There is no
/// reconnect period here: an accepted endpoint that loses its socket is
/// closed, never reconnected.
#[derive(Debug, Clone, CopyGetters)]
#[get_copy = "pub"]
pub struct AcceptOptions {
    heartbeat_period: Duration,
    heartbeat_timeout: Duration,
    max_frame_size: usize,
    /// Queue policies applied to every accepted endpoint.
    inbound_queue: QueuePolicy,
    outbound_queue: QueuePolicy,
    accept_queue: QueuePolicy,
}

impl Default for AcceptOptions {
    fn default() -> Self {
        Self {
            heartbeat_period: DEFAULT_HEARTBEAT_PERIOD,
            heartbeat_timeout: DEFAULT_HEARTBEAT_PERIOD * HEARTBEAT_TIMEOUT_FACTOR,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            inbound_queue: QueuePolicy::default(),
            outbound_queue: QueuePolicy::default(),
            accept_queue: QueuePolicy::default(),
        }
    }
}

impl AcceptOptions {
    pub fn with_heartbeat_period(mut self, period: Duration) -> Self {
        self.heartbeat_period = period;
        self.heartbeat_timeout = period * HEARTBEAT_TIMEOUT_FACTOR;
        self
    }

    pub fn with_heartbeat_timeout(mut self, timeout: Duration) -> Self {
        self.heartbeat_timeout = timeout;
        self
    }

    pub fn with_max_frame_size(mut self, limit: usize) -> Self {
        self.max_frame_size = limit;
        self
    }

    pub fn with_inbound_queue(mut self, policy: QueuePolicy) -> Self {
        self.inbound_queue = policy;
        self
    }

    pub fn with_outbound_queue(mut self, policy: QueuePolicy) -> Self {
        self.outbound_queue = policy;
        self
    }

    pub fn with_accept_queue(mut self, policy: QueuePolicy) -> Self {
        self.accept_queue = policy;
        self
    }
}
