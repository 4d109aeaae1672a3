use tokio::sync::broadcast;

/// Listens for the reactor-wide shutdown signal.
///
/// Every driver task holds its own `Shutdown` and races it against its I/O
/// futures. The signal is sticky: once received, `recv` returns immediately
/// on every later call. A dropped sender counts as a signal, so a task can
/// never outlive the reactor that spawned it.
#[derive(Debug)]
pub struct Shutdown {
    is_shutdown: bool,
    signal: broadcast::Receiver<()>,
}

impl Shutdown {
    pub fn new(signal: broadcast::Receiver<()>) -> Shutdown {
        Shutdown {
            is_shutdown: false,
            signal,
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.is_shutdown
    }

    /// Completes when the shutdown signal has been received.
    pub async fn recv(&mut self) {
        if self.is_shutdown {
            return;
        }
        // Err(Closed) means every sender is gone, which is a shutdown too.
        let _ = self.signal.recv().await;
        self.is_shutdown = true;
    }
}
