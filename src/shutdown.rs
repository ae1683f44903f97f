//! Shutdown signalling for connection sessions.

use tokio::sync::watch;

/// Listens for the server's shutdown signal.
///
/// The server holds the `watch::Sender<bool>` and flips it to `true` once;
/// every session holds one of these. A `Shutdown` whose sender was dropped
/// without signalling never fires.
#[derive(Debug, Clone)]
pub struct Shutdown {
    is_shutdown: bool,
    notify: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn new(notify: watch::Receiver<bool>) -> Self {
        let is_shutdown = *notify.borrow();
        Self {
            is_shutdown,
            notify,
        }
    }

    /// A signal that never fires, for sessions run outside a server.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self::new(rx)
    }

    pub fn is_shutdown(&self) -> bool {
        self.is_shutdown
    }

    /// Waits until shutdown is signalled.
    pub async fn recv(&mut self) {
        while !self.is_shutdown {
            if self.notify.changed().await.is_err() {
                // Sender gone without signalling
                std::future::pending::<()>().await;
            }
            self.is_shutdown = *self.notify.borrow();
        }
    }
}
