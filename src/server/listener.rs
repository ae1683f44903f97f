//! Accept Loop
//!
//! Owns the listening socket and one task per accepted connection. The
//! spawned sessions are tracked in a `JoinSet` so the server can cap how
//! many run at once and can drain them on shutdown.

use crate::commands::CommandHandler;
use crate::config::ServerConfig;
use crate::connection::{ConnectionStats, Session};
use crate::shutdown::Shutdown;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

/// Errors that stop the server. Both are fatal for the process.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind { addr: String, source: io::Error },

    #[error("failed to accept connection: {0}")]
    Accept(#[source] io::Error),
}

/// A bound listener plus the registry of running sessions.
pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
    handler: Arc<dyn CommandHandler>,
    stats: Arc<ConnectionStats>,

    /// One permit per running session when `max_connections` is set
    limit: Option<Arc<Semaphore>>,

    /// Flipped to `true` once to stop every session
    notify_shutdown: watch::Sender<bool>,

    sessions: JoinSet<()>,
}

impl Server {
    /// Binds `config.bind_addr`.
    pub async fn bind(
        config: ServerConfig,
        handler: Arc<dyn CommandHandler>,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(&config.bind_addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: config.bind_addr.clone(),
                source,
            })?;

        let limit = config
            .max_connections
            .filter(|&n| n > 0)
            .map(|n| Arc::new(Semaphore::new(n)));
        let (notify_shutdown, _) = watch::channel(false);

        Ok(Self {
            listener,
            config,
            handler,
            stats: Arc::new(ConnectionStats::new()),
            limit,
            notify_shutdown,
            sessions: JoinSet::new(),
        })
    }

    /// The address the listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Shared statistics for every session this server starts.
    pub fn stats(&self) -> Arc<ConnectionStats> {
        Arc::clone(&self.stats)
    }

    /// Accepts connections until `shutdown` completes, then signals every
    /// session and waits for all of them to finish.
    ///
    /// An accept error is fatal: the sessions are drained and the error is
    /// returned.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) -> Result<(), ServerError> {
        tokio::pin!(shutdown);
        info!(addr = %self.config.bind_addr, "Accepting connections");

        let result = loop {
            let permit = match &self.limit {
                Some(limit) => tokio::select! {
                    permit = Arc::clone(limit).acquire_owned() => match permit {
                        Ok(permit) => Some(permit),
                        Err(_) => break Ok(()),
                    },
                    _ = &mut shutdown => break Ok(()),
                },
                None => None,
            };

            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => self.spawn_session(stream, addr, permit),
                    Err(e) => {
                        error!(error = %e, "Failed to accept connection");
                        break Err(ServerError::Accept(e));
                    }
                },
                Some(joined) = self.sessions.join_next() => {
                    if let Err(e) = joined {
                        error!(error = %e, "Session task failed");
                    }
                }
                _ = &mut shutdown => break Ok(()),
            }
        };

        self.drain().await;
        result
    }

    fn spawn_session(
        &mut self,
        stream: TcpStream,
        addr: SocketAddr,
        permit: Option<OwnedSemaphorePermit>,
    ) {
        let session = Session::with_config(
            stream,
            addr,
            Arc::clone(&self.handler),
            Arc::clone(&self.stats),
            &self.config,
        )
        .with_shutdown(Shutdown::new(self.notify_shutdown.subscribe()));

        self.sessions.spawn(async move {
            // The session reports its own termination
            let _ = session.run().await;
            drop(permit);
        });
        debug!(client = %addr, running = self.sessions.len(), "Session started");
    }

    /// Signals every session to stop and waits for them.
    async fn drain(mut self) {
        info!(sessions = self.sessions.len(), "Draining sessions");
        self.notify_shutdown.send_replace(true);

        while let Some(joined) = self.sessions.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Session task failed");
            }
        }
        info!("All sessions closed");
    }
}
