//! TCP accept loop for cmdlog

use crate::config::ServerConfig;
use crate::server::{shutdown_requested, ConnectionHandler, Heartbeat, Outcome, SharedLog};
use crate::{CmdLogError, Result};
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};
use tokio::time::interval;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

const DRAIN_REPORT_PERIOD: Duration = Duration::from_secs(5);

/// Connections currently being served, keyed by session id
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<Uuid, SocketAddr>>,
}

impl SessionRegistry {
    /// Record a session until the returned guard is dropped
    pub fn register(&self, id: Uuid, peer: SocketAddr) -> SessionGuard {
        self.sessions.insert(id, peer);
        SessionGuard {
            registry: self.clone(),
            id,
        }
    }

    /// Number of open sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no session is open
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Peers of the open sessions
    pub fn peers(&self) -> Vec<SocketAddr> {
        self.sessions.iter().map(|entry| *entry.value()).collect()
    }
}

/// Removes its session from the registry when dropped
#[derive(Debug)]
pub struct SessionGuard {
    registry: SessionRegistry,
    id: Uuid,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.registry.sessions.remove(&self.id);
    }
}

/// TCP server accepting command connections
pub struct TcpServer {
    config: ServerConfig,
    state: SharedLog,
    listener: TcpListener,
    shutdown_tx: Arc<watch::Sender<bool>>,
    sessions: SessionRegistry,
}

impl TcpServer {
    /// Create a TCP server on an already bound listener
    pub fn new(
        config: &ServerConfig,
        state: SharedLog,
        listener: TcpListener,
        shutdown_tx: Arc<watch::Sender<bool>>,
    ) -> Self {
        Self {
            config: config.clone(),
            state,
            listener,
            shutdown_tx,
            sessions: SessionRegistry::default(),
        }
    }

    /// Handle on the sessions this server is serving
    pub fn sessions(&self) -> SessionRegistry {
        self.sessions.clone()
    }

    /// Accept connections until shutdown, then drain every task and tear
    /// down the backend.
    pub async fn start(self) -> Result<()> {
        let TcpServer {
            config,
            state,
            listener,
            shutdown_tx,
            sessions,
        } = self;

        let mut shutdown_rx = shutdown_tx.subscribe();
        let mut tasks = JoinSet::new();

        if config.heartbeat.enabled {
            Heartbeat::new(&config.heartbeat, Arc::clone(&state))
                .spawn(&mut tasks, shutdown_tx.subscribe());
        }

        let handler = ConnectionHandler::new(
            Arc::clone(&state),
            config.server.buffer_size,
            config.framing.shared_accumulator,
        );

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            let handler = handler.clone();
                            let id = Uuid::new_v4();
                            let session = sessions.register(id, peer);
                            let span = info_span!("session", %id, %peer);
                            tasks.spawn(
                                Self::handle_connection(handler, stream, peer, session).instrument(span),
                            );
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                            tokio::time::sleep(Duration::from_millis(100)).await;
                        }
                    }
                }
                Some(result) = tasks.join_next(), if !tasks.is_empty() => {
                    log_task_exit(result);
                }
                _ = shutdown_requested(&mut shutdown_rx) => {
                    info!("Caught shutdown request, exiting");
                    break;
                }
            }
        }

        drop(listener);
        info!("Draining {} running tasks", tasks.len());
        let mut report = interval(DRAIN_REPORT_PERIOD);
        // The first tick completes immediately.
        report.tick().await;
        loop {
            tokio::select! {
                result = tasks.join_next() => match result {
                    Some(result) => log_task_exit(result),
                    None => break,
                },
                _ = report.tick() => {
                    warn!(
                        "Still waiting on {} open sessions: {:?}",
                        sessions.len(),
                        sessions.peers()
                    );
                }
            }
        }

        state.lock().await.backend.teardown().await?;
        info!("Server stopped");
        Ok(())
    }

    async fn handle_connection(
        handler: ConnectionHandler,
        mut stream: TcpStream,
        peer: SocketAddr,
        _session: SessionGuard,
    ) {
        info!("Accepted connection from {}", peer.ip());

        match handler.handle(&mut stream).await {
            Ok(Outcome::Appended { replayed }) => debug!("Replayed {} bytes", replayed),
            Ok(Outcome::Echoed { from, replayed }) => {
                debug!("Replayed {} bytes from offset {}", replayed, from)
            }
            Ok(Outcome::Disconnected) => debug!("Peer left before sending a command"),
            Err(CmdLogError::InvalidArgument(e)) => warn!("Rejected seek: {}", e),
            Err(e) => warn!("Connection failed: {}", e),
        }

        info!("Closed connection from {}", peer.ip());
    }
}

fn log_task_exit(result: std::result::Result<(), JoinError>) {
    if let Err(e) = result {
        if e.is_panic() {
            error!("Task panicked: {}", e);
        } else {
            debug!("Task cancelled: {}", e);
        }
    }
}
