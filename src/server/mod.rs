//! cmdlog server implementation

pub mod connection;
pub mod heartbeat;
pub mod signal;
pub mod tcp;

use crate::config::ServerConfig;
use crate::protocol::CommandFramer;
use crate::store::Backend;
use crate::{CmdLogError, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{watch, Mutex};
use tracing::info;

pub use connection::{ConnectionHandler, Outcome};
pub use heartbeat::Heartbeat;
pub use signal::TerminationSignals;
pub use tcp::{SessionGuard, SessionRegistry, TcpServer};

/// Everything guarded by the server's single lock
#[derive(Debug)]
pub struct LogState {
    /// The command history
    pub backend: Backend,
    /// Process-wide pending command, used only in shared-accumulator mode
    pub shared_pending: Option<CommandFramer>,
}

impl LogState {
    /// Wrap a backend with no pending command
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            shared_pending: None,
        }
    }
}

/// The lock every append, seek, replay and heartbeat goes through
pub type SharedLog = Arc<Mutex<LogState>>;

/// Resolve once shutdown has been requested or the sender is gone.
///
/// The `watch::Ref` is released before returning, so loops that `select!`
/// on this stay `Send`.
pub async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|&stop| stop).await;
}

/// Requests an orderly shutdown of a running [`LogServer`]
#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownTrigger {
    /// Stop accepting connections and drain every running task
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }
}

/// Main cmdlog server that coordinates all components
pub struct LogServer {
    config: ServerConfig,
    state: SharedLog,
    listener: TcpListener,
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl LogServer {
    /// Bind the listening socket, then open the configured backend.
    ///
    /// Failing to bind is a [`CmdLogError::Setup`] error and leaves no data
    /// file behind.
    pub async fn new(config: ServerConfig) -> Result<Self> {
        config.validate()?;

        let address = config.listen_address();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|e| CmdLogError::Setup(format!("Failed to bind {}: {}", address, e)))?;

        let backend = Backend::open(&config.storage).await?;
        let state = Arc::new(Mutex::new(LogState::new(backend)));
        info!("Server listening at {}", listener.local_addr()?);

        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            config,
            state,
            listener,
            shutdown_tx: Arc::new(shutdown_tx),
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Shared handle to the locked log state
    pub fn state(&self) -> SharedLog {
        Arc::clone(&self.state)
    }

    /// Handle that stops the server once [`LogServer::start`] is running
    pub fn shutdown_trigger(&self) -> ShutdownTrigger {
        ShutdownTrigger {
            tx: Arc::clone(&self.shutdown_tx),
        }
    }

    /// Serve connections until shutdown is requested, then drain and tear down
    pub async fn start(self) -> Result<()> {
        let tcp_server = TcpServer::new(&self.config, self.state, self.listener, self.shutdown_tx);

        tcp_server.start().await
    }
}
