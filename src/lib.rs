//! # cmdlog - Bounded TCP Command Log
//!
//! cmdlog keeps the most recent commands sent to it over TCP and streams the
//! retained history back to every client. Commands are newline-terminated
//! byte strings; the history is addressable as one byte stream across all
//! retained commands.
//!
//! ## Features
//!
//! - **Ring Store**: fixed-capacity circular store with FIFO eviction
//! - **Seek Directive**: `SEEKTO:<index>,<offset>` replays from any retained command
//! - **Two Backends**: in-memory ring or an unbounded plain file
//! - **Heartbeat**: periodic timestamp records written under the same lock
//! - **Graceful Shutdown**: every connection task is drained before teardown
//!
//! ## Quick Start
//!
//! ### Server
//! ```no_run
//! use cmdlog::server::LogServer;
//! use cmdlog::config::ServerConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::from_file("config/server.toml")?;
//!     let server = LogServer::new(config).await?;
//!     server.start().await?;
//!     Ok(())
//! }
//! ```
//!
//! ### Client
//! ```no_run
//! use cmdlog::client::LogClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = LogClient::new("127.0.0.1:9000");
//!     let history = client.append(b"hello\n").await?;
//!     let tail = client.seek(0, 2).await?;
//!     println!("{} records, tail {:?}", history.len(), tail);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod protocol;
pub mod server;
pub mod store;
pub mod types;

/// Common error types used throughout cmdlog
pub mod error {
    use std::fmt;

    /// cmdlog error types
    #[derive(Debug)]
    pub enum CmdLogError {
        /// I/O operation failed
        Io(std::io::Error),
        /// Configuration error
        Config(String),
        /// Server setup failed (bind, listen, signal registration)
        Setup(String),
        /// A single connection failed and was closed
        Connection(String),
        /// Seek index or offset outside the retained history
        InvalidArgument(String),
        /// Offset beyond the end of the retained history
        NotFound(u64),
        /// Allocation failed while storing or framing a command
        OutOfMemory(usize),
    }

    impl CmdLogError {
        /// Whether the error must terminate the process
        pub fn is_fatal(&self) -> bool {
            matches!(self, CmdLogError::Setup(_))
        }
    }

    impl fmt::Display for CmdLogError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                CmdLogError::Io(e) => write!(f, "I/O error: {}", e),
                CmdLogError::Config(e) => write!(f, "Configuration error: {}", e),
                CmdLogError::Setup(e) => write!(f, "Setup error: {}", e),
                CmdLogError::Connection(e) => write!(f, "Connection error: {}", e),
                CmdLogError::InvalidArgument(e) => write!(f, "Invalid argument: {}", e),
                CmdLogError::NotFound(offset) => {
                    write!(f, "Offset {} is beyond the retained history", offset)
                }
                CmdLogError::OutOfMemory(len) => {
                    write!(f, "Out of memory allocating {} bytes", len)
                }
            }
        }
    }

    impl std::error::Error for CmdLogError {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            match self {
                CmdLogError::Io(e) => Some(e),
                _ => None,
            }
        }
    }

    impl From<std::io::Error> for CmdLogError {
        fn from(err: std::io::Error) -> Self {
            CmdLogError::Io(err)
        }
    }

    /// Result type alias for cmdlog operations
    pub type Result<T> = std::result::Result<T, CmdLogError>;
}

pub use error::{CmdLogError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::client::LogClient;
    pub use crate::config::ServerConfig;
    pub use crate::protocol::{Command, CommandFramer};
    pub use crate::server::LogServer;
    pub use crate::store::{Backend, FileStore, RingStore};
    pub use crate::types::Entry;
    pub use crate::{CmdLogError, Result};
}
