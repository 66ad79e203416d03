//! cmdlog client for sending commands and reading back the history

use crate::protocol::{Command, CommandFramer, TERMINATOR};
use crate::{CmdLogError, Result};
use bytes::{Bytes, BytesMut};
use futures::TryStreamExt;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};
use tokio_util::codec::FramedRead;

/// Default time allowed for a whole request/replay exchange
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for a cmdlog server.
///
/// The server handles one command per connection, so every call opens a new
/// connection and reads the replay until the server closes it.
#[derive(Debug, Clone)]
pub struct LogClient {
    address: String,
    timeout: Duration,
}

impl LogClient {
    /// Create a client for the server at `address` (`host:port`)
    pub fn new<S: Into<String>>(address: S) -> Self {
        Self {
            address: address.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the exchange timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Server address this client talks to
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Append `command` and return the retained history, oldest first.
    ///
    /// A terminator is added when `command` does not end with one.
    pub async fn append(&self, command: &[u8]) -> Result<Vec<Bytes>> {
        let mut data = BytesMut::with_capacity(command.len() + 1);
        data.extend_from_slice(command);
        if command.last() != Some(&TERMINATOR) {
            data.extend_from_slice(&[TERMINATOR]);
        }
        self.send(&Command::Append(data.freeze())).await
    }

    /// Replay the history starting at byte `offset` of retained entry `index`
    pub async fn seek(&self, index: u32, offset: u32) -> Result<Vec<Bytes>> {
        self.send(&Command::SeekTo { index, offset }).await
    }

    /// Send one request and collect the replayed records
    pub async fn send(&self, command: &Command) -> Result<Vec<Bytes>> {
        timeout(self.timeout, self.exchange(command))
            .await
            .map_err(|_| CmdLogError::Connection("Request timed out".to_string()))?
    }

    async fn exchange(&self, command: &Command) -> Result<Vec<Bytes>> {
        let mut stream = TcpStream::connect(&self.address)
            .await
            .map_err(|e| CmdLogError::Connection(format!("Failed to connect: {}", e)))?;

        stream.write_all(&command.encode()).await?;
        stream.flush().await?;

        FramedRead::new(stream, CommandFramer::new())
            .try_collect()
            .await
    }
}
