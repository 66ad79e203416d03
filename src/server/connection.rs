//! Per-connection command handling

use crate::protocol::{Command, CommandFramer};
use crate::server::{LogState, SharedLog};
use crate::store::Backend;
use crate::{CmdLogError, Result};
use bytes::Bytes;
use std::io::ErrorKind;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// How a connection ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A command was appended and `replayed` bytes of history sent back
    Appended {
        /// Bytes written to the client
        replayed: u64,
    },
    /// A seek directive resolved to `from` and the suffix was sent back
    Echoed {
        /// Global offset the replay started at
        from: u64,
        /// Bytes written to the client
        replayed: u64,
    },
    /// The peer closed the connection before a full command arrived
    Disconnected,
}

/// Runs the read-command, then append-or-seek, then replay cycle for one
/// connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandler {
    state: SharedLog,
    buffer_size: usize,
    shared_accumulator: bool,
}

impl ConnectionHandler {
    /// Create a handler over the shared log
    pub fn new(state: SharedLog, buffer_size: usize, shared_accumulator: bool) -> Self {
        Self {
            state,
            buffer_size: buffer_size.max(1),
            shared_accumulator,
        }
    }

    /// Serve one command on `stream`.
    ///
    /// Reads until a full command is framed or the peer goes away. The lock is
    /// held from the store update until the last replayed byte is written, so
    /// a client always sees its own command and never an interleaved write.
    pub async fn handle<S>(&self, stream: &mut S) -> Result<Outcome>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut framer = CommandFramer::new();
        let mut buf = vec![0u8; self.buffer_size];

        loop {
            let n = match stream.read(&mut buf).await {
                Ok(0) => {
                    if !framer.is_empty() {
                        debug!("Dropping {} unterminated bytes", framer.pending_len());
                    }
                    return Ok(Outcome::Disconnected);
                }
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(CmdLogError::Connection(format!("read failed: {}", e)));
                }
            };

            if self.shared_accumulator {
                let mut state = self.state.lock().await;
                let shared = state.shared_pending.get_or_insert_with(CommandFramer::new);
                if let Some(framed) = shared.feed(&buf[..n])? {
                    // Only a partial command carries over to the next
                    // connection, never the tail of this one's read.
                    if !shared.is_empty() {
                        let dropped = shared.take_pending();
                        debug!("Ignoring {} bytes after the command", dropped.len());
                    }
                    return self.dispatch(framed, &mut state, stream).await;
                }
            } else if let Some(framed) = framer.feed(&buf[..n])? {
                if !framer.is_empty() {
                    debug!("Ignoring {} bytes after the command", framer.pending_len());
                }
                let mut state = self.state.lock().await;
                return self.dispatch(framed, &mut state, stream).await;
            }
        }
    }

    async fn dispatch<W>(&self, framed: Bytes, state: &mut LogState, out: &mut W) -> Result<Outcome>
    where
        W: AsyncWrite + Unpin,
    {
        match Command::parse(framed)? {
            Command::Append(data) => {
                state.backend.append(&data).await?;
                debug!(
                    "Appended {} bytes, replaying {} entries",
                    data.len(),
                    state.backend.len()
                );
                let replayed = replay(&mut state.backend, 0, self.buffer_size, out).await?;
                Ok(Outcome::Appended { replayed })
            }
            Command::SeekTo { index, offset } => {
                let from = state.backend.seek_to(index as usize, offset as usize)?;
                debug!("Seek to entry {} offset {} resolved to {}", index, offset, from);
                let replayed = replay(&mut state.backend, from, self.buffer_size, out).await?;
                Ok(Outcome::Echoed { from, replayed })
            }
        }
    }
}

/// Stream the history from `from` to the end, one entry slice at a time
pub async fn replay<W>(backend: &mut Backend, from: u64, chunk: usize, out: &mut W) -> Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut offset = from;
    loop {
        let bytes = backend.read_range(offset, chunk).await?;
        if bytes.is_empty() {
            break;
        }
        write_chunk(out, &bytes).await?;
        offset += bytes.len() as u64;
    }

    out.flush()
        .await
        .map_err(|e| CmdLogError::Connection(format!("flush failed: {}", e)))?;
    Ok(offset - from)
}

// Interrupted writes are retried; anything else abandons the connection.
async fn write_chunk<W>(out: &mut W, mut buf: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while !buf.is_empty() {
        match out.write(buf).await {
            Ok(0) => {
                return Err(CmdLogError::Connection(
                    "peer stopped accepting replay data".to_string(),
                ));
            }
            Ok(n) => buf = &buf[n..],
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(CmdLogError::Connection(format!("write failed: {}", e))),
        }
    }
    Ok(())
}
