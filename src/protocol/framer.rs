//! Newline framing for raw connection bytes

use crate::{CmdLogError, Result};
use bytes::{Bytes, BytesMut};
use tokio_util::codec::Decoder;

/// Command terminator
pub const TERMINATOR: u8 = b'\n';

const INITIAL_CAPACITY: usize = 1024;

/// Accumulates bytes until a full newline-terminated command is available.
///
/// Reads may split a command anywhere; the partial command stays pending
/// across calls to [`CommandFramer::feed`]. Storage grows by doubling and an
/// allocation failure is reported as [`CmdLogError::OutOfMemory`].
#[derive(Debug, Default)]
pub struct CommandFramer {
    pending: Vec<u8>,
    // Prefix of `pending` already known to hold no terminator
    scanned: usize,
}

impl CommandFramer {
    /// Create an empty framer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `chunk` and return the first complete command, if any.
    ///
    /// The command includes its terminator. Bytes after the terminator stay
    /// pending as the start of the next command.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Option<Bytes>> {
        self.grow(chunk.len())?;
        self.pending.extend_from_slice(chunk);
        Ok(self.next_command())
    }

    /// Split off a complete command that is already buffered
    pub fn next_command(&mut self) -> Option<Bytes> {
        let found = self.pending[self.scanned..]
            .iter()
            .position(|&b| b == TERMINATOR);
        let Some(at) = found else {
            self.scanned = self.pending.len();
            return None;
        };

        let end = self.scanned + at + 1;
        let rest = self.pending.split_off(end);
        let command = std::mem::replace(&mut self.pending, rest);
        self.scanned = 0;
        Some(Bytes::from(command))
    }

    /// Number of bytes waiting for a terminator
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no partial command is pending
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Take whatever is pending, leaving the framer empty
    pub fn take_pending(&mut self) -> Bytes {
        self.scanned = 0;
        Bytes::from(std::mem::take(&mut self.pending))
    }

    fn grow(&mut self, additional: usize) -> Result<()> {
        let needed = self
            .pending
            .len()
            .checked_add(additional)
            .ok_or(CmdLogError::OutOfMemory(usize::MAX))?;
        if needed <= self.pending.capacity() {
            return Ok(());
        }

        let target = needed
            .max(self.pending.capacity().saturating_mul(2))
            .max(INITIAL_CAPACITY);
        self.pending
            .try_reserve_exact(target - self.pending.len())
            .map_err(|_| CmdLogError::OutOfMemory(target))
    }
}

/// Splits a replayed history back into records on the client side.
impl Decoder for CommandFramer {
    type Item = Bytes;
    type Error = CmdLogError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        if src.is_empty() {
            return Ok(self.next_command());
        }
        // Take at most one record out of `src` so the rest is never copied
        // through `pending`.
        let take = match src.iter().position(|&b| b == TERMINATOR) {
            Some(at) => at + 1,
            None => src.len(),
        };
        let chunk = src.split_to(take);
        self.feed(&chunk)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        if let Some(command) = self.decode(src)? {
            return Ok(Some(command));
        }
        if self.is_empty() {
            Ok(None)
        } else {
            // A seek can start mid-record, but the tail is always complete;
            // only a truncated stream ends without a terminator.
            Ok(Some(self.take_pending()))
        }
    }
}
