//! Classification of framed commands

use crate::{CmdLogError, Result};
use bytes::Bytes;

/// Prefix of the seek directive
pub const SEEK_PREFIX: &[u8] = b"SEEKTO:";

/// A framed client request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Store the bytes (terminator included) and replay the whole history
    Append(Bytes),
    /// Replay from byte `offset` of retained entry `index` to the end
    SeekTo {
        /// Retained entry, counted from the oldest
        index: u32,
        /// Byte offset inside that entry
        offset: u32,
    },
}

impl Command {
    /// Classify one framed command.
    ///
    /// Anything not starting with `SEEKTO:` is appended verbatim. A directive
    /// whose arguments are not `<u32>,<u32>` is rejected as malformed.
    pub fn parse(framed: Bytes) -> Result<Self> {
        if !framed.starts_with(SEEK_PREFIX) {
            return Ok(Command::Append(framed));
        }

        let args = std::str::from_utf8(&framed[SEEK_PREFIX.len()..])
            .map_err(|_| malformed(&framed))?
            .trim_end_matches('\n')
            .trim_end_matches('\r');

        let (index, offset) = args.split_once(',').ok_or_else(|| malformed(&framed))?;
        let index = index.trim().parse().map_err(|_| malformed(&framed))?;
        let offset = offset.trim().parse().map_err(|_| malformed(&framed))?;

        Ok(Command::SeekTo { index, offset })
    }

    /// Wire form of the request, terminator included
    pub fn encode(&self) -> Bytes {
        match self {
            Command::Append(data) => data.clone(),
            Command::SeekTo { index, offset } => {
                Bytes::from(format!("SEEKTO:{},{}\n", index, offset))
            }
        }
    }
}

fn malformed(framed: &[u8]) -> CmdLogError {
    CmdLogError::Connection(format!(
        "malformed seek directive: {:?}",
        String::from_utf8_lossy(framed).trim_end()
    ))
}
