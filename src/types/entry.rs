//! Stored command records

use crate::{CmdLogError, Result};
use bytes::Bytes;
use chrono::{DateTime, TimeZone};
use std::fmt;

/// One retained command, stored exactly as received including its terminator.
///
/// Entries are immutable; cloning one only bumps a reference count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    data: Bytes,
}

impl Entry {
    /// Copy `data` into a freshly allocated entry.
    ///
    /// Allocation is fallible so an oversized command surfaces as
    /// [`CmdLogError::OutOfMemory`] instead of aborting the process.
    pub fn copy_from_slice(data: &[u8]) -> Result<Self> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(data.len())
            .map_err(|_| CmdLogError::OutOfMemory(data.len()))?;
        buf.extend_from_slice(data);
        Ok(Self { data: Bytes::from(buf) })
    }

    /// Heartbeat record in the form `timestamp:<RFC 2822 time>\n`
    pub fn timestamp<Tz>(now: &DateTime<Tz>) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        let line = format!("timestamp:{}\n", now.format("%a, %d %b %Y %H:%M:%S %z"));
        Self::from(Bytes::from(line))
    }

    /// Raw bytes of the entry
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Size of the entry in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the entry holds no bytes
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<Bytes> for Entry {
    fn from(data: Bytes) -> Self {
        Self { data }
    }
}

impl From<&'static [u8]> for Entry {
    fn from(data: &'static [u8]) -> Self {
        Self { data: Bytes::from_static(data) }
    }
}

impl AsRef<[u8]> for Entry {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.data))
    }
}
