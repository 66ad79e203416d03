//! Storage backends for the command log
//!
//! Both backends expose the history as one byte stream addressed by global
//! offsets. [`Backend`] selects between them from configuration.

pub mod file;
pub mod ring;

use crate::config::{BackendKind, StorageSettings};
use crate::types::Entry;
use crate::Result;
use bytes::Bytes;
use tracing::info;

pub use file::FileStore;
pub use ring::RingStore;

/// The storage interface used by the server
#[derive(Debug)]
pub enum Backend {
    /// Bounded in-memory ring; the oldest command is evicted when full
    Ring(RingStore),
    /// Unbounded plain file, recreated at start and deleted at teardown
    File(FileStore),
}

impl Backend {
    /// Open the backend described by `settings`
    pub async fn open(settings: &StorageSettings) -> Result<Self> {
        let backend = match settings.backend {
            BackendKind::Ring => Backend::Ring(RingStore::new(settings.capacity)?),
            BackendKind::File => Backend::File(FileStore::create(&settings.file_path).await?),
        };
        info!("Opened {} backend", backend.kind());
        Ok(backend)
    }

    /// Which implementation is active
    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::Ring(_) => BackendKind::Ring,
            Backend::File(_) => BackendKind::File,
        }
    }

    /// Append one command (terminator included)
    pub async fn append(&mut self, data: &[u8]) -> Result<()> {
        match self {
            Backend::Ring(ring) => ring.append(data).map(|_| ()),
            Backend::File(file) => file.append(data).await,
        }
    }

    /// Append a prebuilt entry such as a heartbeat timestamp
    pub async fn append_entry(&mut self, entry: Entry) -> Result<()> {
        match self {
            Backend::Ring(ring) => {
                ring.push(entry);
                Ok(())
            }
            Backend::File(file) => file.append(entry.data()).await,
        }
    }

    /// Number of retained entries
    pub fn len(&self) -> usize {
        match self {
            Backend::Ring(ring) => ring.len(),
            Backend::File(file) => file.len(),
        }
    }

    /// Whether nothing is retained
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size of the retained history in bytes
    pub fn total_size(&self) -> u64 {
        match self {
            Backend::Ring(ring) => ring.total_size(),
            Backend::File(file) => file.total_size(),
        }
    }

    /// Bytes from one entry starting at `global_offset`, at most `max_len`
    pub async fn read_range(&mut self, global_offset: u64, max_len: usize) -> Result<Bytes> {
        match self {
            Backend::Ring(ring) => Ok(ring.read_range(global_offset, max_len)),
            Backend::File(file) => file.read_range(global_offset, max_len).await,
        }
    }

    /// Resolve (`retained_index`, `intra_offset`) to a global offset
    pub fn seek_to(&self, retained_index: usize, intra_offset: usize) -> Result<u64> {
        match self {
            Backend::Ring(ring) => ring.seek_to(retained_index, intra_offset),
            Backend::File(file) => file.seek_to(retained_index, intra_offset),
        }
    }

    /// Release every entry; the file backend also deletes its file
    pub async fn teardown(&mut self) -> Result<()> {
        match self {
            Backend::Ring(ring) => {
                ring.clear();
                Ok(())
            }
            Backend::File(file) => file.remove().await,
        }
    }
}
