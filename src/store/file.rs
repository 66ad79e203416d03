//! Plain-file backend: an unbounded append-only log on disk

use crate::{CmdLogError, Result};
use bytes::Bytes;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::debug;

/// Append-only command log kept in a regular file.
///
/// The file is recreated empty on open and removed on [`FileStore::remove`].
/// Entry end offsets are indexed in memory so offsets resolve exactly as they
/// do for the ring, but no entry is ever evicted.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    file: File,
    // Cumulative end offset of each entry, ascending
    ends: Vec<u64>,
}

impl FileStore {
    /// Create (or truncate) the backing file at `path`
    pub async fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .await
            .map_err(|e| {
                CmdLogError::Setup(format!("Failed to open {}: {}", path.display(), e))
            })?;

        debug!("Recreated backing file {}", path.display());
        Ok(Self {
            path,
            file,
            ends: Vec::new(),
        })
    }

    /// Location of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.ends.len()
    }

    /// Whether nothing has been stored yet
    pub fn is_empty(&self) -> bool {
        self.ends.is_empty()
    }

    /// Size of the whole log in bytes
    pub fn total_size(&self) -> u64 {
        self.ends.last().copied().unwrap_or(0)
    }

    fn start_of(&self, index: usize) -> u64 {
        match index {
            0 => 0,
            i => self.ends[i - 1],
        }
    }

    /// Append one entry at the end of the file
    pub async fn append(&mut self, data: &[u8]) -> Result<()> {
        self.ends
            .try_reserve(1)
            .map_err(|_| CmdLogError::OutOfMemory(data.len()))?;

        self.file.seek(SeekFrom::End(0)).await?;
        self.file.write_all(data).await?;
        self.file.flush().await?;

        let end = self.total_size() + data.len() as u64;
        self.ends.push(end);
        Ok(())
    }

    /// Index of the entry containing `global_offset` and the offset inside it
    pub fn find_entry_for_offset(&self, global_offset: u64) -> Result<(usize, usize)> {
        let index = self.ends.partition_point(|&end| end <= global_offset);
        if index == self.ends.len() {
            return Err(CmdLogError::NotFound(global_offset));
        }
        Ok((index, (global_offset - self.start_of(index)) as usize))
    }

    /// Bytes from `global_offset` up to the end of its entry, at most `max_len`.
    ///
    /// Empty at or past the end of the log.
    pub async fn read_range(&mut self, global_offset: u64, max_len: usize) -> Result<Bytes> {
        let (index, _) = match self.find_entry_for_offset(global_offset) {
            Ok(found) => found,
            Err(_) => return Ok(Bytes::new()),
        };

        let remaining = (self.ends[index] - global_offset) as usize;
        let len = remaining.min(max_len);

        let mut buf = Vec::new();
        buf.try_reserve_exact(len)
            .map_err(|_| CmdLogError::OutOfMemory(len))?;
        buf.resize(len, 0);

        self.file.seek(SeekFrom::Start(global_offset)).await?;
        self.file.read_exact(&mut buf).await?;
        Ok(Bytes::from(buf))
    }

    /// Translate (`index`, `intra_offset`) into a global offset
    pub fn seek_to(&self, index: usize, intra_offset: usize) -> Result<u64> {
        let end = *self.ends.get(index).ok_or_else(|| {
            CmdLogError::InvalidArgument(format!(
                "entry index {} out of range ({} stored)",
                index,
                self.ends.len()
            ))
        })?;

        let start = self.start_of(index);
        let size = end - start;
        if intra_offset as u64 > size {
            return Err(CmdLogError::InvalidArgument(format!(
                "offset {} beyond entry {} of {} bytes",
                intra_offset, index, size
            )));
        }

        Ok(start + intra_offset as u64)
    }

    /// Delete the backing file
    pub async fn remove(&mut self) -> Result<()> {
        self.ends.clear();
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!("Removed backing file {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_create_truncates_existing_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("data");
        std::fs::write(&path, "stale contents\n").unwrap();

        let store = FileStore::create(&path).await.unwrap();
        assert!(store.is_empty());
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_append_is_unbounded() {
        let temp_dir = tempdir().unwrap();
        let mut store = FileStore::create(temp_dir.path().join("data")).await.unwrap();

        for i in 0..50 {
            store.append(format!("cmd {}\n", i).as_bytes()).await.unwrap();
        }

        assert_eq!(store.len(), 50);
        let content = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(content.lines().count(), 50);
        assert_eq!(store.total_size(), content.len() as u64);
    }

    #[tokio::test]
    async fn test_read_range_and_seek() {
        let temp_dir = tempdir().unwrap();
        let mut store = FileStore::create(temp_dir.path().join("data")).await.unwrap();
        store.append(b"abc\n").await.unwrap();
        store.append(b"de\n").await.unwrap();

        assert_eq!(store.read_range(0, 100).await.unwrap().as_ref(), b"abc\n");
        assert_eq!(store.read_range(5, 100).await.unwrap().as_ref(), b"e\n");
        assert_eq!(store.read_range(1, 2).await.unwrap().as_ref(), b"bc");
        assert!(store.read_range(7, 100).await.unwrap().is_empty());

        assert_eq!(store.seek_to(1, 0).unwrap(), 4);
        assert_eq!(store.seek_to(0, 4).unwrap(), 4);
        assert!(matches!(store.seek_to(0, 5), Err(CmdLogError::InvalidArgument(_))));
        assert!(matches!(store.seek_to(2, 0), Err(CmdLogError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_offsets_resolve_across_many_entries() {
        let temp_dir = tempdir().unwrap();
        let mut store = FileStore::create(temp_dir.path().join("data")).await.unwrap();

        let mut starts = Vec::new();
        let mut expected = Vec::new();
        for i in 0..5000 {
            let cmd = format!("command {}\n", i);
            starts.push(store.total_size());
            expected.push(cmd.len());
            store.append(cmd.as_bytes()).await.unwrap();
        }

        for index in [0usize, 1, 9, 10, 999, 4321, 4999] {
            let start = starts[index];
            assert_eq!(store.find_entry_for_offset(start).unwrap(), (index, 0));
            let last = start + expected[index] as u64 - 1;
            assert_eq!(
                store.find_entry_for_offset(last).unwrap(),
                (index, expected[index] - 1)
            );
            assert_eq!(store.seek_to(index, 2).unwrap(), start + 2);
        }

        let total = store.total_size();
        assert!(matches!(
            store.find_entry_for_offset(total),
            Err(CmdLogError::NotFound(_))
        ));
        assert_eq!(
            store.read_range(starts[4321], 100).await.unwrap().as_ref(),
            b"command 4321\n"
        );
    }

    #[tokio::test]
    async fn test_remove_deletes_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("data");
        let mut store = FileStore::create(&path).await.unwrap();
        store.append(b"x\n").await.unwrap();

        store.remove().await.unwrap();
        assert!(!path.exists());
        // Removing twice is not an error.
        store.remove().await.unwrap();
    }
}
