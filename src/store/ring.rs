//! Fixed-capacity circular store of the most recent commands

use crate::types::Entry;
use crate::{CmdLogError, Result};
use bytes::Bytes;

/// Default number of retained commands
pub const DEFAULT_CAPACITY: usize = 10;

/// Circular array of `capacity` entry slots with FIFO eviction.
///
/// The retained entries form one logical byte stream, oldest first. Offsets
/// into that stream ("global offsets") are resolved by walking the live
/// entries, so nothing is ever flattened into contiguous storage.
#[derive(Debug)]
pub struct RingStore {
    slots: Box<[Option<Entry>]>,
    write_index: usize,
    count: usize,
}

impl RingStore {
    /// Create an empty ring holding at most `capacity` entries
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(CmdLogError::InvalidArgument(
                "ring capacity must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            slots: (0..capacity).map(|_| None).collect(),
            write_index: 0,
            count: 0,
        })
    }

    /// Maximum number of retained entries
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.count
    }

    /// Whether the ring holds no entries
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Whether the next append evicts the oldest entry
    pub fn is_full(&self) -> bool {
        self.count == self.capacity()
    }

    /// Copy `data` into a new entry at the head of the ring.
    ///
    /// When the ring is full the oldest entry occupies the write slot and is
    /// dropped first. On allocation failure the ring is left untouched.
    pub fn append(&mut self, data: &[u8]) -> Result<&Entry> {
        let entry = Entry::copy_from_slice(data)?;
        Ok(self.push(entry))
    }

    /// Store an already built entry, evicting the oldest one when full
    pub fn push(&mut self, entry: Entry) -> &Entry {
        let capacity = self.capacity();
        let slot = self.write_index;

        self.write_index = (slot + 1) % capacity;
        self.count = (self.count + 1).min(capacity);

        // Replacing the slot drops the evicted entry.
        self.slots[slot].insert(entry)
    }

    /// Sum of the sizes of all live entries
    pub fn total_size(&self) -> u64 {
        self.iter().map(|entry| entry.len() as u64).sum()
    }

    /// Entry at `retained_index`, counting from the oldest (0-based)
    pub fn get(&self, retained_index: usize) -> Option<&Entry> {
        if retained_index >= self.count {
            return None;
        }
        self.slots[self.physical_index(retained_index)].as_ref()
    }

    /// Live entries, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &Entry> + '_ {
        (0..self.count).filter_map(move |i| self.slots[self.physical_index(i)].as_ref())
    }

    /// Locate the entry containing `global_offset` and the offset inside it
    pub fn find_entry_for_offset(&self, global_offset: u64) -> Result<(&Entry, usize)> {
        let mut start = 0u64;
        for entry in self.iter() {
            let end = start + entry.len() as u64;
            if global_offset < end {
                return Ok((entry, (global_offset - start) as usize));
            }
            start = end;
        }
        Err(CmdLogError::NotFound(global_offset))
    }

    /// Bytes starting at `global_offset`, clipped to the end of the entry that
    /// contains it and to `max_len`.
    ///
    /// Returns an empty buffer at or past the end of the history. Callers
    /// loop, advancing the offset, to assemble a full dump.
    pub fn read_range(&self, global_offset: u64, max_len: usize) -> Bytes {
        match self.find_entry_for_offset(global_offset) {
            Ok((entry, intra)) => {
                let end = entry.len().min(intra.saturating_add(max_len));
                entry.data().slice(intra..end)
            }
            Err(_) => Bytes::new(),
        }
    }

    /// Translate (`retained_index`, `intra_offset`) into a global offset.
    ///
    /// `intra_offset` may equal the entry size, which addresses the first
    /// byte of the following entry.
    pub fn seek_to(&self, retained_index: usize, intra_offset: usize) -> Result<u64> {
        if retained_index >= self.count {
            return Err(CmdLogError::InvalidArgument(format!(
                "entry index {} out of range ({} retained)",
                retained_index, self.count
            )));
        }

        let mut global = 0u64;
        for (i, entry) in self.iter().enumerate() {
            if i == retained_index {
                if intra_offset > entry.len() {
                    return Err(CmdLogError::InvalidArgument(format!(
                        "offset {} beyond entry {} of {} bytes",
                        intra_offset,
                        retained_index,
                        entry.len()
                    )));
                }
                return Ok(global + intra_offset as u64);
            }
            global += entry.len() as u64;
        }

        Err(CmdLogError::InvalidArgument(format!(
            "entry index {} out of range",
            retained_index
        )))
    }

    /// Drop every entry and reset the ring to empty
    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
        self.write_index = 0;
        self.count = 0;
    }

    // Slot holding the entry `retained_index` positions after the oldest.
    fn physical_index(&self, retained_index: usize) -> usize {
        let capacity = self.capacity();
        let oldest = (self.write_index + capacity - self.count) % capacity;
        (oldest + retained_index) % capacity
    }
}
