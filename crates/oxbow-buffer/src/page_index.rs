//! Page-identity index mapping (file, page number) to a frame.

use crate::frame::FrameId;
use oxbow_common::{file_addr, FileRef, PageNo};

/// Index key: file identity plus page number.
///
/// File identity is the address of the caller's shared file allocation; the
/// index never holds a reference of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct PageKey {
    file: usize,
    page_no: PageNo,
}

impl PageKey {
    pub fn new(file: &FileRef, page_no: PageNo) -> Self {
        Self {
            file: file_addr(file),
            page_no,
        }
    }
}

struct IndexEntry {
    key: PageKey,
    frame_id: FrameId,
}

/// Chained hash table from [`PageKey`] to [`FrameId`].
///
/// The bucket count is fixed at construction to roughly 1.2x the frame count
/// so probe chains stay short independent of pool occupancy. Misses are a
/// value, not an error: `lookup` and `remove` return `None` for an absent
/// key.
pub(crate) struct PageIndex {
    buckets: Vec<Vec<IndexEntry>>,
}

impl PageIndex {
    /// Creates an index sized for a pool of `num_frames` frames.
    pub fn with_capacity(num_frames: usize) -> Self {
        let bucket_count = num_frames * 6 / 5 + 1;
        let mut buckets = Vec::with_capacity(bucket_count);
        buckets.resize_with(bucket_count, Vec::new);
        Self { buckets }
    }

    #[inline]
    fn bucket_of(&self, key: &PageKey) -> usize {
        let mixed = (key.file as u64).rotate_left(17) ^ u64::from(key.page_no);
        let hash = mixed.wrapping_mul(0x517cc1b727220a95);
        (hash % self.buckets.len() as u64) as usize
    }

    /// Inserts a mapping. Returns false if the key is already present.
    pub fn insert(&mut self, key: PageKey, frame_id: FrameId) -> bool {
        let bucket = self.bucket_of(&key);
        let chain = &mut self.buckets[bucket];
        if chain.iter().any(|e| e.key == key) {
            return false;
        }
        chain.push(IndexEntry { key, frame_id });
        true
    }

    /// Looks up a key and returns its frame ID if present.
    pub fn lookup(&self, key: &PageKey) -> Option<FrameId> {
        let bucket = self.bucket_of(key);
        self.buckets[bucket]
            .iter()
            .find(|e| e.key == *key)
            .map(|e| e.frame_id)
    }

    /// Removes a mapping. Returns the frame ID if the key was present.
    pub fn remove(&mut self, key: &PageKey) -> Option<FrameId> {
        let bucket = self.bucket_of(key);
        let chain = &mut self.buckets[bucket];
        let pos = chain.iter().position(|e| e.key == *key)?;
        Some(chain.swap_remove(pos).frame_id)
    }

    /// Returns the number of entries in the index.
    pub fn len(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }
}
