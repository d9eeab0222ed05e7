//! Bounded least-recently-used cache of materialized chunk arrays.
//!
//! Values are [`VoxelData`] handles. A hit hands back the same allocation
//! every time, so callers that want to mutate a chunk must hold the only
//! handle (see [`std::sync::Arc::get_mut`]) or copy it first.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;

/// Owned, shareable voxel array of one chunk (`chunk_size³` ids).
pub type VoxelData = Arc<[u16]>;

/// LRU cache keyed by [`chunk_key`](crate::format::chunk_key).
///
/// A capacity of 0 disables the cache: inserts are dropped and every lookup
/// misses.
pub struct ChunkCache {
    entries: Option<LruCache<u64, VoxelData>>,
}

impl ChunkCache {
    /// Creates a cache holding at most `capacity` chunks.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: NonZeroUsize::new(capacity).map(LruCache::new),
        }
    }

    /// Maximum number of retained chunks.
    pub fn capacity(&self) -> usize {
        self.entries.as_ref().map_or(0, |c| c.cap().get())
    }

    /// Number of retained chunks.
    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, LruCache::len)
    }

    /// Returns true if nothing is retained.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Looks up a chunk and marks it most recently used.
    pub fn get(&mut self, key: u64) -> Option<VoxelData> {
        self.entries.as_mut()?.get(&key).cloned()
    }

    /// Returns true if the chunk is retained, without touching its recency.
    pub fn contains(&self, key: u64) -> bool {
        self.entries.as_ref().is_some_and(|c| c.contains(&key))
    }

    /// Inserts a chunk as most recently used.
    ///
    /// When the cache is full the least recently used chunk is evicted first
    /// and its key returned.
    pub fn insert(&mut self, key: u64, data: VoxelData) -> Option<u64> {
        let entries = self.entries.as_mut()?;
        match entries.push(key, data) {
            Some((evicted, _)) if evicted != key => {
                tracing::trace!(key = evicted, "evicted chunk from cache");
                Some(evicted)
            }
            _ => None,
        }
    }

    /// Changes the capacity, evicting least recently used chunks if it shrinks.
    pub fn set_capacity(&mut self, capacity: usize) {
        match (NonZeroUsize::new(capacity), self.entries.as_mut()) {
            (None, _) => self.entries = None,
            (Some(cap), Some(entries)) => entries.resize(cap),
            (Some(cap), None) => self.entries = Some(LruCache::new(cap)),
        }
    }

    /// Raises the capacity to `capacity` if it is currently smaller.
    pub fn grow_to(&mut self, capacity: usize) {
        if capacity > self.capacity() {
            self.set_capacity(capacity);
        }
    }

    /// Keys ordered from least to most recently used.
    pub fn keys_by_recency(&self) -> Vec<u64> {
        let Some(entries) = self.entries.as_ref() else {
            return Vec::new();
        };
        let mut keys: Vec<u64> = entries.iter().map(|(k, _)| *k).collect();
        keys.reverse();
        keys
    }

    /// Drops every retained chunk, keeping the capacity.
    pub fn clear(&mut self) {
        if let Some(entries) = self.entries.as_mut() {
            entries.clear();
        }
    }
}

impl std::fmt::Debug for ChunkCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkCache")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
