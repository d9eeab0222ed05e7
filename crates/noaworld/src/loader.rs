//! World loader: validates a `.noaworld` container, indexes its chunks, and
//! serves chunk arrays through an LRU cache.
//!
//! The raw container can be dropped with [`WorldLoader::release_buffer`]
//! once every non-uniform chunk has been copied into the cache. After that,
//! uniform chunks are still materialized on demand and cached chunks are
//! still served; everything else is gone for good.

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::{ChunkCache, VoxelData};
use crate::format::{
    ChunkBounds, ChunkCoord, ChunkIndexEntry, ENTRY_SIZE, FormatError, HEADER_SIZE, WorldHeader,
    crc32, read_voxels,
};
use crate::source::{CancelToken, ChunkRequest, GeneratedChunk};
use crate::view::ChunkView;

/// Default number of chunks kept in the cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// Failure while loading a container.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The container layout is invalid.
    #[error("invalid world container: {0}")]
    Format(#[from] FormatError),
    /// The data section does not match the stored checksum.
    #[error("world data is corrupt: stored checksum {stored:#010x}, computed {computed:#010x}")]
    Integrity {
        /// Checksum recorded in the header.
        stored: u32,
        /// Checksum of the bytes actually present.
        computed: u32,
    },
    /// Reading the container failed.
    #[error("failed to read world: {0}")]
    Io(#[source] std::io::Error),
    /// The server answered with a non-success status.
    #[error("fetching {url} failed with HTTP status {status}")]
    Http {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },
    /// The request never produced a response.
    #[error("fetching {url} failed: {message}")]
    Transport {
        /// Requested URL.
        url: String,
        /// Transport error description.
        message: String,
    },
}

/// Lifecycle of a [`WorldLoader`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum LoaderState {
    /// Nothing loaded.
    Unloaded,
    /// Container loaded, raw buffer present.
    Loaded,
    /// Container loaded, raw buffer released.
    Released,
}

/// Summary of the loaded world.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct WorldStats {
    /// Index entries.
    pub total_chunks: usize,
    /// Chunks stored as a fill id.
    pub uniform_chunks: usize,
    /// Chunks stored in the data section.
    pub non_uniform_chunks: usize,
    /// Header + index + data section bytes.
    pub estimated_bytes: usize,
}

/// Reads chunks out of a baked world.
///
/// Single-threaded: every access goes through `&mut self`.
pub struct WorldLoader {
    buffer: Option<Vec<u8>>,
    header: Option<WorldHeader>,
    index: FxHashMap<u64, ChunkIndexEntry>,
    data_start: usize,
    cache: ChunkCache,
}

impl WorldLoader {
    /// Creates an unloaded loader whose cache holds `cache_capacity` chunks.
    pub fn new(cache_capacity: usize) -> Self {
        Self {
            buffer: None,
            header: None,
            index: FxHashMap::default(),
            data_start: 0,
            cache: ChunkCache::new(cache_capacity),
        }
    }

    /// Parses, validates and indexes `buffer`.
    ///
    /// Any previously loaded world is discarded first, so a failed load
    /// leaves the loader [`Unloaded`](LoaderState::Unloaded).
    pub fn load_from_buffer(&mut self, buffer: Vec<u8>) -> Result<(), LoadError> {
        self.dispose();

        let header = WorldHeader::decode(&buffer)?;
        let data_start = header.data_start();
        if buffer.len() < data_start {
            return Err(FormatError::Truncated {
                expected: data_start,
                actual: buffer.len(),
            }
            .into());
        }

        let data_len = buffer.len() - data_start;
        let chunk_bytes = header.chunk_bytes();
        let mut index = FxHashMap::default();
        index.reserve(header.chunk_count as usize);

        for record in buffer[HEADER_SIZE..data_start].chunks_exact(ENTRY_SIZE) {
            let entry = ChunkIndexEntry::decode(record)?;
            if !entry.is_uniform() && entry.data_offset as usize + chunk_bytes > data_len {
                return Err(FormatError::EntryOutOfRange {
                    x: entry.x,
                    y: entry.y,
                    z: entry.z,
                    offset: entry.data_offset,
                    data_len,
                }
                .into());
            }
            if index.insert(entry.key(), entry).is_some() {
                return Err(FormatError::DuplicateChunk {
                    x: entry.x,
                    y: entry.y,
                    z: entry.z,
                }
                .into());
            }
        }

        let computed = crc32(&buffer[data_start..]);
        if computed != header.checksum {
            return Err(LoadError::Integrity {
                stored: header.checksum,
                computed,
            });
        }

        info!(
            chunks = header.chunk_count,
            chunk_size = header.chunk_size,
            bytes = buffer.len(),
            "loaded world"
        );
        self.header = Some(header);
        self.index = index;
        self.data_start = data_start;
        self.buffer = Some(buffer);
        Ok(())
    }

    /// Reads a container from disk and loads it.
    pub fn load_from_path(&mut self, path: &Path) -> Result<(), LoadError> {
        let bytes = std::fs::read(path).map_err(LoadError::Io)?;
        debug!(path = %path.display(), bytes = bytes.len(), "read world file");
        self.load_from_buffer(bytes)
    }

    /// Fetches a container over HTTP and loads it.
    pub fn load_from_url(&mut self, url: &str) -> Result<(), LoadError> {
        let response = ureq::get(url).call().map_err(|e| match e {
            ureq::Error::Status(status, _) => LoadError::Http {
                url: url.to_string(),
                status,
            },
            ureq::Error::Transport(t) => LoadError::Transport {
                url: url.to_string(),
                message: t.to_string(),
            },
        })?;

        let mut bytes = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut bytes)
            .map_err(LoadError::Io)?;
        debug!(url, bytes = bytes.len(), "fetched world");
        self.load_from_buffer(bytes)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LoaderState {
        match (&self.header, &self.buffer) {
            (None, _) => LoaderState::Unloaded,
            (Some(_), Some(_)) => LoaderState::Loaded,
            (Some(_), None) => LoaderState::Released,
        }
    }

    /// Header of the loaded world.
    pub fn header(&self) -> Option<&WorldHeader> {
        self.header.as_ref()
    }

    /// Inclusive chunk bounds of the loaded world.
    pub fn world_bounds(&self) -> Option<ChunkBounds> {
        self.header.map(|h| h.bounds)
    }

    /// Chunk edge length of the loaded world.
    pub fn chunk_size(&self) -> Option<u16> {
        self.header.map(|h| h.chunk_size)
    }

    /// Current cache capacity.
    pub fn cache_capacity(&self) -> usize {
        self.cache.capacity()
    }

    /// Number of chunks currently cached.
    pub fn cached_chunks(&self) -> usize {
        self.cache.len()
    }

    /// Changes the cache capacity. Shrinking evicts least recently used chunks.
    pub fn set_cache_capacity(&mut self, capacity: usize) {
        self.cache.set_capacity(capacity);
    }

    /// Returns true if the index has an entry for the chunk.
    pub fn has_chunk(&self, x: i32, y: i32, z: i32) -> bool {
        ChunkCoord::try_from_i32(x, y, z).is_some_and(|c| self.index.contains_key(&c.key()))
    }

    /// Returns true if the chunk is currently cached.
    pub fn is_cached(&self, x: i32, y: i32, z: i32) -> bool {
        ChunkCoord::try_from_i32(x, y, z).is_some_and(|c| self.cache.contains(c.key()))
    }

    /// Voxels of a chunk, or `None` if it is not in the world.
    ///
    /// Repeated calls for a cached chunk return the same allocation.
    /// After [`release_buffer`](Self::release_buffer) the cache only shrinks:
    /// uniform chunks are rebuilt on every miss without being inserted, and a
    /// non-uniform chunk that is no longer cached yields `None`.
    pub fn get_chunk(&mut self, x: i32, y: i32, z: i32) -> Option<VoxelData> {
        let key = ChunkCoord::try_from_i32(x, y, z)?.key();
        let entry = *self.index.get(&key)?;

        if let Some(hit) = self.cache.get(key) {
            return Some(hit);
        }

        let volume = self.header?.chunk_volume();
        let data: VoxelData = if entry.is_uniform() {
            Arc::from(vec![entry.fill_block_id; volume])
        } else {
            let Some(buffer) = self.buffer.as_ref() else {
                warn!(x, y, z, "chunk requested after buffer release and was never cached");
                return None;
            };
            let start = self.data_start + entry.data_offset as usize;
            let end = start + volume * 2;
            Arc::from(read_voxels(&buffer[start..end]))
        };

        // Once released, the cache holds the only copy of every stored chunk.
        if self.buffer.is_some() {
            self.cache.insert(key, Arc::clone(&data));
        }
        Some(data)
    }

    /// [`get_chunk`](Self::get_chunk) wrapped in a `[size, size, size]` view.
    pub fn get_chunk_view(&mut self, x: i32, y: i32, z: i32) -> Option<ChunkView> {
        let size = self.chunk_size()? as usize;
        ChunkView::new(self.get_chunk(x, y, z)?, size)
    }

    /// Returns a chunk source for a streaming dispatcher.
    ///
    /// The closure checks `cancel` once on entry, maps the world position to
    /// a chunk by floor division, and returns `None` for chunks that are not
    /// baked (or whose size does not match), so the dispatcher can fall back
    /// to procedural generation.
    pub fn create_chunk_generator(
        &mut self,
    ) -> impl FnMut(ChunkRequest, &CancelToken) -> Option<GeneratedChunk> + '_ {
        move |request: ChunkRequest, cancel: &CancelToken| {
            if cancel.is_cancelled() {
                return None;
            }
            let chunk_size = self.chunk_size()?;
            if request.size != chunk_size {
                debug!(
                    requested = request.size,
                    baked = chunk_size,
                    "chunk size mismatch, deferring to fallback"
                );
                return None;
            }
            let coord = ChunkCoord::from_world(
                request.world_x,
                request.world_y,
                request.world_z,
                chunk_size,
            )?;
            let view = self.get_chunk_view(coord.x.into(), coord.y.into(), coord.z.into())?;
            Some(GeneratedChunk { voxel_data: view })
        }
    }

    /// Copies every remaining non-uniform chunk into the cache, then drops
    /// the raw buffer. Irreversible.
    ///
    /// The cache grows if needed so that the extraction pass does not evict
    /// anything. Returns the number of chunks extracted by this call.
    pub fn release_buffer(&mut self) -> usize {
        if self.buffer.is_none() {
            return 0;
        }

        let mut pending: Vec<ChunkCoord> = self
            .index
            .values()
            .filter(|e| !e.is_uniform() && !self.cache.contains(e.key()))
            .map(ChunkIndexEntry::coord)
            .collect();
        pending.sort_unstable();

        let required = self.cache.len() + pending.len();
        if required > self.cache.capacity() {
            debug!(
                from = self.cache.capacity(),
                to = required,
                "growing chunk cache before buffer release"
            );
            self.cache.grow_to(required);
        }

        let mut extracted = 0;
        for coord in &pending {
            if self
                .get_chunk(coord.x.into(), coord.y.into(), coord.z.into())
                .is_some()
            {
                extracted += 1;
            }
        }

        self.buffer = None;
        info!(extracted, cached = self.cache.len(), "released world buffer");
        extracted
    }

    /// Drops the buffer, header, index and cached chunks. Idempotent.
    pub fn dispose(&mut self) {
        self.buffer = None;
        self.header = None;
        self.index.clear();
        self.data_start = 0;
        self.cache.clear();
    }

    /// Chunk counts and estimated container size.
    pub fn stats(&self) -> WorldStats {
        let total_chunks = self.index.len();
        let uniform_chunks = self.index.values().filter(|e| e.is_uniform()).count();
        let non_uniform_chunks = total_chunks - uniform_chunks;
        let chunk_bytes = self.header.map_or(0, |h| h.chunk_bytes());
        let estimated_bytes = if self.header.is_some() {
            HEADER_SIZE + total_chunks * ENTRY_SIZE + non_uniform_chunks * chunk_bytes
        } else {
            0
        };
        WorldStats {
            total_chunks,
            uniform_chunks,
            non_uniform_chunks,
            estimated_bytes,
        }
    }
}

impl Default for WorldLoader {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl std::fmt::Debug for WorldLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorldLoader")
            .field("state", &self.state())
            .field("header", &self.header)
            .field("chunks", &self.index.len())
            .field("cache", &self.cache)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baker::{SerializeMode, WorldBaker};
    use crate::format::chunk_volume;

    /// Chunks with `y == 0` are non-uniform, everything above is air.
    fn layered(c: ChunkCoord, size: u16) -> Vec<u16> {
        let n = chunk_volume(size);
        if c.y > 0 {
            vec![0; n]
        } else {
            (0..n)
                .map(|i| (i as u16).wrapping_mul(31) ^ (c.x as u16) ^ ((c.z as u16) << 8))
                .collect()
        }
    }

    fn bake(bounds: ChunkBounds, size: u32) -> Vec<u8> {
        WorldBaker::builder()
            .chunk_size(size)
            .bounds(bounds)
            .generator(layered)
            .serialize_mode(SerializeMode::Inline)
            .build()
            .expect("valid baker")
            .bake()
            .expect("bake")
            .into_bytes()
    }

    /// Four non-uniform chunks along X at y=0, four uniform chunks at y=1.
    fn row_world() -> Vec<u8> {
        bake(ChunkBounds::new((0, 3), (0, 1), (0, 0)), 2)
    }

    fn key(x: i16) -> u64 {
        ChunkCoord::new(x, 0, 0).key()
    }

    #[test]
    fn test_round_trip_every_chunk() {
        let bounds = ChunkBounds::new((-2, 1), (0, 1), (-1, 1));
        let mut loader = WorldLoader::new(8);
        loader.load_from_buffer(bake(bounds, 3)).expect("load");

        for x in bounds.x.iter() {
            for y in bounds.y.iter() {
                for z in bounds.z.iter() {
                    let got = loader.get_chunk(x.into(), y.into(), z.into()).expect("in bounds");
                    assert_eq!(&got[..], &layered(ChunkCoord::new(x, y, z), 3)[..]);
                }
            }
        }
        assert_eq!(loader.world_bounds(), Some(bounds));
        assert_eq!(loader.chunk_size(), Some(3));
    }

    #[test]
    fn test_single_uniform_chunk_scenario() {
        let bytes = WorldBaker::builder()
            .chunk_size(2)
            .bounds(ChunkBounds::new((0, 0), (0, 0), (0, 0)))
            .generator(|_, _| vec![5; 8])
            .build()
            .expect("valid")
            .bake()
            .expect("bake")
            .into_bytes();

        let mut loader = WorldLoader::default();
        loader.load_from_buffer(bytes).expect("load");
        assert!(loader.has_chunk(0, 0, 0));
        assert_eq!(&loader.get_chunk(0, 0, 0).expect("present")[..], &[5; 8]);
        assert_eq!(
            loader.stats(),
            WorldStats {
                total_chunks: 1,
                uniform_chunks: 1,
                non_uniform_chunks: 0,
                estimated_bytes: HEADER_SIZE + ENTRY_SIZE,
            }
        );
    }

    #[test]
    fn test_absent_chunks_return_none() {
        let mut loader = WorldLoader::new(4);
        assert!(loader.get_chunk(0, 0, 0).is_none(), "unloaded loader");

        loader.load_from_buffer(row_world()).expect("load");
        assert!(!loader.has_chunk(4, 0, 0));
        assert!(loader.get_chunk(4, 0, 0).is_none());
        assert!(loader.get_chunk(i32::MAX, 0, 0).is_none());
        assert!(loader.get_chunk_view(-1, 0, 0).is_none());
    }

    #[test]
    fn test_any_data_byte_flip_is_detected() {
        let bytes = row_world();
        let data_start = WorldHeader::decode(&bytes).expect("header").data_start();
        assert!(bytes.len() > data_start);

        for i in data_start..bytes.len() {
            let mut tampered = bytes.clone();
            tampered[i] ^= 0x01;
            let mut loader = WorldLoader::new(4);
            let result = loader.load_from_buffer(tampered);
            assert!(
                matches!(result, Err(LoadError::Integrity { .. })),
                "flip at byte {i} not detected: {result:?}"
            );
            assert_eq!(loader.state(), LoaderState::Unloaded);
        }
    }

    #[test]
    fn test_bad_magic_and_version_are_format_errors() {
        let mut bytes = row_world();
        bytes[0] = b'X';
        let result = WorldLoader::new(1).load_from_buffer(bytes);
        assert!(matches!(
            result,
            Err(LoadError::Format(FormatError::InvalidMagic { .. }))
        ));

        let mut bytes = row_world();
        bytes[4] = 2;
        let result = WorldLoader::new(1).load_from_buffer(bytes);
        assert!(matches!(
            result,
            Err(LoadError::Format(FormatError::UnsupportedVersion(2)))
        ));
    }

    #[test]
    fn test_truncated_index_is_rejected() {
        let bytes = row_world();
        let result = WorldLoader::new(1).load_from_buffer(bytes[..HEADER_SIZE + 20].to_vec());
        assert!(matches!(
            result,
            Err(LoadError::Format(FormatError::Truncated { .. }))
        ));
    }

    #[test]
    fn test_duplicate_entries_are_rejected() {
        let mut bytes = row_world();
        let second = HEADER_SIZE + ENTRY_SIZE;
        let first_coords = bytes[HEADER_SIZE..HEADER_SIZE + 6].to_vec();
        bytes[second..second + 6].copy_from_slice(&first_coords);
        let result = WorldLoader::new(1).load_from_buffer(bytes);
        assert!(matches!(
            result,
            Err(LoadError::Format(FormatError::DuplicateChunk { .. }))
        ));
    }

    #[test]
    fn test_lru_evicts_exactly_the_oldest() {
        let mut loader = WorldLoader::new(3);
        loader.load_from_buffer(row_world()).expect("load");

        for x in 0..3 {
            loader.get_chunk(x, 0, 0).expect("present");
        }
        loader.get_chunk(3, 0, 0).expect("present");

        assert!(!loader.is_cached(0, 0, 0), "least recently used is evicted");
        assert_eq!(loader.cache.keys_by_recency(), vec![key(1), key(2), key(3)]);
    }

    #[test]
    fn test_hit_changes_only_its_own_recency() {
        let mut loader = WorldLoader::new(3);
        loader.load_from_buffer(row_world()).expect("load");
        for x in 0..3 {
            loader.get_chunk(x, 0, 0);
        }

        let first = loader.get_chunk(0, 0, 0).expect("cached");
        assert_eq!(loader.cache.keys_by_recency(), vec![key(1), key(2), key(0)]);

        let again = loader.get_chunk(0, 0, 0).expect("cached");
        assert!(Arc::ptr_eq(&first, &again), "hits share one allocation");

        loader.get_chunk(3, 0, 0);
        assert!(!loader.is_cached(1, 0, 0));
        assert!(loader.is_cached(0, 0, 0));
    }

    #[test]
    fn test_zero_capacity_never_caches() {
        let mut loader = WorldLoader::new(0);
        loader.load_from_buffer(row_world()).expect("load");
        let a = loader.get_chunk(0, 0, 0).expect("present");
        let b = loader.get_chunk(0, 0, 0).expect("present");
        assert_eq!(a, b);
        assert!(!Arc::ptr_eq(&a, &b), "every miss re-reads the buffer");
        assert_eq!(loader.cached_chunks(), 0);
    }

    #[test]
    fn test_returned_chunks_do_not_alias_buffer() {
        let mut loader = WorldLoader::new(1);
        loader.load_from_buffer(row_world()).expect("load");
        let before = loader.get_chunk(0, 0, 0).expect("present");
        let expected = layered(ChunkCoord::new(0, 0, 0), 2);

        loader.release_buffer();
        loader.dispose();
        assert_eq!(&before[..], &expected[..]);
    }

    #[test]
    fn test_release_keeps_cached_and_uniform_chunks() {
        let mut loader = WorldLoader::new(2);
        loader.load_from_buffer(row_world()).expect("load");
        let cached = loader.get_chunk(1, 0, 0).expect("present");

        let extracted = loader.release_buffer();
        assert_eq!(extracted, 3, "three non-uniform chunks were not cached yet");
        assert_eq!(loader.state(), LoaderState::Released);
        assert!(loader.cache_capacity() >= 4, "cache grew to hold every chunk");

        for x in 0..4 {
            assert!(loader.get_chunk(x, 0, 0).is_some(), "non-uniform {x} survives");
        }
        assert!(Arc::ptr_eq(&cached, &loader.get_chunk(1, 0, 0).expect("cached")));
        assert_eq!(loader.release_buffer(), 0, "second release is a no-op");

        // Uniform chunks are rebuilt from the index without the buffer.
        for x in 0..4 {
            assert_eq!(&loader.get_chunk(x, 1, 0).expect("uniform")[..], &[0; 8]);
        }
    }

    #[test]
    fn test_uniform_reads_after_release_keep_stored_chunks() {
        let mut loader = WorldLoader::new(2);
        loader.load_from_buffer(row_world()).expect("load");
        loader.get_chunk(0, 0, 0).expect("present");
        loader.release_buffer();
        let cached = loader.cached_chunks();

        for x in 0..4 {
            assert_eq!(&loader.get_chunk(x, 1, 0).expect("uniform")[..], &[0; 8]);
        }
        assert_eq!(loader.cached_chunks(), cached);
        assert!(!loader.is_cached(0, 1, 0), "uniform chunks are not cached after release");

        for x in 0..4 {
            assert!(loader.get_chunk(x, 0, 0).is_some(), "stored chunk {x} survives");
        }
    }

    #[test]
    fn test_evicted_chunk_after_release_returns_none() {
        let mut loader = WorldLoader::new(2);
        loader.load_from_buffer(row_world()).expect("load");
        loader.release_buffer();

        // Shrink so non-uniform chunks fall out, then ask for one of them.
        loader.set_cache_capacity(1);
        let survivors: Vec<i32> = (0..4).filter(|&x| loader.is_cached(x, 0, 0)).collect();
        assert_eq!(survivors.len(), 1);
        let lost = (0..4).find(|x| !survivors.contains(x)).expect("one was evicted");
        assert!(loader.get_chunk(lost, 0, 0).is_none());
        assert!(loader.has_chunk(lost, 0, 0), "index still knows the chunk");
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let mut loader = WorldLoader::new(4);
        loader.dispose();
        loader.load_from_buffer(row_world()).expect("load");
        loader.get_chunk(0, 0, 0);
        loader.dispose();
        loader.dispose();

        assert_eq!(loader.state(), LoaderState::Unloaded);
        assert!(!loader.has_chunk(0, 0, 0));
        assert_eq!(loader.cached_chunks(), 0);
        assert_eq!(loader.stats(), WorldStats::default());
    }

    #[test]
    fn test_reload_replaces_previous_world() {
        let mut loader = WorldLoader::new(8);
        loader.load_from_buffer(row_world()).expect("first load");
        loader.get_chunk(3, 0, 0);

        let other = bake(ChunkBounds::new((10, 10), (0, 0), (0, 0)), 2);
        loader.load_from_buffer(other).expect("second load");

        assert!(!loader.has_chunk(3, 0, 0));
        assert!(!loader.is_cached(3, 0, 0));
        assert!(loader.has_chunk(10, 0, 0));
        assert_eq!(loader.stats().total_chunks, 1);
    }

    #[test]
    fn test_stats_count_uniform_and_stored() {
        let mut loader = WorldLoader::new(1);
        loader.load_from_buffer(row_world()).expect("load");
        let stats = loader.stats();
        assert_eq!(stats.total_chunks, 8);
        assert_eq!(stats.uniform_chunks, 4);
        assert_eq!(stats.non_uniform_chunks, 4);
        assert_eq!(stats.estimated_bytes, HEADER_SIZE + 8 * ENTRY_SIZE + 4 * 16);
    }

    #[test]
    fn test_chunk_view_has_cubic_shape() {
        let mut loader = WorldLoader::new(4);
        loader.load_from_buffer(row_world()).expect("load");
        let view = loader.get_chunk_view(2, 0, 0).expect("present");
        let flat = layered(ChunkCoord::new(2, 0, 0), 2);
        assert_eq!(view.shape(), [2, 2, 2]);
        assert_eq!(view[[1, 0, 1]], flat[5]);
    }

    #[test]
    fn test_chunk_generator_maps_world_positions() {
        let mut loader = WorldLoader::new(4);
        loader.load_from_buffer(row_world()).expect("load");
        let token = CancelToken::new();
        let mut generate = loader.create_chunk_generator();

        let chunk = generate(ChunkRequest::new(7, 1, 0, 2), &token).expect("chunk (3,0,0)");
        assert_eq!(chunk.voxel_data.as_slice(), &layered(ChunkCoord::new(3, 0, 0), 2)[..]);

        assert!(generate(ChunkRequest::new(-1, 0, 0, 2), &token).is_none(), "x=-1 not baked");
        assert!(generate(ChunkRequest::new(0, 0, 0, 4), &token).is_none(), "size mismatch");

        token.cancel();
        assert!(generate(ChunkRequest::new(0, 0, 0, 2), &token).is_none(), "cancelled");
    }

    /// Serves `requests` responses on an OS-assigned port, then stops.
    fn serve(body: Vec<u8>, status: u16, requests: usize) -> (u16, std::thread::JoinHandle<()>) {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("bind");
        let port = server
            .server_addr()
            .to_ip()
            .expect("ip listener")
            .port();
        let handle = std::thread::spawn(move || {
            for request in server.incoming_requests().take(requests) {
                let response = tiny_http::Response::from_data(body.clone())
                    .with_status_code(tiny_http::StatusCode(status));
                let _ = request.respond(response);
            }
        });
        (port, handle)
    }

    #[test]
    fn test_load_from_url() {
        let (port, server) = serve(row_world(), 200, 1);
        let mut loader = WorldLoader::new(4);
        loader
            .load_from_url(&format!("http://127.0.0.1:{port}/row.noaworld"))
            .expect("fetch and load");
        server.join().expect("server thread");

        assert_eq!(loader.state(), LoaderState::Loaded);
        assert_eq!(loader.stats().total_chunks, 8);
    }

    #[test]
    fn test_load_from_url_reports_http_status() {
        let (port, server) = serve(b"not found".to_vec(), 404, 1);
        let url = format!("http://127.0.0.1:{port}/missing.noaworld");
        let result = WorldLoader::new(4).load_from_url(&url);
        server.join().expect("server thread");

        match result {
            Err(LoadError::Http { status, url: failed }) => {
                assert_eq!(status, 404);
                assert_eq!(failed, url);
            }
            other => panic!("expected HTTP error, got {other:?}"),
        }
    }

    #[test]
    fn test_load_from_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("row.noaworld");
        std::fs::write(&path, row_world()).expect("write");

        let mut loader = WorldLoader::new(4);
        loader.load_from_path(&path).expect("load");
        assert_eq!(loader.state(), LoaderState::Loaded);

        let missing = loader.load_from_path(&dir.path().join("missing.noaworld"));
        assert!(matches!(missing, Err(LoadError::Io(_))));
    }
}
