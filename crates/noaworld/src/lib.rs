//! Baked voxel worlds: the `.noaworld` container format, a baker that
//! generates and packs a box of chunks, and a loader that serves chunk arrays
//! from a loaded container through an LRU cache.

pub mod baker;
pub mod cache;
pub mod format;
pub mod loader;
pub mod pack;
pub mod source;
pub mod view;
pub mod worker;

pub use baker::{
    BakeConfigError, BakeError, BakedWorld, SerializeMode, WorldBaker, WorldBakerBuilder,
};
pub use cache::{ChunkCache, VoxelData};
pub use format::{
    AxisRange, ChunkBounds, ChunkCoord, ChunkIndexEntry, FILE_EXTENSION, FormatError,
    MAX_CHUNK_SIZE, WorldHeader, chunk_key,
};
pub use loader::{DEFAULT_CACHE_CAPACITY, LoadError, LoaderState, WorldLoader, WorldStats};
pub use pack::{BakeProgress, BakedChunk, ChunkPayload};
pub use source::{CancelToken, ChunkRequest, ChunkSource, Fallback, GeneratedChunk};
pub use view::ChunkView;
