//! World baker: runs a chunk generator over a box of chunk coordinates and
//! packs the result into a `.noaworld` container.
//!
//! Generation runs on the calling thread in X-outer, Y-middle, Z-inner order
//! and yields the thread every few chunks. Packing runs on a background
//! worker by default and falls back to the calling thread if the worker
//! fails; both paths call [`pack_world`] and produce identical bytes.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::format::{
    BYTES_PER_VOXEL, ChunkBounds, ChunkCoord, ENTRY_SIZE, HEADER_SIZE, MAX_CHUNK_SIZE, WorldHeader,
    chunk_volume, classify_chunk,
};
use crate::pack::{BakeProgress, BakedChunk, ChunkPayload, PackError, pack_world};
use crate::worker::{WorkerFailure, pack_on_worker};

/// Default number of chunks generated between cooperative yields.
pub const DEFAULT_YIELD_INTERVAL: usize = 4;

/// Default number of chunks generated between progress reports.
pub const DEFAULT_PROGRESS_INTERVAL: usize = 10;

/// Procedural chunk generator: `(chunk coordinates, chunk size) -> chunk_size³ voxel ids`.
pub type ChunkGenerator = Box<dyn FnMut(ChunkCoord, u16) -> Vec<u16>>;

/// Progress callback.
pub type ProgressCallback = Box<dyn FnMut(&BakeProgress)>;

/// Background packing path used in [`SerializeMode::Worker`].
type WorkerPacker = fn(
    Vec<BakedChunk>,
    &WorldHeader,
    &mut dyn FnMut(BakeProgress),
) -> Result<Vec<u8>, WorkerFailure>;

/// Where packing runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SerializeMode {
    /// On a background worker thread, falling back to inline on failure.
    #[default]
    Worker,
    /// On the calling thread.
    Inline,
}

/// Invalid baker construction arguments.
#[derive(Debug, thiserror::Error)]
pub enum BakeConfigError {
    /// Chunk size is 0 or above [`MAX_CHUNK_SIZE`].
    #[error("chunk size must be in 1..={max}, got {0}", max = MAX_CHUNK_SIZE)]
    InvalidChunkSize(u32),
    /// No generator was supplied.
    #[error("a chunk generator is required")]
    MissingGenerator,
    /// No bounds were supplied.
    #[error("chunk bounds are required")]
    MissingBounds,
    /// An axis range has `min > max`.
    #[error("{axis} range is inverted: min {min} > max {max}")]
    InvertedRange {
        /// Axis name.
        axis: char,
        /// Range start.
        min: i16,
        /// Range end.
        max: i16,
    },
    /// The worst-case container cannot be addressed by the format.
    #[error("worst-case data section of {0} bytes exceeds the format's u32 offset range")]
    TooLarge(u128),
}

/// Failure while baking.
#[derive(Debug, thiserror::Error)]
pub enum BakeError {
    /// The generator returned the wrong number of voxels.
    #[error("generator returned {actual} voxels for chunk ({x}, {y}, {z}), expected {expected}")]
    ChunkLength {
        /// Chunk X index.
        x: i16,
        /// Chunk Y index.
        y: i16,
        /// Chunk Z index.
        z: i16,
        /// `chunk_size³`.
        expected: usize,
        /// Voxels returned.
        actual: usize,
    },
    /// Packing rejected the generated chunks.
    #[error(transparent)]
    Pack(#[from] PackError),
    /// The worker failed and its chunks could not be recovered for inline packing.
    #[error("pack worker lost the generated chunks: {0}")]
    WorkerLost(#[source] crate::worker::WorkerError),
}

/// A packed container, ready for storage or transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BakedWorld {
    bytes: Vec<u8>,
}

impl BakedWorld {
    /// Wraps packed bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Raw container bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Takes the raw container bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Container size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true if the container has no bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Writes the container to `path`, creating parent directories.
    pub fn write_to_path(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &self.bytes)?;
        info!(path = %path.display(), bytes = self.bytes.len(), "wrote baked world");
        Ok(())
    }
}

/// Builder for [`WorldBaker`].
#[derive(Default)]
pub struct WorldBakerBuilder {
    chunk_size: Option<u32>,
    bounds: Option<ChunkBounds>,
    generator: Option<ChunkGenerator>,
    on_progress: Option<ProgressCallback>,
    serialize_mode: SerializeMode,
    yield_interval: Option<usize>,
    progress_interval: Option<usize>,
}

impl WorldBakerBuilder {
    /// Chunk edge length in voxels.
    pub fn chunk_size(mut self, chunk_size: u32) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    /// Inclusive chunk bounds to bake.
    pub fn bounds(mut self, bounds: ChunkBounds) -> Self {
        self.bounds = Some(bounds);
        self
    }

    /// The chunk generator.
    pub fn generator<F>(mut self, generator: F) -> Self
    where
        F: FnMut(ChunkCoord, u16) -> Vec<u16> + 'static,
    {
        self.generator = Some(Box::new(generator));
        self
    }

    /// Progress callback, invoked on the baking thread.
    pub fn on_progress<F>(mut self, on_progress: F) -> Self
    where
        F: FnMut(&BakeProgress) + 'static,
    {
        self.on_progress = Some(Box::new(on_progress));
        self
    }

    /// Where packing runs.
    pub fn serialize_mode(mut self, mode: SerializeMode) -> Self {
        self.serialize_mode = mode;
        self
    }

    /// Chunks generated between cooperative yields (minimum 1).
    pub fn yield_interval(mut self, chunks: usize) -> Self {
        self.yield_interval = Some(chunks);
        self
    }

    /// Chunks generated between progress reports (minimum 1).
    pub fn progress_interval(mut self, chunks: usize) -> Self {
        self.progress_interval = Some(chunks);
        self
    }

    /// Validates the configuration.
    pub fn build(self) -> Result<WorldBaker, BakeConfigError> {
        let raw_size = self.chunk_size.unwrap_or(0);
        let chunk_size = u16::try_from(raw_size)
            .ok()
            .filter(|s| (1..=MAX_CHUNK_SIZE).contains(s))
            .ok_or(BakeConfigError::InvalidChunkSize(raw_size))?;
        let generator = self.generator.ok_or(BakeConfigError::MissingGenerator)?;
        let bounds = self.bounds.ok_or(BakeConfigError::MissingBounds)?;

        for (axis, range) in [('x', bounds.x), ('y', bounds.y), ('z', bounds.z)] {
            if range.min > range.max {
                return Err(BakeConfigError::InvertedRange {
                    axis,
                    min: range.min,
                    max: range.max,
                });
            }
        }

        // Per-axis in u128: full-range bounds hold 2^48 chunks.
        let chunks = [bounds.x, bounds.y, bounds.z]
            .iter()
            .map(|r| r.len() as u128)
            .product::<u128>();
        let worst_case = chunks * chunk_volume(chunk_size) as u128 * BYTES_PER_VOXEL as u128;
        if worst_case > u128::from(u32::MAX) {
            return Err(BakeConfigError::TooLarge(worst_case));
        }

        Ok(WorldBaker {
            chunk_size,
            bounds,
            generator,
            on_progress: self.on_progress,
            serialize_mode: self.serialize_mode,
            packer: pack_on_worker,
            yield_interval: self.yield_interval.unwrap_or(DEFAULT_YIELD_INTERVAL).max(1),
            progress_interval: self
                .progress_interval
                .unwrap_or(DEFAULT_PROGRESS_INTERVAL)
                .max(1),
        })
    }
}

/// Generates and packs a world.
pub struct WorldBaker {
    chunk_size: u16,
    bounds: ChunkBounds,
    generator: ChunkGenerator,
    on_progress: Option<ProgressCallback>,
    serialize_mode: SerializeMode,
    packer: WorkerPacker,
    yield_interval: usize,
    progress_interval: usize,
}

impl WorldBaker {
    /// Starts a builder.
    pub fn builder() -> WorldBakerBuilder {
        WorldBakerBuilder::default()
    }

    /// Chunk edge length in voxels.
    pub fn chunk_size(&self) -> u16 {
        self.chunk_size
    }

    /// Bounds being baked.
    pub fn bounds(&self) -> ChunkBounds {
        self.bounds
    }

    /// Number of chunks the bake will generate.
    pub fn chunk_count(&self) -> usize {
        self.bounds.chunk_count()
    }

    /// Container size if no chunk turned out uniform. Advisory only.
    ///
    /// Bounded by `u32::MAX` plus header and index, see [`WorldBakerBuilder::build`].
    pub fn estimate_max_size(&self) -> usize {
        let count = self.chunk_count();
        let per_chunk = ENTRY_SIZE + chunk_volume(self.chunk_size) * BYTES_PER_VOXEL;
        count.saturating_mul(per_chunk).saturating_add(HEADER_SIZE)
    }

    /// Generates every chunk in bounds and packs the result.
    pub fn bake(&mut self) -> Result<BakedWorld, BakeError> {
        let total = self.chunk_count();
        let volume = chunk_volume(self.chunk_size);
        info!(
            chunks = total,
            chunk_size = self.chunk_size,
            "baking world"
        );

        let mut chunks = Vec::with_capacity(total);
        let mut uniform = 0usize;
        let bounds = self.bounds;

        for x in bounds.x.iter() {
            for y in bounds.y.iter() {
                for z in bounds.z.iter() {
                    let coord = ChunkCoord::new(x, y, z);
                    let voxels = (self.generator)(coord, self.chunk_size);
                    if voxels.len() != volume {
                        return Err(BakeError::ChunkLength {
                            x,
                            y,
                            z,
                            expected: volume,
                            actual: voxels.len(),
                        });
                    }

                    let class = classify_chunk(&voxels);
                    let payload = if class.uniform {
                        uniform += 1;
                        ChunkPayload::Uniform(class.fill_id)
                    } else {
                        ChunkPayload::Voxels(voxels)
                    };
                    chunks.push(BakedChunk { coord, payload });

                    let done = chunks.len();
                    if done % self.yield_interval == 0 {
                        std::thread::yield_now();
                    }
                    if done % self.progress_interval == 0 || done == total {
                        emit(
                            &mut self.on_progress,
                            BakeProgress::new(
                                done,
                                total,
                                format!("Generated {done}/{total} chunks"),
                            ),
                        );
                    }
                }
            }
        }

        debug!(uniform, stored = total - uniform, "generation finished");

        let header = WorldHeader::new(self.chunk_size, self.bounds);
        let bytes = self.serialize(chunks, &header)?;
        info!(bytes = bytes.len(), "world baked");
        Ok(BakedWorld::new(bytes))
    }

    fn serialize(
        &mut self,
        chunks: Vec<BakedChunk>,
        header: &WorldHeader,
    ) -> Result<Vec<u8>, BakeError> {
        let on_progress = &mut self.on_progress;
        let mut forward = |p: BakeProgress| emit(on_progress, p);

        let chunks = match self.serialize_mode {
            SerializeMode::Inline => chunks,
            SerializeMode::Worker => match (self.packer)(chunks, header, &mut forward) {
                Ok(buffer) => return Ok(buffer),
                Err(failure) => {
                    warn!(error = %failure.error, "pack worker unavailable, packing inline");
                    failure
                        .chunks
                        .ok_or(BakeError::WorkerLost(failure.error))?
                }
            },
        };

        Ok(pack_world(&chunks, header, &mut forward)?)
    }
}

impl std::fmt::Debug for WorldBaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorldBaker")
            .field("chunk_size", &self.chunk_size)
            .field("bounds", &self.bounds)
            .field("serialize_mode", &self.serialize_mode)
            .finish_non_exhaustive()
    }
}

fn emit(on_progress: &mut Option<ProgressCallback>, progress: BakeProgress) {
    debug!(
        current = progress.current,
        total = progress.total,
        "{}",
        progress.message
    );
    if let Some(cb) = on_progress.as_mut() {
        cb(&progress);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
