//! Byte layout of the `.noaworld` container.
//!
//! A container is a fixed 32-byte header, followed by one 14-byte index
//! entry per chunk, followed by the data section holding the voxel arrays of
//! every non-uniform chunk. All integers are little-endian.
//!
//! ## Header
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 4 | Magic bytes `"NOAW"` |
//! | 4 | 2 | Format version (`u16`, currently 1) |
//! | 6 | 2 | Flags (`u16`, reserved, 0) |
//! | 8 | 2 | Chunk edge length in voxels (`u16`) |
//! | 10 | 4 | Chunk count (`u32`) |
//! | 14 | 12 | `min_x, max_x, min_y, max_y, min_z, max_z` (`i16` each, inclusive) |
//! | 26 | 4 | CRC-32 of the data section (`u32`) |
//! | 30 | 2 | Reserved |
//!
//! ## Index entry
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 6 | Chunk coordinates `x, y, z` (`i16` each) |
//! | 6 | 2 | Flags (`u16`, bit 0 = uniform) |
//! | 8 | 2 | Fill block id (`u16`, uniform chunks only) |
//! | 10 | 4 | Byte offset into the data section (`u32`, non-uniform chunks only) |

use serde::Serialize;

/// Magic bytes identifying a `.noaworld` container.
pub const MAGIC: [u8; 4] = *b"NOAW";

/// Conventional file extension for containers.
pub const FILE_EXTENSION: &str = "noaworld";

/// Newest format version this build reads and writes.
pub const CURRENT_VERSION: u16 = 1;

/// Size of [`WorldHeader`] on disk.
pub const HEADER_SIZE: usize = 32;

/// Size of one [`ChunkIndexEntry`] on disk.
pub const ENTRY_SIZE: usize = 14;

/// Index entry flag: every voxel of the chunk equals `fill_block_id`.
pub const FLAG_UNIFORM: u16 = 0b0000_0001;

/// Bytes per stored voxel id.
pub const BYTES_PER_VOXEL: usize = 2;

/// Largest chunk edge length accepted by the baker and the decoder.
///
/// A uniform chunk is materialized as `chunk_size³` voxels from a single
/// index entry, so the header alone decides that allocation.
pub const MAX_CHUNK_SIZE: u16 = 512;

/// Errors raised while decoding a container.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    /// The buffer does not start with [`MAGIC`].
    #[error("invalid magic bytes: expected {expected:?}, found {found:?}")]
    InvalidMagic {
        /// The magic this build expects.
        expected: [u8; 4],
        /// The first four bytes of the buffer.
        found: [u8; 4],
    },
    /// The version is outside `1..=CURRENT_VERSION`.
    #[error("unsupported format version {0} (supported: 1..={max})", max = CURRENT_VERSION)]
    UnsupportedVersion(u16),
    /// The buffer is shorter than the layout requires.
    #[error("data truncated: expected at least {expected} bytes, got {actual}")]
    Truncated {
        /// Minimum byte count required.
        expected: usize,
        /// Byte count available.
        actual: usize,
    },
    /// The header declares a zero chunk size.
    #[error("header declares a chunk size of 0")]
    ZeroChunkSize,
    /// The header declares a chunk size above [`MAX_CHUNK_SIZE`].
    #[error("header declares a chunk size of {0}, maximum is {max}", max = MAX_CHUNK_SIZE)]
    ChunkSizeTooLarge(u16),
    /// Two index entries share the same coordinates.
    #[error("duplicate index entry for chunk ({x}, {y}, {z})")]
    DuplicateChunk {
        /// Chunk X index.
        x: i16,
        /// Chunk Y index.
        y: i16,
        /// Chunk Z index.
        z: i16,
    },
    /// A non-uniform entry points past the end of the data section.
    #[error("chunk ({x}, {y}, {z}) data at offset {offset} exceeds data section of {data_len} bytes")]
    EntryOutOfRange {
        /// Chunk X index.
        x: i16,
        /// Chunk Y index.
        y: i16,
        /// Chunk Z index.
        z: i16,
        /// Declared data offset.
        offset: u32,
        /// Length of the data section.
        data_len: usize,
    },
}

/// Chunk-space coordinates (chunk indices, not voxel positions).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ChunkCoord {
    /// Chunk X index.
    pub x: i16,
    /// Chunk Y index.
    pub y: i16,
    /// Chunk Z index.
    pub z: i16,
}

impl ChunkCoord {
    /// Creates a chunk coordinate.
    pub const fn new(x: i16, y: i16, z: i16) -> Self {
        Self { x, y, z }
    }

    /// Converts wider integers, returning `None` if any axis leaves `i16`.
    pub fn try_from_i32(x: i32, y: i32, z: i32) -> Option<Self> {
        Some(Self {
            x: i16::try_from(x).ok()?,
            y: i16::try_from(y).ok()?,
            z: i16::try_from(z).ok()?,
        })
    }

    /// Chunk containing the voxel at world position `(wx, wy, wz)`.
    ///
    /// Uses floor division, so negative positions map to negative chunks.
    pub fn from_world(wx: i32, wy: i32, wz: i32, chunk_size: u16) -> Option<Self> {
        let s = i32::from(chunk_size.max(1));
        Self::try_from_i32(wx.div_euclid(s), wy.div_euclid(s), wz.div_euclid(s))
    }

    /// Lookup key, see [`chunk_key`].
    pub fn key(&self) -> u64 {
        chunk_key(self.x, self.y, self.z)
    }
}

/// Inclusive range of chunk indices along one axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct AxisRange {
    /// Smallest chunk index (inclusive).
    pub min: i16,
    /// Largest chunk index (inclusive).
    pub max: i16,
}

impl AxisRange {
    /// Creates a range covering `min..=max`.
    pub const fn new(min: i16, max: i16) -> Self {
        Self { min, max }
    }

    /// Number of chunk indices in the range, 0 if inverted.
    pub fn len(&self) -> usize {
        if self.max < self.min {
            0
        } else {
            (self.max as i32 - self.min as i32 + 1) as usize
        }
    }

    /// Returns true if the range is inverted.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if `v` lies inside the range.
    pub fn contains(&self, v: i16) -> bool {
        (self.min..=self.max).contains(&v)
    }

    /// Iterates the range in ascending order.
    pub fn iter(self) -> impl Iterator<Item = i16> {
        self.min..=self.max
    }
}

/// Inclusive chunk-index bounds of a world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ChunkBounds {
    /// X range.
    pub x: AxisRange,
    /// Y range.
    pub y: AxisRange,
    /// Z range.
    pub z: AxisRange,
}

impl ChunkBounds {
    /// Creates bounds from three inclusive `(min, max)` pairs.
    pub const fn new(x: (i16, i16), y: (i16, i16), z: (i16, i16)) -> Self {
        Self {
            x: AxisRange::new(x.0, x.1),
            y: AxisRange::new(y.0, y.1),
            z: AxisRange::new(z.0, z.1),
        }
    }

    /// Total number of chunks covered.
    pub fn chunk_count(&self) -> usize {
        self.x.len() * self.y.len() * self.z.len()
    }

    /// Returns true if the chunk lies inside the bounds.
    pub fn contains(&self, x: i16, y: i16, z: i16) -> bool {
        self.x.contains(x) && self.y.contains(y) && self.z.contains(z)
    }
}

/// Fixed-size container header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorldHeader {
    /// Format version.
    pub version: u16,
    /// Container flags (currently unused, written as 0).
    pub flags: u16,
    /// Chunk edge length in voxels.
    pub chunk_size: u16,
    /// Number of index entries following the header.
    pub chunk_count: u32,
    /// Inclusive chunk bounds.
    pub bounds: ChunkBounds,
    /// CRC-32 of the data section.
    pub checksum: u32,
}

impl WorldHeader {
    /// Creates a current-version header with no chunks and a zero checksum.
    pub fn new(chunk_size: u16, bounds: ChunkBounds) -> Self {
        Self {
            version: CURRENT_VERSION,
            flags: 0,
            chunk_size,
            chunk_count: 0,
            bounds,
            checksum: 0,
        }
    }

    /// Number of voxels in one chunk.
    pub fn chunk_volume(&self) -> usize {
        chunk_volume(self.chunk_size)
    }

    /// Bytes one non-uniform chunk occupies in the data section.
    pub fn chunk_bytes(&self) -> usize {
        self.chunk_volume() * BYTES_PER_VOXEL
    }

    /// Offset of the first data section byte.
    pub fn data_start(&self) -> usize {
        HEADER_SIZE + self.chunk_count as usize * ENTRY_SIZE
    }

    /// Writes the header into the first [`HEADER_SIZE`] bytes of `out`.
    ///
    /// # Panics
    ///
    /// Panics if `out` is shorter than [`HEADER_SIZE`].
    pub fn encode_into(&self, out: &mut [u8]) {
        let out = &mut out[..HEADER_SIZE];
        out[0..4].copy_from_slice(&MAGIC);
        out[4..6].copy_from_slice(&self.version.to_le_bytes());
        out[6..8].copy_from_slice(&self.flags.to_le_bytes());
        out[8..10].copy_from_slice(&self.chunk_size.to_le_bytes());
        out[10..14].copy_from_slice(&self.chunk_count.to_le_bytes());
        let b = &self.bounds;
        let extents = [b.x.min, b.x.max, b.y.min, b.y.max, b.z.min, b.z.max];
        for (i, v) in extents.iter().enumerate() {
            let at = 14 + i * 2;
            out[at..at + 2].copy_from_slice(&v.to_le_bytes());
        }
        out[26..30].copy_from_slice(&self.checksum.to_le_bytes());
        out[30..32].fill(0);
    }

    /// Parses and validates a header from the start of `data`.
    pub fn decode(data: &[u8]) -> Result<Self, FormatError> {
        if data.len() < 4 {
            return Err(FormatError::Truncated {
                expected: HEADER_SIZE,
                actual: data.len(),
            });
        }
        if data[0..4] != MAGIC {
            return Err(FormatError::InvalidMagic {
                expected: MAGIC,
                found: [data[0], data[1], data[2], data[3]],
            });
        }
        if data.len() < HEADER_SIZE {
            return Err(FormatError::Truncated {
                expected: HEADER_SIZE,
                actual: data.len(),
            });
        }

        let version = read_u16(data, 4);
        if version == 0 || version > CURRENT_VERSION {
            return Err(FormatError::UnsupportedVersion(version));
        }
        let chunk_size = read_u16(data, 8);
        if chunk_size == 0 {
            return Err(FormatError::ZeroChunkSize);
        }
        if chunk_size > MAX_CHUNK_SIZE {
            return Err(FormatError::ChunkSizeTooLarge(chunk_size));
        }

        Ok(Self {
            version,
            flags: read_u16(data, 6),
            chunk_size,
            chunk_count: read_u32(data, 10),
            bounds: ChunkBounds::new(
                (read_i16(data, 14), read_i16(data, 16)),
                (read_i16(data, 18), read_i16(data, 20)),
                (read_i16(data, 22), read_i16(data, 24)),
            ),
            checksum: read_u32(data, 26),
        })
    }
}

/// One chunk's record in the index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkIndexEntry {
    /// Chunk X index.
    pub x: i16,
    /// Chunk Y index.
    pub y: i16,
    /// Chunk Z index.
    pub z: i16,
    /// Entry flags, see [`FLAG_UNIFORM`].
    pub flags: u16,
    /// Voxel id filling the chunk when uniform.
    pub fill_block_id: u16,
    /// Byte offset into the data section when non-uniform.
    pub data_offset: u32,
}

impl ChunkIndexEntry {
    /// Entry for a chunk stored as a single fill id.
    pub fn uniform(x: i16, y: i16, z: i16, fill_block_id: u16) -> Self {
        Self {
            x,
            y,
            z,
            flags: FLAG_UNIFORM,
            fill_block_id,
            data_offset: 0,
        }
    }

    /// Entry for a chunk whose voxels live at `data_offset`.
    pub fn stored(x: i16, y: i16, z: i16, data_offset: u32) -> Self {
        Self {
            x,
            y,
            z,
            flags: 0,
            fill_block_id: 0,
            data_offset,
        }
    }

    /// Returns true if the uniform flag is set.
    pub fn is_uniform(&self) -> bool {
        self.flags & FLAG_UNIFORM != 0
    }

    /// Coordinates of the chunk this entry describes.
    pub fn coord(&self) -> ChunkCoord {
        ChunkCoord::new(self.x, self.y, self.z)
    }

    /// Lookup key for this entry's coordinates.
    pub fn key(&self) -> u64 {
        chunk_key(self.x, self.y, self.z)
    }

    /// Writes the entry into the first [`ENTRY_SIZE`] bytes of `out`.
    pub fn encode_into(&self, out: &mut [u8]) {
        let out = &mut out[..ENTRY_SIZE];
        out[0..2].copy_from_slice(&self.x.to_le_bytes());
        out[2..4].copy_from_slice(&self.y.to_le_bytes());
        out[4..6].copy_from_slice(&self.z.to_le_bytes());
        out[6..8].copy_from_slice(&self.flags.to_le_bytes());
        out[8..10].copy_from_slice(&self.fill_block_id.to_le_bytes());
        out[10..14].copy_from_slice(&self.data_offset.to_le_bytes());
    }

    /// Parses an entry from the first [`ENTRY_SIZE`] bytes of `data`.
    pub fn decode(data: &[u8]) -> Result<Self, FormatError> {
        if data.len() < ENTRY_SIZE {
            return Err(FormatError::Truncated {
                expected: ENTRY_SIZE,
                actual: data.len(),
            });
        }
        Ok(Self {
            x: read_i16(data, 0),
            y: read_i16(data, 2),
            z: read_i16(data, 4),
            flags: read_u16(data, 6),
            fill_block_id: read_u16(data, 8),
            data_offset: read_u32(data, 10),
        })
    }
}

/// Result of scanning a chunk's voxels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Uniformity {
    /// True if every voxel has the same id.
    pub uniform: bool,
    /// The shared id when uniform, otherwise the first voxel (0 if empty).
    pub fill_id: u16,
}

/// Classifies a voxel array as uniform or not in a single pass.
///
/// An empty array is never uniform.
pub fn classify_chunk(voxels: &[u16]) -> Uniformity {
    let Some(&first) = voxels.first() else {
        return Uniformity {
            uniform: false,
            fill_id: 0,
        };
    };
    Uniformity {
        uniform: voxels.iter().all(|&v| v == first),
        fill_id: first,
    }
}

/// CRC-32 (IEEE) of `bytes`.
pub fn crc32(bytes: &[u8]) -> u32 {
    crc32fast::hash(bytes)
}

/// Order-preserving, collision-free key for a chunk coordinate.
///
/// Each coordinate is biased by 2^15 so negative values sort before positive
/// ones, then packed as `x:16 | y:16 | z:16` into the low 48 bits.
pub fn chunk_key(x: i16, y: i16, z: i16) -> u64 {
    let bias = |v: i16| (v as i32 + 0x8000) as u64;
    (bias(x) << 32) | (bias(y) << 16) | bias(z)
}

/// Inverse of [`chunk_key`].
pub fn chunk_key_parts(key: u64) -> (i16, i16, i16) {
    let unbias = |v: u64| ((v & 0xFFFF) as i32 - 0x8000) as i16;
    (unbias(key >> 32), unbias(key >> 16), unbias(key))
}

/// Number of voxels in a chunk of edge `chunk_size`.
pub fn chunk_volume(chunk_size: u16) -> usize {
    let s = chunk_size as usize;
    s * s * s
}

/// Length of a data section holding `non_uniform` chunks.
pub fn data_section_len(chunk_size: u16, non_uniform: usize) -> usize {
    chunk_volume(chunk_size) * BYTES_PER_VOXEL * non_uniform
}

/// Writes `voxels` into `out` as little-endian `u16`s.
pub fn write_voxels(voxels: &[u16], out: &mut [u8]) {
    for (dst, v) in out.chunks_exact_mut(BYTES_PER_VOXEL).zip(voxels) {
        dst.copy_from_slice(&v.to_le_bytes());
    }
}

/// Decodes little-endian `u16` voxels into a freshly owned vector.
pub fn read_voxels(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(BYTES_PER_VOXEL)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .collect()
}

fn read_u16(data: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([data[at], data[at + 1]])
}

fn read_i16(data: &[u8], at: usize) -> i16 {
    i16::from_le_bytes([data[at], data[at + 1]])
}

fn read_u32(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
