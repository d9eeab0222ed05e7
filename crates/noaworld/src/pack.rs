//! Serialization of generated chunks into a `.noaworld` buffer.
//!
//! [`pack_world`] is the only packing implementation. The baker calls it on
//! its own thread when packing inline, and the pack worker calls it on a
//! background thread, so both paths produce identical bytes.

use crate::format::{
    ChunkCoord, ChunkIndexEntry, ENTRY_SIZE, HEADER_SIZE, WorldHeader, crc32, write_voxels,
};

/// How often (in chunks) packing reports progress.
pub const PACK_PROGRESS_INTERVAL: usize = 256;

/// Voxel content of a generated chunk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChunkPayload {
    /// Every voxel holds this id; nothing goes into the data section.
    Uniform(u16),
    /// Full voxel array, `chunk_size³` ids.
    Voxels(Vec<u16>),
}

/// A generated chunk waiting to be packed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BakedChunk {
    /// Chunk coordinates.
    pub coord: ChunkCoord,
    /// Classified voxel content.
    pub payload: ChunkPayload,
}

impl BakedChunk {
    /// Returns true if the chunk is stored as a fill id.
    pub fn is_uniform(&self) -> bool {
        matches!(self.payload, ChunkPayload::Uniform(_))
    }
}

/// Progress notification emitted while baking or packing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BakeProgress {
    /// Units of work completed.
    pub current: usize,
    /// Total units of work.
    pub total: usize,
    /// Human-readable status line.
    pub message: String,
}

impl BakeProgress {
    /// Creates a progress notification.
    pub fn new(current: usize, total: usize, message: impl Into<String>) -> Self {
        Self {
            current,
            total,
            message: message.into(),
        }
    }
}

/// Errors caused by packing input that cannot be represented in the format.
#[derive(Debug, thiserror::Error)]
pub enum PackError {
    /// A non-uniform chunk does not hold exactly `chunk_size³` voxels.
    #[error("chunk ({x}, {y}, {z}) holds {actual} voxels, expected {expected}")]
    ChunkLength {
        /// Chunk X index.
        x: i16,
        /// Chunk Y index.
        y: i16,
        /// Chunk Z index.
        z: i16,
        /// Voxels per chunk for this world.
        expected: usize,
        /// Voxels supplied.
        actual: usize,
    },
    /// More chunks than the `u32` chunk count can describe.
    #[error("{0} chunks exceed the format's u32 chunk count")]
    TooManyChunks(usize),
    /// The data section would overflow the `u32` data offset field.
    #[error("data section of {0} bytes exceeds the format's u32 offset range")]
    DataTooLarge(usize),
}

/// Total container size for the given chunk list.
pub fn packed_size(chunks: &[BakedChunk], header: &WorldHeader) -> usize {
    let stored = chunks.iter().filter(|c| !c.is_uniform()).count();
    HEADER_SIZE + chunks.len() * ENTRY_SIZE + stored * header.chunk_bytes()
}

/// Packs `chunks` into a complete container.
///
/// `header` supplies the chunk size and bounds; its chunk count and checksum
/// are recomputed. Index entries are written in slice order and data offsets
/// follow that order contiguously. The header is written last, after the
/// checksum over the data section is known.
pub fn pack_world(
    chunks: &[BakedChunk],
    header: &WorldHeader,
    progress: &mut dyn FnMut(BakeProgress),
) -> Result<Vec<u8>, PackError> {
    let volume = header.chunk_volume();
    let chunk_bytes = header.chunk_bytes();

    for chunk in chunks {
        if let ChunkPayload::Voxels(voxels) = &chunk.payload
            && voxels.len() != volume
        {
            return Err(PackError::ChunkLength {
                x: chunk.coord.x,
                y: chunk.coord.y,
                z: chunk.coord.z,
                expected: volume,
                actual: voxels.len(),
            });
        }
    }

    let chunk_count =
        u32::try_from(chunks.len()).map_err(|_| PackError::TooManyChunks(chunks.len()))?;
    let total = packed_size(chunks, header);

    let mut header = *header;
    header.chunk_count = chunk_count;
    let data_start = header.data_start();
    let data_len = total - data_start;
    if data_len > u32::MAX as usize {
        return Err(PackError::DataTooLarge(data_len));
    }

    let mut buffer = vec![0u8; total];
    let mut data_offset = 0usize;

    for (i, chunk) in chunks.iter().enumerate() {
        let ChunkCoord { x, y, z } = chunk.coord;
        let entry = match &chunk.payload {
            ChunkPayload::Uniform(fill) => ChunkIndexEntry::uniform(x, y, z, *fill),
            ChunkPayload::Voxels(voxels) => {
                let at = data_start + data_offset;
                write_voxels(voxels, &mut buffer[at..at + chunk_bytes]);
                let entry = ChunkIndexEntry::stored(x, y, z, data_offset as u32);
                data_offset += chunk_bytes;
                entry
            }
        };
        let at = HEADER_SIZE + i * ENTRY_SIZE;
        entry.encode_into(&mut buffer[at..at + ENTRY_SIZE]);

        let done = i + 1;
        if done % PACK_PROGRESS_INTERVAL == 0 && done < chunks.len() {
            progress(BakeProgress::new(
                done,
                chunks.len(),
                format!("Packed {done}/{} chunks", chunks.len()),
            ));
        }
    }

    header.checksum = crc32(&buffer[data_start..]);
    header.encode_into(&mut buffer[..HEADER_SIZE]);

    progress(BakeProgress::new(
        chunks.len(),
        chunks.len(),
        format!("Packed {} chunks into {} bytes", chunks.len(), buffer.len()),
    ));
    Ok(buffer)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
