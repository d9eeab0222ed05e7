//! Fixed-shape 3D view over a chunk's voxel array.

use std::ops::Index;

use crate::cache::VoxelData;

/// A `[size, size, size]` view over a chunk, row-major with Z fastest
/// (`x * size² + y * size + z`).
#[derive(Clone, Debug)]
pub struct ChunkView {
    data: VoxelData,
    size: usize,
}

impl ChunkView {
    /// Wraps `data` if it holds exactly `size³` voxels.
    pub fn new(data: VoxelData, size: usize) -> Option<Self> {
        (data.len() == size * size * size).then_some(Self { data, size })
    }

    /// Edge length in voxels.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Shape of the view, `[size, size, size]`.
    pub fn shape(&self) -> [usize; 3] {
        [self.size; 3]
    }

    /// Voxel at `(x, y, z)`, or `None` outside the chunk.
    pub fn get(&self, x: usize, y: usize, z: usize) -> Option<u16> {
        if x >= self.size || y >= self.size || z >= self.size {
            return None;
        }
        Some(self.data[self.linear_index(x, y, z)])
    }

    /// Flat backing array.
    pub fn as_slice(&self) -> &[u16] {
        &self.data
    }

    /// Unwraps the shared backing array.
    pub fn into_data(self) -> VoxelData {
        self.data
    }

    fn linear_index(&self, x: usize, y: usize, z: usize) -> usize {
        (x * self.size + y) * self.size + z
    }
}

impl Index<[usize; 3]> for ChunkView {
    type Output = u16;

    fn index(&self, [x, y, z]: [usize; 3]) -> &u16 {
        assert!(
            x < self.size && y < self.size && z < self.size,
            "voxel ({x}, {y}, {z}) outside chunk of size {}",
            self.size
        );
        &self.data[self.linear_index(x, y, z)]
    }
}
