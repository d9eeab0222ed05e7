//! Demo chunk generator: fBm heightmap over simplex noise.

use noaworld::ChunkCoord;
use noaworld::format::chunk_volume;
use noaworld_config::TerrainConfig;
use noise::{NoiseFn, Simplex};

/// Voxel ids written by [`TerrainGenerator`].
pub mod blocks {
    /// Empty space.
    pub const AIR: u16 = 0;
    /// Deep fill.
    pub const STONE: u16 = 1;
    /// A few voxels under the surface.
    pub const DIRT: u16 = 2;
    /// Top voxel of each column.
    pub const GRASS: u16 = 3;
    /// Fills air below the base height.
    pub const WATER: u16 = 4;
}

/// Dirt layer depth below the grass voxel.
const DIRT_DEPTH: i64 = 3;
const LACUNARITY: f64 = 2.0;
const PERSISTENCE: f64 = 0.5;

/// Column heights from multi-octave simplex noise, filled into chunks.
#[derive(Clone, Debug)]
pub struct TerrainGenerator {
    noise: Simplex,
    params: TerrainConfig,
}

impl TerrainGenerator {
    /// Create a generator for the given terrain settings.
    pub fn new(params: TerrainConfig) -> Self {
        Self {
            noise: Simplex::new(params.seed),
            params,
        }
    }

    /// Surface height (world Y of the top solid voxel) at a world column.
    pub fn surface_height(&self, wx: i64, wz: i64) -> i64 {
        let mut total = 0.0;
        let mut frequency = self.params.frequency;
        let mut amplitude = self.params.amplitude;

        for _ in 0..self.params.octaves {
            total += self.noise.get([wx as f64 * frequency, wz as f64 * frequency]) * amplitude;
            frequency *= LACUNARITY;
            amplitude *= PERSISTENCE;
        }

        (self.params.base_height + total).floor() as i64
    }

    /// Voxel id at a world position given its column's surface height.
    fn block_at(&self, wy: i64, surface: i64) -> u16 {
        let sea_level = self.params.base_height.floor() as i64;
        if wy > surface {
            if wy <= sea_level { blocks::WATER } else { blocks::AIR }
        } else if wy == surface {
            blocks::GRASS
        } else if wy >= surface - DIRT_DEPTH {
            blocks::DIRT
        } else {
            blocks::STONE
        }
    }

    /// Generates one chunk in `(x * size + y) * size + z` order.
    pub fn chunk(&self, coord: ChunkCoord, size: u16) -> Vec<u16> {
        let s = usize::from(size);
        let origin = |c: i16| i64::from(c) * i64::from(size);
        let (ox, oy, oz) = (origin(coord.x), origin(coord.y), origin(coord.z));

        let mut voxels = vec![blocks::AIR; chunk_volume(size)];
        for x in 0..s {
            for z in 0..s {
                let surface = self.surface_height(ox + x as i64, oz + z as i64);
                for y in 0..s {
                    voxels[(x * s + y) * s + z] = self.block_at(oy + y as i64, surface);
                }
            }
        }
        voxels
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
