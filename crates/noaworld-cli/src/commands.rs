//! Subcommand implementations. Each returns a report; `main` prints it.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Instant;

use noaworld::{
    BakeConfigError, BakeError, BakeProgress, ChunkBounds, ChunkView, LoadError, WorldLoader,
    WorldStats,
};
use noaworld_config::{Config, LoaderConfig};
use serde::Serialize;
use tracing::info;

use crate::terrain::TerrainGenerator;

/// Anything a subcommand can fail with.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("invalid bake settings: {0}")]
    BakeConfig(#[from] BakeConfigError),
    #[error("bake failed: {0}")]
    Bake(#[from] BakeError),
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to load {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: LoadError,
    },
    #[error("{0} did not produce a loaded world")]
    NotLoaded(PathBuf),
    #[error("chunk ({x}, {y}, {z}) is not in the world")]
    ChunkNotFound { x: i32, y: i32, z: i32 },
    #[error("{stored} stored chunks indexed but {extracted} extracted")]
    Incomplete { stored: usize, extracted: usize },
    #[error("failed to encode report: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result of `bake`.
#[derive(Debug, Serialize)]
pub struct BakeReport {
    pub path: PathBuf,
    pub bytes: usize,
    pub chunks: usize,
    pub estimated_max_bytes: usize,
    pub elapsed_ms: u64,
}

/// Result of `inspect`.
#[derive(Debug, Serialize)]
pub struct InspectReport {
    pub path: PathBuf,
    pub version: u16,
    pub chunk_size: u16,
    pub bounds: ChunkBounds,
    pub checksum: String,
    pub stats: WorldStats,
}

/// Result of `verify`.
#[derive(Debug, Serialize)]
pub struct VerifyReport {
    pub path: PathBuf,
    pub chunks: usize,
    pub extracted: usize,
    pub cached_after_release: usize,
}

/// Generates the configured box of demo terrain and writes it to `output`.
pub fn bake(config: &Config, output: &Path) -> Result<BakeReport, CliError> {
    let terrain = TerrainGenerator::new(config.terrain.clone());
    let mut baker = config
        .bake
        .baker_builder()
        .generator(move |coord, size| terrain.chunk(coord, size))
        .on_progress(|p: &BakeProgress| {
            info!(current = p.current, total = p.total, "{}", p.message);
        })
        .build()?;

    info!(max_bytes = baker.estimate_max_size(), "worst-case container size");
    let started = Instant::now();
    let world = baker.bake()?;
    world.write_to_path(output).map_err(|source| CliError::Write {
        path: output.to_path_buf(),
        source,
    })?;

    Ok(BakeReport {
        path: output.to_path_buf(),
        bytes: world.len(),
        chunks: baker.chunk_count(),
        estimated_max_bytes: baker.estimate_max_size(),
        elapsed_ms: started.elapsed().as_millis() as u64,
    })
}

fn open(path: &Path, settings: &LoaderConfig) -> Result<WorldLoader, CliError> {
    let mut loader = settings.build_loader();
    loader.load_from_path(path).map_err(|source| CliError::Load {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(loader)
}

/// Header fields and chunk statistics.
pub fn inspect(path: &Path) -> Result<InspectReport, CliError> {
    let loader = open(path, &LoaderConfig::default())?;
    let stats = loader.stats();
    let header = loader
        .header()
        .copied()
        .ok_or_else(|| CliError::NotLoaded(path.to_path_buf()))?;

    Ok(InspectReport {
        path: path.to_path_buf(),
        version: header.version,
        chunk_size: header.chunk_size,
        bounds: header.bounds,
        checksum: format!("{:#010x}", header.checksum),
        stats,
    })
}

/// Loads the container (magic, version, index and checksum checks), then
/// releases the buffer, which extracts every stored chunk.
pub fn verify(path: &Path, settings: &LoaderConfig) -> Result<VerifyReport, CliError> {
    let mut loader = open(path, settings)?;
    let stats = loader.stats();
    let extracted = loader.release_buffer();
    if extracted != stats.non_uniform_chunks {
        return Err(CliError::Incomplete {
            stored: stats.non_uniform_chunks,
            extracted,
        });
    }

    Ok(VerifyReport {
        path: path.to_path_buf(),
        chunks: stats.total_chunks,
        extracted,
        cached_after_release: loader.cached_chunks(),
    })
}

/// Voxels of one chunk.
pub fn extract(
    path: &Path,
    settings: &LoaderConfig,
    [x, y, z]: [i32; 3],
) -> Result<ChunkView, CliError> {
    let mut loader = open(path, settings)?;
    if settings.release_after_load {
        loader.release_buffer();
    }
    loader
        .get_chunk_view(x, y, z)
        .ok_or(CliError::ChunkNotFound { x, y, z })
}

/// One block of text per Y layer; rows are X, columns are Z.
pub fn format_layers(view: &ChunkView) -> String {
    let size = view.size();
    let mut out = String::new();
    for y in 0..size {
        let _ = writeln!(out, "y = {y}");
        for x in 0..size {
            let row: Vec<String> = (0..size).map(|z| view[[x, y, z]].to_string()).collect();
            let _ = writeln!(out, "  {}", row.join(" "));
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn small_config() -> Config {
        let mut config = Config::default();
        config.bake.chunk_size = 4;
        config.bake.bounds_min = (-1, -1, -1);
        config.bake.bounds_max = (0, 1, 0);
        config.terrain.amplitude = 3.0;
        config
    }

    fn baked(dir: &Path) -> PathBuf {
        let path = dir.join("demo.noaworld");
        bake(&small_config(), &path).expect("bake");
        path
    }

    #[test]
    fn test_bake_then_inspect() {
        let dir = tempfile::tempdir().unwrap();
        let path = baked(dir.path());

        let report = inspect(&path).expect("inspect");
        assert_eq!(report.chunk_size, 4);
        assert_eq!(report.bounds, small_config().bake.bounds());
        assert_eq!(report.stats.total_chunks, 12);
        assert_eq!(
            report.stats.estimated_bytes,
            std::fs::metadata(&path).unwrap().len() as usize
        );

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["stats"]["total_chunks"], 12);
        assert_eq!(json["bounds"]["x"]["min"], -1);
    }

    #[test]
    fn test_inline_and_worker_bakes_match() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = small_config();
        let worker_path = dir.path().join("worker.noaworld");
        bake(&config, &worker_path).unwrap();

        config.bake.use_worker = false;
        let inline_path = dir.path().join("inline.noaworld");
        bake(&config, &inline_path).unwrap();

        assert_eq!(
            std::fs::read(worker_path).unwrap(),
            std::fs::read(inline_path).unwrap()
        );
    }

    #[test]
    fn test_verify_extracts_everything() {
        let dir = tempfile::tempdir().unwrap();
        let path = baked(dir.path());
        let settings = LoaderConfig {
            cache_capacity: 1,
            release_after_load: false,
        };

        let report = verify(&path, &settings).expect("verify");
        assert_eq!(report.chunks, 12);
        assert!(report.cached_after_release >= report.extracted);
    }

    #[test]
    fn test_verify_rejects_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = baked(dir.path());
        let mut bytes = std::fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        std::fs::write(&path, bytes).unwrap();

        let err = verify(&path, &LoaderConfig::default()).expect_err("corrupt");
        assert!(matches!(
            err,
            CliError::Load {
                source: LoadError::Integrity { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_extract_missing_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let path = baked(dir.path());
        let err = extract(&path, &LoaderConfig::default(), [5, 0, 0]).expect_err("outside");
        assert!(matches!(err, CliError::ChunkNotFound { x: 5, y: 0, z: 0 }));

        let view = extract(&path, &LoaderConfig::default(), [0, 1, 0]).expect("inside");
        assert_eq!(view.shape(), [4, 4, 4]);
    }

    #[test]
    fn test_format_layers() {
        let view = ChunkView::new(Arc::from((0u16..8).collect::<Vec<_>>()), 2).unwrap();
        assert_eq!(format_layers(&view), "y = 0\n  0 1\n  4 5\ny = 1\n  2 3\n  6 7\n");
    }
}
