//! Subcommand implementations. Each returns data; `main` does the printing.

use std::error::Error;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use strata_config::WorldConfig;
use strata_region::{
    MAX_OPEN_REGION_FILES, RegionLayer, RegionStore, WorldFiles, WorldInfo, region_path,
    slot_chunk,
};
use strata_voxel::{BlockDef, ChunkSource, ContentRegistry};
use strata_world::{FlatGenerator, World};
use tracing::info;

pub type CommandResult<T> = Result<T, Box<dyn Error>>;

/// What `strata info` prints.
#[derive(Debug)]
pub struct WorldSummary {
    pub info: Option<WorldInfo>,
    pub blocks: Option<usize>,
    pub packs: Vec<String>,
    pub chunks: usize,
}

impl fmt::Display for WorldSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.info {
            Some(info) => {
                writeln!(f, "name:      {}", info.name)?;
                writeln!(f, "seed:      {}", info.seed)?;
                writeln!(f, "generator: {}", info.generator)?;
                writeln!(f, "format:    v{}", info.format_version)?;
            }
            None => writeln!(f, "no world.json")?,
        }
        match self.blocks {
            Some(blocks) => writeln!(f, "blocks:    {blocks}")?,
            None => writeln!(f, "blocks:    no indices.json")?,
        }
        if !self.packs.is_empty() {
            writeln!(f, "packs:     {}", self.packs.join(", "))?;
        }
        writeln!(f, "chunks:    {}", self.chunks)
    }
}

/// One region file of a layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegionSummary {
    pub rx: i32,
    pub rz: i32,
    pub chunks: usize,
    pub bytes: u64,
}

impl fmt::Display for RegionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>5} {:>5}  {:>4} chunks  {:>9} bytes",
            self.rx, self.rz, self.chunks, self.bytes
        )
    }
}

pub fn info(directory: &Path) -> CommandResult<WorldSummary> {
    let files = WorldFiles::new(directory);
    let store = RegionStore::new(directory, MAX_OPEN_REGION_FILES);
    Ok(WorldSummary {
        info: files.read_world_info()?,
        blocks: files.read_indices()?.map(|names| names.len()),
        packs: files.read_packs()?,
        chunks: store.stored_chunks(RegionLayer::Voxels)?.len(),
    })
}

pub fn inspect(directory: &Path, layer: RegionLayer) -> CommandResult<Vec<RegionSummary>> {
    let store = RegionStore::new(directory, MAX_OPEN_REGION_FILES);
    let mut summaries = Vec::new();
    for (rx, rz) in store.regions(layer)? {
        let chunks = store.region_slots(layer, rx, rz)?.len();
        let bytes = fs::metadata(region_path(directory, layer, rx, rz))?.len();
        summaries.push(RegionSummary {
            rx,
            rz,
            chunks,
            bytes,
        });
    }
    Ok(summaries)
}

/// Chunk coordinates stored in region `(rx, rz)` of `layer`.
pub fn region_chunks(
    directory: &Path,
    layer: RegionLayer,
    rx: i32,
    rz: i32,
) -> CommandResult<Vec<(i32, i32)>> {
    let store = RegionStore::new(directory, MAX_OPEN_REGION_FILES);
    Ok(store
        .region_slots(layer, rx, rz)?
        .into_iter()
        .map(|slot| slot_chunk(rx, rz, slot))
        .collect())
}

/// Blocks the tool knows without any content packs.
pub fn builtin_content() -> CommandResult<(ContentRegistry, FlatGenerator)> {
    let mut content = ContentRegistry::new();
    let bedrock = content.register(BlockDef::opaque("base:bedrock"))?;
    let stone = content.register(BlockDef::opaque("base:stone"))?;
    let dirt = content.register(BlockDef::opaque("base:dirt"))?;
    let grass = content.register(BlockDef::opaque("base:grass"))?;
    let generator = FlatGenerator::new(vec![(bedrock, 1), (stone, 58), (dirt, 4), (grass, 1)]);
    Ok((content, generator))
}

/// Generates, lights and saves the square of chunks within `radius` of
/// `center`. Returns the number of chunks written.
pub fn generate(config: &WorldConfig, radius: u32, center: (i32, i32)) -> CommandResult<usize> {
    let (content, generator) = builtin_content()?;
    let config = WorldConfig {
        view_distance: radius,
        ..config.clone()
    };

    let mut world = World::open(&config, Arc::new(content), Arc::new(generator))?;
    world.set_center(center.0, center.1)?;
    let loaded = world.load_area()?;

    // Untouched generated chunks are not dirty; force them onto disk.
    let mut count = 0;
    world.matrix().for_each_chunk(&mut |handle| {
        handle.write().flags.unsaved = true;
        count += 1;
    });
    world.close()?;

    info!("generated {} chunks ({} written) around {:?}", loaded, count, center);
    Ok(count)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn world_config(dir: &Path) -> WorldConfig {
        WorldConfig {
            directory: dir.to_path_buf(),
            seed: 42,
            ..WorldConfig::default()
        }
    }

    #[test]
    fn test_info_of_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let summary = info(dir.path()).unwrap();
        assert!(summary.info.is_none());
        assert!(summary.blocks.is_none());
        assert_eq!(summary.chunks, 0);
        assert!(summary.to_string().contains("no world.json"));
    }

    #[test]
    fn test_generate_then_inspect() {
        let dir = tempfile::tempdir().unwrap();
        let config = world_config(dir.path());
        assert_eq!(generate(&config, 1, (0, 0)).unwrap(), 9);

        let summary = info(dir.path()).unwrap();
        assert_eq!(summary.info.as_ref().map(|i| i.seed), Some(42));
        assert_eq!(summary.blocks, Some(5));
        assert_eq!(summary.chunks, 9);

        // Chunks -1..=1 straddle regions (-1, -1), (-1, 0), (0, -1) and (0, 0).
        let regions = inspect(dir.path(), RegionLayer::Voxels).unwrap();
        assert_eq!(regions.len(), 4);
        assert_eq!(regions.iter().map(|r| r.chunks).sum::<usize>(), 9);
        assert!(regions.iter().all(|r| r.bytes > 0));

        let mut chunks = region_chunks(dir.path(), RegionLayer::Voxels, 0, 0).unwrap();
        chunks.sort();
        assert_eq!(chunks, vec![(0, 0), (0, 1), (1, 0), (1, 1)]);
    }

    #[test]
    fn test_inspect_missing_layer_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(inspect(dir.path(), RegionLayer::Lights).unwrap().is_empty());
        assert!(
            region_chunks(dir.path(), RegionLayer::Voxels, 3, 3)
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_builtin_content() {
        let (content, generator) = builtin_content().unwrap();
        assert!(content.lookup_by_name("base:grass").is_some());
        assert_eq!(generator.height(), 64);
    }
}
