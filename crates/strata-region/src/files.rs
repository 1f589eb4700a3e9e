//! World directory layout and the small JSON side files.
//!
//! ```text
//! <world>/
//!   regions/      voxel region files
//!   lights/       lightmap region files
//!   inventories/  inventory-map region files
//!   blocksdata/   metadata-heap region files
//!   world.json    world info
//!   player.json   owned by the player subsystem
//!   indices.json  block id -> name table the save was written with
//!   packs.list    enabled content packs, one per line
//! ```
//!
//! Every file is optional; a fresh directory reads as "nothing saved yet".

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::RegionError;
use crate::layer::RegionLayer;

/// Persistent world metadata (`world.json`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldInfo {
    pub name: String,
    pub seed: u64,
    pub generator: String,
    /// Region format version the world was last written with.
    pub format_version: u8,
}

impl Default for WorldInfo {
    fn default() -> Self {
        Self {
            name: "world".to_string(),
            seed: 0,
            generator: "flat".to_string(),
            format_version: crate::format::REGION_FORMAT_VERSION,
        }
    }
}

/// Block names in id order (`indices.json`).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentIndices {
    pub blocks: Vec<String>,
}

/// Paths and side-file I/O for one world directory.
#[derive(Clone, Debug)]
pub struct WorldFiles {
    directory: PathBuf,
}

impl WorldFiles {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Directory holding the region files of `layer`.
    pub fn layer_dir(&self, layer: RegionLayer) -> PathBuf {
        self.directory.join(layer.folder())
    }

    pub fn world_info_path(&self) -> PathBuf {
        self.directory.join("world.json")
    }

    pub fn player_path(&self) -> PathBuf {
        self.directory.join("player.json")
    }

    pub fn indices_path(&self) -> PathBuf {
        self.directory.join("indices.json")
    }

    pub fn packs_path(&self) -> PathBuf {
        self.directory.join("packs.list")
    }

    /// Creates the world directory and every layer directory.
    pub fn create_directories(&self) -> Result<(), RegionError> {
        for layer in RegionLayer::ALL {
            fs::create_dir_all(self.layer_dir(layer))?;
        }
        Ok(())
    }

    /// Reads `world.json`, or `None` if absent.
    pub fn read_world_info(&self) -> Result<Option<WorldInfo>, RegionError> {
        read_json(&self.world_info_path())
    }

    pub fn write_world_info(&self, info: &WorldInfo) -> Result<(), RegionError> {
        write_json(&self.world_info_path(), info)
    }

    /// Reads the saved id→name table, or `None` if absent.
    pub fn read_indices(&self) -> Result<Option<Vec<String>>, RegionError> {
        Ok(read_json::<ContentIndices>(&self.indices_path())?.map(|i| i.blocks))
    }

    pub fn write_indices(&self, names: &[String]) -> Result<(), RegionError> {
        let indices = ContentIndices {
            blocks: names.to_vec(),
        };
        write_json(&self.indices_path(), &indices)
    }

    /// Enabled content packs; empty if `packs.list` is absent.
    pub fn read_packs(&self) -> Result<Vec<String>, RegionError> {
        match fs::read_to_string(self.packs_path()) {
            Ok(text) => Ok(text
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn write_packs(&self, packs: &[String]) -> Result<(), RegionError> {
        fs::create_dir_all(&self.directory)?;
        let mut text = packs.join("\n");
        text.push('\n');
        fs::write(self.packs_path(), text)?;
        Ok(())
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>, RegionError> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(serde_json::from_str(&text)?)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), RegionError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let text = serde_json::to_string_pretty(value)?;
    fs::write(path, text)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_directory_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let files = WorldFiles::new(dir.path().join("world"));
        assert!(files.read_world_info().unwrap().is_none());
        assert!(files.read_indices().unwrap().is_none());
        assert!(files.read_packs().unwrap().is_empty());
    }

    #[test]
    fn test_world_info_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let files = WorldFiles::new(dir.path());
        let info = WorldInfo {
            name: "test".to_string(),
            seed: 42,
            ..WorldInfo::default()
        };
        files.write_world_info(&info).unwrap();
        assert_eq!(files.read_world_info().unwrap(), Some(info));
    }

    #[test]
    fn test_partial_world_info_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let files = WorldFiles::new(dir.path());
        fs::write(files.world_info_path(), r#"{ "seed": 7 }"#).unwrap();
        let info = files.read_world_info().unwrap().unwrap();
        assert_eq!(info.seed, 7);
        assert_eq!(info.generator, "flat");
    }

    #[test]
    fn test_malformed_json_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let files = WorldFiles::new(dir.path());
        fs::write(files.indices_path(), "not json").unwrap();
        assert!(matches!(files.read_indices(), Err(RegionError::Json(_))));
    }

    #[test]
    fn test_indices_and_packs_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let files = WorldFiles::new(dir.path());
        let names = vec!["core:air".to_string(), "base:stone".to_string()];
        files.write_indices(&names).unwrap();
        assert_eq!(files.read_indices().unwrap(), Some(names));

        files.write_packs(&["base".to_string(), "extra".to_string()]).unwrap();
        assert_eq!(files.read_packs().unwrap(), vec!["base", "extra"]);
    }

    #[test]
    fn test_create_directories() {
        let dir = tempfile::tempdir().unwrap();
        let files = WorldFiles::new(dir.path());
        files.create_directories().unwrap();
        for name in ["regions", "lights", "inventories", "blocksdata"] {
            assert!(dir.path().join(name).is_dir());
        }
    }
}
