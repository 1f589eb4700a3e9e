//! Parallel region namespaces.

use strata_voxel::{CHUNK_DATA_LEN, LIGHTMAP_DATA_LEN};

/// One of the independent region directories of a world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RegionLayer {
    /// Chunk voxel payloads.
    Voxels,
    /// Chunk lightmaps.
    Lights,
    /// Block-bound inventory maps.
    Inventories,
    /// Per-block metadata heaps.
    BlocksData,
}

impl RegionLayer {
    /// Every layer.
    pub const ALL: [RegionLayer; 4] = [
        RegionLayer::Voxels,
        RegionLayer::Lights,
        RegionLayer::Inventories,
        RegionLayer::BlocksData,
    ];

    /// Directory name under the world root.
    pub fn folder(self) -> &'static str {
        match self {
            RegionLayer::Voxels => "regions",
            RegionLayer::Lights => "lights",
            RegionLayer::Inventories => "inventories",
            RegionLayer::BlocksData => "blocksdata",
        }
    }

    /// Fixed decoded payload length for RLE-compressed layers; `None` for
    /// variable-length layers stored raw.
    pub fn data_len(self) -> Option<usize> {
        match self {
            RegionLayer::Voxels => Some(CHUNK_DATA_LEN),
            RegionLayer::Lights => Some(LIGHTMAP_DATA_LEN),
            RegionLayer::Inventories | RegionLayer::BlocksData => None,
        }
    }

    /// Returns `true` if payloads of this layer are RLE-compressed.
    pub fn is_compressed(self) -> bool {
        self.data_len().is_some()
    }
}
