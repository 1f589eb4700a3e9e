//! The chunk entity: a fixed 16×256×16 column of voxels plus its lightmap,
//! block metadata, block-bound inventories, and status flags.
//!
//! Voxels are stored in a single contiguous buffer indexed
//! `(y * CHUNK_D + z) * CHUNK_W + x`, so a horizontal layer is contiguous and
//! the buffer can be handed to a generator as a flat slice.

use rustc_hash::FxHashMap;

use crate::lightmap::Lightmap;
use crate::metadata::BlockDataHeap;
use crate::registry::ContentRegistry;
use crate::voxel::Voxel;

/// Chunk width along X.
pub const CHUNK_W: usize = 16;
/// Chunk height along Y.
pub const CHUNK_H: usize = 256;
/// Chunk depth along Z.
pub const CHUNK_D: usize = 16;
/// Voxels per chunk.
pub const CHUNK_VOL: usize = CHUNK_W * CHUNK_H * CHUNK_D;

/// Identifier of an inventory owned by an external inventory store.
pub type InventoryId = u64;

/// Returns the buffer index for local coordinates, or `None` out of range.
#[inline]
pub fn vox_index(x: usize, y: usize, z: usize) -> Option<usize> {
    if x < CHUNK_W && y < CHUNK_H && z < CHUNK_D {
        Some((y * CHUNK_D + z) * CHUNK_W + x)
    } else {
        None
    }
}

/// Inverse of [`vox_index`].
#[inline]
pub fn vox_coords(index: usize) -> (usize, usize, usize) {
    let x = index % CHUNK_W;
    let z = (index / CHUNK_W) % CHUNK_D;
    let y = index / (CHUNK_W * CHUNK_D);
    (x, y, z)
}

/// Status flags of a chunk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChunkFlags {
    /// Changed since the last mesh/consumer sync.
    pub modified: bool,
    /// Changed since the last save.
    pub unsaved: bool,
    /// Voxel data is present (loaded or generated).
    pub loaded: bool,
    /// Lighting has been built for this chunk.
    pub lighted: bool,
    /// The lightmap came from disk rather than being computed.
    pub loaded_lights: bool,
    /// Entities reference this chunk.
    pub has_entities: bool,
    /// The metadata heap is non-empty.
    pub has_block_data: bool,
}

/// One chunk of the world.
#[derive(Clone, Debug)]
pub struct Chunk {
    /// Chunk X coordinate.
    pub cx: i32,
    /// Chunk Z coordinate.
    pub cz: i32,
    voxels: Box<[Voxel]>,
    /// Propagated light of this chunk.
    pub lightmap: Lightmap,
    /// Per-voxel structured metadata.
    pub blocks_data: BlockDataHeap,
    inventories: FxHashMap<u32, InventoryId>,
    /// Status flags.
    pub flags: ChunkFlags,
    bottom: usize,
    top: usize,
}

impl Chunk {
    /// Creates an all-air chunk at `(cx, cz)`.
    pub fn new(cx: i32, cz: i32) -> Self {
        Self {
            cx,
            cz,
            voxels: vec![Voxel::AIR; CHUNK_VOL].into_boxed_slice(),
            lightmap: Lightmap::new(),
            blocks_data: BlockDataHeap::new(),
            inventories: FxHashMap::default(),
            flags: ChunkFlags::default(),
            bottom: 0,
            top: 0,
        }
    }

    /// Returns the voxel at local `(x, y, z)`, or `None` out of range.
    pub fn get(&self, x: usize, y: usize, z: usize) -> Option<Voxel> {
        vox_index(x, y, z).map(|i| self.voxels[i])
    }

    /// Mutable access to one voxel.
    ///
    /// Bypasses height, metadata and flag bookkeeping; callers that change the
    /// block id through this must call [`Chunk::update_heights`] and set the
    /// flags themselves.
    pub fn get_mut(&mut self, x: usize, y: usize, z: usize) -> Option<&mut Voxel> {
        vox_index(x, y, z).map(|i| &mut self.voxels[i])
    }

    /// The raw voxel buffer.
    pub fn voxels(&self) -> &[Voxel] {
        &self.voxels
    }

    /// The raw voxel buffer, e.g. as a generator target.
    ///
    /// Call [`Chunk::update_heights`] after bulk writes.
    pub fn voxels_mut(&mut self) -> &mut [Voxel] {
        &mut self.voxels
    }

    /// Lowest Y containing a non-air voxel.
    pub fn bottom(&self) -> usize {
        self.bottom
    }

    /// One past the highest Y containing a non-air voxel.
    pub fn top(&self) -> usize {
        self.top
    }

    /// Returns `true` if the chunk contains only air.
    pub fn is_empty(&self) -> bool {
        self.bottom == self.top
    }

    /// Writes a voxel at local `(x, y, z)`.
    ///
    /// Maintains the non-air height range, drops metadata and inventory entries
    /// the new block type does not declare, allocates metadata for origin
    /// cells of types that do, and marks the chunk modified and unsaved.
    /// Returns `false` (with a warning) for out-of-range coordinates.
    pub fn set_voxel(
        &mut self,
        x: usize,
        y: usize,
        z: usize,
        voxel: Voxel,
        content: &ContentRegistry,
    ) -> bool {
        let Some(index) = vox_index(x, y, z) else {
            tracing::warn!("Chunk::set_voxel out of bounds: ({}, {}, {})", x, y, z);
            return false;
        };

        let previous = self.voxels[index];
        self.voxels[index] = voxel;

        if previous.id != voxel.id || previous.state.segment() != voxel.state.segment() {
            let def = content.get(voxel.id);
            let key = index as u32;
            self.blocks_data.free(key);
            if def.data_size > 0 && !voxel.is_segment() {
                self.blocks_data.allocate(key, def.data_size as usize);
            }
            if def.inventory_size == 0 || voxel.is_segment() {
                self.inventories.remove(&key);
            }
            self.flags.has_block_data = !self.blocks_data.is_empty();
        }

        if voxel.is_air() {
            if !previous.is_air() && (y == self.bottom || y + 1 == self.top) {
                self.update_heights();
            }
        } else if self.is_empty() {
            self.bottom = y;
            self.top = y + 1;
        } else {
            self.bottom = self.bottom.min(y);
            self.top = self.top.max(y + 1);
        }

        self.flags.modified = true;
        self.flags.unsaved = true;
        true
    }

    /// Recomputes the non-air height range by scanning from both ends.
    pub fn update_heights(&mut self) {
        let layer = CHUNK_W * CHUNK_D;
        let non_air = |y: &usize| {
            self.voxels[y * layer..(y + 1) * layer]
                .iter()
                .any(|v| !v.is_air())
        };
        match (0..CHUNK_H).find(non_air) {
            Some(bottom) => {
                let top = (bottom..CHUNK_H).rev().find(non_air).unwrap_or(bottom);
                self.bottom = bottom;
                self.top = top + 1;
            }
            None => {
                self.bottom = 0;
                self.top = 0;
            }
        }
    }

    /// Inventory bound to the voxel at `index`, if any.
    pub fn inventory(&self, index: u32) -> Option<InventoryId> {
        self.inventories.get(&index).copied()
    }

    /// Binds an inventory to the voxel at `index`.
    pub fn add_inventory(&mut self, index: u32, id: InventoryId) {
        self.inventories.insert(index, id);
        self.flags.unsaved = true;
    }

    /// Unbinds the inventory at `index`, returning it.
    pub fn remove_inventory(&mut self, index: u32) -> Option<InventoryId> {
        let removed = self.inventories.remove(&index);
        if removed.is_some() {
            self.flags.unsaved = true;
        }
        removed
    }

    /// Iterates `(voxel index, inventory id)` pairs in unspecified order.
    pub fn inventories(&self) -> impl Iterator<Item = (u32, InventoryId)> + '_ {
        self.inventories.iter().map(|(&i, &id)| (i, id))
    }

    pub(crate) fn replace_inventories(&mut self, inventories: FxHashMap<u32, InventoryId>) {
        self.inventories = inventories;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::BlockDef;
    use crate::voxel::{BlockId, BlockState};

    fn content() -> (ContentRegistry, BlockId, BlockId, BlockId) {
        let mut registry = ContentRegistry::new();
        let stone = registry.register(BlockDef::opaque("base:stone")).unwrap();
        let sign = registry
            .register(BlockDef {
                data_size: 8,
                ..BlockDef::opaque("base:sign")
            })
            .unwrap();
        let chest = registry
            .register(BlockDef {
                inventory_size: 27,
                ..BlockDef::opaque("base:chest")
            })
            .unwrap();
        (registry, stone, sign, chest)
    }

    #[test]
    fn test_index_layout() {
        assert_eq!(vox_index(0, 0, 0), Some(0));
        assert_eq!(vox_index(1, 0, 0), Some(1));
        assert_eq!(vox_index(0, 0, 1), Some(CHUNK_W));
        assert_eq!(vox_index(0, 1, 0), Some(CHUNK_W * CHUNK_D));
        assert_eq!(vox_index(16, 0, 0), None);
        assert_eq!(vox_coords(vox_index(5, 200, 9).unwrap()), (5, 200, 9));
    }

    #[test]
    fn test_new_chunk_is_air() {
        let chunk = Chunk::new(3, -2);
        assert_eq!(chunk.get(0, 0, 0), Some(Voxel::AIR));
        assert!(chunk.is_empty());
        assert_eq!((chunk.bottom(), chunk.top()), (0, 0));
        assert_eq!(chunk.get(0, 256, 0), None);
    }

    #[test]
    fn test_set_voxel_tracks_heights() {
        let (content, stone, ..) = content();
        let mut chunk = Chunk::new(0, 0);

        assert!(chunk.set_voxel(1, 50, 1, Voxel::of(stone), &content));
        assert_eq!((chunk.bottom(), chunk.top()), (50, 51));

        chunk.set_voxel(2, 10, 2, Voxel::of(stone), &content);
        chunk.set_voxel(2, 90, 2, Voxel::of(stone), &content);
        assert_eq!((chunk.bottom(), chunk.top()), (10, 91));

        chunk.set_voxel(2, 90, 2, Voxel::AIR, &content);
        assert_eq!((chunk.bottom(), chunk.top()), (10, 51));

        chunk.set_voxel(2, 10, 2, Voxel::AIR, &content);
        assert_eq!((chunk.bottom(), chunk.top()), (50, 51));

        chunk.set_voxel(1, 50, 1, Voxel::AIR, &content);
        assert!(chunk.is_empty());
    }

    #[test]
    fn test_set_voxel_marks_flags() {
        let (content, stone, ..) = content();
        let mut chunk = Chunk::new(0, 0);
        assert!(!chunk.flags.unsaved);
        chunk.set_voxel(0, 0, 0, Voxel::of(stone), &content);
        assert!(chunk.flags.modified);
        assert!(chunk.flags.unsaved);
    }

    #[test]
    fn test_set_voxel_out_of_range() {
        let (content, stone, ..) = content();
        let mut chunk = Chunk::new(0, 0);
        assert!(!chunk.set_voxel(0, 300, 0, Voxel::of(stone), &content));
        assert!(!chunk.flags.unsaved);
    }

    #[test]
    fn test_metadata_follows_block_type() {
        let (content, stone, sign, _) = content();
        let mut chunk = Chunk::new(0, 0);
        let index = vox_index(4, 4, 4).unwrap() as u32;

        chunk.set_voxel(4, 4, 4, Voxel::of(sign), &content);
        assert_eq!(chunk.blocks_data.find(index).map(<[u8]>::len), Some(8));
        assert!(chunk.flags.has_block_data);

        chunk.set_voxel(4, 4, 4, Voxel::of(stone), &content);
        assert!(chunk.blocks_data.find(index).is_none());
        assert!(!chunk.flags.has_block_data);
    }

    #[test]
    fn test_inventory_cleared_by_replacement() {
        let (content, stone, _, chest) = content();
        let mut chunk = Chunk::new(0, 0);
        let index = vox_index(1, 2, 3).unwrap() as u32;

        chunk.set_voxel(1, 2, 3, Voxel::of(chest), &content);
        chunk.add_inventory(index, 77);
        assert_eq!(chunk.inventory(index), Some(77));

        // Rotating the chest keeps its inventory.
        chunk.set_voxel(1, 2, 3, Voxel::new(chest, BlockState::pack(2, 0, 0)), &content);
        assert_eq!(chunk.inventory(index), Some(77));

        chunk.set_voxel(1, 2, 3, Voxel::of(stone), &content);
        assert_eq!(chunk.inventory(index), None);
    }

    #[test]
    fn test_update_heights_after_bulk_write() {
        let (_, stone, ..) = content();
        let mut chunk = Chunk::new(0, 0);
        let layer = CHUNK_W * CHUNK_D;
        for v in &mut chunk.voxels_mut()[..layer * 64] {
            *v = Voxel::of(stone);
        }
        chunk.update_heights();
        assert_eq!((chunk.bottom(), chunk.top()), (0, 64));
    }
}
