//! Byte encoding of chunk voxels, inventories, and the shared error type.
//!
//! ## Voxel layout
//!
//! `CHUNK_DATA_LEN = CHUNK_VOL * 4` bytes in four planes of `CHUNK_VOL` bytes
//! each, in voxel-index order:
//!
//! | Plane | Content |
//! |-------|---------|
//! | 0 | block id, high byte |
//! | 1 | block id, low byte |
//! | 2 | state, high byte |
//! | 3 | state, low byte |
//!
//! Grouping like bytes together gives long runs for the region RLE codec.
//!
//! ## Inventory layout
//!
//! `count: u32 BE` followed by `count` records of `index: u32 BE, id: u64 BE`
//! in ascending index order.

use rustc_hash::FxHashMap;

use crate::chunk::{CHUNK_VOL, Chunk, InventoryId};
use crate::metadata::read_u32;
use crate::registry::{ContentRegistry, ContentRemap};
use crate::voxel::{BlockId, BlockState, Voxel};

/// Serialized voxel payload size.
pub const CHUNK_DATA_LEN: usize = CHUNK_VOL * 4;

/// Errors that can occur while decoding chunk payloads.
#[derive(Debug, thiserror::Error)]
pub enum ChunkSerError {
    /// A fixed-size payload had the wrong length.
    #[error("wrong payload length: expected {expected} bytes, got {actual}")]
    WrongLength {
        /// Required byte count.
        expected: usize,
        /// Actual byte count received.
        actual: usize,
    },
    /// A variable-size payload ended early.
    #[error("data truncated: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Minimum expected byte count.
        expected: usize,
        /// Actual byte count received.
        actual: usize,
    },
}

impl Chunk {
    /// Encodes the voxel buffer to `CHUNK_DATA_LEN` planar bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; CHUNK_DATA_LEN];
        let (id_hi, rest) = buf.split_at_mut(CHUNK_VOL);
        let (id_lo, rest) = rest.split_at_mut(CHUNK_VOL);
        let (st_hi, st_lo) = rest.split_at_mut(CHUNK_VOL);
        for (i, voxel) in self.voxels().iter().enumerate() {
            let [ih, il] = voxel.id.0.to_be_bytes();
            let [sh, sl] = voxel.state.0.to_be_bytes();
            id_hi[i] = ih;
            id_lo[i] = il;
            st_hi[i] = sh;
            st_lo[i] = sl;
        }
        buf
    }

    /// Replaces the voxel buffer with decoded bytes and recomputes heights.
    ///
    /// The buffer is left untouched if `bytes` has the wrong length.
    pub fn decode(&mut self, bytes: &[u8]) -> Result<(), ChunkSerError> {
        if bytes.len() != CHUNK_DATA_LEN {
            return Err(ChunkSerError::WrongLength {
                expected: CHUNK_DATA_LEN,
                actual: bytes.len(),
            });
        }
        let (id_hi, rest) = bytes.split_at(CHUNK_VOL);
        let (id_lo, rest) = rest.split_at(CHUNK_VOL);
        let (st_hi, st_lo) = rest.split_at(CHUNK_VOL);
        for (i, voxel) in self.voxels_mut().iter_mut().enumerate() {
            *voxel = Voxel {
                id: BlockId(u16::from_be_bytes([id_hi[i], id_lo[i]])),
                state: BlockState(u16::from_be_bytes([st_hi[i], st_lo[i]])),
            };
        }
        self.update_heights();
        Ok(())
    }

    /// Like [`Chunk::decode`], but replaces ids unknown to `content` with air.
    ///
    /// Returns the number of voxels that were coerced.
    pub fn decode_checked(
        &mut self,
        bytes: &[u8],
        content: &ContentRegistry,
    ) -> Result<usize, ChunkSerError> {
        self.decode(bytes)?;
        Ok(self.coerce_unknown(content))
    }

    /// Replaces every voxel whose id `content` does not know with air.
    ///
    /// Returns the number of voxels that were coerced.
    pub fn coerce_unknown(&mut self, content: &ContentRegistry) -> usize {
        let mut coerced = 0usize;
        for voxel in self.voxels_mut() {
            if !content.contains(voxel.id) {
                *voxel = Voxel::AIR;
                coerced += 1;
            }
        }
        if coerced > 0 {
            tracing::warn!(
                "chunk ({}, {}) had {} voxels with unknown block ids, replaced with air",
                self.cx,
                self.cz,
                coerced
            );
            self.update_heights();
        }
        coerced
    }

    /// Rewrites every block id through `table`.
    pub fn remap(&mut self, table: &ContentRemap) {
        for voxel in self.voxels_mut() {
            voxel.id = table.map(voxel.id);
        }
        self.update_heights();
    }

    /// Encodes the block-bound inventory map.
    pub fn encode_inventories(&self) -> Vec<u8> {
        let mut entries: Vec<(u32, InventoryId)> = self.inventories().collect();
        entries.sort_unstable_by_key(|&(index, _)| index);

        let mut buf = Vec::with_capacity(4 + entries.len() * 12);
        buf.extend_from_slice(&(entries.len() as u32).to_be_bytes());
        for (index, id) in entries {
            buf.extend_from_slice(&index.to_be_bytes());
            buf.extend_from_slice(&id.to_be_bytes());
        }
        buf
    }

    /// Replaces the inventory map with decoded bytes.
    pub fn decode_inventories(&mut self, data: &[u8]) -> Result<(), ChunkSerError> {
        let mut cursor = 0usize;
        let count = read_u32(data, &mut cursor)?;
        let mut map = FxHashMap::default();
        for _ in 0..count {
            let index = read_u32(data, &mut cursor)?;
            let hi = read_u32(data, &mut cursor)?;
            let lo = read_u32(data, &mut cursor)?;
            map.insert(index, (u64::from(hi) << 32) | u64::from(lo));
        }
        self.replace_inventories(map);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::BlockDef;

    fn sample_chunk() -> (Chunk, ContentRegistry) {
        let mut content = ContentRegistry::new();
        let stone = content.register(BlockDef::opaque("base:stone")).unwrap();
        let glass = content.register(BlockDef::opaque("base:glass")).unwrap();
        let mut chunk = Chunk::new(2, -7);
        for x in 0..16 {
            for z in 0..16 {
                chunk.set_voxel(x, 0, z, Voxel::of(stone), &content);
            }
        }
        chunk.set_voxel(3, 64, 9, Voxel::new(glass, BlockState::pack(3, 0, 0xA5)), &content);
        (chunk, content)
    }

    #[test]
    fn test_encode_length_and_planes() {
        let (chunk, _) = sample_chunk();
        let bytes = chunk.encode();
        assert_eq!(bytes.len(), CHUNK_DATA_LEN);
        // Voxel 0 is stone (id 1): high plane 0, low plane 1.
        assert_eq!(bytes[0], 0);
        assert_eq!(bytes[CHUNK_VOL], 1);
    }

    #[test]
    fn test_decode_restores_voxels_and_heights() {
        let (chunk, _) = sample_chunk();
        let mut restored = Chunk::new(2, -7);
        restored.decode(&chunk.encode()).unwrap();
        assert_eq!(restored.voxels(), chunk.voxels());
        assert_eq!((restored.bottom(), restored.top()), (0, 65));
        assert_eq!(restored.get(3, 64, 9).unwrap().state.userbits(), 0xA5);
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        let mut chunk = Chunk::new(0, 0);
        let result = chunk.decode(&[0u8; 100]);
        assert!(matches!(
            result,
            Err(ChunkSerError::WrongLength {
                expected: CHUNK_DATA_LEN,
                actual: 100
            })
        ));
    }

    #[test]
    fn test_decode_checked_coerces_unknown_ids() {
        let (chunk, _) = sample_chunk();
        let mut bytes = chunk.encode();
        // Voxel 5 gets id 0x0900, unknown to the registry.
        bytes[5] = 0x09;

        let small = ContentRegistry::new();
        let mut restored = Chunk::new(0, 0);
        let coerced = restored.decode_checked(&bytes, &small).unwrap();
        // Every stone and glass voxel is unknown to an air-only registry.
        assert_eq!(coerced, 16 * 16 + 1);
        assert!(restored.voxels().iter().all(|v| v.is_air()));
        assert!(restored.is_empty());
    }

    #[test]
    fn test_remap_rewrites_ids() {
        let (mut chunk, content) = sample_chunk();
        // Saved as [air, stone, glass]; current registry swaps them.
        let mut swapped = ContentRegistry::new();
        let glass = swapped.register(BlockDef::opaque("base:glass")).unwrap();
        let stone = swapped.register(BlockDef::opaque("base:stone")).unwrap();
        let table = ContentRemap::from_names(&content.names(), &swapped);

        chunk.remap(&table);
        assert_eq!(chunk.get(0, 0, 0).unwrap().id, stone);
        assert_eq!(chunk.get(3, 64, 9).unwrap().id, glass);
    }

    #[test]
    fn test_inventories_encode_decode() {
        let mut chunk = Chunk::new(0, 0);
        chunk.add_inventory(10, 0x0102_0304_0506_0708);
        chunk.add_inventory(3, 9);
        let bytes = chunk.encode_inventories();
        assert_eq!(bytes.len(), 4 + 2 * 12);

        let mut restored = Chunk::new(0, 0);
        restored.decode_inventories(&bytes).unwrap();
        assert_eq!(restored.inventory(10), Some(0x0102_0304_0506_0708));
        assert_eq!(restored.inventory(3), Some(9));

        assert!(restored.decode_inventories(&bytes[..7]).is_err());
    }
}
