//! Shared chunk handles and the capability trait over chunk containers.
//!
//! Algorithms that work on world coordinates (lighting, block placement, ray
//! casts, snapshots) are written once against [`ChunkSource`] and reused by
//! every container shape: the bounded chunk matrix and the unbounded chunk
//! directory.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::chunk::{CHUNK_D, CHUNK_H, CHUNK_W, Chunk};
use crate::lightmap::LightChannel;
use crate::registry::ContentRegistry;
use crate::voxel::Voxel;

/// Shared, lockable handle to a resident chunk.
pub type ChunkHandle = Arc<RwLock<Chunk>>;

/// Wraps a chunk in a new handle.
pub fn new_handle(chunk: Chunk) -> ChunkHandle {
    Arc::new(RwLock::new(chunk))
}

/// Chunk coordinates containing world column `(x, z)`.
#[inline]
pub fn chunk_coords(x: i32, z: i32) -> (i32, i32) {
    (x.div_euclid(CHUNK_W as i32), z.div_euclid(CHUNK_D as i32))
}

/// Local chunk coordinates of world position `(x, y, z)`, or `None` if `y` is
/// outside the world's vertical range.
#[inline]
pub fn local_coords(x: i32, y: i32, z: i32) -> Option<(usize, usize, usize)> {
    if y < 0 || y >= CHUNK_H as i32 {
        return None;
    }
    Some((
        x.rem_euclid(CHUNK_W as i32) as usize,
        y as usize,
        z.rem_euclid(CHUNK_D as i32) as usize,
    ))
}

/// A container that can resolve resident chunks by coordinate.
pub trait ChunkSource {
    /// The handle for chunk `(cx, cz)` if it is resident.
    fn chunk(&self, cx: i32, cz: i32) -> Option<&ChunkHandle>;

    /// Block definitions used to interpret voxel ids.
    fn content(&self) -> &ContentRegistry;

    /// Visits every resident chunk.
    fn for_each_chunk(&self, f: &mut dyn FnMut(&ChunkHandle));

    /// The handle owning world position `(x, z)`.
    fn chunk_at(&self, x: i32, z: i32) -> Option<&ChunkHandle> {
        let (cx, cz) = chunk_coords(x, z);
        self.chunk(cx, cz)
    }

    /// The voxel at world `(x, y, z)`, or `None` if not resident.
    fn voxel(&self, x: i32, y: i32, z: i32) -> Option<Voxel> {
        let (lx, ly, lz) = local_coords(x, y, z)?;
        self.chunk_at(x, z)?.read().get(lx, ly, lz)
    }

    /// One light channel at world `(x, y, z)`; 0 if not resident.
    fn light(&self, x: i32, y: i32, z: i32, channel: LightChannel) -> u8 {
        let Some((lx, ly, lz)) = local_coords(x, y, z) else {
            return 0;
        };
        self.chunk_at(x, z)
            .map(|handle| handle.read().lightmap.get(lx, ly, lz, channel))
            .unwrap_or(0)
    }

    /// The packed light word at world `(x, y, z)`; 0 if not resident.
    fn light_packed(&self, x: i32, y: i32, z: i32) -> u16 {
        let Some((lx, ly, lz)) = local_coords(x, y, z) else {
            return 0;
        };
        self.chunk_at(x, z)
            .map(|handle| handle.read().lightmap.get_packed(lx, ly, lz))
            .unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
