//! Bounded window of chunks around a moving center.

use std::sync::Arc;

use strata_voxel::{ChunkHandle, ChunkSource, ContentRegistry};

use crate::directory::ChunkDirectory;
use crate::error::WorldError;

/// A `width × depth` grid of chunk handles whose minimum corner sits at
/// chunk `(ox, oz)`.
///
/// Every held handle owns one reference in the [`ChunkDirectory`]; chunks
/// that leave the window are released through [`ChunkDirectory::decref`].
pub struct ChunkMatrix {
    width: i32,
    depth: i32,
    ox: i32,
    oz: i32,
    slots: Vec<Option<ChunkHandle>>,
    content: Arc<ContentRegistry>,
}

impl ChunkMatrix {
    pub fn new(width: i32, depth: i32, content: Arc<ContentRegistry>) -> Self {
        let width = width.max(1);
        let depth = depth.max(1);
        Self {
            width,
            depth,
            ox: 0,
            oz: 0,
            slots: vec![None; (width * depth) as usize],
            content,
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn depth(&self) -> i32 {
        self.depth
    }

    /// Chunk coordinates of the window's minimum corner.
    pub fn offset(&self) -> (i32, i32) {
        (self.ox, self.oz)
    }

    /// Chunk the window is centered on.
    pub fn center(&self) -> (i32, i32) {
        (self.ox + self.width / 2, self.oz + self.depth / 2)
    }

    fn slot(&self, cx: i32, cz: i32) -> Option<usize> {
        let lx = cx - self.ox;
        let lz = cz - self.oz;
        if lx < 0 || lz < 0 || lx >= self.width || lz >= self.depth {
            return None;
        }
        Some((lz * self.width + lx) as usize)
    }

    /// Returns `true` if `(cx, cz)` lies inside the window.
    pub fn contains(&self, cx: i32, cz: i32) -> bool {
        self.slot(cx, cz).is_some()
    }

    /// Stores a resident chunk in its slot and takes a reference on it.
    ///
    /// Returns `false` if the chunk lies outside the window.
    pub fn put(&mut self, handle: ChunkHandle, directory: &mut ChunkDirectory) -> bool {
        let (cx, cz) = {
            let chunk = handle.read();
            (chunk.cx, chunk.cz)
        };
        let Some(index) = self.slot(cx, cz) else {
            return false;
        };
        if let Some(existing) = &self.slots[index]
            && Arc::ptr_eq(existing, &handle)
        {
            return true;
        }
        directory.incref(cx, cz);
        self.slots[index] = Some(handle);
        true
    }

    /// Moves the window so `(cx, cz)` is its center, releasing every chunk
    /// that falls out.
    ///
    /// All releases are attempted; the first failure is returned.
    pub fn set_center(
        &mut self,
        cx: i32,
        cz: i32,
        directory: &mut ChunkDirectory,
    ) -> Result<(), WorldError> {
        let ox = cx - self.width / 2;
        let oz = cz - self.depth / 2;
        if (ox, oz) == (self.ox, self.oz) {
            return Ok(());
        }

        let old = std::mem::replace(&mut self.slots, vec![None; (self.width * self.depth) as usize]);
        self.ox = ox;
        self.oz = oz;

        let mut released = Vec::new();
        for handle in old.into_iter().flatten() {
            let (hx, hz) = {
                let chunk = handle.read();
                (chunk.cx, chunk.cz)
            };
            match self.slot(hx, hz) {
                Some(index) => self.slots[index] = Some(handle),
                None => released.push((hx, hz)),
            }
        }
        release(directory, released)
    }

    /// Releases every held chunk.
    pub fn clear(&mut self, directory: &mut ChunkDirectory) -> Result<(), WorldError> {
        let released: Vec<(i32, i32)> = self
            .slots
            .iter_mut()
            .filter_map(Option::take)
            .map(|handle| {
                let chunk = handle.read();
                (chunk.cx, chunk.cz)
            })
            .collect();
        release(directory, released)
    }

    /// Empty slots, nearest to the center first.
    pub fn missing(&self) -> Vec<(i32, i32)> {
        let (centerx, centerz) = self.center();
        let mut missing: Vec<(i32, i32)> = (0..self.depth)
            .flat_map(|lz| (0..self.width).map(move |lx| (lx, lz)))
            .filter(|&(lx, lz)| self.slots[(lz * self.width + lx) as usize].is_none())
            .map(|(lx, lz)| (self.ox + lx, self.oz + lz))
            .collect();
        missing.sort_by_key(|&(cx, cz)| (cx - centerx).pow(2) + (cz - centerz).pow(2));
        missing
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }
}

fn release(directory: &mut ChunkDirectory, coords: Vec<(i32, i32)>) -> Result<(), WorldError> {
    let mut result = Ok(());
    for (cx, cz) in coords {
        if let Err(e) = directory.decref(cx, cz) {
            tracing::warn!("failed to release chunk ({}, {}): {}", cx, cz, e);
            if result.is_ok() {
                result = Err(e);
            }
        }
    }
    result
}

impl ChunkSource for ChunkMatrix {
    fn chunk(&self, cx: i32, cz: i32) -> Option<&ChunkHandle> {
        self.slots[self.slot(cx, cz)?].as_ref()
    }

    fn content(&self) -> &ContentRegistry {
        &self.content
    }

    fn for_each_chunk(&self, f: &mut dyn FnMut(&ChunkHandle)) {
        for handle in self.slots.iter().flatten() {
            f(handle);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
