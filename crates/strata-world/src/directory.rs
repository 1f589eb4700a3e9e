//! Chunk directory: the authoritative map of resident chunks.
//!
//! Chunks enter through [`ChunkDirectory::create`], which loads them from the
//! region store or generates them, and leave when their reference count drops
//! to zero while unpinned. Eviction writes unsaved chunks back first.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use strata_lighting::Lighting;
use strata_region::{RegionLayer, RegionStore};
use strata_voxel::{
    BlockDataHeap, Chunk, ChunkHandle, ChunkSerError, ChunkSource, ContentRegistry, ContentRemap,
    Lightmap, new_handle,
};

use crate::error::WorldError;
use crate::generator::ChunkGenerator;

struct Entry {
    handle: ChunkHandle,
    refs: u32,
    pinned: bool,
}

/// Resident chunks keyed by chunk coordinates.
pub struct ChunkDirectory {
    chunks: FxHashMap<(i32, i32), Entry>,
    content: Arc<ContentRegistry>,
    store: Arc<RegionStore>,
    generator: Arc<dyn ChunkGenerator>,
    remap: Option<ContentRemap>,
    lighting: bool,
}

impl ChunkDirectory {
    /// Creates an empty directory.
    ///
    /// With `lighting` off no lightmaps are loaded, prebuilt or saved.
    pub fn new(
        content: Arc<ContentRegistry>,
        store: Arc<RegionStore>,
        generator: Arc<dyn ChunkGenerator>,
        lighting: bool,
    ) -> Self {
        Self {
            chunks: FxHashMap::default(),
            content,
            store,
            generator,
            remap: None,
            lighting,
        }
    }

    /// Id translation applied to every chunk loaded from disk.
    pub fn set_remap(&mut self, remap: Option<ContentRemap>) {
        self.remap = remap.filter(|r| !r.is_identity());
    }

    pub fn store(&self) -> &Arc<RegionStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<ContentRegistry> {
        &self.content
    }

    pub fn lighting_enabled(&self) -> bool {
        self.lighting
    }

    /// The handle of a resident chunk, without loading anything.
    pub fn fetch(&self, cx: i32, cz: i32) -> Option<ChunkHandle> {
        self.chunks.get(&(cx, cz)).map(|e| Arc::clone(&e.handle))
    }

    /// Returns the resident chunk at `(cx, cz)`, loading or generating it on a
    /// miss. A new chunk starts with zero references.
    ///
    /// Background I/O failures fall back to generation with a warning;
    /// corrupted or incompatible files are returned as errors.
    pub fn create(&mut self, cx: i32, cz: i32) -> Result<ChunkHandle, WorldError> {
        if let Some(entry) = self.chunks.get(&(cx, cz)) {
            return Ok(Arc::clone(&entry.handle));
        }

        let chunk = self.load_or_generate(cx, cz)?;
        let handle = new_handle(chunk);
        self.chunks.insert(
            (cx, cz),
            Entry {
                handle: Arc::clone(&handle),
                refs: 0,
                pinned: false,
            },
        );
        Ok(handle)
    }

    /// Keeps a chunk resident regardless of its reference count.
    /// Returns `false` if it is not resident.
    pub fn pin(&mut self, cx: i32, cz: i32) -> bool {
        match self.chunks.get_mut(&(cx, cz)) {
            Some(entry) => {
                entry.pinned = true;
                true
            }
            None => false,
        }
    }

    /// Removes a pin; an unreferenced chunk is evicted immediately.
    pub fn unpin(&mut self, cx: i32, cz: i32) -> Result<(), WorldError> {
        let Some(entry) = self.chunks.get_mut(&(cx, cz)) else {
            return Ok(());
        };
        entry.pinned = false;
        if entry.refs == 0 {
            self.evict(cx, cz)?;
        }
        Ok(())
    }

    /// Adds a reference. Returns `false` if the chunk is not resident.
    pub fn incref(&mut self, cx: i32, cz: i32) -> bool {
        match self.chunks.get_mut(&(cx, cz)) {
            Some(entry) => {
                entry.refs += 1;
                true
            }
            None => false,
        }
    }

    /// Drops a reference. At zero an unpinned chunk is saved (if unsaved)
    /// and removed; if the save fails it stays resident and the error is
    /// returned.
    pub fn decref(&mut self, cx: i32, cz: i32) -> Result<(), WorldError> {
        let Some(entry) = self.chunks.get_mut(&(cx, cz)) else {
            return Ok(());
        };
        entry.refs = entry.refs.saturating_sub(1);
        if entry.refs == 0 && !entry.pinned {
            self.evict(cx, cz)?;
        }
        Ok(())
    }

    /// Current reference count of a resident chunk.
    pub fn refs(&self, cx: i32, cz: i32) -> Option<u32> {
        self.chunks.get(&(cx, cz)).map(|e| e.refs)
    }

    pub fn is_pinned(&self, cx: i32, cz: i32) -> bool {
        self.chunks.get(&(cx, cz)).is_some_and(|e| e.pinned)
    }

    /// Persists one chunk and flushes the region store.
    pub fn save(&self, chunk: &mut Chunk) -> Result<(), WorldError> {
        if self.stage(chunk) {
            self.store.flush()?;
        }
        Ok(())
    }

    /// Persists every unsaved resident chunk and flushes the region store.
    /// Returns the number of chunks written.
    pub fn save_all(&self) -> Result<usize, WorldError> {
        let mut saved = 0;
        for entry in self.chunks.values() {
            if self.stage(&mut entry.handle.write()) {
                saved += 1;
            }
        }
        self.store.flush()?;
        if saved > 0 {
            tracing::info!("saved {} chunks", saved);
        }
        Ok(saved)
    }

    /// Evicts every unreferenced, unpinned chunk. Returns how many left.
    pub fn collect_garbage(&mut self) -> Result<usize, WorldError> {
        let idle: Vec<(i32, i32)> = self
            .chunks
            .iter()
            .filter(|(_, e)| e.refs == 0 && !e.pinned)
            .map(|(&key, _)| key)
            .collect();
        for &(cx, cz) in &idle {
            self.evict(cx, cz)?;
        }
        Ok(idle.len())
    }

    /// Number of resident chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Coordinates of every resident chunk.
    pub fn coords(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.chunks.keys().copied()
    }

    fn evict(&mut self, cx: i32, cz: i32) -> Result<(), WorldError> {
        let Some(entry) = self.chunks.get(&(cx, cz)) else {
            return Ok(());
        };
        self.save(&mut entry.handle.write())?;
        self.chunks.remove(&(cx, cz));
        tracing::debug!("evicted chunk ({}, {})", cx, cz);
        Ok(())
    }

    /// Queues the payloads of an unsaved chunk in the region store.
    fn stage(&self, chunk: &mut Chunk) -> bool {
        if !chunk.flags.unsaved {
            return false;
        }
        let (cx, cz) = (chunk.cx, chunk.cz);
        self.store.put(RegionLayer::Voxels, cx, cz, &chunk.encode());
        if self.lighting && (chunk.flags.lighted || chunk.flags.loaded_lights) {
            self.store
                .put(RegionLayer::Lights, cx, cz, &chunk.lightmap.encode());
        }
        self.store
            .put(RegionLayer::Inventories, cx, cz, &chunk.encode_inventories());
        self.store
            .put(RegionLayer::BlocksData, cx, cz, &chunk.blocks_data.encode());
        chunk.flags.unsaved = false;
        true
    }

    fn load_or_generate(&self, cx: i32, cz: i32) -> Result<Chunk, WorldError> {
        let mut chunk = Chunk::new(cx, cz);

        let loaded = match self.load_voxels(&mut chunk) {
            Ok(loaded) => loaded,
            Err(e) if e.is_format_error() => return Err(e),
            Err(e) => {
                tracing::warn!("failed to load chunk ({}, {}), generating: {}", cx, cz, e);
                false
            }
        };

        if loaded {
            self.load_attachments(&mut chunk)?;
        } else {
            self.generator.generate(chunk.voxels_mut(), cx, cz);
            chunk.update_heights();
        }

        if self.lighting {
            if loaded && let Some(lightmap) = self.load_lights(cx, cz) {
                chunk.lightmap = lightmap;
                chunk.flags.loaded_lights = true;
            } else {
                Lighting::prebuild_sky_light(&mut chunk, &self.content);
            }
        }

        chunk.flags.loaded = true;
        Ok(chunk)
    }

    fn load_voxels(&self, chunk: &mut Chunk) -> Result<bool, WorldError> {
        let (cx, cz) = (chunk.cx, chunk.cz);
        let Some(bytes) = self.store.get(RegionLayer::Voxels, cx, cz)? else {
            return Ok(false);
        };
        chunk.decode(&bytes).map_err(|e| chunk_error(cx, cz, e))?;
        if let Some(remap) = &self.remap {
            chunk.remap(remap);
        }
        chunk.coerce_unknown(&self.content);
        Ok(true)
    }

    fn load_attachments(&self, chunk: &mut Chunk) -> Result<(), WorldError> {
        let (cx, cz) = (chunk.cx, chunk.cz);
        if let Some(bytes) = self.store.get(RegionLayer::Inventories, cx, cz)? {
            chunk
                .decode_inventories(&bytes)
                .map_err(|e| chunk_error(cx, cz, e))?;
        }
        if let Some(bytes) = self.store.get(RegionLayer::BlocksData, cx, cz)? {
            chunk.blocks_data = BlockDataHeap::decode(&bytes).map_err(|e| chunk_error(cx, cz, e))?;
            chunk.flags.has_block_data = !chunk.blocks_data.is_empty();
        }
        Ok(())
    }

    /// Stored lights are derived data: any failure means rebuilding them.
    fn load_lights(&self, cx: i32, cz: i32) -> Option<Lightmap> {
        let bytes = match self.store.get(RegionLayer::Lights, cx, cz) {
            Ok(bytes) => bytes?,
            Err(e) => {
                tracing::warn!("failed to load lights of chunk ({}, {}): {}", cx, cz, e);
                return None;
            }
        };
        match Lightmap::decode(&bytes) {
            Ok(lightmap) => Some(lightmap),
            Err(e) => {
                tracing::warn!("discarding lights of chunk ({}, {}): {}", cx, cz, e);
                None
            }
        }
    }
}

fn chunk_error(cx: i32, cz: i32, source: ChunkSerError) -> WorldError {
    WorldError::Chunk { cx, cz, source }
}

impl ChunkSource for ChunkDirectory {
    fn chunk(&self, cx: i32, cz: i32) -> Option<&ChunkHandle> {
        self.chunks.get(&(cx, cz)).map(|e| &e.handle)
    }

    fn content(&self) -> &ContentRegistry {
        &self.content
    }

    fn for_each_chunk(&self, f: &mut dyn FnMut(&ChunkHandle)) {
        for entry in self.chunks.values() {
            f(&entry.handle);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::path::Path;

    use strata_voxel::{BlockDef, BlockId, LightChannel, Voxel};

    use super::*;
    use crate::generator::FlatGenerator;

    fn content() -> (Arc<ContentRegistry>, BlockId) {
        let mut content = ContentRegistry::new();
        let stone = content.register(BlockDef::opaque("base:stone")).unwrap();
        (Arc::new(content), stone)
    }

    fn directory(root: &Path) -> (ChunkDirectory, BlockId) {
        let (content, stone) = content();
        let generator = Arc::new(FlatGenerator::new(vec![(stone, 4)]));
        let store = Arc::new(RegionStore::new(root, 8));
        (ChunkDirectory::new(content, store, generator, true), stone)
    }

    #[test]
    fn test_create_generates_and_caches() {
        let dir = tempfile::tempdir().unwrap();
        let (mut chunks, stone) = directory(dir.path());

        assert!(chunks.fetch(2, -3).is_none());
        let handle = chunks.create(2, -3).unwrap();
        {
            let chunk = handle.read();
            assert!(chunk.flags.loaded);
            assert!(!chunk.flags.loaded_lights);
            assert_eq!(chunk.get(0, 3, 0).unwrap().id, stone);
            assert!(chunk.get(0, 4, 0).unwrap().is_air());
            // Prebuilt sky light stops at the surface.
            assert_eq!(chunk.lightmap.get(0, 4, 0, LightChannel::Sky), 15);
            assert_eq!(chunk.lightmap.get(0, 3, 0, LightChannel::Sky), 0);
        }
        let again = chunks.create(2, -3).unwrap();
        assert!(Arc::ptr_eq(&handle, &again));
        assert!(Arc::ptr_eq(&handle, &chunks.fetch(2, -3).unwrap()));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks.refs(2, -3), Some(0));
    }

    #[test]
    fn test_decref_to_zero_evicts_and_writes_back() {
        let dir = tempfile::tempdir().unwrap();
        let (mut chunks, stone) = directory(dir.path());

        let handle = chunks.create(0, 0).unwrap();
        chunks.incref(0, 0);
        chunks.incref(0, 0);
        handle
            .write()
            .set_voxel(3, 10, 3, Voxel::of(stone), ChunkSource::content(&chunks));
        drop(handle);

        chunks.decref(0, 0).unwrap();
        assert!(chunks.fetch(0, 0).is_some());
        chunks.decref(0, 0).unwrap();
        assert!(chunks.fetch(0, 0).is_none());
        assert!(dir.path().join("regions").join("0_0.bin").exists());

        let (mut reopened, _) = directory(dir.path());
        let chunk = reopened.create(0, 0).unwrap();
        assert_eq!(chunk.read().get(3, 10, 3).unwrap().id, stone);
    }

    #[test]
    fn test_pinned_chunk_survives_decref() {
        let dir = tempfile::tempdir().unwrap();
        let (mut chunks, _) = directory(dir.path());

        chunks.create(1, 1).unwrap();
        chunks.incref(1, 1);
        assert!(chunks.pin(1, 1));
        chunks.decref(1, 1).unwrap();
        assert!(chunks.fetch(1, 1).is_some());
        assert!(chunks.is_pinned(1, 1));

        chunks.unpin(1, 1).unwrap();
        assert!(chunks.fetch(1, 1).is_none());
        assert!(!chunks.pin(1, 1));
    }

    #[test]
    fn test_reloaded_chunk_equals_saved() {
        let dir = tempfile::tempdir().unwrap();
        let (mut chunks, stone) = directory(dir.path());

        let handle = chunks.create(-1, 5).unwrap();
        {
            let content = Arc::clone(chunks.registry());
            let mut chunk = handle.write();
            chunk.set_voxel(0, 20, 15, Voxel::of(stone), &content);
            chunk.set_voxel(15, 255, 0, Voxel::of(stone), &content);
            chunk.set_voxel(7, 0, 7, Voxel::AIR, &content);
            chunk.lightmap.set(1, 30, 1, LightChannel::Red, 9);
            chunk.lightmap.set(2, 30, 1, LightChannel::Blue, 4);
            chunk.add_inventory(42, 777);
            chunk.flags.lighted = true;
        }
        assert_eq!(chunks.save_all().unwrap(), 1);
        assert!(!handle.read().flags.unsaved);

        let (mut reopened, _) = directory(dir.path());
        let loaded = reopened.create(-1, 5).unwrap();
        let saved = handle.read();
        let loaded = loaded.read();
        assert_eq!(loaded.voxels(), saved.voxels());
        assert_eq!(loaded.lightmap.as_slice(), saved.lightmap.as_slice());
        assert_eq!(loaded.inventory(42), Some(777));
        assert!(loaded.flags.loaded_lights);
        assert!(!loaded.flags.unsaved);
        assert_eq!(loaded.top(), 256);
    }

    #[test]
    fn test_clean_chunk_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let (mut chunks, _) = directory(dir.path());
        chunks.create(0, 0).unwrap();
        assert_eq!(chunks.save_all().unwrap(), 0);
        assert!(!dir.path().join("regions").join("0_0.bin").exists());
    }

    #[test]
    fn test_corrupted_region_is_surfaced() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("regions")).unwrap();
        std::fs::write(dir.path().join("regions").join("0_0.bin"), vec![0xAB; 8192]).unwrap();

        let (mut chunks, _) = directory(dir.path());
        let err = chunks.create(0, 0).unwrap_err();
        assert!(err.is_format_error());
        assert!(chunks.fetch(0, 0).is_none());
        // Other regions are unaffected.
        assert!(chunks.create(32, 0).is_ok());
    }

    #[test]
    fn test_unknown_ids_load_as_air() {
        let dir = tempfile::tempdir().unwrap();
        let (chunks, _) = directory(dir.path());

        let mut chunk = Chunk::new(0, 0);
        *chunk.get_mut(4, 4, 4).unwrap() = Voxel::of(BlockId(900));
        chunks.store().put(RegionLayer::Voxels, 0, 0, &chunk.encode());
        chunks.store().flush().unwrap();

        let (mut reopened, _) = directory(dir.path());
        let handle = reopened.create(0, 0).unwrap();
        assert!(handle.read().get(4, 4, 4).unwrap().is_air());
    }

    #[test]
    fn test_remap_applies_saved_indices() {
        let dir = tempfile::tempdir().unwrap();
        let mut content = ContentRegistry::new();
        let stone = content.register(BlockDef::opaque("base:stone")).unwrap();
        let dirt = content.register(BlockDef::opaque("base:dirt")).unwrap();
        let content = Arc::new(content);

        // Saved with dirt = 1 and stone = 2.
        let saved = vec![
            "core:air".to_string(),
            "base:dirt".to_string(),
            "base:stone".to_string(),
        ];
        let mut chunk = Chunk::new(0, 0);
        *chunk.get_mut(0, 0, 0).unwrap() = Voxel::of(BlockId(2));
        *chunk.get_mut(1, 0, 0).unwrap() = Voxel::of(BlockId(1));
        let store = Arc::new(RegionStore::new(dir.path(), 4));
        store.put(RegionLayer::Voxels, 0, 0, &chunk.encode());
        store.flush().unwrap();

        let generator = Arc::new(FlatGenerator::default());
        let mut chunks = ChunkDirectory::new(Arc::clone(&content), store, generator, false);
        chunks.set_remap(Some(ContentRemap::from_names(&saved, &content)));
        let handle = chunks.create(0, 0).unwrap();
        let chunk = handle.read();
        assert_eq!(chunk.get(0, 0, 0).unwrap().id, stone);
        assert_eq!(chunk.get(1, 0, 0).unwrap().id, dirt);
    }

    #[test]
    fn test_collect_garbage_keeps_referenced() {
        let dir = tempfile::tempdir().unwrap();
        let (mut chunks, _) = directory(dir.path());
        for cx in 0..4 {
            chunks.create(cx, 0).unwrap();
        }
        chunks.incref(0, 0);
        chunks.pin(1, 0);

        assert_eq!(chunks.collect_garbage().unwrap(), 2);
        let mut left: Vec<_> = chunks.coords().collect();
        left.sort_unstable();
        assert_eq!(left, vec![(0, 0), (1, 0)]);
    }
}
