//! The world facade: chunk residency, lighting and persistence behind one
//! handle.

use std::sync::Arc;

use glam::{IVec3, Vec3};
use strata_config::WorldConfig;
use strata_lighting::Lighting;
use strata_region::{REGION_SLOTS, RegionLayer, RegionStore, WorldFiles, WorldInfo};
use strata_voxel::{Aabb, BlockId, ChunkSource, ContentRegistry, ContentRemap, LightChannel, Voxel};

use crate::blocks;
use crate::directory::ChunkDirectory;
use crate::error::WorldError;
use crate::generator::ChunkGenerator;
use crate::matrix::ChunkMatrix;
use crate::raycast::{self, RayHit};
use crate::snapshot::{self, VoxelVolume};

/// An open world directory.
pub struct World {
    files: WorldFiles,
    info: WorldInfo,
    content: Arc<ContentRegistry>,
    directory: ChunkDirectory,
    matrix: ChunkMatrix,
    lighting: Lighting,
}

impl World {
    /// Opens (or creates) the world at `config.directory`.
    ///
    /// Chunks saved with a different block id table are rewritten with the
    /// ids of `content` before anything else is loaded.
    pub fn open(
        config: &WorldConfig,
        content: Arc<ContentRegistry>,
        generator: Arc<dyn ChunkGenerator>,
    ) -> Result<Self, WorldError> {
        let files = WorldFiles::new(&config.directory);
        files.create_directories()?;

        let info = match files.read_world_info()? {
            Some(info) => info,
            None => {
                let info = WorldInfo {
                    seed: config.seed,
                    ..WorldInfo::default()
                };
                files.write_world_info(&info)?;
                info
            }
        };

        let store = Arc::new(RegionStore::new(
            files.directory(),
            config.max_open_region_files,
        ));
        let mut directory =
            ChunkDirectory::new(Arc::clone(&content), store, generator, config.lighting);

        if let Some(saved) = files.read_indices()? {
            let remap = ContentRemap::from_names(&saved, &content);
            if !remap.is_identity() {
                let migrated = migrate_content(&mut directory, remap)?;
                tracing::info!("rewrote {} chunks with the current block ids", migrated);
            }
        }
        files.write_indices(&content.names())?;

        let size = config.window_size();
        tracing::info!(
            "opened world {:?} at {} (seed {})",
            info.name,
            files.directory().display(),
            info.seed
        );
        Ok(Self {
            files,
            info,
            matrix: ChunkMatrix::new(size, size, Arc::clone(&content)),
            lighting: Lighting::new(Arc::clone(&content)),
            content,
            directory,
        })
    }

    pub fn info(&self) -> &WorldInfo {
        &self.info
    }

    pub fn files(&self) -> &WorldFiles {
        &self.files
    }

    pub fn content(&self) -> &Arc<ContentRegistry> {
        &self.content
    }

    pub fn directory(&self) -> &ChunkDirectory {
        &self.directory
    }

    pub fn directory_mut(&mut self) -> &mut ChunkDirectory {
        &mut self.directory
    }

    pub fn matrix(&self) -> &ChunkMatrix {
        &self.matrix
    }

    pub fn lighting(&self) -> &Lighting {
        &self.lighting
    }

    // ---- Voxels ----

    pub fn get_voxel(&self, pos: IVec3) -> Option<Voxel> {
        blocks::get_voxel(&self.directory, pos)
    }

    /// Writes one voxel and relights around it.
    pub fn set_voxel(&mut self, pos: IVec3, voxel: Voxel) -> bool {
        if !blocks::set_voxel(&self.directory, pos, voxel) {
            return false;
        }
        self.relight(&[pos]);
        true
    }

    /// Places a block (extended blocks included) and relights every written
    /// cell. Returns `false` if any target cell is occupied or unloaded.
    pub fn place_block(&mut self, pos: IVec3, id: BlockId, rotation: u8) -> bool {
        match blocks::place_block(&self.directory, pos, id, rotation) {
            Some(cells) => {
                self.relight(&cells);
                true
            }
            None => false,
        }
    }

    /// Breaks the block at `pos` and relights every cleared cell.
    pub fn break_block(&mut self, pos: IVec3) -> bool {
        match blocks::break_block(&self.directory, pos) {
            Some(cells) => {
                self.relight(&cells);
                true
            }
            None => false,
        }
    }

    pub fn set_rotation(&mut self, pos: IVec3, rotation: u8) -> bool {
        match blocks::set_rotation(&self.directory, pos, rotation) {
            Some(cells) => {
                self.relight(&cells);
                true
            }
            None => false,
        }
    }

    pub fn is_obstacle_at(&self, x: f64, y: f64, z: f64) -> Option<Aabb> {
        blocks::is_obstacle_at(&self.directory, x, y, z)
    }

    pub fn is_solid_block(&self, pos: IVec3) -> bool {
        blocks::is_solid_block(&self.directory, pos)
    }

    pub fn is_replaceable_block(&self, pos: IVec3) -> bool {
        blocks::is_replaceable_block(&self.directory, pos)
    }

    /// Origin cell of the (possibly extended) block at `pos`.
    pub fn seek_origin(&self, pos: IVec3) -> Option<IVec3> {
        blocks::seek_origin(&self.directory, pos)
    }

    pub fn raycast(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        filter: &[BlockId],
    ) -> Option<RayHit> {
        raycast::raycast(&self.directory, origin, direction, max_distance, filter)
    }

    pub fn fetch_snapshot(&self, min: IVec3, size: IVec3) -> VoxelVolume {
        snapshot::fetch_snapshot(&self.directory, min, size)
    }

    // ---- Light ----

    pub fn get_light(&self, pos: IVec3, channel: LightChannel) -> u8 {
        self.lighting
            .get_light(&self.directory, pos.x, pos.y, pos.z, channel)
    }

    pub fn get_light_packed(&self, pos: IVec3) -> u16 {
        self.lighting
            .get_light_packed(&self.directory, pos.x, pos.y, pos.z)
    }

    fn relight(&mut self, cells: &[IVec3]) {
        if !self.directory.lighting_enabled() {
            return;
        }
        for &cell in cells {
            let id = self.get_voxel(cell).map_or(BlockId::AIR, |v| v.id);
            self.lighting
                .on_block_set(&self.directory, cell.x, cell.y, cell.z, id);
        }
    }

    /// Lights every unlit chunk whose 3×3 neighbourhood is resident.
    /// Returns the number of chunks lit.
    pub fn build_lights(&mut self) -> usize {
        if !self.directory.lighting_enabled() {
            return 0;
        }
        let mut pending: Vec<(i32, i32)> = self
            .directory
            .coords()
            .filter(|&(cx, cz)| {
                self.directory
                    .chunk(cx, cz)
                    .is_some_and(|h| !h.read().flags.lighted)
                    && self.neighbourhood_resident(cx, cz)
            })
            .collect();
        pending.sort_unstable();

        for &(cx, cz) in &pending {
            let Some(handle) = self.directory.fetch(cx, cz) else {
                continue;
            };
            let loaded_lights = handle.read().flags.loaded_lights;
            if !loaded_lights {
                self.lighting.build_sky_light(&self.directory, cx, cz);
            }
            self.lighting
                .on_chunk_loaded(&self.directory, cx, cz, !loaded_lights);
            handle.write().flags.lighted = true;
        }
        if !pending.is_empty() {
            tracing::debug!("lit {} chunks", pending.len());
        }
        pending.len()
    }

    fn neighbourhood_resident(&self, cx: i32, cz: i32) -> bool {
        (-1..=1).all(|dz| (-1..=1).all(|dx| self.directory.chunk(cx + dx, cz + dz).is_some()))
    }

    // ---- Residency ----

    /// Recenters the loaded window on chunk `(cx, cz)`; chunks that fall out
    /// are released and, once unreferenced, saved and evicted.
    pub fn set_center(&mut self, cx: i32, cz: i32) -> Result<(), WorldError> {
        self.matrix.set_center(cx, cz, &mut self.directory)
    }

    /// Loads every missing chunk of the window, nearest first, then lights
    /// what became lightable. Returns the number of chunks loaded.
    pub fn load_area(&mut self) -> Result<usize, WorldError> {
        let missing = self.matrix.missing();
        for &(cx, cz) in &missing {
            let handle = self.directory.create(cx, cz)?;
            self.matrix.put(handle, &mut self.directory);
        }
        self.build_lights();
        Ok(missing.len())
    }

    // ---- Persistence ----

    /// Writes every unsaved chunk and the side files. Returns the number of
    /// chunks written.
    pub fn save_all(&mut self) -> Result<usize, WorldError> {
        let saved = self.directory.save_all()?;
        self.files.write_indices(&self.content.names())?;
        self.files.write_world_info(&self.info)?;
        Ok(saved)
    }

    /// Saves everything and releases the loaded window.
    pub fn close(mut self) -> Result<(), WorldError> {
        self.save_all()?;
        self.matrix.clear(&mut self.directory)?;
        self.directory.store().close_files();
        tracing::info!("closed world {:?}", self.info.name);
        Ok(())
    }
}

/// Rewrites every stored chunk through `remap`, one region's worth of chunks
/// at a time.
fn migrate_content(directory: &mut ChunkDirectory, remap: ContentRemap) -> Result<usize, WorldError> {
    let chunks = directory.store().stored_chunks(RegionLayer::Voxels)?;
    directory.set_remap(Some(remap));

    for batch in chunks.chunks(REGION_SLOTS) {
        for &(cx, cz) in batch {
            let handle = directory.create(cx, cz)?;
            handle.write().flags.unsaved = true;
        }
        directory.save_all()?;
        directory.collect_garbage()?;
    }

    directory.set_remap(None);
    Ok(chunks.len())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
