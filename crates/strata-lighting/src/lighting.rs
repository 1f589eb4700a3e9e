//! Lighting coordinator: owns one solver per channel and exposes chunk-level
//! and block-level lighting operations.

use std::sync::Arc;

use strata_voxel::{
    BlockId, CHUNK_D, CHUNK_H, CHUNK_W, Chunk, ChunkSource, ContentRegistry, LightChannel, MAX_LIGHT,
};

use crate::solver::{LightSolver, NEIGHBORS_6, probe};

/// Four-channel lighting engine bound to one content registry.
pub struct Lighting {
    content: Arc<ContentRegistry>,
    solvers: [LightSolver; 4],
}

impl Lighting {
    pub fn new(content: Arc<ContentRegistry>) -> Self {
        Self {
            content,
            solvers: LightChannel::ALL.map(LightSolver::new),
        }
    }

    pub fn content(&self) -> &Arc<ContentRegistry> {
        &self.content
    }

    /// The solver for one channel.
    pub fn solver(&self, channel: LightChannel) -> &LightSolver {
        &self.solvers[channel.index()]
    }

    /// Returns `true` if every solver queue is empty.
    pub fn is_idle(&self) -> bool {
        self.solvers.iter().all(LightSolver::is_idle)
    }

    /// Fills each column of a fresh chunk with direct sky light from the top
    /// down to the first block that stops sky light, and records the highest
    /// such block in the lightmap's `highest_point`.
    ///
    /// Works on the chunk alone; lateral spread happens in
    /// [`Lighting::build_sky_light`].
    pub fn prebuild_sky_light(chunk: &mut Chunk, content: &ContentRegistry) {
        let mut highest = 0;
        for z in 0..CHUNK_D {
            for x in 0..CHUNK_W {
                let mut lit = true;
                for y in (0..CHUNK_H).rev() {
                    if lit {
                        let passes = chunk
                            .get(x, y, z)
                            .is_some_and(|v| content.get(v.id).sky_light_passing);
                        if !passes {
                            lit = false;
                            highest = highest.max(y + 1);
                        }
                    }
                    let level = if lit { MAX_LIGHT } else { 0 };
                    chunk.lightmap.set(x, y, z, LightChannel::Sky, level);
                }
            }
        }
        chunk.lightmap.highest_point = highest;
    }

    /// Spreads column sky light sideways inside chunk `(cx, cz)` and across
    /// its borders with resident neighbours, then drains the sky solver.
    pub fn build_sky_light<S: ChunkSource + ?Sized>(&mut self, source: &S, cx: i32, cz: i32) {
        let Some(handle) = source.chunk(cx, cz) else {
            return;
        };
        let (ox, oz) = (cx * CHUNK_W as i32, cz * CHUNK_D as i32);

        // Collect under one read lock, enqueue after releasing it.
        let seeds = {
            let chunk = handle.read();
            let top = (chunk.lightmap.highest_point + 1).min(CHUNK_H);
            let mut seeds = Vec::new();
            for y in 0..top {
                for z in 0..CHUNK_D {
                    for x in 0..CHUNK_W {
                        if chunk.lightmap.get(x, y, z, LightChannel::Sky) != MAX_LIGHT {
                            continue;
                        }
                        if borders_darker(&chunk, &self.content, x, y, z) {
                            seeds.push((ox + x as i32, y as i32, oz + z as i32));
                        }
                    }
                }
            }
            seeds
        };

        let sky = &mut self.solvers[LightChannel::Sky.index()];
        for (x, y, z) in seeds {
            sky.enqueue_add_existing(source, x, y, z);
        }
        for (x, y, z) in neighbor_edges(cx, cz) {
            sky.enqueue_add_existing(source, x, y, z);
        }
        sky.solve(source, &self.content);
    }

    /// Seeds every emissive block of chunk `(cx, cz)` and drains all solvers.
    ///
    /// With `expand`, light already present on both sides of the chunk's four
    /// borders is re-seeded as well, so neighbour light flows in and this
    /// chunk's light flows out.
    pub fn on_chunk_loaded<S: ChunkSource + ?Sized>(&mut self, source: &S, cx: i32, cz: i32, expand: bool) {
        let Some(handle) = source.chunk(cx, cz) else {
            return;
        };
        let (ox, oz) = (cx * CHUNK_W as i32, cz * CHUNK_D as i32);

        let emitters: Vec<(i32, i32, i32, [u8; 3])> = {
            let chunk = handle.read();
            let (bottom, top) = (chunk.bottom(), chunk.top());
            let mut emitters = Vec::new();
            for y in bottom..top {
                for z in 0..CHUNK_D {
                    for x in 0..CHUNK_W {
                        let Some(voxel) = chunk.get(x, y, z) else {
                            continue;
                        };
                        let def = self.content.get(voxel.id);
                        if def.is_emissive() {
                            emitters.push((ox + x as i32, y as i32, oz + z as i32, def.emission));
                        }
                    }
                }
            }
            emitters
        };

        for (x, y, z, emission) in emitters {
            for (channel, level) in LightChannel::COLORS.into_iter().zip(emission) {
                self.solvers[channel.index()].enqueue_add(source, x, y, z, level);
            }
        }

        if expand {
            let cells: Vec<(i32, i32, i32)> = own_edges(cx, cz).chain(neighbor_edges(cx, cz)).collect();
            for solver in &mut self.solvers {
                for &(x, y, z) in &cells {
                    solver.enqueue_add_existing(source, x, y, z);
                }
            }
        }

        self.solve_all(source);
    }

    /// Incrementally relights around world cell `(x, y, z)` after its block
    /// changed to `id`. Every solver is drained before this returns.
    pub fn on_block_set<S: ChunkSource + ?Sized>(&mut self, source: &S, x: i32, y: i32, z: i32, id: BlockId) {
        let content = Arc::clone(&self.content);
        let def = content.get(id);

        for channel in LightChannel::COLORS {
            self.solvers[channel.index()].enqueue_remove(source, x, y, z);
        }
        if !def.light_passing || !def.sky_light_passing {
            self.solvers[LightChannel::Sky.index()].enqueue_remove(source, x, y, z);
        }
        self.solve_all(source);

        if def.light_passing {
            for solver in &mut self.solvers {
                for (dx, dy, dz) in NEIGHBORS_6 {
                    solver.enqueue_add_existing(source, x + dx, y + dy, z + dz);
                }
            }
        }
        for (channel, level) in LightChannel::COLORS.into_iter().zip(def.emission) {
            self.solvers[channel.index()].enqueue_add(source, x, y, z, level);
        }
        self.solve_all(source);
    }

    /// Zeroes every channel of every resident chunk and marks them unlit.
    pub fn clear<S: ChunkSource + ?Sized>(&mut self, source: &S) {
        source.for_each_chunk(&mut |handle| {
            let mut chunk = handle.write();
            chunk.lightmap.clear();
            chunk.flags.lighted = false;
            chunk.flags.loaded_lights = false;
        });
    }

    /// One channel at world `(x, y, z)`; 0 outside resident chunks.
    pub fn get_light<S: ChunkSource + ?Sized>(&self, source: &S, x: i32, y: i32, z: i32, channel: LightChannel) -> u8 {
        probe(source, channel, x, y, z).map_or(0, |(level, _)| level)
    }

    /// The packed light word at world `(x, y, z)`.
    pub fn get_light_packed<S: ChunkSource + ?Sized>(&self, source: &S, x: i32, y: i32, z: i32) -> u16 {
        source.light_packed(x, y, z)
    }

    fn solve_all<S: ChunkSource + ?Sized>(&mut self, source: &S) {
        for solver in &mut self.solvers {
            solver.solve(source, &self.content);
        }
    }
}

/// Returns `true` if a horizontal or lower neighbour could take sky light
/// from this cell: it lies outside the chunk, or it passes light and holds
/// less than the maximum.
fn borders_darker(chunk: &Chunk, content: &ContentRegistry, x: usize, y: usize, z: usize) -> bool {
    const SPREAD: [(i32, i32, i32); 5] = [(1, 0, 0), (-1, 0, 0), (0, 0, 1), (0, 0, -1), (0, -1, 0)];
    SPREAD.iter().any(|&(dx, dy, dz)| {
        let (nx, ny, nz) = (x as i32 + dx, y as i32 + dy, z as i32 + dz);
        if ny < 0 {
            return false;
        }
        if nx < 0 || nz < 0 || nx >= CHUNK_W as i32 || nz >= CHUNK_D as i32 {
            return true;
        }
        let (nx, ny, nz) = (nx as usize, ny as usize, nz as usize);
        chunk.get(nx, ny, nz).is_some_and(|v| content.get(v.id).light_passing)
            && chunk.lightmap.get(nx, ny, nz, LightChannel::Sky) < MAX_LIGHT
    })
}

/// World cells on the four border faces of chunk `(cx, cz)`.
fn own_edges(cx: i32, cz: i32) -> impl Iterator<Item = (i32, i32, i32)> {
    let (x0, z0) = (cx * CHUNK_W as i32, cz * CHUNK_D as i32);
    let (x1, z1) = (x0 + CHUNK_W as i32 - 1, z0 + CHUNK_D as i32 - 1);
    (0..CHUNK_H as i32).flat_map(move |y| {
        let along_x = (x0..=x1).flat_map(move |x| [(x, y, z0), (x, y, z1)]);
        let along_z = (z0 + 1..z1).flat_map(move |z| [(x0, y, z), (x1, y, z)]);
        along_x.chain(along_z)
    })
}

/// World cells of resident-or-not neighbours that face chunk `(cx, cz)`.
fn neighbor_edges(cx: i32, cz: i32) -> impl Iterator<Item = (i32, i32, i32)> {
    let (x0, z0) = (cx * CHUNK_W as i32, cz * CHUNK_D as i32);
    let (x1, z1) = (x0 + CHUNK_W as i32, z0 + CHUNK_D as i32);
    (0..CHUNK_H as i32).flat_map(move |y| {
        let along_x = (x0..x1).flat_map(move |x| [(x, y, z0 - 1), (x, y, z1)]);
        let along_z = (z0..z1).flat_map(move |z| [(x0 - 1, y, z), (x1, y, z)]);
        along_x.chain(along_z)
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use strata_voxel::{BlockDef, Voxel};

    use super::*;
    use crate::solver::tests::{TestSource, test_content};

    fn lamp_content() -> (ContentRegistry, BlockId, BlockId) {
        let (mut content, stone) = test_content();
        let lamp = content
            .register(BlockDef {
                emission: [15, 0, 0],
                ..BlockDef::opaque("base:red_lamp")
            })
            .unwrap();
        (content, stone, lamp)
    }

    fn lit_world(content: ContentRegistry, radius: i32) -> (TestSource, Lighting) {
        let source = TestSource::new(content.clone(), radius);
        let mut lighting = Lighting::new(Arc::new(content));
        for handle in source.chunks.values() {
            let mut chunk = handle.write();
            Lighting::prebuild_sky_light(&mut chunk, &source.content);
        }
        let keys: Vec<(i32, i32)> = source.chunks.keys().copied().collect();
        for &(cx, cz) in &keys {
            lighting.build_sky_light(&source, cx, cz);
        }
        for &(cx, cz) in &keys {
            lighting.on_chunk_loaded(&source, cx, cz, true);
        }
        (source, lighting)
    }

    #[test]
    fn test_scenario_red_lamp_across_chunks() {
        let (content, _, lamp) = lamp_content();
        let (source, mut lighting) = lit_world(content, 1);

        source.set(8, 100, 8, lamp);
        lighting.on_block_set(&source, 8, 100, 8, lamp);
        assert!(lighting.is_idle());

        let red = |x, y, z| lighting.get_light(&source, x, y, z, LightChannel::Red);
        assert_eq!(red(8, 100, 8), 15);
        assert_eq!(red(8, 100, 9), 14);
        assert_eq!(red(8, 100, 16), 7);
        assert_eq!(red(8, 100, 17), 6);
        assert_eq!(red(8, 100, 24), 0);
        assert_eq!(red(0, 100, 0), 0);
    }

    #[test]
    fn test_breaking_lamp_returns_to_dark() {
        let (content, _, lamp) = lamp_content();
        let (source, mut lighting) = lit_world(content, 1);

        source.set(8, 100, 8, lamp);
        lighting.on_block_set(&source, 8, 100, 8, lamp);
        source.set(8, 100, 8, BlockId::AIR);
        lighting.on_block_set(&source, 8, 100, 8, BlockId::AIR);

        for handle in source.chunks.values() {
            let chunk = handle.read();
            assert!(chunk.lightmap.as_slice().iter().all(|&w| w & 0x0FFF == 0));
        }
    }

    #[test]
    fn test_prebuild_sky_stops_at_ground() {
        let (content, stone) = test_content();
        let mut chunk = Chunk::new(0, 0);
        for x in 0..CHUNK_W {
            for z in 0..CHUNK_D {
                chunk.set_voxel(x, 10, z, Voxel::of(stone), &content);
            }
        }
        chunk.set_voxel(5, 40, 5, Voxel::of(stone), &content);
        Lighting::prebuild_sky_light(&mut chunk, &content);

        assert_eq!(chunk.lightmap.get(0, 11, 0, LightChannel::Sky), 15);
        assert_eq!(chunk.lightmap.get(0, 10, 0, LightChannel::Sky), 0);
        assert_eq!(chunk.lightmap.get(0, 9, 0, LightChannel::Sky), 0);
        assert_eq!(chunk.lightmap.get(5, 39, 5, LightChannel::Sky), 0);
        assert_eq!(chunk.lightmap.highest_point, 41);
    }

    #[test]
    fn test_sky_spreads_under_overhang() {
        let (content, stone) = test_content();
        let source = TestSource::new(content.clone(), 0);
        // Floor at y = 10 and a roof over x in 0..8 at y = 20.
        for x in 0..CHUNK_W as i32 {
            for z in 0..CHUNK_D as i32 {
                source.set(x, 10, z, stone);
                if x < 8 {
                    source.set(x, 20, z, stone);
                }
            }
        }
        let mut lighting = Lighting::new(Arc::new(content));
        {
            let mut chunk = source.chunks[&(0, 0)].write();
            Lighting::prebuild_sky_light(&mut chunk, &source.content);
        }
        lighting.build_sky_light(&source, 0, 0);

        let sky = |x, y, z| lighting.get_light(&source, x, y, z, LightChannel::Sky);
        assert_eq!(sky(8, 15, 8), 15);
        assert_eq!(sky(7, 15, 8), 14);
        assert_eq!(sky(4, 15, 8), 11);
        assert_eq!(sky(4, 20, 8), 0);
    }

    #[test]
    fn test_placing_roof_shadows_column() {
        let (content, stone) = test_content();
        let (source, mut lighting) = lit_world(content, 0);
        assert_eq!(lighting.get_light(&source, 5, 50, 5, LightChannel::Sky), 15);

        source.set(5, 60, 5, stone);
        lighting.on_block_set(&source, 5, 60, 5, stone);

        let sky = |lighting: &Lighting, y| lighting.get_light(&source, 5, y, 5, LightChannel::Sky);
        assert_eq!(sky(&lighting, 61), 15);
        assert_eq!(sky(&lighting, 60), 0);
        // Lit sideways from the neighbouring open columns.
        assert_eq!(sky(&lighting, 59), 14);
        assert_eq!(sky(&lighting, 30), 14);

        source.set(5, 60, 5, BlockId::AIR);
        lighting.on_block_set(&source, 5, 60, 5, BlockId::AIR);
        assert_eq!(sky(&lighting, 60), 15);
        assert_eq!(sky(&lighting, 30), 15);
    }

    #[test]
    fn test_clear_zeroes_everything() {
        let (content, ..) = lamp_content();
        let (source, mut lighting) = lit_world(content, 0);
        lighting.clear(&source);
        let chunk = source.chunks[&(0, 0)].read();
        assert!(chunk.lightmap.as_slice().iter().all(|&w| w == 0));
        assert!(!chunk.flags.lighted);
    }
}
