//! Terrain generation for chunks that were never saved.

use strata_voxel::{BlockId, CHUNK_D, CHUNK_H, CHUNK_W, Voxel};

/// Fills a fresh chunk's voxel buffer.
///
/// `voxels` is laid out `(y * CHUNK_D + z) * CHUNK_W + x` and starts all air.
pub trait ChunkGenerator: Send + Sync {
    fn generate(&self, voxels: &mut [Voxel], cx: i32, cz: i32);
}

/// Horizontal layers stacked from y = 0, identical in every chunk.
#[derive(Clone, Debug, Default)]
pub struct FlatGenerator {
    layers: Vec<(BlockId, usize)>,
}

impl FlatGenerator {
    /// `layers` lists `(block, thickness)` bottom-up.
    pub fn new(layers: Vec<(BlockId, usize)>) -> Self {
        Self { layers }
    }

    /// Total height of all layers, clamped to the chunk height.
    pub fn height(&self) -> usize {
        self.layers
            .iter()
            .map(|&(_, thickness)| thickness)
            .sum::<usize>()
            .min(CHUNK_H)
    }
}

impl ChunkGenerator for FlatGenerator {
    fn generate(&self, voxels: &mut [Voxel], _cx: i32, _cz: i32) {
        let layer = CHUNK_W * CHUNK_D;
        let mut y = 0;
        for &(id, thickness) in &self.layers {
            for _ in 0..thickness {
                if y >= CHUNK_H {
                    return;
                }
                voxels[y * layer..(y + 1) * layer].fill(Voxel::of(id));
                y += 1;
            }
        }
    }
}
