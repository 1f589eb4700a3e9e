//! Dense copies of a world box for consumers that must not hold chunk locks
//! (meshing, physics queries on another thread).

use glam::IVec3;
use strata_voxel::{CHUNK_D, CHUNK_H, CHUNK_W, ChunkSource, LightChannel, Voxel, extract_light};

/// Voxels and packed light of a box, indexed `(y * size.z + z) * size.x + x`.
#[derive(Clone, Debug, PartialEq)]
pub struct VoxelVolume {
    /// World position of the box's minimum corner.
    pub min: IVec3,
    pub size: IVec3,
    pub voxels: Vec<Voxel>,
    pub lights: Vec<u16>,
}

impl VoxelVolume {
    fn empty(min: IVec3, size: IVec3) -> Self {
        let mut size = size.max(IVec3::ZERO);
        // Boxes whose cell count or far corner overflows are treated as empty.
        let len = (size.x as usize)
            .checked_mul(size.y as usize)
            .and_then(|n| n.checked_mul(size.z as usize))
            .filter(|_| {
                min.x.checked_add(size.x).is_some()
                    && min.y.checked_add(size.y).is_some()
                    && min.z.checked_add(size.z).is_some()
            });
        let len = match len {
            Some(len) => len,
            None => {
                size = IVec3::ZERO;
                0
            }
        };
        Self {
            min,
            size,
            voxels: vec![Voxel::AIR; len],
            lights: vec![0; len],
        }
    }

    /// Index of world position `pos`, or `None` outside the box.
    pub fn index(&self, pos: IVec3) -> Option<usize> {
        let local = pos - self.min;
        if local.cmplt(IVec3::ZERO).any() || local.cmpge(self.size).any() {
            return None;
        }
        let (x, y, z) = (local.x as usize, local.y as usize, local.z as usize);
        Some((y * self.size.z as usize + z) * self.size.x as usize + x)
    }

    /// The voxel at world position `pos`; air outside the box.
    pub fn voxel(&self, pos: IVec3) -> Voxel {
        self.index(pos).map_or(Voxel::AIR, |i| self.voxels[i])
    }

    /// Packed light at world position `pos`; 0 outside the box.
    pub fn light_packed(&self, pos: IVec3) -> u16 {
        self.index(pos).map_or(0, |i| self.lights[i])
    }

    pub fn light(&self, pos: IVec3, channel: LightChannel) -> u8 {
        extract_light(self.light_packed(pos), channel)
    }
}

/// Copies the box starting at `min` with extent `size` out of `source`.
///
/// Each overlapped chunk is locked once. Cells of unloaded chunks and cells
/// outside the vertical range read as air with light 0.
pub fn fetch_snapshot<S: ChunkSource + ?Sized>(source: &S, min: IVec3, size: IVec3) -> VoxelVolume {
    let mut volume = VoxelVolume::empty(min, size);
    if volume.voxels.is_empty() {
        return volume;
    }
    let max = min + volume.size;

    let y0 = min.y.max(0);
    let y1 = max.y.min(CHUNK_H as i32);
    if y0 >= y1 {
        return volume;
    }

    let (cw, cd) = (CHUNK_W as i32, CHUNK_D as i32);
    for cz in min.z.div_euclid(cd)..=(max.z - 1).div_euclid(cd) {
        for cx in min.x.div_euclid(cw)..=(max.x - 1).div_euclid(cw) {
            let Some(handle) = source.chunk(cx, cz) else {
                continue;
            };
            let chunk = handle.read();
            let x0 = min.x.max(cx * cw);
            let x1 = max.x.min((cx + 1) * cw);
            let z0 = min.z.max(cz * cd);
            let z1 = max.z.min((cz + 1) * cd);
            for y in y0..y1 {
                for z in z0..z1 {
                    for x in x0..x1 {
                        let (lx, lz) = ((x - cx * cw) as usize, (z - cz * cd) as usize);
                        let Some(index) = volume.index(IVec3::new(x, y, z)) else {
                            continue;
                        };
                        if let Some(voxel) = chunk.get(lx, y as usize, lz) {
                            volume.voxels[index] = voxel;
                            volume.lights[index] = chunk.lightmap.get_packed(lx, y as usize, lz);
                        }
                    }
                }
            }
        }
    }
    volume
}
