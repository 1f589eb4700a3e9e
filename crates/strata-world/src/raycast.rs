//! Block selection ray casts using the DDA (Amanatides & Woo) traversal.
//!
//! Full-cube blocks are hit at the cell boundary; blocks with a smaller
//! hitbox are tested against that box so a ray can pass over a slab.

use glam::{IVec3, Vec3};
use strata_voxel::{Aabb, BlockId, ChunkSource, Voxel};

use crate::blocks::{block_hitbox, get_voxel};

/// Result of a successful ray cast.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayHit {
    /// Cell of the selected block.
    pub position: IVec3,
    /// Normal of the face the ray entered through; zero if the ray started
    /// inside the block.
    pub normal: IVec3,
    /// Exact world-space hit point.
    pub point: Vec3,
    /// Distance from the ray origin to `point`.
    pub distance: f32,
    pub voxel: Voxel,
}

impl RayHit {
    /// The cell a block placed against the hit face would occupy.
    pub fn adjacent(&self) -> IVec3 {
        self.position + self.normal
    }
}

/// Casts a ray from `origin` along `direction` and returns the first
/// selectable block within `max_distance`.
///
/// Blocks whose id appears in `filter` are passed through, as are cells of
/// unloaded chunks.
pub fn raycast<S: ChunkSource + ?Sized>(
    source: &S,
    origin: Vec3,
    direction: Vec3,
    max_distance: f32,
    filter: &[BlockId],
) -> Option<RayHit> {
    let dir = direction.normalize_or_zero();
    if dir == Vec3::ZERO {
        return None;
    }

    let mut cell = origin.floor().as_ivec3();
    let sub = origin - cell.as_vec3();

    let step = IVec3::new(step_of(dir.x), step_of(dir.y), step_of(dir.z));

    // Distance in t-units to cross one full cell on each axis.
    let t_delta = Vec3::new(
        safe_inv(dir.x.abs()),
        safe_inv(dir.y.abs()),
        safe_inv(dir.z.abs()),
    );

    // Distance in t-units to the first cell boundary on each axis.
    let mut t_max = Vec3::new(
        initial_t_max(sub.x, dir.x, t_delta.x),
        initial_t_max(sub.y, dir.y, t_delta.y),
        initial_t_max(sub.z, dir.z, t_delta.z),
    );

    let content = source.content();
    let mut last_normal = IVec3::ZERO;
    let mut t = 0.0_f32;

    loop {
        if let Some(voxel) = get_voxel(source, cell)
            && !filter.contains(&voxel.id)
        {
            let def = content.get(voxel.id);
            if def.selectable {
                let hitbox = block_hitbox(def, voxel);
                if hitbox.is_full() {
                    return Some(RayHit {
                        position: cell,
                        normal: last_normal,
                        point: origin + dir * t,
                        distance: t,
                        voxel,
                    });
                }
                if let Some((t_hit, normal)) =
                    intersect_aabb(origin, dir, &hitbox.translated(cell.as_vec3()))
                    && t_hit <= max_distance
                {
                    return Some(RayHit {
                        position: cell,
                        normal,
                        point: origin + dir * t_hit,
                        distance: t_hit,
                        voxel,
                    });
                }
            }
        }

        // Advance along the axis with the smallest t_max.
        if t_max.x < t_max.y && t_max.x < t_max.z {
            t = t_max.x;
            t_max.x += t_delta.x;
            cell.x += step.x;
            last_normal = IVec3::new(-step.x, 0, 0);
        } else if t_max.y < t_max.z {
            t = t_max.y;
            t_max.y += t_delta.y;
            cell.y += step.y;
            last_normal = IVec3::new(0, -step.y, 0);
        } else {
            t = t_max.z;
            t_max.z += t_delta.z;
            cell.z += step.z;
            last_normal = IVec3::new(0, 0, -step.z);
        }

        if t > max_distance {
            return None;
        }
    }
}

fn step_of(d: f32) -> i32 {
    if d >= 0.0 { 1 } else { -1 }
}

/// Safely compute 1.0 / x, clamping to `f32::MAX` when x ≈ 0.
fn safe_inv(x: f32) -> f32 {
    if x.abs() < f32::EPSILON {
        f32::MAX
    } else {
        1.0 / x
    }
}

fn initial_t_max(sub: f32, dir_component: f32, t_delta: f32) -> f32 {
    if dir_component > 0.0 {
        (1.0 - sub) * t_delta
    } else if dir_component < 0.0 {
        sub * t_delta
    } else {
        f32::MAX
    }
}

/// Slab test of a ray against a world-space box. Returns the entry distance
/// and the entry face normal (zero when the origin is inside the box).
fn intersect_aabb(origin: Vec3, dir: Vec3, aabb: &Aabb) -> Option<(f32, IVec3)> {
    let mut t_enter = f32::NEG_INFINITY;
    let mut t_exit = f32::INFINITY;
    let mut normal = IVec3::ZERO;

    for axis in 0..3 {
        let (o, d) = (origin[axis], dir[axis]);
        let (lo, hi) = (aabb.min[axis], aabb.max[axis]);
        if d.abs() < f32::EPSILON {
            if o < lo || o > hi {
                return None;
            }
            continue;
        }
        let inv = 1.0 / d;
        let (t0, t1) = if inv >= 0.0 {
            ((lo - o) * inv, (hi - o) * inv)
        } else {
            ((hi - o) * inv, (lo - o) * inv)
        };
        if t0 > t_enter {
            t_enter = t0;
            normal = IVec3::ZERO;
            normal[axis] = -step_of(d);
        }
        t_exit = t_exit.min(t1);
    }

    if t_enter > t_exit || t_exit < 0.0 {
        return None;
    }
    if t_enter < 0.0 {
        return Some((0.0, IVec3::ZERO));
    }
    Some((t_enter, normal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::set_voxel;
    use crate::testing::{TestBlocks, TestSource, test_content};

    fn setup() -> (TestSource, TestBlocks) {
        let (content, blocks) = test_content();
        (TestSource::new(content, 1), blocks)
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_hit_along_positive_x() {
        let (source, blocks) = setup();
        set_voxel(&source, IVec3::new(5, 10, 0), Voxel::of(blocks.stone));

        let hit = raycast(&source, Vec3::new(0.5, 10.5, 0.5), Vec3::X, 10.0, &[]).unwrap();
        assert_eq!(hit.position, IVec3::new(5, 10, 0));
        assert_eq!(hit.normal, IVec3::new(-1, 0, 0));
        assert!(approx(hit.distance, 4.5));
        assert!(approx(hit.point.x, 5.0));
        assert_eq!(hit.voxel.id, blocks.stone);
        assert_eq!(hit.adjacent(), IVec3::new(4, 10, 0));
    }

    #[test]
    fn test_miss_beyond_max_distance() {
        let (source, blocks) = setup();
        set_voxel(&source, IVec3::new(5, 10, 0), Voxel::of(blocks.stone));
        assert!(raycast(&source, Vec3::new(0.5, 10.5, 0.5), Vec3::X, 4.0, &[]).is_none());
        assert!(raycast(&source, Vec3::new(0.5, 10.5, 0.5), Vec3::ZERO, 10.0, &[]).is_none());
    }

    #[test]
    fn test_filter_passes_through() {
        let (source, blocks) = setup();
        set_voxel(&source, IVec3::new(5, 10, 0), Voxel::of(blocks.stone));
        set_voxel(&source, IVec3::new(7, 10, 0), Voxel::of(blocks.lamp));

        let hit = raycast(
            &source,
            Vec3::new(0.5, 10.5, 0.5),
            Vec3::X,
            10.0,
            &[blocks.stone],
        )
        .unwrap();
        assert_eq!(hit.position, IVec3::new(7, 10, 0));
        assert_eq!(hit.voxel.id, blocks.lamp);
    }

    #[test]
    fn test_partial_hitbox() {
        let (source, blocks) = setup();
        set_voxel(&source, IVec3::new(3, 10, 0), Voxel::of(blocks.slab));
        set_voxel(&source, IVec3::new(6, 10, 0), Voxel::of(blocks.stone));

        // Above the slab's top face the ray continues.
        let over = raycast(&source, Vec3::new(0.5, 10.75, 0.5), Vec3::X, 10.0, &[]).unwrap();
        assert_eq!(over.position, IVec3::new(6, 10, 0));

        let side = raycast(&source, Vec3::new(0.5, 10.25, 0.5), Vec3::X, 10.0, &[]).unwrap();
        assert_eq!(side.position, IVec3::new(3, 10, 0));
        assert_eq!(side.normal, IVec3::new(-1, 0, 0));
        assert!(approx(side.distance, 2.5));

        let top = raycast(&source, Vec3::new(3.5, 12.0, 0.5), Vec3::NEG_Y, 10.0, &[]).unwrap();
        assert_eq!(top.position, IVec3::new(3, 10, 0));
        assert_eq!(top.normal, IVec3::Y);
        assert!(approx(top.point.y, 10.5));
        assert!(approx(top.distance, 1.5));
    }

    #[test]
    fn test_negative_direction_across_chunk_border() {
        let (source, blocks) = setup();
        set_voxel(&source, IVec3::new(-3, 10, 0), Voxel::of(blocks.stone));

        let hit = raycast(&source, Vec3::new(0.5, 10.5, 0.5), Vec3::NEG_X, 10.0, &[]).unwrap();
        assert_eq!(hit.position, IVec3::new(-3, 10, 0));
        assert_eq!(hit.normal, IVec3::new(1, 0, 0));
        assert!(approx(hit.distance, 2.5));
    }

    #[test]
    fn test_origin_inside_block() {
        let (source, blocks) = setup();
        set_voxel(&source, IVec3::new(0, 10, 0), Voxel::of(blocks.stone));
        let hit = raycast(&source, Vec3::new(0.5, 10.5, 0.5), Vec3::X, 10.0, &[]).unwrap();
        assert_eq!(hit.position, IVec3::new(0, 10, 0));
        assert_eq!(hit.normal, IVec3::ZERO);
        assert_eq!(hit.distance, 0.0);
    }

    #[test]
    fn test_unloaded_chunks_are_empty() {
        let (source, _) = setup();
        assert!(raycast(&source, Vec3::new(40.5, 10.5, 0.5), Vec3::X, 64.0, &[]).is_none());
    }
}
