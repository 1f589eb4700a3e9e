//! Rotation profiles for rotatable and extended blocks.
//!
//! Indices 0–3 are yaw rotations about +Y; each profile gives the world
//! direction of the block's local X, Y and Z axes. Indices 4–7 are reserved
//! and behave as the identity.

use glam::{IVec3, Vec3};

use crate::registry::Aabb;

/// World directions of a block's local axes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rotation {
    pub axis_x: IVec3,
    pub axis_y: IVec3,
    pub axis_z: IVec3,
}

const PROFILES: [Rotation; 4] = [
    Rotation {
        axis_x: IVec3::new(1, 0, 0),
        axis_y: IVec3::new(0, 1, 0),
        axis_z: IVec3::new(0, 0, 1),
    },
    Rotation {
        axis_x: IVec3::new(0, 0, 1),
        axis_y: IVec3::new(0, 1, 0),
        axis_z: IVec3::new(-1, 0, 0),
    },
    Rotation {
        axis_x: IVec3::new(-1, 0, 0),
        axis_y: IVec3::new(0, 1, 0),
        axis_z: IVec3::new(0, 0, -1),
    },
    Rotation {
        axis_x: IVec3::new(0, 0, -1),
        axis_y: IVec3::new(0, 1, 0),
        axis_z: IVec3::new(1, 0, 0),
    },
];

impl Rotation {
    /// The profile for a state rotation index.
    pub fn from_index(index: u8) -> Rotation {
        PROFILES
            .get(index as usize)
            .copied()
            .unwrap_or(PROFILES[0])
    }

    /// World offset of the cell at local offset `(lx, ly, lz)` from the origin.
    pub fn offset(&self, lx: i32, ly: i32, lz: i32) -> IVec3 {
        self.axis_x * lx + self.axis_y * ly + self.axis_z * lz
    }

    /// World step from a segment cell one cell closer to its origin.
    ///
    /// Repeating the step from any segment reaches the origin after at most
    /// `max(size) - 1` iterations.
    pub fn segment_step(&self, segment: u8) -> IVec3 {
        let mut step = IVec3::ZERO;
        if segment & 0b001 != 0 {
            step -= self.axis_x;
        }
        if segment & 0b010 != 0 {
            step -= self.axis_y;
        }
        if segment & 0b100 != 0 {
            step -= self.axis_z;
        }
        step
    }

    /// Rotates a block-local hitbox about the cell centre.
    pub fn transform_aabb(&self, aabb: &Aabb) -> Aabb {
        let center = Vec3::splat(0.5);
        let apply = |p: Vec3| -> Vec3 {
            let local = p - center;
            center
                + self.axis_x.as_vec3() * local.x
                + self.axis_y.as_vec3() * local.y
                + self.axis_z.as_vec3() * local.z
        };
        let a = apply(aabb.min);
        let b = apply(aabb.max);
        Aabb::new(a.min(b), a.max(b))
    }
}

/// Segment tag for the cell at local offset `(lx, ly, lz)` of an extended block.
///
/// A bit is set for every local axis the cell is offset along; the origin
/// gets tag 0.
pub fn segment_tag(lx: u8, ly: u8, lz: u8) -> u8 {
    u8::from(lx > 0) | (u8::from(ly > 0) << 1) | (u8::from(lz > 0) << 2)
}
