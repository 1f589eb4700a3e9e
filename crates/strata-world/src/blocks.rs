//! Block queries and edits on world coordinates.
//!
//! Everything here is generic over [`ChunkSource`] and locks one chunk at a
//! time. Edits that can touch several cells (extended blocks) validate every
//! target cell before writing any of them, and return the cells they changed
//! so the caller can update lighting.

use glam::{IVec3, Vec3};
use strata_voxel::{
    Aabb, BlockDef, BlockId, BlockState, ChunkSource, Rotation, Voxel, local_coords, segment_tag,
};

/// The voxel at `pos`, or `None` if its chunk is not resident.
pub fn get_voxel<S: ChunkSource + ?Sized>(source: &S, pos: IVec3) -> Option<Voxel> {
    source.voxel(pos.x, pos.y, pos.z)
}

/// Writes one voxel without any extended-block handling.
///
/// Returns `false` if the chunk is not resident or `pos.y` is out of range.
pub fn set_voxel<S: ChunkSource + ?Sized>(source: &S, pos: IVec3, voxel: Voxel) -> bool {
    let Some((lx, ly, lz)) = local_coords(pos.x, pos.y, pos.z) else {
        return false;
    };
    let Some(handle) = source.chunk_at(pos.x, pos.z) else {
        return false;
    };
    handle.write().set_voxel(lx, ly, lz, voxel, source.content())
}

/// Block-local hitbox of `voxel`, rotated for rotatable blocks.
pub(crate) fn block_hitbox(def: &BlockDef, voxel: Voxel) -> Aabb {
    if def.rotatable {
        Rotation::from_index(voxel.state.rotation()).transform_aabb(&def.hitbox)
    } else {
        def.hitbox
    }
}

/// Returns the world-space hitbox of the obstacle containing the point
/// `(x, y, z)`, if any.
pub fn is_obstacle_at<S: ChunkSource + ?Sized>(source: &S, x: f64, y: f64, z: f64) -> Option<Aabb> {
    let cell = IVec3::new(x.floor() as i32, y.floor() as i32, z.floor() as i32);
    let voxel = get_voxel(source, cell)?;
    let def = source.content().get(voxel.id);
    if !def.obstacle {
        return None;
    }
    let hitbox = block_hitbox(def, voxel);
    let local = Vec3::new(
        (x - f64::from(cell.x)) as f32,
        (y - f64::from(cell.y)) as f32,
        (z - f64::from(cell.z)) as f32,
    );
    hitbox
        .contains(local)
        .then(|| hitbox.translated(cell.as_vec3()))
}

/// Returns `true` if `pos` holds a solid block. Unloaded cells are not solid.
pub fn is_solid_block<S: ChunkSource + ?Sized>(source: &S, pos: IVec3) -> bool {
    get_voxel(source, pos).is_some_and(|v| source.content().get(v.id).solid)
}

/// Returns `true` if a block may be placed at `pos`.
pub fn is_replaceable_block<S: ChunkSource + ?Sized>(source: &S, pos: IVec3) -> bool {
    get_voxel(source, pos).is_some_and(|v| source.content().get(v.id).replaceable)
}

/// Cells covered by a block of `size` whose origin is at `origin`, origin
/// first, each with its segment tag.
fn extent_cells(size: [u8; 3], origin: IVec3, rotation: u8) -> Vec<(IVec3, u8)> {
    let rotation = Rotation::from_index(rotation);
    let mut cells = Vec::with_capacity(size.iter().map(|&s| s as usize).product());
    for ly in 0..size[1] {
        for lz in 0..size[2] {
            for lx in 0..size[0] {
                let offset = rotation.offset(i32::from(lx), i32::from(ly), i32::from(lz));
                cells.push((origin + offset, segment_tag(lx, ly, lz)));
            }
        }
    }
    cells
}

/// Follows segment tags from `pos` back to the origin cell of its block.
///
/// Returns `pos` itself for ordinary blocks and `None` if the chain leaves
/// the block (a damaged structure) or an unloaded chunk.
pub fn seek_origin<S: ChunkSource + ?Sized>(source: &S, pos: IVec3) -> Option<IVec3> {
    let mut voxel = get_voxel(source, pos)?;
    let def = source.content().get(voxel.id);
    if !def.is_extended() {
        return Some(pos);
    }

    let id = voxel.id;
    let max_steps: usize = def.size.iter().map(|&s| s as usize).sum();
    let mut current = pos;
    for _ in 0..=max_steps {
        if !voxel.is_segment() {
            return Some(current);
        }
        current += Rotation::from_index(voxel.state.rotation()).segment_step(voxel.state.segment());
        voxel = get_voxel(source, current)?;
        if voxel.id != id {
            return None;
        }
    }
    None
}

/// Places block `id` with its origin at `pos`.
///
/// Every covered cell must be resident and replaceable, otherwise nothing is
/// written and `None` is returned. On success returns the written cells.
pub fn place_block<S: ChunkSource + ?Sized>(
    source: &S,
    pos: IVec3,
    id: BlockId,
    rotation: u8,
) -> Option<Vec<IVec3>> {
    let def = source.content().get(id);
    let rotation = if def.rotatable { rotation & 0b111 } else { 0 };
    let cells = extent_cells(def.size, pos, rotation);

    if let Some(&(blocked, _)) = cells
        .iter()
        .find(|&&(cell, _)| !is_replaceable_block(source, cell))
    {
        tracing::debug!("cannot place {} at {}: {} is occupied", def.name, pos, blocked);
        return None;
    }

    for &(cell, segment) in &cells {
        set_voxel(source, cell, Voxel::new(id, BlockState::pack(rotation, segment, 0)));
    }
    Some(cells.into_iter().map(|(cell, _)| cell).collect())
}

/// Removes the block at `pos`; for extended blocks the origin and every
/// segment go together.
///
/// Returns the cleared cells, or `None` for air and unloaded cells.
pub fn break_block<S: ChunkSource + ?Sized>(source: &S, pos: IVec3) -> Option<Vec<IVec3>> {
    let voxel = get_voxel(source, pos)?;
    if voxel.is_air() {
        return None;
    }
    let def = source.content().get(voxel.id);
    let origin = match seek_origin(source, pos) {
        Some(origin) if def.is_extended() => origin,
        _ => {
            set_voxel(source, pos, Voxel::AIR);
            return Some(vec![pos]);
        }
    };

    let rotation = get_voxel(source, origin)?.state.rotation();
    let mut cleared = Vec::new();
    for (cell, _) in extent_cells(def.size, origin, rotation) {
        if get_voxel(source, cell).is_some_and(|v| v.id == voxel.id)
            && set_voxel(source, cell, Voxel::AIR)
        {
            cleared.push(cell);
        }
    }
    Some(cleared)
}

/// Rotates the block at `pos` (any of its cells) to `rotation`.
///
/// Cells the rotated block would newly cover must be replaceable; otherwise
/// the block is left untouched and `None` is returned. On success returns
/// every cell that changed.
pub fn set_rotation<S: ChunkSource + ?Sized>(
    source: &S,
    pos: IVec3,
    rotation: u8,
) -> Option<Vec<IVec3>> {
    let origin = seek_origin(source, pos)?;
    let voxel = get_voxel(source, origin)?;
    let def = source.content().get(voxel.id);
    if !def.rotatable {
        return None;
    }
    let rotation = rotation & 0b111;
    if voxel.state.rotation() == rotation {
        return Some(Vec::new());
    }

    let old_cells: Vec<IVec3> = extent_cells(def.size, origin, voxel.state.rotation())
        .into_iter()
        .map(|(cell, _)| cell)
        .collect();
    let new_cells = extent_cells(def.size, origin, rotation);
    if !new_cells
        .iter()
        .all(|&(cell, _)| old_cells.contains(&cell) || is_replaceable_block(source, cell))
    {
        return None;
    }

    let mut changed = Vec::with_capacity(old_cells.len() + new_cells.len());
    for &cell in &old_cells {
        if !new_cells.iter().any(|&(c, _)| c == cell) {
            set_voxel(source, cell, Voxel::AIR);
            changed.push(cell);
        }
    }
    let userbits = voxel.state.userbits();
    for &(cell, segment) in &new_cells {
        set_voxel(
            source,
            cell,
            Voxel::new(voxel.id, BlockState::pack(rotation, segment, userbits)),
        );
        changed.push(cell);
    }
    Some(changed)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
