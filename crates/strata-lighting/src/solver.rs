//! Incremental flood-fill light solver for one channel.
//!
//! The solver owns two FIFO queues. *Add* entries spread light outwards with
//! a decay of 1 per step; *remove* entries clear light that was derived from a
//! removed source and hand the boundary of still-lit cells back to the add
//! queue. Both queues work on world coordinates and cross chunk borders
//! through a [`ChunkSource`]; cells in chunks that are not resident behave as
//! opaque.
//!
//! Sky light is special in one way: a level-15 cell passes 15 straight down
//! into a sky-passing block without decay.
//!
//! Chunk locks are only ever held for a single cell access, so the solver
//! never holds two chunk locks at once.

use std::collections::VecDeque;

use strata_voxel::{
    BlockDef, ChunkSource, ContentRegistry, LightChannel, MAX_LIGHT, Voxel, local_coords,
};

/// The six face-neighbour offsets.
pub(crate) const NEIGHBORS_6: [(i32, i32, i32); 6] = [
    (1, 0, 0),
    (-1, 0, 0),
    (0, 1, 0),
    (0, -1, 0),
    (0, 0, 1),
    (0, 0, -1),
];

/// One queued cell and the level it carried when queued.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LightEntry {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub level: u8,
}

/// Breadth-first propagation and removal engine for one [`LightChannel`].
#[derive(Debug)]
pub struct LightSolver {
    channel: LightChannel,
    add_queue: VecDeque<LightEntry>,
    remove_queue: VecDeque<LightEntry>,
}

impl LightSolver {
    /// Creates an idle solver for `channel`.
    pub fn new(channel: LightChannel) -> Self {
        Self {
            channel,
            add_queue: VecDeque::new(),
            remove_queue: VecDeque::new(),
        }
    }

    pub fn channel(&self) -> LightChannel {
        self.channel
    }

    /// Raises the cell to `level` (if not already brighter) and queues it.
    ///
    /// No-op for level 0 or a cell outside resident chunks.
    pub fn enqueue_add<S: ChunkSource + ?Sized>(&mut self, source: &S, x: i32, y: i32, z: i32, level: u8) {
        let level = level.min(MAX_LIGHT);
        if level == 0 {
            return;
        }
        let Some((current, _)) = probe(source, self.channel, x, y, z) else {
            return;
        };
        if level > current {
            write_level(source, self.channel, x, y, z, level);
        }
        self.add_queue.push_back(LightEntry { x, y, z, level });
    }

    /// Re-queues the cell at its currently stored level.
    pub fn enqueue_add_existing<S: ChunkSource + ?Sized>(&mut self, source: &S, x: i32, y: i32, z: i32) {
        if let Some((level, _)) = probe(source, self.channel, x, y, z)
            && level > 0
        {
            self.add_queue.push_back(LightEntry { x, y, z, level });
        }
    }

    /// Seeds the cell with its own block's emission on this channel.
    pub fn enqueue_emission<S: ChunkSource + ?Sized>(
        &mut self,
        source: &S,
        content: &ContentRegistry,
        x: i32,
        y: i32,
        z: i32,
    ) {
        if let Some((_, voxel)) = probe(source, self.channel, x, y, z) {
            let emission = content.get(voxel.id).emission(self.channel);
            self.enqueue_add(source, x, y, z, emission);
        }
    }

    /// Zeroes the cell and queues its former level for removal.
    ///
    /// No-op for a dark cell or a cell outside resident chunks.
    pub fn enqueue_remove<S: ChunkSource + ?Sized>(&mut self, source: &S, x: i32, y: i32, z: i32) {
        let Some((level, _)) = probe(source, self.channel, x, y, z) else {
            return;
        };
        if level == 0 {
            return;
        }
        write_level(source, self.channel, x, y, z, 0);
        self.remove_queue.push_back(LightEntry { x, y, z, level });
    }

    /// Number of queued entries (add + remove).
    pub fn pending(&self) -> usize {
        self.add_queue.len() + self.remove_queue.len()
    }

    /// Returns `true` if both queues are empty.
    pub fn is_idle(&self) -> bool {
        self.pending() == 0
    }

    /// Drains the removal queue, then the propagation queue.
    pub fn solve<S: ChunkSource + ?Sized>(&mut self, source: &S, content: &ContentRegistry) {
        let sky = self.channel == LightChannel::Sky;

        while let Some(entry) = self.remove_queue.pop_front() {
            for (dx, dy, dz) in NEIGHBORS_6 {
                let (nx, ny, nz) = (entry.x + dx, entry.y + dy, entry.z + dz);
                let Some((level, voxel)) = probe(source, self.channel, nx, ny, nz) else {
                    continue;
                };
                if level == 0 {
                    continue;
                }
                let direct_sky = sky && dy == -1 && entry.level == MAX_LIGHT && level == MAX_LIGHT;
                if level < entry.level || direct_sky {
                    write_level(source, self.channel, nx, ny, nz, 0);
                    self.remove_queue.push_back(LightEntry {
                        x: nx,
                        y: ny,
                        z: nz,
                        level,
                    });
                    let emission = content.get(voxel.id).emission(self.channel);
                    if emission > 0 {
                        self.enqueue_add(source, nx, ny, nz, emission);
                    }
                } else {
                    self.add_queue.push_back(LightEntry {
                        x: nx,
                        y: ny,
                        z: nz,
                        level,
                    });
                }
            }
        }

        while let Some(entry) = self.add_queue.pop_front() {
            // The stored level wins over the queued one; the cell may have been
            // cleared or brightened since it was queued.
            let Some((level, _)) = probe(source, self.channel, entry.x, entry.y, entry.z) else {
                continue;
            };
            if level == 0 {
                continue;
            }
            for (dx, dy, dz) in NEIGHBORS_6 {
                let (nx, ny, nz) = (entry.x + dx, entry.y + dy, entry.z + dz);
                let Some((current, voxel)) = probe(source, self.channel, nx, ny, nz) else {
                    continue;
                };
                let def = content.get(voxel.id);
                let Some(target) = spread_level(def, self.channel, level, dy) else {
                    continue;
                };
                if target > current {
                    write_level(source, self.channel, nx, ny, nz, target);
                    self.add_queue.push_back(LightEntry {
                        x: nx,
                        y: ny,
                        z: nz,
                        level: target,
                    });
                }
            }
        }
    }
}

/// Level a neighbour receives from a cell at `level`, or `None` if the
/// neighbour's block stops this channel.
fn spread_level(def: &BlockDef, channel: LightChannel, level: u8, dy: i32) -> Option<u8> {
    if channel == LightChannel::Sky && dy == -1 && level == MAX_LIGHT && def.sky_light_passing {
        return Some(MAX_LIGHT);
    }
    if def.passes_light(channel) {
        Some(level.saturating_sub(1))
    } else {
        None
    }
}

/// Stored level and voxel of a resident cell.
pub(crate) fn probe<S: ChunkSource + ?Sized>(
    source: &S,
    channel: LightChannel,
    x: i32,
    y: i32,
    z: i32,
) -> Option<(u8, Voxel)> {
    let (lx, ly, lz) = local_coords(x, y, z)?;
    let chunk = source.chunk_at(x, z)?.read();
    let voxel = chunk.get(lx, ly, lz)?;
    Some((chunk.lightmap.get(lx, ly, lz, channel), voxel))
}

fn write_level<S: ChunkSource + ?Sized>(source: &S, channel: LightChannel, x: i32, y: i32, z: i32, level: u8) {
    let Some((lx, ly, lz)) = local_coords(x, y, z) else {
        return;
    };
    if let Some(handle) = source.chunk_at(x, z) {
        let mut chunk = handle.write();
        chunk.lightmap.set(lx, ly, lz, channel, level);
        chunk.flags.modified = true;
        chunk.flags.unsaved = true;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
