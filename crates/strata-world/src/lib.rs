//! World runtime: chunk residency, block edits, ray casts, snapshots and
//! the [`World`] facade tying them to lighting and region storage.

pub mod blocks;
pub mod directory;
pub mod error;
pub mod generator;
pub mod matrix;
pub mod raycast;
pub mod snapshot;
pub mod world;

#[cfg(test)]
pub(crate) mod testing;

pub use directory::ChunkDirectory;
pub use error::WorldError;
pub use generator::{ChunkGenerator, FlatGenerator};
pub use matrix::ChunkMatrix;
pub use raycast::{RayHit, raycast};
pub use snapshot::{VoxelVolume, fetch_snapshot};
pub use world::World;
