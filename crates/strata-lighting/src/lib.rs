//! Multi-channel voxel lighting: per-channel flood-fill solvers and the
//! coordinator that keeps chunk lightmaps consistent as blocks change.

pub mod lighting;
pub mod solver;

pub use lighting::Lighting;
pub use solver::{LightEntry, LightSolver};
