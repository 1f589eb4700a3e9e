//! World-level error type.

use strata_region::RegionError;
use strata_voxel::ChunkSerError;

/// Errors surfaced by chunk residency and persistence.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// Region storage failed (I/O or format).
    #[error(transparent)]
    Region(#[from] RegionError),

    /// A stored chunk payload did not decode.
    #[error("chunk ({cx}, {cz}): {source}")]
    Chunk {
        cx: i32,
        cz: i32,
        #[source]
        source: ChunkSerError,
    },
}

impl WorldError {
    /// Returns `true` if the error comes from the contents of a file rather
    /// than from the file system.
    pub fn is_format_error(&self) -> bool {
        match self {
            WorldError::Region(e) => e.is_format_error(),
            WorldError::Chunk { .. } => true,
        }
    }
}
