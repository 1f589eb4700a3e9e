//! Voxel data model: the packed voxel record, block definitions, the chunk
//! entity with its lightmap and metadata, and chunk byte encoding.

pub mod chunk;
pub mod chunk_serial;
pub mod lightmap;
pub mod metadata;
pub mod registry;
pub mod rotation;
pub mod source;
pub mod voxel;

pub use chunk::{CHUNK_D, CHUNK_H, CHUNK_VOL, CHUNK_W, Chunk, ChunkFlags, InventoryId, vox_coords, vox_index};
pub use chunk_serial::{CHUNK_DATA_LEN, ChunkSerError};
pub use lightmap::{LIGHTMAP_DATA_LEN, LightChannel, Lightmap, MAX_LIGHT, extract_light, pack_light};
pub use metadata::BlockDataHeap;
pub use registry::{Aabb, BlockDef, ContentRegistry, ContentRemap, RegistryError};
pub use rotation::{Rotation, segment_tag};
pub use source::{ChunkHandle, ChunkSource, chunk_coords, local_coords, new_handle};
pub use voxel::{BlockId, BlockState, Voxel};
