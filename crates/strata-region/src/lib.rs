//! Persistence: the byte RLE codec, the region file format, the shared
//! open-handle cache, the layered region store, and world side files.

pub mod error;
pub mod files;
pub mod format;
pub mod handles;
pub mod layer;
pub mod rle;
pub mod store;

pub use error::RegionError;
pub use files::{ContentIndices, WorldFiles, WorldInfo};
pub use format::{
    REGION_FORMAT_VERSION, REGION_MAGIC, REGION_SIZE, REGION_SLOTS, RegionContents, RegionHeader,
    parse_region_file_name, read_region, region_coords, region_file_name, slot_chunk, slot_index,
};
pub use handles::{MAX_OPEN_REGION_FILES, RegionHandles, region_path};
pub use layer::RegionLayer;
pub use rle::RleError;
pub use store::RegionStore;
