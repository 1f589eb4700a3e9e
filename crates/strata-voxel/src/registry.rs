//! Content registry: maps compact [`BlockId`] values to [`BlockDef`] properties.
//!
//! The registry is built once during startup and then shared read-only as an
//! `Arc<ContentRegistry>` by every component that needs block properties. Air
//! is always ID 0.

use std::collections::HashMap;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lightmap::LightChannel;
use crate::voxel::BlockId;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Axis-aligned box in block-local space (`0.0..=1.0` for a full cube).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    /// Minimum corner.
    pub min: Vec3,
    /// Maximum corner.
    pub max: Vec3,
}

impl Aabb {
    /// The unit cube.
    pub const FULL: Aabb = Aabb {
        min: Vec3::ZERO,
        max: Vec3::ONE,
    };

    /// Creates a box from two corners.
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Returns `true` if `point` lies inside the box (inclusive bounds).
    pub fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    /// Returns the box shifted by `offset`.
    pub fn translated(&self, offset: Vec3) -> Aabb {
        Aabb {
            min: self.min + offset,
            max: self.max + offset,
        }
    }

    /// Returns `true` if this is the full unit cube.
    pub fn is_full(&self) -> bool {
        *self == Aabb::FULL
    }
}

/// Full descriptor for a block type.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockDef {
    /// Unique content name (e.g. "base:stone").
    pub name: String,
    /// Emitted light per colour channel (red, green, blue), each 0–15.
    pub emission: [u8; 3],
    /// Whether coloured light and diffuse sky light pass through.
    pub light_passing: bool,
    /// Whether direct sky light passes straight down without decay.
    pub sky_light_passing: bool,
    /// Whether the block participates in collision.
    pub obstacle: bool,
    /// Whether the block is a full solid cube for neighbour queries.
    pub solid: bool,
    /// Whether placing another block may overwrite this one.
    pub replaceable: bool,
    /// Whether ray casts can select the block.
    pub selectable: bool,
    /// Whether the rotation bits are meaningful.
    pub rotatable: bool,
    /// Collision and selection box in block-local space.
    pub hitbox: Aabb,
    /// Extent in cells along the local axes; `[1, 1, 1]` for ordinary blocks.
    pub size: [u8; 3],
    /// Bytes of structured per-block metadata (0 = none).
    pub data_size: u16,
    /// Inventory slot count (0 = no inventory).
    pub inventory_size: u16,
}

impl BlockDef {
    /// An opaque, solid, selectable unit cube with no emission.
    pub fn opaque(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            emission: [0; 3],
            light_passing: false,
            sky_light_passing: false,
            obstacle: true,
            solid: true,
            replaceable: false,
            selectable: true,
            rotatable: false,
            hitbox: Aabb::FULL,
            size: [1, 1, 1],
            data_size: 0,
            inventory_size: 0,
        }
    }

    /// The built-in air definition.
    pub fn air() -> Self {
        Self {
            name: "core:air".to_string(),
            light_passing: true,
            sky_light_passing: true,
            obstacle: false,
            solid: false,
            replaceable: true,
            selectable: false,
            ..Self::opaque("core:air")
        }
    }

    /// Returns `true` if any colour channel emits light.
    pub fn is_emissive(&self) -> bool {
        self.emission.iter().any(|&e| e > 0)
    }

    /// Emission for one channel; sky is never emitted by blocks.
    pub fn emission(&self, channel: LightChannel) -> u8 {
        match channel {
            LightChannel::Red => self.emission[0],
            LightChannel::Green => self.emission[1],
            LightChannel::Blue => self.emission[2],
            LightChannel::Sky => 0,
        }
    }

    /// Returns `true` if light of `channel` may enter this block.
    pub fn passes_light(&self, _channel: LightChannel) -> bool {
        self.light_passing
    }

    /// Returns `true` if the block spans more than one cell.
    pub fn is_extended(&self) -> bool {
        self.size != [1, 1, 1]
    }
}

/// Errors that can occur during block registration.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A block with the same name has already been registered.
    #[error("duplicate block name: {0}")]
    DuplicateName(String),
    /// All id slots have been consumed.
    #[error("content registry is full (max 65536 blocks)")]
    RegistryFull,
    /// An emission value exceeds the maximum light level.
    #[error("block {name} has emission {value} above 15")]
    InvalidEmission {
        /// Offending block name.
        name: String,
        /// Offending value.
        value: u8,
    },
    /// A zero-length extent was declared.
    #[error("block {0} declares a zero size")]
    InvalidSize(String),
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Maps [`BlockId`] → [`BlockDef`] with O(1) lookup by index and O(1) reverse
/// lookup by name.
#[derive(Clone, Debug)]
pub struct ContentRegistry {
    /// Dense array where `index == BlockId.0`.
    blocks: Vec<BlockDef>,
    /// Reverse lookup: name → ID.
    name_to_id: HashMap<String, BlockId>,
}

impl ContentRegistry {
    /// Creates a new registry with air pre-registered as ID 0.
    pub fn new() -> Self {
        let air = BlockDef::air();
        let mut name_to_id = HashMap::new();
        name_to_id.insert(air.name.clone(), BlockId::AIR);
        Self {
            blocks: vec![air],
            name_to_id,
        }
    }

    /// Registers a new block and returns its assigned ID.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateName`] for a repeated name,
    /// [`RegistryError::RegistryFull`] when no ids remain, and a validation
    /// error for out-of-range emission or a zero extent.
    pub fn register(&mut self, def: BlockDef) -> Result<BlockId, RegistryError> {
        if self.name_to_id.contains_key(&def.name) {
            return Err(RegistryError::DuplicateName(def.name));
        }
        if self.blocks.len() > u16::MAX as usize {
            return Err(RegistryError::RegistryFull);
        }
        if let Some(&value) = def.emission.iter().find(|&&e| e > 15) {
            return Err(RegistryError::InvalidEmission {
                name: def.name,
                value,
            });
        }
        if def.size.contains(&0) {
            return Err(RegistryError::InvalidSize(def.name));
        }

        let id = BlockId(self.blocks.len() as u16);
        self.name_to_id.insert(def.name.clone(), id);
        self.blocks.push(def);
        Ok(id)
    }

    /// Returns the definition for `id`.
    ///
    /// Unknown ids resolve to the air definition so that corrupted data reads
    /// as empty space rather than panicking.
    pub fn get(&self, id: BlockId) -> &BlockDef {
        self.blocks
            .get(id.0 as usize)
            .unwrap_or(&self.blocks[0])
    }

    /// Returns `true` if `id` was registered.
    pub fn contains(&self, id: BlockId) -> bool {
        (id.0 as usize) < self.blocks.len()
    }

    /// Returns the ID for a named block, or `None` if not found.
    pub fn lookup_by_name(&self, name: &str) -> Option<BlockId> {
        self.name_to_id.get(name).copied()
    }

    /// Returns the total number of registered blocks (including air).
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Returns `true` if only air is registered.
    pub fn is_empty(&self) -> bool {
        self.blocks.len() <= 1
    }

    /// Block names in id order, as written to the world's index file.
    pub fn names(&self) -> Vec<String> {
        self.blocks.iter().map(|def| def.name.clone()).collect()
    }
}

impl Default for ContentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Remapping
// ---------------------------------------------------------------------------

/// Translation table from the block ids a save was written with to the ids of
/// the current registry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentRemap {
    table: Vec<BlockId>,
}

impl ContentRemap {
    /// Builds a remap from the saved id→name list. Names missing from the
    /// current registry map to air.
    pub fn from_names(saved: &[String], registry: &ContentRegistry) -> Self {
        let table = saved
            .iter()
            .map(|name| match registry.lookup_by_name(name) {
                Some(id) => id,
                None => {
                    tracing::warn!("saved block {name:?} is not registered, replacing with air");
                    BlockId::AIR
                }
            })
            .collect();
        Self { table }
    }

    /// Maps a saved id; ids past the table map to air.
    pub fn map(&self, id: BlockId) -> BlockId {
        self.table.get(id.0 as usize).copied().unwrap_or(BlockId::AIR)
    }

    /// Returns `true` if every id maps to itself.
    pub fn is_identity(&self) -> bool {
        self.table
            .iter()
            .enumerate()
            .all(|(index, id)| id.0 as usize == index)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
