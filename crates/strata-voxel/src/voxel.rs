//! Voxel records and the packed block-state word.
//!
//! A [`Voxel`] is a block-type id plus a 16-bit [`BlockState`]. The state is an
//! explicit integer with named shift/mask accessors so its layout is portable
//! and can be written to disk as-is.
//!
//! ## State layout (least significant bit first)
//!
//! | Bits | Field |
//! |------|-------|
//! | 0..3 | rotation index (0–7) |
//! | 3..6 | segment tag (0 = origin cell) |
//! | 6..8 | reserved |
//! | 8..16 | free-form user bits |

use serde::{Deserialize, Serialize};

/// Compact block-type identifier stored inside every voxel (2 bytes).
///
/// Air is always `BlockId(0)` so zeroed memory is empty space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub u16);

impl BlockId {
    /// The empty block.
    pub const AIR: BlockId = BlockId(0);
}

const ROTATION_SHIFT: u16 = 0;
const ROTATION_MASK: u16 = 0b111;
const SEGMENT_SHIFT: u16 = 3;
const SEGMENT_MASK: u16 = 0b111;
const RESERVED_SHIFT: u16 = 6;
const RESERVED_MASK: u16 = 0b11;
const USERBITS_SHIFT: u16 = 8;
const USERBITS_MASK: u16 = 0xFF;

/// Packed per-voxel state word.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockState(pub u16);

impl BlockState {
    /// Packs the three fields into a state word. Out-of-range inputs are masked.
    pub fn pack(rotation: u8, segment: u8, userbits: u8) -> Self {
        let rotation = (u16::from(rotation) & ROTATION_MASK) << ROTATION_SHIFT;
        let segment = (u16::from(segment) & SEGMENT_MASK) << SEGMENT_SHIFT;
        let userbits = (u16::from(userbits) & USERBITS_MASK) << USERBITS_SHIFT;
        Self(rotation | segment | userbits)
    }

    /// Splits the state word into `(rotation, segment, userbits)`.
    pub fn unpack(self) -> (u8, u8, u8) {
        (self.rotation(), self.segment(), self.userbits())
    }

    /// Rotation index (0–7).
    pub fn rotation(self) -> u8 {
        ((self.0 >> ROTATION_SHIFT) & ROTATION_MASK) as u8
    }

    /// Segment tag of an extended block cell; 0 marks the origin.
    pub fn segment(self) -> u8 {
        ((self.0 >> SEGMENT_SHIFT) & SEGMENT_MASK) as u8
    }

    /// Reserved bits, preserved verbatim.
    pub fn reserved(self) -> u8 {
        ((self.0 >> RESERVED_SHIFT) & RESERVED_MASK) as u8
    }

    /// Free-form user data byte.
    pub fn userbits(self) -> u8 {
        ((self.0 >> USERBITS_SHIFT) & USERBITS_MASK) as u8
    }

    /// Returns a copy with the rotation replaced.
    pub fn with_rotation(self, rotation: u8) -> Self {
        self.with_field(ROTATION_SHIFT, ROTATION_MASK, rotation)
    }

    /// Returns a copy with the segment tag replaced.
    pub fn with_segment(self, segment: u8) -> Self {
        self.with_field(SEGMENT_SHIFT, SEGMENT_MASK, segment)
    }

    /// Returns a copy with the user bits replaced.
    pub fn with_userbits(self, userbits: u8) -> Self {
        self.with_field(USERBITS_SHIFT, USERBITS_MASK, userbits)
    }

    fn with_field(self, shift: u16, mask: u16, value: u8) -> Self {
        let cleared = self.0 & !(mask << shift);
        Self(cleared | ((u16::from(value) & mask) << shift))
    }
}

/// One grid cell: block type plus packed state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Voxel {
    /// Block type.
    pub id: BlockId,
    /// Packed rotation / segment / user bits.
    pub state: BlockState,
}

impl Voxel {
    /// An air voxel with a zero state.
    pub const AIR: Voxel = Voxel {
        id: BlockId::AIR,
        state: BlockState(0),
    };

    /// Creates a voxel.
    pub fn new(id: BlockId, state: BlockState) -> Self {
        Self { id, state }
    }

    /// Creates a voxel with a default state.
    pub fn of(id: BlockId) -> Self {
        Self {
            id,
            state: BlockState::default(),
        }
    }

    /// Returns `true` for air.
    pub fn is_air(self) -> bool {
        self.id == BlockId::AIR
    }

    /// Returns `true` if this cell is a secondary cell of an extended block.
    pub fn is_segment(self) -> bool {
        self.state.segment() != 0
    }
}
