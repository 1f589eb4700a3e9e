//! Packed four-channel light storage for one chunk.
//!
//! Each voxel stores one `u16` with 4 bits per channel:
//! `R | G << 4 | B << 8 | S << 12`.

use crate::chunk::{CHUNK_H, CHUNK_VOL, vox_index};
use crate::chunk_serial::ChunkSerError;

/// Serialized lightmap size in bytes (planar high/low bytes).
pub const LIGHTMAP_DATA_LEN: usize = CHUNK_VOL * 2;

/// Maximum light level of any channel.
pub const MAX_LIGHT: u8 = 15;

/// One of the four light channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LightChannel {
    Red,
    Green,
    Blue,
    Sky,
}

impl LightChannel {
    /// All channels in storage order.
    pub const ALL: [LightChannel; 4] = [
        LightChannel::Red,
        LightChannel::Green,
        LightChannel::Blue,
        LightChannel::Sky,
    ];

    /// The three block-emitted colour channels.
    pub const COLORS: [LightChannel; 3] = [LightChannel::Red, LightChannel::Green, LightChannel::Blue];

    /// Bit offset of this channel inside the packed word.
    pub const fn shift(self) -> u16 {
        match self {
            LightChannel::Red => 0,
            LightChannel::Green => 4,
            LightChannel::Blue => 8,
            LightChannel::Sky => 12,
        }
    }

    /// Storage index (0 = red .. 3 = sky).
    pub const fn index(self) -> usize {
        (self.shift() / 4) as usize
    }
}

/// Packs four channel levels into one word.
pub fn pack_light(r: u8, g: u8, b: u8, s: u8) -> u16 {
    (u16::from(r) & 0xF)
        | (u16::from(g) & 0xF) << 4
        | (u16::from(b) & 0xF) << 8
        | (u16::from(s) & 0xF) << 12
}

/// Extracts one channel from a packed word.
pub fn extract_light(packed: u16, channel: LightChannel) -> u8 {
    ((packed >> channel.shift()) & 0xF) as u8
}

/// Per-chunk light storage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Lightmap {
    map: Box<[u16]>,
    /// Highest Y (exclusive) that received direct sky light from above an
    /// opaque voxel. Used to bound sky-light scans.
    pub highest_point: usize,
}

impl Lightmap {
    /// Creates a fully dark lightmap.
    pub fn new() -> Self {
        Self {
            map: vec![0u16; CHUNK_VOL].into_boxed_slice(),
            highest_point: 0,
        }
    }

    /// Returns the level of one channel; 0 for out-of-range coordinates.
    pub fn get(&self, x: usize, y: usize, z: usize, channel: LightChannel) -> u8 {
        vox_index(x, y, z)
            .map(|i| extract_light(self.map[i], channel))
            .unwrap_or(0)
    }

    /// Sets one channel, leaving the others untouched. Values are masked to 4 bits.
    pub fn set(&mut self, x: usize, y: usize, z: usize, channel: LightChannel, value: u8) {
        if let Some(i) = vox_index(x, y, z) {
            let shift = channel.shift();
            let cleared = self.map[i] & !(0xF << shift);
            self.map[i] = cleared | ((u16::from(value) & 0xF) << shift);
        }
    }

    /// Returns the packed word for one voxel; 0 for out-of-range coordinates.
    pub fn get_packed(&self, x: usize, y: usize, z: usize) -> u16 {
        vox_index(x, y, z).map(|i| self.map[i]).unwrap_or(0)
    }

    /// Overwrites the packed word for one voxel.
    pub fn set_packed(&mut self, x: usize, y: usize, z: usize, packed: u16) {
        if let Some(i) = vox_index(x, y, z) {
            self.map[i] = packed;
        }
    }

    /// Zeroes every channel.
    pub fn clear(&mut self) {
        self.map.fill(0);
        self.highest_point = 0;
    }

    /// Raw packed words in voxel-index order.
    pub fn as_slice(&self) -> &[u16] {
        &self.map
    }

    /// Encodes to `LIGHTMAP_DATA_LEN` bytes: all high bytes, then all low bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; LIGHTMAP_DATA_LEN];
        let (hi, lo) = buf.split_at_mut(CHUNK_VOL);
        for (i, &word) in self.map.iter().enumerate() {
            let [h, l] = word.to_be_bytes();
            hi[i] = h;
            lo[i] = l;
        }
        buf
    }

    /// Decodes bytes produced by [`Lightmap::encode`].
    ///
    /// Rejects input of the wrong length. The highest point is recomputed from
    /// sky values.
    pub fn decode(bytes: &[u8]) -> Result<Self, ChunkSerError> {
        if bytes.len() != LIGHTMAP_DATA_LEN {
            return Err(ChunkSerError::WrongLength {
                expected: LIGHTMAP_DATA_LEN,
                actual: bytes.len(),
            });
        }
        let (hi, lo) = bytes.split_at(CHUNK_VOL);
        let map: Box<[u16]> = hi
            .iter()
            .zip(lo)
            .map(|(&h, &l)| u16::from_be_bytes([h, l]))
            .collect();
        let mut lightmap = Self {
            map,
            highest_point: 0,
        };
        lightmap.highest_point = lightmap.scan_highest_point();
        Ok(lightmap)
    }

    // Topmost layer that is not fully sky-lit, plus one.
    fn scan_highest_point(&self) -> usize {
        let layer = CHUNK_VOL / CHUNK_H;
        for y in (0..CHUNK_H).rev() {
            let row = &self.map[y * layer..(y + 1) * layer];
            if row
                .iter()
                .any(|&w| extract_light(w, LightChannel::Sky) < MAX_LIGHT)
            {
                return y + 1;
            }
        }
        0
    }
}

impl Default for Lightmap {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
