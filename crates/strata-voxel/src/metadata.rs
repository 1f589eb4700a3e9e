//! Sparse per-voxel metadata storage.
//!
//! Blocks whose definition declares a non-zero `data_size` own a small byte
//! buffer keyed by voxel index. The heap is persisted in the block-data region
//! layer.

use std::collections::BTreeMap;

use crate::chunk_serial::ChunkSerError;

/// Sparse map from voxel index to a fixed-size metadata buffer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockDataHeap {
    entries: BTreeMap<u32, Vec<u8>>,
}

impl BlockDataHeap {
    /// Creates an empty heap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the buffer for `index`, creating a zeroed one of `size` bytes.
    ///
    /// An existing buffer of a different size is resized (zero-filled).
    pub fn allocate(&mut self, index: u32, size: usize) -> &mut [u8] {
        let entry = self.entries.entry(index).or_default();
        entry.resize(size, 0);
        entry
    }

    /// Returns the buffer for `index`, if any.
    pub fn find(&self, index: u32) -> Option<&[u8]> {
        self.entries.get(&index).map(Vec::as_slice)
    }

    /// Returns a mutable view of the buffer for `index`, if any.
    pub fn find_mut(&mut self, index: u32) -> Option<&mut [u8]> {
        self.entries.get_mut(&index).map(Vec::as_mut_slice)
    }

    /// Removes the buffer for `index`. Returns `true` if one existed.
    pub fn free(&mut self, index: u32) -> bool {
        self.entries.remove(&index).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates `(index, bytes)` in ascending index order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &[u8])> {
        self.entries.iter().map(|(&i, v)| (i, v.as_slice()))
    }

    /// Encodes as `count: u32 BE` followed by `index: u32 BE, size: u16 BE, bytes`
    /// records in ascending index order.
    pub fn encode(&self) -> Vec<u8> {
        let payload: usize = self.entries.values().map(|v| 6 + v.len()).sum();
        let mut buf = Vec::with_capacity(4 + payload);
        buf.extend_from_slice(&(self.entries.len() as u32).to_be_bytes());
        for (&index, bytes) in &self.entries {
            buf.extend_from_slice(&index.to_be_bytes());
            buf.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
            buf.extend_from_slice(bytes);
        }
        buf
    }

    /// Decodes bytes produced by [`BlockDataHeap::encode`].
    pub fn decode(data: &[u8]) -> Result<Self, ChunkSerError> {
        let mut cursor = 0usize;
        let count = read_u32(data, &mut cursor)?;
        let mut entries = BTreeMap::new();
        for _ in 0..count {
            let index = read_u32(data, &mut cursor)?;
            let size = read_u16(data, &mut cursor)? as usize;
            let end = cursor + size;
            if data.len() < end {
                return Err(ChunkSerError::Truncated {
                    expected: end,
                    actual: data.len(),
                });
            }
            entries.insert(index, data[cursor..end].to_vec());
            cursor = end;
        }
        Ok(Self { entries })
    }
}

pub(crate) fn read_u32(data: &[u8], cursor: &mut usize) -> Result<u32, ChunkSerError> {
    let end = *cursor + 4;
    let bytes = data.get(*cursor..end).ok_or(ChunkSerError::Truncated {
        expected: end,
        actual: data.len(),
    })?;
    *cursor = end;
    Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

pub(crate) fn read_u16(data: &[u8], cursor: &mut usize) -> Result<u16, ChunkSerError> {
    let end = *cursor + 2;
    let bytes = data.get(*cursor..end).ok_or(ChunkSerError::Truncated {
        expected: end,
        actual: data.len(),
    })?;
    *cursor = end;
    Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
}
