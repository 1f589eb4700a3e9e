//! Layered region store shared by all persistence paths.
//!
//! Writes are staged in memory per region and committed on [`RegionStore::flush`],
//! which rewrites each touched region file as a whole (temp file + rename).
//! Reads see staged payloads before anything on disk.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::error::RegionError;
use crate::format::{self, region_coords, slot_index};
use crate::handles::{RegionHandles, RegionKey, region_path};
use crate::layer::RegionLayer;
use crate::rle;

struct StoreInner {
    handles: RegionHandles,
    /// Raw (already compressed) payloads waiting for `flush`, per region.
    staged: FxHashMap<RegionKey, BTreeMap<usize, Vec<u8>>>,
}

/// Thread-safe access to every region layer of one world directory.
pub struct RegionStore {
    root: PathBuf,
    inner: Mutex<StoreInner>,
}

impl RegionStore {
    /// Creates a store rooted at the world directory `root`, keeping at most
    /// `max_open_files` region files open.
    pub fn new(root: impl Into<PathBuf>, max_open_files: usize) -> Self {
        let root = root.into();
        Self {
            inner: Mutex::new(StoreInner {
                handles: RegionHandles::new(root.clone(), max_open_files),
                staged: FxHashMap::default(),
            }),
            root,
        }
    }

    /// The world directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Loads the decoded payload of chunk `(cx, cz)` in `layer`.
    ///
    /// Returns `Ok(None)` if the chunk was never stored.
    pub fn get(&self, layer: RegionLayer, cx: i32, cz: i32) -> Result<Option<Vec<u8>>, RegionError> {
        let (rx, rz) = region_coords(cx, cz);
        let key = (layer, rx, rz);
        let slot = slot_index(cx, cz);

        let raw = {
            let mut inner = self.inner.lock();
            let staged = inner
                .staged
                .get(&key)
                .and_then(|slots| slots.get(&slot))
                .cloned();
            match staged {
                Some(raw) => Some(raw),
                None => {
                    let path = inner.handles.path(key);
                    match inner.handles.get(key)? {
                        Some(file) => format::read_slot(file, &path, slot)?,
                        None => None,
                    }
                }
            }
        };

        match (raw, layer.data_len()) {
            (Some(raw), Some(len)) => Ok(Some(rle::decompress(&raw, len)?)),
            (raw, _) => Ok(raw),
        }
    }

    /// Stages the payload of chunk `(cx, cz)` in `layer`; it reaches disk on
    /// the next [`RegionStore::flush`].
    pub fn put(&self, layer: RegionLayer, cx: i32, cz: i32, data: &[u8]) {
        let raw = if layer.is_compressed() {
            rle::compress(data)
        } else {
            data.to_vec()
        };
        let (rx, rz) = region_coords(cx, cz);
        self.inner
            .lock()
            .staged
            .entry((layer, rx, rz))
            .or_default()
            .insert(slot_index(cx, cz), raw);
    }

    /// Returns `true` if any writes are waiting for a flush.
    pub fn has_pending(&self) -> bool {
        !self.inner.lock().staged.is_empty()
    }

    /// Writes every staged region to disk, merged with the slots already in
    /// its file. Returns the number of region files written.
    ///
    /// Every staged region is attempted. A region that fails to write stays
    /// staged and the first failure is returned once the others are done.
    pub fn flush(&self) -> Result<usize, RegionError> {
        let mut inner = self.inner.lock();
        let keys: Vec<RegionKey> = inner.staged.keys().copied().collect();
        let mut written = 0;
        let mut first_error = None;
        for key in keys {
            match self.flush_region(&mut inner, key) {
                Ok(()) => written += 1,
                Err(e) => {
                    tracing::warn!("failed to write region {:?}: {}", key, e);
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(written),
        }
    }

    fn flush_region(&self, inner: &mut StoreInner, key: RegionKey) -> Result<(), RegionError> {
        let (layer, rx, rz) = key;
        let path = region_path(&self.root, layer, rx, rz);
        let mut slots = match format::read_region(&path)? {
            Some(contents) => contents.slots,
            None => BTreeMap::new(),
        };
        if let Some(staged) = inner.staged.get(&key) {
            for (&slot, raw) in staged {
                slots.insert(slot, raw.clone());
            }
        }

        inner.handles.invalidate(key);
        format::write_region(&path, &slots)?;
        inner.staged.remove(&key);
        tracing::debug!("wrote region {:?} ({} slots)", path, slots.len());
        Ok(())
    }

    /// Slot indices present in region `(rx, rz)` of `layer`, on disk or staged.
    pub fn region_slots(&self, layer: RegionLayer, rx: i32, rz: i32) -> Result<Vec<usize>, RegionError> {
        let key = (layer, rx, rz);
        let mut slots: Vec<usize> = match format::read_region(&region_path(&self.root, layer, rx, rz))? {
            Some(contents) => contents.slots.into_keys().collect(),
            None => Vec::new(),
        };
        if let Some(staged) = self.inner.lock().staged.get(&key) {
            slots.extend(staged.keys().copied());
        }
        slots.sort_unstable();
        slots.dedup();
        Ok(slots)
    }

    /// Coordinates of every region file of `layer` on disk, sorted.
    pub fn regions(&self, layer: RegionLayer) -> Result<Vec<(i32, i32)>, RegionError> {
        let dir = self.root.join(layer.folder());
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut regions = Vec::new();
        for entry in entries {
            let name = entry?.file_name();
            if let Some(coords) = name.to_str().and_then(format::parse_region_file_name) {
                regions.push(coords);
            }
        }
        regions.sort_unstable();
        Ok(regions)
    }

    /// Coordinates of every chunk stored in `layer`, on disk or staged.
    pub fn stored_chunks(&self, layer: RegionLayer) -> Result<Vec<(i32, i32)>, RegionError> {
        let mut regions = self.regions(layer)?;
        regions.extend(
            self.inner
                .lock()
                .staged
                .keys()
                .filter(|key| key.0 == layer)
                .map(|&(_, rx, rz)| (rx, rz)),
        );
        regions.sort_unstable();
        regions.dedup();

        let mut chunks = Vec::new();
        for (rx, rz) in regions {
            for slot in self.region_slots(layer, rx, rz)? {
                chunks.push(format::slot_chunk(rx, rz, slot));
            }
        }
        Ok(chunks)
    }

    /// Number of region files currently held open.
    pub fn open_files(&self) -> usize {
        self.inner.lock().handles.len()
    }

    /// Closes every cached region file.
    pub fn close_files(&self) {
        self.inner.lock().handles.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
