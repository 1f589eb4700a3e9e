//! Bounded cache of open region file handles.
//!
//! Every layer shares one cache so the process never holds more than
//! `capacity` region files open. Eviction is least-recently-used; evicted
//! handles are closed when dropped.

use std::fs::File;
use std::io;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use lru::LruCache;

use crate::error::RegionError;
use crate::format::{self, region_file_name};
use crate::layer::RegionLayer;

/// Default cap on simultaneously open region files.
pub const MAX_OPEN_REGION_FILES: usize = 32;

/// Cache key: one file per layer and region coordinate.
pub type RegionKey = (RegionLayer, i32, i32);

/// LRU-bounded map of open, header-validated region files.
pub struct RegionHandles {
    root: PathBuf,
    cache: LruCache<RegionKey, File>,
}

impl RegionHandles {
    /// Creates a cache for the world at `root`. A capacity of 0 is treated as 1.
    pub fn new(root: impl Into<PathBuf>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            root: root.into(),
            cache: LruCache::new(capacity),
        }
    }

    /// Path of the file backing `key`.
    pub fn path(&self, (layer, rx, rz): RegionKey) -> PathBuf {
        region_path(&self.root, layer, rx, rz)
    }

    /// Returns the open handle for `key`, opening it if necessary.
    ///
    /// Returns `Ok(None)` if the file does not exist. A newly opened file has
    /// its header validated before it is cached.
    pub fn get(&mut self, key: RegionKey) -> Result<Option<&mut File>, RegionError> {
        if !self.cache.contains(&key) {
            let path = self.path(key);
            let mut file = match File::open(&path) {
                Ok(file) => file,
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
                Err(e) => return Err(e.into()),
            };
            format::read_header(&mut file, &path)?;
            if let Some((evicted, _)) = self.cache.push(key, file)
                && evicted != key
            {
                tracing::debug!("closed region file {:?}", evicted);
            }
        }
        Ok(self.cache.get_mut(&key))
    }

    /// Closes the handle for `key`, if open. Must be called before the file is
    /// replaced on disk.
    pub fn invalidate(&mut self, key: RegionKey) {
        self.cache.pop(&key);
    }

    /// Closes every handle.
    pub fn clear(&mut self) {
        self.cache.clear();
    }

    /// Number of currently open files.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Maximum number of simultaneously open files.
    pub fn capacity(&self) -> usize {
        self.cache.cap().get()
    }
}

/// Path of region `(rx, rz)` of `layer` under the world root.
pub fn region_path(root: &Path, layer: RegionLayer, rx: i32, rz: i32) -> PathBuf {
    root.join(layer.folder()).join(region_file_name(rx, rz))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
