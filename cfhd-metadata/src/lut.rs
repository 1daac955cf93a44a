//! Look/LUT file cache.
//!
//! Repeated references to the same look file path reuse the derived filename
//! and CRC instead of re-reading and re-hashing the file. The cache belongs to
//! one [`crate::MetadataStore`]; stores that should share it are handed the
//! same [`SharedLutCache`].

use crc::{Crc, CRC_32_ISO_HDLC};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, trace};

const LUT_CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LutCacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that had to derive the filename.
    pub misses: u64,
    /// Files actually read and hashed.
    pub crc_computations: u64,
}

/// Result of a look file lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LutFile {
    /// Filename without directories.
    pub filename: String,
    /// CRC-32 of the file contents, if the file could be read.
    pub crc: Option<u32>,
}

/// Last-seen look file.
#[derive(Debug, Default)]
pub struct LutCache {
    last_path: Option<String>,
    last: Option<LutFile>,
    stats: LutCacheStats,
}

impl LutCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a look file path, reusing the previous answer for the same path.
    pub fn lookup(&mut self, path: &str) -> LutFile {
        if let (Some(last_path), Some(last)) = (&self.last_path, &self.last) {
            if last_path == path {
                self.stats.hits += 1;
                trace!("Look file cache hit for {}", path);
                return last.clone();
            }
        }

        self.stats.misses += 1;
        let filename = short_filename(path).to_string();
        let crc = match std::fs::read(path) {
            Ok(contents) => {
                self.stats.crc_computations += 1;
                Some(LUT_CRC.checksum(&contents))
            }
            Err(e) => {
                debug!("Look file {} not readable, storing name only: {}", path, e);
                None
            }
        };

        let file = LutFile { filename, crc };
        self.last_path = Some(path.to_string());
        self.last = Some(file.clone());
        file
    }

    /// Counters since creation.
    pub fn stats(&self) -> LutCacheStats {
        self.stats
    }

    /// Forget the cached file.
    pub fn clear(&mut self) {
        self.last_path = None;
        self.last = None;
    }
}

/// Thread-safe handle to a look file cache.
#[derive(Debug, Clone, Default)]
pub struct SharedLutCache {
    inner: Arc<Mutex<LutCache>>,
}

impl SharedLutCache {
    /// Create a new shared cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a look file path.
    pub fn lookup(&self, path: &str) -> LutFile {
        self.inner.lock().lookup(path)
    }

    /// Counters since creation.
    pub fn stats(&self) -> LutCacheStats {
        self.inner.lock().stats()
    }

    /// Forget the cached file.
    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    /// Whether two handles share the same cache.
    pub fn ptr_eq(&self, other: &SharedLutCache) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Final path component, accepting both separator styles.
pub fn short_filename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}
