// SPDX-License-Identifier: GPL-3.0-only

//! Byte-bounded least-recently-used bitmap map

use image::RgbaImage;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Decoded byte size used for cache accounting (RGBA, 4 bytes per pixel)
pub fn bitmap_byte_count(bitmap: &RgbaImage) -> usize {
    bitmap.as_raw().len()
}

/// LRU map of decoded bitmaps bounded by total decoded byte size.
///
/// On insert, least-recently-used entries are evicted until the total is
/// back within budget; an entry larger than the whole budget is evicted
/// immediately (the caller still holds its own `Arc`).
pub struct BitmapLru {
    max_bytes: usize,
    used_bytes: usize,
    entries: HashMap<PathBuf, Arc<RgbaImage>>,
    /// Access order, front = least recently used
    order: VecDeque<PathBuf>,
}

impl BitmapLru {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            used_bytes: 0,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// Look up an entry, marking it most recently used
    pub fn get(&mut self, key: &Path) -> Option<Arc<RgbaImage>> {
        let bitmap = self.entries.get(key)?.clone();
        self.touch(key);
        Some(bitmap)
    }

    /// Insert or replace an entry, then evict back to budget
    pub fn insert(&mut self, key: PathBuf, bitmap: Arc<RgbaImage>) {
        if let Some(previous) = self.entries.remove(&key) {
            self.used_bytes -= bitmap_byte_count(&previous);
            self.remove_from_order(&key);
        }
        self.used_bytes += bitmap_byte_count(&bitmap);
        self.order.push_back(key.clone());
        self.entries.insert(key, bitmap);
        self.evict_to_budget();
    }

    pub fn remove(&mut self, key: &Path) -> Option<Arc<RgbaImage>> {
        let bitmap = self.entries.remove(key)?;
        self.used_bytes -= bitmap_byte_count(&bitmap);
        self.remove_from_order(key);
        Some(bitmap)
    }

    pub fn used_bytes(&self) -> usize {
        self.used_bytes
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn touch(&mut self, key: &Path) {
        self.remove_from_order(key);
        self.order.push_back(key.to_path_buf());
    }

    fn remove_from_order(&mut self, key: &Path) {
        if let Some(position) = self.order.iter().position(|k| k == key) {
            self.order.remove(position);
        }
    }

    fn evict_to_budget(&mut self) {
        while self.used_bytes > self.max_bytes {
            let Some(oldest) = self.order.pop_front() else {
                return;
            };
            if let Some(bitmap) = self.entries.remove(&oldest) {
                self.used_bytes -= bitmap_byte_count(&bitmap);
                debug!(
                    key = %oldest.display(),
                    freed = bitmap_byte_count(&bitmap),
                    "evicted bitmap from memory cache"
                );
            }
        }
    }
}
