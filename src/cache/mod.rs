// SPDX-License-Identifier: GPL-3.0-only

//! Two-tier scaled bitmap cache
//!
//! Lookup order: memory cache, persisted thumbnail file, fresh decode of
//! the source image. Both cache tiers are written back on a miss. Every
//! failure on the way degrades to "no bitmap available" — the preview
//! and gallery paths must never see an error from here.

pub mod loader;
mod lru;

pub use loader::AsyncImageLoader;
pub use lru::{BitmapLru, bitmap_byte_count};

use crate::config::CacheSettings;
use crate::media::{self, BitmapDecoder};
use crate::storage::{MediaStore, ThumbnailLocator};
use image::RgbaImage;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

/// Scaled bitmap cache over an injected byte store and decode backend
///
/// Shared across threads behind an `Arc`; the memory tier is guarded by
/// a mutex and misses for the same id serialize on an id-scoped lock so
/// at most one decode runs per image.
pub struct ScaledBitmapCache {
    memory: Mutex<BitmapLru>,
    decode_locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
    store: Arc<dyn MediaStore>,
    decoder: Arc<dyn BitmapDecoder>,
    locator: Box<dyn ThumbnailLocator>,
    jpeg_quality: u8,
    pending_writes: Mutex<Vec<std::thread::JoinHandle<()>>>,
}

impl ScaledBitmapCache {
    pub fn new(
        store: Arc<dyn MediaStore>,
        decoder: Arc<dyn BitmapDecoder>,
        locator: Box<dyn ThumbnailLocator>,
        settings: &CacheSettings,
    ) -> Self {
        Self {
            memory: Mutex::new(BitmapLru::new(settings.memory_cache_bytes)),
            decode_locks: Mutex::new(HashMap::new()),
            store,
            decoder,
            locator,
            jpeg_quality: settings.jpeg_quality,
            pending_writes: Mutex::new(Vec::new()),
        }
    }

    /// Convenience constructor: filesystem store, `image`-crate decoder,
    /// all thumbnails in one directory
    pub fn with_thumbnail_directory(
        directory: impl Into<PathBuf>,
        settings: &CacheSettings,
    ) -> Self {
        Self::new(
            Arc::new(crate::storage::FsMediaStore),
            Arc::new(crate::media::ImageBitmapDecoder),
            Box::new(crate::storage::FixedDirectoryLocator::new(directory)),
            settings,
        )
    }

    /// Memory-tier lookup only: no I/O, no cache mutation beyond recency
    pub fn get_in_memory_scaled_bitmap(
        &self,
        id: &Path,
        min_width: u32,
        min_height: u32,
    ) -> Option<Arc<RgbaImage>> {
        let mut memory = self
            .memory
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let bitmap = memory.get(id)?;
        if bitmap.width() >= min_width && bitmap.height() >= min_height {
            Some(bitmap)
        } else {
            None
        }
    }

    /// Produce a bitmap for `id` scaled to at least the requested size.
    ///
    /// Tries the memory cache, then the persisted thumbnail, then a
    /// fresh decode of the source. A fresh decode is written back to
    /// both tiers; the thumbnail write happens on a detached thread and
    /// never delays the returned bitmap. `None` means the image cannot
    /// be decoded at any tier.
    pub fn get_scaled_bitmap(
        &self,
        id: &Path,
        min_width: u32,
        min_height: u32,
    ) -> Option<Arc<RgbaImage>> {
        if let Some(hit) = self.get_in_memory_scaled_bitmap(id, min_width, min_height) {
            return Some(hit);
        }

        let id_lock = self.decode_lock_for(id);
        let _guard = id_lock.lock().unwrap_or_else(PoisonError::into_inner);

        // a racing caller may have populated the memory tier meanwhile
        if let Some(hit) = self.get_in_memory_scaled_bitmap(id, min_width, min_height) {
            return Some(hit);
        }

        let thumbnail_path = self.locator.thumbnail_path(id);
        if self.store.thumbnail_exists(&thumbnail_path) {
            if let Some(bytes) = self.store.read_thumbnail(&thumbnail_path) {
                if let Some(bitmap) = self.decode_scaled(&bytes, min_width, min_height) {
                    if bitmap.width() >= min_width && bitmap.height() >= min_height {
                        let bitmap = Arc::new(bitmap);
                        self.insert_memory(id, bitmap.clone());
                        return Some(bitmap);
                    }
                    debug!(
                        id = %id.display(),
                        "thumbnail smaller than requested, decoding source"
                    );
                }
            }
        }

        let source_bytes = self.store.read_source(id)?;
        let bitmap = Arc::new(self.decode_scaled(&source_bytes, min_width, min_height)?);
        self.insert_memory(id, bitmap.clone());
        self.write_thumbnail_detached(thumbnail_path, bitmap.clone());
        Some(bitmap)
    }

    /// Drop the memory entry and delete the persisted thumbnail
    pub fn invalidate(&self, id: &Path) {
        self.memory
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        let thumbnail_path = self.locator.thumbnail_path(id);
        if !self.store.delete_thumbnail(&thumbnail_path) {
            debug!(path = %thumbnail_path.display(), "no thumbnail to delete");
        }
        self.decode_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }

    /// Where the thumbnail for `id` lives (or would live)
    pub fn thumbnail_path(&self, id: &Path) -> PathBuf {
        self.locator.thumbnail_path(id)
    }

    /// Bytes of decoded pixel data currently retained in memory
    pub fn memory_used_bytes(&self) -> usize {
        self.memory
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .used_bytes()
    }

    /// Join all detached thumbnail writes started so far.
    ///
    /// Shutdown/test helper; callers on the hot path never need this.
    pub fn flush_pending_writes(&self) {
        let handles = std::mem::take(
            &mut *self
                .pending_writes
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for handle in handles {
            let _ = handle.join();
        }
    }

    fn decode_scaled(&self, bytes: &[u8], min_width: u32, min_height: u32) -> Option<RgbaImage> {
        let (width, height) = self.decoder.probe_dimensions(bytes)?;
        let factor = media::downsample_factor(width, height, min_width, min_height);
        self.decoder.decode_downsampled(bytes, factor)
    }

    fn decode_lock_for(&self, id: &Path) -> Arc<Mutex<()>> {
        let mut locks = self
            .decode_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        locks.entry(id.to_path_buf()).or_default().clone()
    }

    fn insert_memory(&self, id: &Path, bitmap: Arc<RgbaImage>) {
        self.memory
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_path_buf(), bitmap);
    }

    fn write_thumbnail_detached(&self, path: PathBuf, bitmap: Arc<RgbaImage>) {
        let store = self.store.clone();
        let quality = self.jpeg_quality;
        let handle = std::thread::spawn(move || {
            let Some(encoded) = media::encode_jpeg(&bitmap, quality) else {
                return;
            };
            if let Err(e) = store.write_thumbnail(&path, &encoded) {
                warn!(path = %path.display(), error = %e, "thumbnail write failed");
            } else {
                debug!(path = %path.display(), "thumbnail written");
            }
        });
        let mut pending = self
            .pending_writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }
}
