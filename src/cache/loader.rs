// SPDX-License-Identifier: GPL-3.0-only

//! Asynchronous bitmap loading with stale-result suppression
//!
//! A cache miss means a decode, and a decode must not run on the thread
//! driving the preview. Each load is tagged with a per-target generation;
//! by the time a decode finishes the target may have been given a newer
//! request, in which case the stale result is dropped instead of
//! delivered.

use super::ScaledBitmapCache;
use image::RgbaImage;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Async front end for [`ScaledBitmapCache`]
pub struct AsyncImageLoader {
    cache: Arc<ScaledBitmapCache>,
    /// Current generation per UI target
    generations: Mutex<HashMap<u64, u64>>,
}

impl AsyncImageLoader {
    pub fn new(cache: Arc<ScaledBitmapCache>) -> Self {
        Self {
            cache,
            generations: Mutex::new(HashMap::new()),
        }
    }

    /// Load a bitmap for a UI target.
    ///
    /// Memory hits resolve inline; misses decode on a blocking worker.
    /// Every call supersedes the target's previous request, so an older
    /// in-flight load for the same target resolves to `None` rather than
    /// delivering a stale bitmap to a reused slot.
    pub async fn load(
        &self,
        target: u64,
        id: &Path,
        min_width: u32,
        min_height: u32,
    ) -> Option<Arc<RgbaImage>> {
        let generation = self.begin(target);

        if let Some(hit) = self.cache.get_in_memory_scaled_bitmap(id, min_width, min_height) {
            return Some(hit);
        }

        let cache = self.cache.clone();
        let owned_id = id.to_path_buf();
        let result = tokio::task::spawn_blocking(move || {
            cache.get_scaled_bitmap(&owned_id, min_width, min_height)
        })
        .await
        .ok()?;

        if self.is_current(target, generation) {
            result
        } else {
            debug!(target_id = target, id = %id.display(), "discarding superseded bitmap load");
            None
        }
    }

    /// Invalidate the target's pending loads (e.g. its view was recycled)
    pub fn cancel(&self, target: u64) {
        self.bump(target);
    }

    fn begin(&self, target: u64) -> u64 {
        self.bump(target)
    }

    fn bump(&self, target: u64) -> u64 {
        let mut generations = self
            .generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let generation = generations.entry(target).or_insert(0);
        *generation = generation.wrapping_add(1);
        *generation
    }

    fn is_current(&self, target: u64, generation: u64) -> bool {
        self.generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&target)
            == Some(&generation)
    }
}
