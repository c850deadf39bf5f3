// SPDX-License-Identifier: GPL-3.0-only

//! User configuration
//!
//! Stored as JSON under the platform config directory. Anything that
//! fails to load falls back to defaults; a broken config file must not
//! keep the camera from starting.

use crate::constants::{cache, timing};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, warn};

/// Frame pacer tuning
///
/// The streak thresholds and the fudge factor are empirically tuned;
/// they are carried as configuration rather than re-derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacerSettings {
    /// Target frame rate ladder, fastest first
    pub target_rates: Vec<f64>,
    /// Performance floor per tier, one fewer than targets (the last
    /// tier is the fallback and has none)
    pub minimum_rates: Vec<f64>,
    /// Rolling FPS window length in frames
    pub history_size: usize,
    /// Good-streak length that locks the rate
    pub max_good_frames: u32,
    /// Slow-streak length that demotes a tier
    pub max_slow_frames: u32,
    /// Multiplicative slack applied to target rates
    pub fudge_factor: f64,
    /// Whether a proven-stable rate may be locked
    pub allow_rate_lock: bool,
}

impl Default for PacerSettings {
    fn default() -> Self {
        Self {
            target_rates: vec![30.0, 15.0],
            minimum_rates: vec![20.0],
            history_size: timing::DEFAULT_FRAME_HISTORY,
            max_good_frames: timing::DEFAULT_MAX_GOOD_FRAMES,
            max_slow_frames: timing::DEFAULT_MAX_SLOW_FRAMES,
            fudge_factor: timing::DEFAULT_FUDGE_FACTOR,
            allow_rate_lock: true,
        }
    }
}

/// Bitmap cache tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Memory budget for decoded pixel data, in bytes
    pub memory_cache_bytes: usize,
    /// Thumbnail directory; `None` uses the platform cache dir
    pub thumbnail_dir: Option<PathBuf>,
    /// JPEG quality for persisted thumbnails
    pub jpeg_quality: u8,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            memory_cache_bytes: cache::DEFAULT_MEMORY_CACHE_BYTES,
            thumbnail_dir: None,
            jpeg_quality: cache::THUMBNAIL_JPEG_QUALITY,
        }
    }
}

impl CacheSettings {
    /// Thumbnail directory, resolved against the platform cache dir
    pub fn resolved_thumbnail_dir(&self) -> PathBuf {
        match &self.thumbnail_dir {
            Some(dir) => dir.clone(),
            None => dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("phototimer")
                .join("thumbnails"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pacer: PacerSettings,
    pub cache: CacheSettings,
}

impl Config {
    /// Path of the config file, if a config directory exists
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("phototimer").join("config.json"))
    }

    /// Load from disk, falling back to defaults on any failure
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    debug!(path = %path.display(), "loaded configuration");
                    config
                }
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "invalid configuration, using defaults"
                    );
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    /// Persist to the platform config directory
    pub fn save(&self) -> std::io::Result<()> {
        let Some(path) = Self::config_path() else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no config directory on this platform",
            ));
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(&path, contents)
    }
}
