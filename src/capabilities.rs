// SPDX-License-Identifier: GPL-3.0-only

//! Startup capability detection
//!
//! Optional platform features are probed once at startup and cached in a
//! plain struct, instead of being re-checked on every call site.

use std::path::Path;
use tracing::{info, warn};

/// Feature-detection results, resolved once
#[derive(Debug, Clone)]
pub struct Capabilities {
    /// Worker threads available for bitmap decode fan-out
    pub decode_parallelism: u32,
    /// Whether the thumbnail directory can be created and written
    pub thumbnails_writable: bool,
}

impl Capabilities {
    /// Probe the environment. Safe to call from any thread, but callers
    /// are expected to do this once and pass the result around.
    pub fn detect(thumbnail_dir: &Path) -> Self {
        let decode_parallelism = std::thread::available_parallelism()
            .map(|n| n.get() as u32)
            .unwrap_or(4);
        let thumbnails_writable = probe_writable(thumbnail_dir);
        if !thumbnails_writable {
            warn!(
                dir = %thumbnail_dir.display(),
                "thumbnail directory not writable, thumbnails will not persist"
            );
        }
        info!(decode_parallelism, thumbnails_writable, "detected capabilities");
        Self {
            decode_parallelism,
            thumbnails_writable,
        }
    }
}

fn probe_writable(dir: &Path) -> bool {
    if std::fs::create_dir_all(dir).is_err() {
        return false;
    }
    let probe = dir.join(".write_probe");
    match std::fs::write(&probe, b"") {
        Ok(()) => {
            let _ = std::fs::remove_file(&probe);
            true
        }
        Err(_) => false,
    }
}
