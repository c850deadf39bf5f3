// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

/// Frame pacing constants
pub mod timing {
    /// Nanoseconds per second
    pub const NANOS_PER_SECOND: u64 = 1_000_000_000;

    /// Nanoseconds per millisecond
    pub const NANOS_PER_MILLI: u64 = 1_000_000;

    /// Minimum wait returned by the pacer, to avoid busy-spinning
    pub const MIN_FRAME_WAIT_NANOS: u64 = NANOS_PER_MILLI;

    /// Frames kept in the rolling FPS window
    pub const DEFAULT_FRAME_HISTORY: usize = 10;

    /// Good-frame streak that locks the current rate
    pub const DEFAULT_MAX_GOOD_FRAMES: u32 = 500;

    /// Slow-frame streak that demotes to the next rate tier
    pub const DEFAULT_MAX_SLOW_FRAMES: u32 = 150;

    /// Slack multiplier applied to target rates before deriving the
    /// per-frame time budget (empirically tuned, see `PacerSettings`)
    pub const DEFAULT_FUDGE_FACTOR: f64 = 1.015;

    /// Frame counter modulo for periodic FPS logging
    pub const FRAME_LOG_INTERVAL: u64 = 30;
}

/// Bitmap cache constants
pub mod cache {
    /// Memory budget for decoded bitmaps (bytes of RGBA pixel data)
    pub const DEFAULT_MEMORY_CACHE_BYTES: usize = 2 * 1024 * 1024;

    /// JPEG quality for persisted thumbnails
    pub const THUMBNAIL_JPEG_QUALITY: u8 = 90;

    /// Marker file suppressing media indexing of a thumbnail directory
    pub const NO_MEDIA_MARKER: &str = ".nomedia";
}
