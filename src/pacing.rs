// SPDX-License-Identifier: GPL-3.0-only

//! Frame-rate-adaptive preview pacing
//!
//! Tracks recent frame start times, derives a rolling FPS estimate, and
//! steps down a ladder of configured target rates when the measured rate
//! stays under the current tier's floor for long enough. After a long
//! streak of good frames the current rate can be locked, so transient
//! stalls no longer demote it. The preview loop driving the camera owns
//! the actual capture timing; this type only answers "when should the
//! next frame start".

use crate::config::PacerSettings;
use crate::constants::timing;
use crate::errors::ConfigError;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Monotonic nanosecond clock source, injectable for tests
pub trait Clock: Send {
    /// Nanoseconds since an arbitrary fixed origin; never goes backwards
    fn now_nanos(&self) -> u64;
}

/// Default clock backed by `std::time::Instant`, anchored at creation
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_nanos(&self) -> u64 {
        self.origin.elapsed().as_nanos() as u64
    }
}

/// Adaptive frame pacer
///
/// Holds an ordered ladder of target frame rates (fastest first) and a
/// performance floor for every tier except the last. The last tier is the
/// fallback and is never demoted away from. The tier index only moves
/// down the ladder; [`FrameRateManager::reset_rate`] is the only way back
/// to tier 0.
///
/// Intended for single-threaded periodic polling by one frame producer;
/// no internal locking.
pub struct FrameRateManager {
    /// Target rates with the fudge factor applied
    target_rates: Vec<f64>,
    /// Target rates as configured, reported by [`Self::target_fps`]
    unfudged_target_rates: Vec<f64>,
    minimum_rates: Vec<f64>,
    current_rate_index: usize,
    current_nanos_per_frame: u64,

    frame_timestamps: VecDeque<u64>,
    history_size: usize,

    max_good_frames: u32,
    max_slow_frames: u32,
    allow_rate_lock: bool,
    rate_locked: bool,

    current_fps: Option<f64>,
    good_frames: u32,
    slow_frames: u32,
    total_frames: u64,

    clock: Box<dyn Clock>,
}

impl std::fmt::Debug for FrameRateManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameRateManager")
            .field("target_rates", &self.target_rates)
            .field("unfudged_target_rates", &self.unfudged_target_rates)
            .field("minimum_rates", &self.minimum_rates)
            .field("current_rate_index", &self.current_rate_index)
            .field("current_nanos_per_frame", &self.current_nanos_per_frame)
            .field("frame_timestamps", &self.frame_timestamps)
            .field("history_size", &self.history_size)
            .field("max_good_frames", &self.max_good_frames)
            .field("max_slow_frames", &self.max_slow_frames)
            .field("allow_rate_lock", &self.allow_rate_lock)
            .field("rate_locked", &self.rate_locked)
            .field("current_fps", &self.current_fps)
            .field("good_frames", &self.good_frames)
            .field("slow_frames", &self.slow_frames)
            .field("total_frames", &self.total_frames)
            .field("clock", &"<dyn Clock>")
            .finish()
    }
}

impl FrameRateManager {
    /// Create a pacer with the default tuning constants.
    ///
    /// `minimum_rates` must hold a floor for every tier except the last.
    pub fn new(target_rates: Vec<f64>, minimum_rates: Vec<f64>) -> Result<Self, ConfigError> {
        Self::build(
            target_rates,
            minimum_rates,
            timing::DEFAULT_FUDGE_FACTOR,
            timing::DEFAULT_FRAME_HISTORY,
            timing::DEFAULT_MAX_GOOD_FRAMES,
            timing::DEFAULT_MAX_SLOW_FRAMES,
            true,
        )
    }

    /// Single fixed rate: no floors, so the tier never demotes or locks
    pub fn with_single_rate(rate: f64) -> Result<Self, ConfigError> {
        Self::new(vec![rate], Vec::new())
    }

    /// Create a pacer from user configuration
    pub fn from_settings(settings: &PacerSettings) -> Result<Self, ConfigError> {
        if settings.history_size < 2 {
            return Err(ConfigError::InvalidSetting(format!(
                "history_size must be at least 2, got {}",
                settings.history_size
            )));
        }
        if settings.fudge_factor <= 0.0 {
            return Err(ConfigError::InvalidSetting(format!(
                "fudge_factor must be positive, got {}",
                settings.fudge_factor
            )));
        }
        Self::build(
            settings.target_rates.clone(),
            settings.minimum_rates.clone(),
            settings.fudge_factor,
            settings.history_size,
            settings.max_good_frames,
            settings.max_slow_frames,
            settings.allow_rate_lock,
        )
    }

    /// Replace the clock used by the `_now` convenience methods
    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn build(
        target_rates: Vec<f64>,
        minimum_rates: Vec<f64>,
        fudge_factor: f64,
        history_size: usize,
        max_good_frames: u32,
        max_slow_frames: u32,
        allow_rate_lock: bool,
    ) -> Result<Self, ConfigError> {
        if target_rates.is_empty() {
            return Err(ConfigError::NoTargetRates);
        }
        if minimum_rates.len() + 1 < target_rates.len() {
            return Err(ConfigError::NotEnoughMinimumRates {
                targets: target_rates.len(),
                minimums: minimum_rates.len(),
            });
        }

        let fudged = target_rates.iter().map(|r| r * fudge_factor).collect();
        let mut manager = Self {
            target_rates: fudged,
            unfudged_target_rates: target_rates,
            minimum_rates,
            current_rate_index: 0,
            current_nanos_per_frame: 0,
            frame_timestamps: VecDeque::with_capacity(history_size + 1),
            history_size,
            max_good_frames,
            max_slow_frames,
            allow_rate_lock,
            rate_locked: false,
            current_fps: None,
            good_frames: 0,
            slow_frames: 0,
            total_frames: 0,
            clock: Box::new(MonotonicClock::new()),
        };
        manager.set_current_rate_index(0);
        Ok(manager)
    }

    fn set_current_rate_index(&mut self, index: usize) {
        self.current_rate_index = index;
        self.current_nanos_per_frame =
            (timing::NANOS_PER_SECOND as f64 / self.target_rates[index]) as u64;
    }

    /// Whether the current tier has a floor to compare against
    fn has_floor(&self) -> bool {
        self.current_rate_index < self.minimum_rates.len()
            && self.current_rate_index + 1 < self.target_rates.len()
    }

    fn reduce_fps(&mut self) {
        let from = self.target_fps();
        self.set_current_rate_index(self.current_rate_index + 1);
        self.good_frames = 0;
        self.slow_frames = 0;
        self.rate_locked = false;
        info!(
            tier = self.current_rate_index,
            from,
            to = self.target_fps(),
            "reduced target frame rate"
        );
    }

    /// Record the start of a frame.
    ///
    /// Once the history window has filled, every call recomputes the
    /// rolling FPS over the window and feeds the slow/good streak
    /// counters that drive tier demotion and rate locking.
    pub fn frame_started(&mut self, time: u64) {
        self.total_frames += 1;
        self.frame_timestamps.push_back(time);
        if self.frame_timestamps.len() <= self.history_size {
            return;
        }
        let Some(first) = self.frame_timestamps.pop_front() else {
            return;
        };
        let seconds = time.saturating_sub(first) as f64 / timing::NANOS_PER_SECOND as f64;
        let fps = self.history_size as f64 / seconds;
        self.current_fps = Some(fps);

        if self.rate_locked || !self.has_floor() {
            return;
        }
        if fps < self.minimum_rates[self.current_rate_index] {
            self.slow_frames += 1;
            if self.slow_frames >= self.max_slow_frames {
                self.reduce_fps();
            }
        } else {
            self.good_frames += 1;
            if self.max_good_frames > 0 && self.good_frames >= self.max_good_frames {
                if self.allow_rate_lock {
                    self.rate_locked = true;
                    info!(tier = self.current_rate_index, fps, "frame rate locked");
                }
                self.good_frames = 0;
                self.slow_frames = 0;
            }
        }
    }

    /// Record a frame start at the injected clock's current time
    pub fn frame_started_now(&mut self) {
        let now = self.clock.now_nanos();
        self.frame_started(now);
    }

    /// Nanoseconds to wait from `now` before starting the next frame.
    ///
    /// Converges toward the current tier's per-frame cadence, and once the
    /// history window is full also corrects for cumulative lag across the
    /// whole window. Never less than one millisecond.
    pub fn nanos_until_next_frame(&self, now: u64) -> u64 {
        let Some(&last) = self.frame_timestamps.back() else {
            return self.current_nanos_per_frame.max(timing::MIN_FRAME_WAIT_NANOS);
        };
        let single_frame_goal = last as i64 + self.current_nanos_per_frame as i64;
        let mut wait = single_frame_goal - now as i64;

        if self.frame_timestamps.len() == self.history_size {
            if let Some(&first) = self.frame_timestamps.front() {
                let multi_frame_goal =
                    first as i64 + self.history_size as i64 * self.current_nanos_per_frame as i64;
                let behind = single_frame_goal - multi_frame_goal;
                if behind > 0 {
                    wait -= behind;
                }
            }
        }

        wait.max(timing::MIN_FRAME_WAIT_NANOS as i64) as u64
    }

    /// Wait computed against the injected clock
    pub fn nanos_until_next_frame_now(&self) -> u64 {
        self.nanos_until_next_frame(self.clock.now_nanos())
    }

    /// Block the calling thread until the next frame should start.
    ///
    /// Returns the nanoseconds slept.
    pub fn sleep_until_next_frame(&self) -> u64 {
        let nanos = self.nanos_until_next_frame_now();
        std::thread::sleep(Duration::from_nanos(nanos));
        nanos
    }

    /// Drop the timestamp history and streak state, keeping the tier
    pub fn clear_history(&mut self) {
        self.frame_timestamps.clear();
        self.good_frames = 0;
        self.slow_frames = 0;
        self.current_fps = None;
    }

    /// Return to tier 0 and unlock, dropping all history
    pub fn reset_rate(&mut self) {
        self.clear_history();
        self.set_current_rate_index(0);
        self.rate_locked = false;
        debug!("frame rate reset to tier 0");
    }

    /// Rolling FPS estimate; `None` until the history window first fills
    pub fn current_fps(&self) -> Option<f64> {
        self.current_fps
    }

    /// The current tier's configured (unfudged) target rate
    pub fn target_fps(&self) -> f64 {
        self.unfudged_target_rates[self.current_rate_index]
    }

    /// Per-frame time budget at the current tier, fudge applied
    pub fn nanos_per_frame(&self) -> u64 {
        self.current_nanos_per_frame
    }

    /// Index into the target-rate ladder (0 = fastest)
    pub fn current_tier(&self) -> usize {
        self.current_rate_index
    }

    /// Whether the current rate has been locked in
    pub fn rate_locked(&self) -> bool {
        self.rate_locked
    }

    /// Lifetime count of recorded frames
    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    /// Timestamp of the most recently recorded frame start
    pub fn last_frame_start_time(&self) -> Option<u64> {
        self.frame_timestamps.back().copied()
    }

    #[cfg(test)]
    fn streaks(&self) -> (u32, u32) {
        (self.good_frames, self.slow_frames)
    }

    /// One-line status for periodic logging
    pub fn fps_debug_info(&self) -> String {
        match self.current_fps {
            Some(fps) => format!(
                "FPS: {:.1} target: {:.1}{}",
                fps,
                self.target_fps(),
                if self.rate_locked { " (locked)" } else { "" }
            ),
            None => format!("FPS: warming up, target: {:.1}", self.target_fps()),
        }
    }
}
