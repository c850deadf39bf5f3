// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for exercising the pacing and cache cores
//!
//! This module provides command-line functionality for:
//! - Driving the adaptive frame pacer against the real clock
//! - Producing scaled bitmaps and persisting thumbnails
//! - Pre-warming the thumbnail cache for a directory of images
//! - Running an epoch-guarded capture countdown

use phototimer::cache::{AsyncImageLoader, ScaledBitmapCache};
use phototimer::capabilities::Capabilities;
use phototimer::config::Config;
use phototimer::constants::timing;
use phototimer::countdown::{CountdownTimer, Tick};
use phototimer::errors::AppResult;
use phototimer::pacing::FrameRateManager;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Extensions accepted by the `warm` command
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp"];

/// Drive the pacer for `frames` frames, logging the rolling FPS
pub fn run_pace(frames: u64, target: Vec<f64>, minimum: Vec<f64>) -> AppResult<()> {
    let mut manager = if target.is_empty() {
        FrameRateManager::from_settings(&Config::load().pacer)?
    } else {
        FrameRateManager::new(target, minimum)?
    };

    println!("Pacing {} frames at {:.1} FPS target", frames, manager.target_fps());
    for n in 0..frames {
        manager.frame_started_now();
        if n % timing::FRAME_LOG_INTERVAL == 0 {
            println!("  {}", manager.fps_debug_info());
        }
        manager.sleep_until_next_frame();
    }
    println!(
        "Done: {} frames, tier {}, {}",
        manager.total_frames(),
        manager.current_tier(),
        manager.fps_debug_info()
    );
    Ok(())
}

/// Produce one scaled bitmap and persist its thumbnail
pub fn run_thumbnail(
    image: PathBuf,
    width: u32,
    height: u32,
    out_dir: Option<PathBuf>,
) -> AppResult<()> {
    let config = Config::load();
    let thumbnail_dir = out_dir.unwrap_or_else(|| config.cache.resolved_thumbnail_dir());
    let capabilities = Capabilities::detect(&thumbnail_dir);
    if !capabilities.thumbnails_writable {
        println!("Warning: {} is not writable", thumbnail_dir.display());
    }

    let cache = ScaledBitmapCache::with_thumbnail_directory(&thumbnail_dir, &config.cache);
    let Some(bitmap) = cache.get_scaled_bitmap(&image, width, height) else {
        return Err(format!("Could not decode {}", image.display()).into());
    };
    cache.flush_pending_writes();

    println!(
        "{} -> {}x{} (thumbnail at {})",
        image.display(),
        bitmap.width(),
        bitmap.height(),
        cache.thumbnail_path(&image).display()
    );
    Ok(())
}

/// Pre-generate thumbnails for every image in a directory
pub async fn run_warm(dir: PathBuf, size: u32) -> AppResult<()> {
    let config = Config::load();
    let thumbnail_dir = config.cache.resolved_thumbnail_dir();
    let capabilities = Capabilities::detect(&thumbnail_dir);

    let mut images = Vec::new();
    for entry in std::fs::read_dir(&dir)?.flatten() {
        let path = entry.path();
        let Some(ext) = path.extension().map(|e| e.to_string_lossy().to_lowercase()) else {
            continue;
        };
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            images.push(path);
        }
    }
    if images.is_empty() {
        println!("No images found in {}", dir.display());
        return Ok(());
    }
    println!(
        "Warming {} thumbnails with {} decode workers",
        images.len(),
        capabilities.decode_parallelism
    );

    let cache = Arc::new(ScaledBitmapCache::with_thumbnail_directory(
        &thumbnail_dir,
        &config.cache,
    ));
    let loader = Arc::new(AsyncImageLoader::new(cache.clone()));
    let semaphore = Arc::new(tokio::sync::Semaphore::new(
        capabilities.decode_parallelism as usize,
    ));

    let mut tasks = tokio::task::JoinSet::new();
    for (index, path) in images.into_iter().enumerate() {
        let Ok(permit) = semaphore.clone().acquire_owned().await else {
            break;
        };
        let loader = loader.clone();
        tasks.spawn(async move {
            let _permit = permit;
            let loaded = loader.load(index as u64, &path, size, size).await;
            (path, loaded.is_some())
        });
    }

    let mut failures = 0u32;
    while let Some(result) = tasks.join_next().await {
        let Ok((path, ok)) = result else {
            continue;
        };
        if ok {
            println!("  {}", path.display());
        } else {
            println!("  {} (failed)", path.display());
            failures += 1;
        }
    }
    cache.flush_pending_writes();

    if failures > 0 {
        println!("{} images could not be decoded", failures);
    }
    Ok(())
}

/// Count down to a capture, cancellable with Ctrl-C
pub async fn run_countdown(seconds: u32) -> AppResult<()> {
    if seconds == 0 {
        println!("Capture!");
        return Ok(());
    }

    let mut timer = CountdownTimer::new();
    let epoch = timer.start(seconds);
    println!("Taking picture in {} seconds (Ctrl-C cancels)", seconds);

    loop {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(1)) => {
                match timer.tick(epoch) {
                    Tick::Continue(remaining) => println!("{}...", remaining),
                    Tick::Fire => {
                        println!("Capture!");
                        break;
                    }
                    Tick::Stale => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                timer.cancel();
                // the scheduled tick for the old epoch is now a no-op
                if timer.tick(epoch) == Tick::Stale {
                    println!("Canceled");
                }
                break;
            }
        }
    }
    Ok(())
}
