// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the scaled bitmap cache against real files

use image::RgbaImage;
use phototimer::cache::{AsyncImageLoader, ScaledBitmapCache};
use phototimer::config::CacheSettings;
use phototimer::media::{BitmapDecoder, ImageBitmapDecoder};
use phototimer::storage::{FixedDirectoryLocator, FsMediaStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Fresh working directory per test, under the system temp dir
fn test_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "phototimer-cache-test-{}-{}",
        std::process::id(),
        name
    ));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).expect("create test dir");
    dir
}

/// Write a real decodable PNG of the given size
fn write_png(path: &Path, width: u32, height: u32) {
    let bitmap = RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
    });
    bitmap.save(path).expect("write test image");
}

fn build_cache(thumbnail_dir: &Path) -> ScaledBitmapCache {
    ScaledBitmapCache::with_thumbnail_directory(thumbnail_dir, &CacheSettings::default())
}

/// Decoder wrapper counting how many real decodes happen
struct CountingDecoder {
    inner: ImageBitmapDecoder,
    decodes: AtomicUsize,
}

impl CountingDecoder {
    fn new() -> Self {
        Self {
            inner: ImageBitmapDecoder,
            decodes: AtomicUsize::new(0),
        }
    }
}

impl BitmapDecoder for CountingDecoder {
    fn probe_dimensions(&self, bytes: &[u8]) -> Option<(u32, u32)> {
        self.inner.probe_dimensions(bytes)
    }

    fn decode_downsampled(&self, bytes: &[u8], factor: u32) -> Option<RgbaImage> {
        self.decodes.fetch_add(1, Ordering::SeqCst);
        self.inner.decode_downsampled(bytes, factor)
    }
}

#[test]
fn test_cold_cache_decodes_and_writes_thumbnail_back() {
    let dir = test_dir("cold");
    let thumbnail_dir = dir.join("thumbs");
    let source = dir.join("photo.png");
    write_png(&source, 800, 600);

    let cache = build_cache(&thumbnail_dir);
    let bitmap = cache
        .get_scaled_bitmap(&source, 100, 100)
        .expect("decodable source");
    assert!(bitmap.width() >= 100 && bitmap.height() >= 100);

    // inserted into the memory tier
    assert!(cache.get_in_memory_scaled_bitmap(&source, 100, 100).is_some());

    // thumbnail and indexing marker persisted at the locator's path
    cache.flush_pending_writes();
    assert!(cache.thumbnail_path(&source).is_file());
    assert!(thumbnail_dir.join(".nomedia").is_file());
}

#[test]
fn test_repeat_request_skips_decode() {
    let dir = test_dir("repeat");
    let source = dir.join("photo.png");
    write_png(&source, 800, 600);

    let decoder = Arc::new(CountingDecoder::new());
    let cache = ScaledBitmapCache::new(
        Arc::new(FsMediaStore),
        decoder.clone(),
        Box::new(FixedDirectoryLocator::new(dir.join("thumbs"))),
        &CacheSettings::default(),
    );

    cache.get_scaled_bitmap(&source, 100, 100).expect("first");
    // same id at a smaller-or-equal size: served from memory
    cache.get_scaled_bitmap(&source, 100, 100).expect("second");
    cache.get_scaled_bitmap(&source, 50, 50).expect("third");
    assert_eq!(decoder.decodes.load(Ordering::SeqCst), 1);
    cache.flush_pending_writes();
}

#[test]
fn test_persisted_thumbnail_serves_cold_restart() {
    let dir = test_dir("restart");
    let thumbnail_dir = dir.join("thumbs");
    let source = dir.join("photo.png");
    write_png(&source, 800, 600);

    {
        let cache = build_cache(&thumbnail_dir);
        cache.get_scaled_bitmap(&source, 100, 100).expect("warm up");
        cache.flush_pending_writes();
    }

    // remove the source; only the persisted thumbnail can serve now
    std::fs::remove_file(&source).expect("remove source");
    let cache = build_cache(&thumbnail_dir);
    let bitmap = cache
        .get_scaled_bitmap(&source, 100, 100)
        .expect("served from thumbnail tier");
    assert!(bitmap.width() >= 100 && bitmap.height() >= 100);
}

#[test]
fn test_invalidate_then_in_memory_lookup_is_none() {
    let dir = test_dir("invalidate");
    let thumbnail_dir = dir.join("thumbs");
    let source = dir.join("photo.png");
    write_png(&source, 640, 480);

    let cache = build_cache(&thumbnail_dir);
    cache.get_scaled_bitmap(&source, 100, 100).expect("warm up");
    cache.flush_pending_writes();
    assert!(cache.thumbnail_path(&source).is_file());

    cache.invalidate(&source);
    assert!(cache.get_in_memory_scaled_bitmap(&source, 1, 1).is_none());
    assert!(!cache.thumbnail_path(&source).is_file());
}

#[test]
fn test_undecodable_source_degrades_to_none() {
    let dir = test_dir("garbage");
    let source = dir.join("broken.png");
    std::fs::write(&source, b"this is not a png").expect("write garbage");

    let cache = build_cache(&dir.join("thumbs"));
    assert!(cache.get_scaled_bitmap(&source, 100, 100).is_none());
    assert!(cache.get_scaled_bitmap(&dir.join("missing.png"), 100, 100).is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_loader_delivers_current_request() {
    let dir = test_dir("loader");
    let source = dir.join("photo.png");
    write_png(&source, 400, 300);

    let cache = Arc::new(build_cache(&dir.join("thumbs")));
    let loader = AsyncImageLoader::new(cache.clone());

    let bitmap = loader.load(1, &source, 100, 100).await.expect("loaded");
    assert!(bitmap.width() >= 100 && bitmap.height() >= 100);

    // a second load for the same target is a memory hit
    assert!(loader.load(1, &source, 100, 100).await.is_some());
    cache.flush_pending_writes();
}

/// Decoder that blocks inside the decode until released, so tests can
/// order events around an in-flight load
struct GatedDecoder {
    inner: ImageBitmapDecoder,
    entered: std::sync::Mutex<std::sync::mpsc::Sender<()>>,
    gate: std::sync::Mutex<std::sync::mpsc::Receiver<()>>,
}

impl BitmapDecoder for GatedDecoder {
    fn probe_dimensions(&self, bytes: &[u8]) -> Option<(u32, u32)> {
        self.inner.probe_dimensions(bytes)
    }

    fn decode_downsampled(&self, bytes: &[u8], factor: u32) -> Option<RgbaImage> {
        let _ = self.entered.lock().unwrap().send(());
        let _ = self.gate.lock().unwrap().recv();
        self.inner.decode_downsampled(bytes, factor)
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_superseded_load_is_not_delivered() {
    let dir = test_dir("cancel");
    let source = dir.join("photo.png");
    write_png(&source, 400, 300);

    let (entered_tx, entered_rx) = std::sync::mpsc::channel();
    let (gate_tx, gate_rx) = std::sync::mpsc::channel();
    let cache = Arc::new(ScaledBitmapCache::new(
        Arc::new(FsMediaStore),
        Arc::new(GatedDecoder {
            inner: ImageBitmapDecoder,
            entered: std::sync::Mutex::new(entered_tx),
            gate: std::sync::Mutex::new(gate_rx),
        }),
        Box::new(FixedDirectoryLocator::new(dir.join("thumbs"))),
        &CacheSettings::default(),
    ));
    let loader = Arc::new(AsyncImageLoader::new(cache.clone()));

    let task = {
        let loader = loader.clone();
        let source = source.clone();
        tokio::spawn(async move { loader.load(7, &source, 100, 100).await })
    };

    // the decode is underway; supersede the target, then let it finish
    entered_rx
        .recv_timeout(std::time::Duration::from_secs(5))
        .expect("decode started");
    loader.cancel(7);
    gate_tx.send(()).expect("release decoder");

    assert!(task.await.expect("task").is_none(), "stale result delivered");

    // the decoded bitmap still landed in the cache; a fresh request for
    // the same target gets it
    gate_tx.send(()).ok();
    let bitmap = loader.load(7, &source, 100, 100).await;
    assert!(bitmap.is_some());
    cache.flush_pending_writes();
}
