// SPDX-License-Identifier: GPL-3.0-only

//! Byte storage for source images and persisted thumbnails
//!
//! The cache never touches the filesystem directly; it goes through
//! [`MediaStore`] for bytes and [`ThumbnailLocator`] for thumbnail
//! placement, so both are swappable in tests and by embedding callers.

use crate::constants::cache;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Maps a source image to its on-disk thumbnail path
pub trait ThumbnailLocator: Send + Sync {
    fn thumbnail_path(&self, source: &Path) -> PathBuf;
}

/// Locator placing every thumbnail, named after its source file, in a
/// single caller-chosen directory
pub struct FixedDirectoryLocator {
    directory: PathBuf,
}

impl FixedDirectoryLocator {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }
}

impl ThumbnailLocator for FixedDirectoryLocator {
    fn thumbnail_path(&self, source: &Path) -> PathBuf {
        match source.file_name() {
            Some(name) => self.directory.join(name),
            None => self.directory.join("unnamed"),
        }
    }
}

/// Byte store consumed by the bitmap cache: source reads plus thumbnail
/// read/write/delete
pub trait MediaStore: Send + Sync {
    /// Bytes of the original source image, or `None` if unreadable
    fn read_source(&self, id: &Path) -> Option<Vec<u8>>;

    fn thumbnail_exists(&self, path: &Path) -> bool;

    fn read_thumbnail(&self, path: &Path) -> Option<Vec<u8>>;

    /// Persist an encoded thumbnail, creating parent directories and the
    /// media-indexing suppression marker alongside it
    fn write_thumbnail(&self, path: &Path, encoded: &[u8]) -> io::Result<()>;

    /// Best-effort delete; returns whether a file was removed
    fn delete_thumbnail(&self, path: &Path) -> bool;
}

/// [`MediaStore`] backed by the local filesystem
pub struct FsMediaStore;

impl MediaStore for FsMediaStore {
    fn read_source(&self, id: &Path) -> Option<Vec<u8>> {
        match fs::read(id) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                debug!(path = %id.display(), error = %e, "cannot read source image");
                None
            }
        }
    }

    fn thumbnail_exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read_thumbnail(&self, path: &Path) -> Option<Vec<u8>> {
        fs::read(path).ok()
    }

    fn write_thumbnail(&self, path: &Path, encoded: &[u8]) -> io::Result<()> {
        let Some(parent) = path.parent() else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "thumbnail path has no parent directory",
            ));
        };
        fs::create_dir_all(parent)?;
        fs::write(path, encoded)?;
        // marker is create-if-absent, like the thumbnails around it
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(parent.join(cache::NO_MEDIA_MARKER))
        {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn delete_thumbnail(&self, path: &Path) -> bool {
        fs::remove_file(path).is_ok()
    }
}
