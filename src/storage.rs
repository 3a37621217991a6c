//! Artifact persistence and URL construction
//!
//! Encoded cut-outs are written once under `storage_root/images/` with a
//! fresh random identifier; files are immutable and never read back by the
//! service (only served statically). Uniqueness relies on UUIDv4, not
//! locking; collisions are never checked.

use crate::error::Result;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// Subdirectory of the storage root holding image artifacts
pub const IMAGES_SUBDIR: &str = "images";

/// URL path prefix under which the storage root is served
pub const FILES_PREFIX: &str = "files";

/// Content-addressed-by-random-id file store for output artifacts
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Open a store rooted at `root`, creating the images directory.
    ///
    /// # Errors
    /// Directory creation failures.
    pub fn open<P: Into<PathBuf>>(root: P) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(root.join(IMAGES_SUBDIR))?;
        Ok(Self { root })
    }

    /// Filesystem root of the store
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write encoded bytes under a fresh random identifier.
    ///
    /// Returns the path relative to the storage root
    /// (`images/<uuid-hex>.<ext>`). Single full-buffer write; no atomic
    /// rename and no collision check.
    ///
    /// # Errors
    /// File write failures.
    pub fn store(&self, data: &[u8], extension: &str) -> Result<String> {
        let file_name = format!("{}.{extension}", Uuid::new_v4().simple());
        let relative = format!("{IMAGES_SUBDIR}/{file_name}");
        let absolute = self.root.join(IMAGES_SUBDIR).join(&file_name);
        std::fs::write(&absolute, data)?;
        debug!(path = %absolute.display(), bytes = data.len(), "artifact written");
        Ok(relative)
    }

    /// Build the public URL for a stored artifact.
    ///
    /// Concatenates the configured base (trailing slash stripped) with
    /// `/files/<relative path>`.
    #[must_use]
    pub fn public_url(&self, base_url: &str, relative: &str) -> String {
        format!("{}/{FILES_PREFIX}/{relative}", base_url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_creates_images_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path().join("storage")).unwrap();
        assert!(store.root().join(IMAGES_SUBDIR).is_dir());
    }

    #[test]
    fn test_store_writes_file_under_images() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        let relative = store.store(b"payload", "png").unwrap();
        assert!(relative.starts_with("images/"));
        assert!(relative.ends_with(".png"));
        assert_eq!(std::fs::read(store.root().join(&relative)).unwrap(), b"payload");
    }

    #[test]
    fn test_store_generates_distinct_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        let first = store.store(b"a", "webp").unwrap();
        let second = store.store(b"b", "webp").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_public_url_strips_trailing_slash() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        assert_eq!(
            store.public_url("http://localhost:8001/", "images/a.png"),
            "http://localhost:8001/files/images/a.png"
        );
        assert_eq!(
            store.public_url("http://localhost:8001", "images/a.png"),
            "http://localhost:8001/files/images/a.png"
        );
    }
}
