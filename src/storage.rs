//! Blob storage at the edge of a job: fetch the source, store the result,
//! hand out a download URL.
//!
//! [`BlobStore`] is the seam; [`LocalStore`] maps locators onto files below a
//! root directory. Locators are `/`-separated relative paths such as
//! `albums/2024/cat.jpg`. Absolute paths and `..` segments are rejected so a
//! locator can never escape the root.

use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("Invalid locator: {0}")]
    InvalidLocator(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where job inputs come from and outputs go to.
pub trait BlobStore: Sync {
    /// Read the full object stored under `locator`.
    fn fetch(&self, locator: &str) -> Result<Vec<u8>, StoreError>;

    /// Write `bytes` under `locator`, replacing any existing object.
    fn store(&self, locator: &str, bytes: &[u8]) -> Result<(), StoreError>;

    /// A URL through which the object can be downloaded for `ttl_seconds`.
    fn download_url(&self, locator: &str, ttl_seconds: u64) -> String;
}

/// [`BlobStore`] over a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Map a locator to a path below the root.
    pub fn resolve(&self, locator: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(locator);
        if locator.trim().is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(StoreError::InvalidLocator(locator.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

impl BlobStore for LocalStore {
    fn fetch(&self, locator: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.resolve(locator)?;
        debug!(path = %path.display(), "fetching object");
        std::fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StoreError::NotFound(locator.to_string()),
            _ => StoreError::Io(e),
        })
    }

    fn store(&self, locator: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.resolve(locator)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        debug!(path = %path.display(), bytes = bytes.len(), "storing object");
        std::fs::write(&path, bytes)?;
        Ok(())
    }

    fn download_url(&self, locator: &str, ttl_seconds: u64) -> String {
        let path = self.root.join(locator);
        let absolute = std::path::absolute(&path).unwrap_or(path);
        format!("file://{}?expires_in={ttl_seconds}", absolute.display())
    }
}

/// Derive the default output locator: same directory, file name prefixed.
///
/// `photos/cat.jpg` with prefix `batch_` becomes `photos/batch_cat.jpg`.
pub fn prefixed_locator(source: &str, prefix: &str) -> String {
    match source.rsplit_once('/') {
        Some((dir, name)) => format!("{dir}/{prefix}{name}"),
        None => format!("{prefix}{source}"),
    }
}

/// Replace (or add) the extension of a locator's file name.
pub fn with_extension(locator: &str, extension: &str) -> String {
    let (dir, name) = match locator.rsplit_once('/') {
        Some((dir, name)) => (Some(dir), name),
        None => (None, locator),
    };
    let stem = match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    };
    match dir {
        Some(dir) => format!("{dir}/{stem}.{extension}"),
        None => format!("{stem}.{extension}"),
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory store that records every write.
    #[derive(Default)]
    pub struct MemoryStore {
        pub objects: Mutex<HashMap<String, Vec<u8>>>,
        pub fail_writes: bool,
    }

    impl MemoryStore {
        pub fn with_object(locator: &str, bytes: Vec<u8>) -> Self {
            let store = Self::default();
            store
                .objects
                .lock()
                .unwrap()
                .insert(locator.to_string(), bytes);
            store
        }

        pub fn get(&self, locator: &str) -> Option<Vec<u8>> {
            self.objects.lock().unwrap().get(locator).cloned()
        }
    }

    impl BlobStore for MemoryStore {
        fn fetch(&self, locator: &str) -> Result<Vec<u8>, StoreError> {
            self.get(locator)
                .ok_or_else(|| StoreError::NotFound(locator.to_string()))
        }

        fn store(&self, locator: &str, bytes: &[u8]) -> Result<(), StoreError> {
            if self.fail_writes {
                return Err(StoreError::Io(std::io::Error::other("disk full")));
            }
            self.objects
                .lock()
                .unwrap()
                .insert(locator.to_string(), bytes.to_vec());
            Ok(())
        }

        fn download_url(&self, locator: &str, ttl_seconds: u64) -> String {
            format!("mem://{locator}?expires_in={ttl_seconds}")
        }
    }

    #[test]
    fn local_store_roundtrip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());
        store.store("nested/dir/a.bin", b"hello").unwrap();
        assert_eq!(store.fetch("nested/dir/a.bin").unwrap(), b"hello");
        assert!(tmp.path().join("nested/dir/a.bin").exists());
    }

    #[test]
    fn local_store_missing_object_is_not_found() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());
        assert!(matches!(
            store.fetch("nope.png"),
            Err(StoreError::NotFound(l)) if l == "nope.png"
        ));
    }

    #[test]
    fn local_store_rejects_escaping_locators() {
        let store = LocalStore::new("/srv/images");
        assert!(matches!(
            store.resolve("../etc/passwd"),
            Err(StoreError::InvalidLocator(_))
        ));
        assert!(matches!(
            store.resolve("/etc/passwd"),
            Err(StoreError::InvalidLocator(_))
        ));
        assert!(matches!(store.resolve("  "), Err(StoreError::InvalidLocator(_))));
        assert_eq!(
            store.resolve("a/b.png").unwrap(),
            PathBuf::from("/srv/images/a/b.png")
        );
    }

    #[test]
    fn download_url_carries_ttl() {
        let store = LocalStore::new("/srv/images");
        let url = store.download_url("a/b.png", 3600);
        assert!(url.starts_with("file:///srv/images/a/b.png"));
        assert!(url.ends_with("?expires_in=3600"));
    }

    #[test]
    fn prefixed_locator_keeps_directory() {
        assert_eq!(prefixed_locator("cat.jpg", "batch_"), "batch_cat.jpg");
        assert_eq!(
            prefixed_locator("photos/2024/cat.jpg", "batch_"),
            "photos/2024/batch_cat.jpg"
        );
    }

    #[test]
    fn with_extension_replaces_or_appends() {
        assert_eq!(with_extension("a/b/cat.jpg", "png"), "a/b/cat.png");
        assert_eq!(with_extension("cat", "png"), "cat.png");
        assert_eq!(with_extension(".hidden", "png"), ".hidden.png");
    }
}
