use async_trait::async_trait;
use axum::body::Bytes;
use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use thiserror::Error;
use uuid::Uuid;

/// Public URL prefix under which uploaded images are served.
pub const UPLOADS_PREFIX: &str = "/uploads";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("simulated storage failure")]
    Simulated,
}

// 1. StorageService Contract
/// StorageService
///
/// Abstract contract for persisting uploaded images. The real implementation writes to
/// a local directory; the mock keeps files in memory so handlers can be tested offline.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Creates the upload location if it does not exist yet. Called once at startup.
    async fn ensure_upload_dir(&self) -> Result<(), StorageError>;

    /// Persists an image and returns its public path (e.g. `/uploads/<uuid>.png`).
    ///
    /// The stored name is a fresh v4 UUID; only a sanitised extension is taken from
    /// `original_name`, so concurrent uploads of identically named files never collide.
    async fn save_image(&self, original_name: &str, bytes: Bytes) -> Result<String, StorageError>;
}

/// stored_file_name
///
/// Builds the collision-free file name for an upload. The extension survives only if it
/// is short ASCII alphanumeric; anything else (including path tricks) becomes `bin`.
pub fn stored_file_name(original_name: &str) -> String {
    let extension = Path::new(original_name)
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .filter(|ext| !ext.is_empty() && ext.len() <= 8)
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "bin".to_string());

    format!("{}.{}", Uuid::new_v4(), extension)
}

// 2. The Real Implementation (Local Disk)
/// LocalDiskStorage
///
/// Writes uploads into a single directory that is also mounted as a static route.
#[derive(Clone)]
pub struct LocalDiskStorage {
    root: PathBuf,
}

impl LocalDiskStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl StorageService for LocalDiskStorage {
    async fn ensure_upload_dir(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    async fn save_image(&self, original_name: &str, bytes: Bytes) -> Result<String, StorageError> {
        let file_name = stored_file_name(original_name);
        let path = self.root.join(&file_name);

        tokio::fs::write(&path, &bytes).await?;
        tracing::debug!(path = %path.display(), size = bytes.len(), "image stored");

        Ok(format!("{UPLOADS_PREFIX}/{file_name}"))
    }
}

// 3. The Mock Implementation (For Tests)
/// MockStorageService
///
/// Keeps saved images in memory. `new_failing` makes every save fail.
#[derive(Clone, Default)]
pub struct MockStorageService {
    pub should_fail: bool,
    saved: Arc<Mutex<Vec<(String, Bytes)>>>,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Public paths and contents of everything saved so far.
    pub fn saved(&self) -> Vec<(String, Bytes)> {
        self.saved
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_upload_dir(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn save_image(&self, original_name: &str, bytes: Bytes) -> Result<String, StorageError> {
        if self.should_fail {
            return Err(StorageError::Simulated);
        }

        let url = format!("{UPLOADS_PREFIX}/{}", stored_file_name(original_name));
        self.saved
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((url.clone(), bytes));
        Ok(url)
    }
}

/// StorageState
///
/// The shared handle to the image store.
pub type StorageState = Arc<dyn StorageService>;
