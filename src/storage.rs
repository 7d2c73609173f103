use async_trait::async_trait;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use thiserror::Error;
use uuid::Uuid;

/// Largest accepted image, in bytes (5 MiB).
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Extensions (lowercase, with the dot) accepted for uploaded images.
pub const ALLOWED_EXTENSIONS: [&str; 4] = [".jpg", ".jpeg", ".png", ".webp"];

/// Public path prefix uploaded files are served under.
pub const UPLOADS_URL_PREFIX: &str = "/uploads";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("rejected file name '{0}'")]
    InvalidName(String),
    #[error("{0}")]
    Simulated(String),
}

// 1. StorageService Contract
/// StorageService
///
/// Abstract contract for persisting uploaded images, so handlers can run against the
/// local filesystem in production and an in-memory mock in tests.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Ensures the upload destination exists. Safe to call at every startup.
    async fn ensure_ready(&self) -> Result<(), StorageError>;

    /// Writes `bytes` under the server-generated `filename`.
    /// Never called with a user-supplied name.
    async fn store(&self, filename: &str, bytes: &[u8]) -> Result<(), StorageError>;
}

/// Lowercased extension of `filename` (including the dot) if it is an allowed
/// image type. Only the final extension counts: `photo.png.exe` is rejected.
pub fn allowed_extension(filename: &str) -> Option<String> {
    let ext = Path::new(filename).extension()?.to_str()?.to_ascii_lowercase();
    let ext = format!(".{ext}");
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Collision-resistant stored name: a random UUID plus the validated extension.
pub fn generate_upload_name(extension: &str) -> String {
    format!("{}{}", Uuid::new_v4().simple(), extension)
}

pub fn upload_url(filename: &str) -> String {
    format!("{UPLOADS_URL_PREFIX}/{filename}")
}

/// Guards against a name that would escape the uploads directory.
fn is_plain_file_name(filename: &str) -> bool {
    !filename.is_empty()
        && filename != "."
        && filename != ".."
        && !filename.contains(['/', '\\'])
}

// 2. The Real Implementation (local directory served by ServeDir)
/// LocalStorage
///
/// Persists uploads into a single flat directory. Files are write-once: every name
/// is freshly generated, so concurrent uploads never target the same path.
#[derive(Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl StorageService for LocalStorage {
    async fn ensure_ready(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    async fn store(&self, filename: &str, bytes: &[u8]) -> Result<(), StorageError> {
        if !is_plain_file_name(filename) {
            return Err(StorageError::InvalidName(filename.to_string()));
        }
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(self.root.join(filename), bytes).await?;
        tracing::debug!(file = %filename, size = bytes.len(), "stored upload");
        Ok(())
    }
}

// 3. The Mock Implementation (For Tests)
/// MockStorageService
///
/// Keeps uploads in memory so the upload handler can be exercised without touching
/// the filesystem.
#[derive(Clone, Default)]
pub struct MockStorageService {
    /// When true, every write returns a simulated failure.
    pub should_fail: bool,
    files: Arc<Mutex<HashMap<String, usize>>>,
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

    /// Names and sizes of everything stored so far.
    pub fn stored(&self) -> HashMap<String, usize> {
        self.files.lock().map(|files| files.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_ready(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn store(&self, filename: &str, bytes: &[u8]) -> Result<(), StorageError> {
        if self.should_fail {
            return Err(StorageError::Simulated(
                "Mock Storage Error: Simulation requested".to_string(),
            ));
        }
        if !is_plain_file_name(filename) {
            return Err(StorageError::InvalidName(filename.to_string()));
        }
        if let Ok(mut files) = self.files.lock() {
            files.insert(filename.to_string(), bytes.len());
        }
        Ok(())
    }
}

/// StorageState
///
/// The concrete type used to share the storage service across the application state.
pub type StorageState = Arc<dyn StorageService>;
