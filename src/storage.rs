use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::error::{AppError, Result};

/// UploadKind
///
/// Which sub-directory of the content root an upload lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Image,
    Model,
}

impl UploadKind {
    pub fn dir(&self) -> &'static str {
        match self {
            UploadKind::Image => "images",
            UploadKind::Model => "models",
        }
    }
}

// 1. StorageService Contract
/// StorageService
///
/// Abstract contract for persisting uploaded files. Handlers only ever see the
/// public path returned by `store`, so the on-disk implementation can be swapped for
/// the in-memory mock in tests.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Creates the `images/` and `models/` directories if they are missing.
    async fn ensure_dirs(&self) -> Result<()>;

    /// Writes `bytes` and returns the public path the file is served under
    /// (e.g. `/static/images/1718000000000_3f2a9c1e_vase.jpg`).
    async fn store(&self, bytes: &[u8], original_name: &str, kind: UploadKind) -> Result<String>;

    /// Best-effort removal of a previously stored file, addressed by its public path.
    async fn remove(&self, public_path: &str) -> Result<()>;
}

/// sanitize_filename
///
/// Keeps only the final path segment of a client-supplied filename and replaces
/// anything outside `[A-Za-z0-9._-]`, so an upload can never escape its directory.
pub fn sanitize_filename(name: &str) -> String {
    let last = name.rsplit(['/', '\\']).next().unwrap_or_default();

    let cleaned: String = last
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "upload".to_string()
    } else {
        trimmed.to_string()
    }
}

/// generate_filename
///
/// `<unix millis>_<8 hex chars>_<sanitized original name>`. The timestamp keeps names
/// sortable, the random discriminator rules out two uploads in the same
/// millisecond colliding.
pub fn generate_filename(original_name: &str) -> String {
    let discriminator = Uuid::new_v4().simple().to_string();
    format!(
        "{}_{}_{}",
        Utc::now().timestamp_millis(),
        &discriminator[..8],
        sanitize_filename(original_name)
    )
}

// 2. The Real Implementation (local directory served by ServeDir)
/// LocalFileStorage
///
/// Writes uploads under `root/<kind dir>/` and maps them to
/// `<public_prefix>/<kind dir>/<file>`. The router serves `root` at `public_prefix`.
#[derive(Clone, Debug)]
pub struct LocalFileStorage {
    root: PathBuf,
    public_prefix: String,
}

impl LocalFileStorage {
    pub fn new(root: impl Into<PathBuf>, public_prefix: &str) -> Self {
        Self {
            root: root.into(),
            public_prefix: public_prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a public path back to its location on disk, refusing anything that is
    /// not a plain `<dir>/<file>` under this storage's prefix.
    fn resolve(&self, public_path: &str) -> Option<PathBuf> {
        let relative = public_path
            .strip_prefix(&self.public_prefix)?
            .trim_start_matches('/');

        let mut segments = relative.split('/');
        let dir = segments.next()?;
        let file = segments.next()?;
        if segments.next().is_some() || file.is_empty() || file.starts_with('.') {
            return None;
        }
        if dir != UploadKind::Image.dir() && dir != UploadKind::Model.dir() {
            return None;
        }

        Some(self.root.join(dir).join(file))
    }
}

#[async_trait]
impl StorageService for LocalFileStorage {
    async fn ensure_dirs(&self) -> Result<()> {
        for kind in [UploadKind::Image, UploadKind::Model] {
            tokio::fs::create_dir_all(self.root.join(kind.dir())).await?;
        }
        Ok(())
    }

    async fn store(&self, bytes: &[u8], original_name: &str, kind: UploadKind) -> Result<String> {
        let filename = generate_filename(original_name);
        let path = self.root.join(kind.dir()).join(&filename);

        tokio::fs::write(&path, bytes).await?;
        tracing::debug!(path = %path.display(), size = bytes.len(), "Stored upload");

        Ok(format!("{}/{}/{}", self.public_prefix, kind.dir(), filename))
    }

    async fn remove(&self, public_path: &str) -> Result<()> {
        let path = self
            .resolve(public_path)
            .ok_or_else(|| AppError::Validation(format!("not a stored file: {public_path}")))?;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// 3. The Mock Implementation (For Tests)
/// MockStorageService
///
/// In-memory `StorageService` that records every stored and removed path. With
/// `should_fail` set every write fails with an IO error.
#[derive(Clone, Default)]
pub struct MockStorageService {
    pub should_fail: bool,
    stored: Arc<Mutex<Vec<String>>>,
    removed: Arc<Mutex<Vec<String>>>,
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

    pub fn stored(&self) -> Vec<String> {
        self.stored.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn removed(&self) -> Vec<String> {
        self.removed.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_dirs(&self) -> Result<()> {
        Ok(())
    }

    async fn store(&self, _bytes: &[u8], original_name: &str, kind: UploadKind) -> Result<String> {
        if self.should_fail {
            return Err(AppError::Io(std::io::Error::other(
                "Mock Storage Error: Simulation requested",
            )));
        }

        let path = format!("/static/{}/{}", kind.dir(), sanitize_filename(original_name));
        if let Ok(mut stored) = self.stored.lock() {
            stored.push(path.clone());
        }
        Ok(path)
    }

    async fn remove(&self, public_path: &str) -> Result<()> {
        if let Ok(mut removed) = self.removed.lock() {
            removed.push(public_path.to_string());
        }
        Ok(())
    }
}

/// StorageState
///
/// The shared handle to the file intake held in `AppState`.
pub type StorageState = Arc<dyn StorageService>;
