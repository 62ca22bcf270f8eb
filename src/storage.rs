use async_trait::async_trait;
use axum::body::Bytes;
use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use uuid::Uuid;

/// Image extensions accepted for pictures and event posters.
const ALLOWED_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

/// UploadCategory
///
/// The sub-directory an uploaded file lands in. The stored reference is always
/// `uploads/<category>/<generated name>`, which is also the public URL path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadCategory {
    ProfilePictures,
    ClubPictures,
    EventPosters,
}

impl UploadCategory {
    pub const ALL: [UploadCategory; 3] = [
        UploadCategory::ProfilePictures,
        UploadCategory::ClubPictures,
        UploadCategory::EventPosters,
    ];

    pub const fn dir_name(self) -> &'static str {
        match self {
            UploadCategory::ProfilePictures => "profile_pictures",
            UploadCategory::ClubPictures => "club_pictures",
            UploadCategory::EventPosters => "event_posters",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The client sent something that cannot be stored (empty file, unsupported type).
    #[error("{0}")]
    InvalidUpload(String),
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// StorageService
///
/// The contract for persisting uploaded pictures. Handlers only see this trait, so the
/// local disk backend can be replaced by `MockStorageService` in tests.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Creates the upload directories. Called once at startup.
    async fn ensure_dirs(&self) -> Result<(), StorageError>;

    /// Writes `data` under `category` with a generated name and returns the stored
    /// reference (`uploads/<category>/<uuid>.<ext>`). The client's file name only
    /// contributes its extension.
    async fn store(
        &self,
        category: UploadCategory,
        file_name: &str,
        data: Bytes,
    ) -> Result<String, StorageError>;

    /// Deletes a previously stored upload. A reference that is already gone is not an
    /// error.
    async fn remove(&self, reference: &str) -> Result<(), StorageError>;
}

/// extension_of
///
/// Extracts and validates the extension of a client-supplied file name. Anything
/// that is not a known image type is rejected, which also rules out path tricks since
/// the rest of the name is discarded.
fn extension_of(file_name: &str) -> Result<String, StorageError> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    if ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        Ok(extension)
    } else {
        Err(StorageError::InvalidUpload(format!(
            "Unsupported file type. Allowed: {}.",
            ALLOWED_EXTENSIONS.join(", ")
        )))
    }
}

fn generated_name(category: UploadCategory, file_name: &str) -> Result<String, StorageError> {
    let extension = extension_of(file_name)?;
    Ok(format!("{}/{}.{}", category.dir_name(), Uuid::new_v4(), extension))
}

/// relative_path
///
/// Maps a stored reference back to its path below the storage root. Only references of
/// the `uploads/<category>/<name>` shape are accepted.
fn relative_path(reference: &str) -> Result<PathBuf, StorageError> {
    let invalid = || StorageError::InvalidUpload(format!("Not an upload reference: {reference}"));
    let (dir, name) = reference
        .strip_prefix("uploads/")
        .and_then(|rest| rest.split_once('/'))
        .ok_or_else(invalid)?;

    let known = UploadCategory::ALL.iter().any(|c| c.dir_name() == dir);
    if !known || name.is_empty() || name.contains('/') || name.starts_with('.') {
        return Err(invalid());
    }
    Ok(Path::new(dir).join(name))
}

/// LocalDiskStorage
///
/// Stores uploads on the local filesystem below `root` (the configured `UPLOAD_DIR`),
/// which the router serves back under `/uploads`.
#[derive(Debug, Clone)]
pub struct LocalDiskStorage {
    root: PathBuf,
}

impl LocalDiskStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl StorageService for LocalDiskStorage {
    async fn ensure_dirs(&self) -> Result<(), StorageError> {
        for category in UploadCategory::ALL {
            tokio::fs::create_dir_all(self.root.join(category.dir_name())).await?;
        }
        Ok(())
    }

    async fn store(
        &self,
        category: UploadCategory,
        file_name: &str,
        data: Bytes,
    ) -> Result<String, StorageError> {
        if data.is_empty() {
            return Err(StorageError::InvalidUpload("Uploaded file is empty.".to_string()));
        }

        let relative = generated_name(category, file_name)?;
        let target = self.root.join(&relative);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, &data).await?;

        tracing::debug!(path = %target.display(), bytes = data.len(), "stored upload");
        Ok(format!("uploads/{relative}"))
    }

    async fn remove(&self, reference: &str) -> Result<(), StorageError> {
        let target = self.root.join(relative_path(reference)?);
        match tokio::fs::remove_file(&target).await {
            Ok(()) => {
                tracing::debug!(path = %target.display(), "removed upload");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// MockStorageService
///
/// Keeps uploads in memory. Used by the test suite to exercise the upload paths of the
/// handlers without touching the disk; `new_failing` simulates a broken backend.
#[derive(Debug, Default)]
pub struct MockStorageService {
    /// When true, every store call fails with `StorageError::Unavailable`.
    pub should_fail: bool,
    stored: Mutex<Vec<(String, usize)>>,
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

    /// References handed out so far, with the size of each payload.
    pub fn stored(&self) -> Vec<(String, usize)> {
        self.stored
            .lock()
            .map(|stored| stored.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_dirs(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn store(
        &self,
        category: UploadCategory,
        file_name: &str,
        data: Bytes,
    ) -> Result<String, StorageError> {
        if self.should_fail {
            return Err(StorageError::Unavailable(
                "Mock Storage Error: Simulation requested".to_string(),
            ));
        }
        if data.is_empty() {
            return Err(StorageError::InvalidUpload("Uploaded file is empty.".to_string()));
        }

        let reference = format!("uploads/{}", generated_name(category, file_name)?);
        if let Ok(mut stored) = self.stored.lock() {
            stored.push((reference.clone(), data.len()));
        }
        Ok(reference)
    }

    async fn remove(&self, reference: &str) -> Result<(), StorageError> {
        relative_path(reference)?;
        if let Ok(mut stored) = self.stored.lock() {
            stored.retain(|(kept, _)| kept != reference);
        }
        Ok(())
    }
}

/// StorageState
///
/// The concrete type used to share the storage service across the application state.
pub type StorageState = Arc<dyn StorageService>;
