use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use votalloween_shared::constants::UPLOADS_ROUTE;
use votalloween_shared::media::allowed_image_extension;

use crate::error::ServerError;

/// Verify that a resolved path stays within the expected base directory.
/// Prevents path traversal attacks.
fn ensure_within(base: &Path, target: &Path) -> Result<PathBuf, ServerError> {
    // Canonicalize base; target may not exist yet so normalize manually
    let canonical_base = base.canonicalize().unwrap_or_else(|_| base.to_path_buf());
    let mut resolved = canonical_base.clone();
    for component in target
        .strip_prefix(base)
        .or_else(|_| target.strip_prefix(&canonical_base))
        .unwrap_or(target)
        .components()
    {
        match component {
            std::path::Component::Normal(c) => resolved.push(c),
            std::path::Component::ParentDir => {
                return Err(ServerError::Validation("Path traversal detected".to_string()));
            }
            _ => {} // RootDir, CurDir, Prefix
        }
    }
    if !resolved.starts_with(&canonical_base) {
        return Err(ServerError::Validation("Path traversal detected".to_string()));
    }
    Ok(resolved)
}

/// An image written to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    /// Generated file name inside the uploads directory.
    pub file_name: String,
    /// Public URL path, `/uploads/<file_name>`.
    pub url: String,
}

/// File count and total size of the uploads directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreUsage {
    pub files: u64,
    pub bytes: u64,
}

/// Disk-backed storage for costume photos.
#[derive(Debug, Clone)]
pub struct ImageStore {
    base_path: PathBuf,
    max_size: usize,
}

impl ImageStore {
    pub async fn new(base_path: PathBuf, max_size: usize) -> Result<Self, ServerError> {
        fs::create_dir_all(&base_path).await.map_err(|e| {
            ServerError::Storage(format!(
                "Failed to create uploads directory '{}': {}",
                base_path.display(),
                e
            ))
        })?;

        info!(path = %base_path.display(), "Image store initialized");

        Ok(Self {
            base_path,
            max_size,
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Validate and persist an uploaded image.
    ///
    /// The original file name only contributes its extension; the stored
    /// name is generated.
    pub async fn store_image(
        &self,
        original_name: &str,
        content_type: &str,
        data: &[u8],
    ) -> Result<StoredImage, ServerError> {
        let ext = allowed_image_extension(original_name, content_type).ok_or_else(|| {
            ServerError::Validation(
                "Only images are allowed (jpeg, jpg, png, gif, webp)".to_string(),
            )
        })?;
        if data.is_empty() {
            return Err(ServerError::Validation("The image is empty".to_string()));
        }
        if data.len() > self.max_size {
            return Err(ServerError::ImageTooLarge {
                size: data.len(),
                max: self.max_size,
            });
        }

        let file_name = format!(
            "{}-{}.{}",
            Utc::now().timestamp_millis(),
            Uuid::new_v4().simple(),
            ext
        );
        let path = self.safe_path(&file_name)?;

        fs::write(&path, data).await.map_err(|e| {
            ServerError::Storage(format!("Failed to write image {}: {}", file_name, e))
        })?;

        debug!(file = %file_name, size = data.len(), "Stored image");
        Ok(StoredImage {
            url: format!("{UPLOADS_ROUTE}/{file_name}"),
            file_name,
        })
    }

    /// Resolve an `/uploads/...` URL to its file on disk.
    pub fn path_for_url(&self, url: &str) -> Result<PathBuf, ServerError> {
        let file_name = url
            .strip_prefix(UPLOADS_ROUTE)
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| ServerError::Validation(format!("Not an upload URL: {url}")))?;
        self.safe_path(file_name)
    }

    /// Remove a stored image. A file that is already gone is not an error.
    pub async fn remove_image(&self, url: &str) -> Result<(), ServerError> {
        let path = self.path_for_url(url)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = %path.display(), "Removed image");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ServerError::Storage(format!(
                "Failed to remove image {}: {}",
                path.display(),
                e
            ))),
        }
    }

    pub async fn usage(&self) -> Result<StoreUsage, ServerError> {
        let mut usage = StoreUsage::default();
        let mut entries = fs::read_dir(&self.base_path)
            .await
            .map_err(|e| ServerError::Storage(format!("Failed to list uploads: {}", e)))?;

        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            ServerError::Storage(format!("Failed to read directory entry: {}", e))
        })? {
            let meta = entry.metadata().await.map_err(|e| {
                ServerError::Storage(format!("Failed to stat upload: {}", e))
            })?;
            if meta.is_file() {
                usage.files += 1;
                usage.bytes += meta.len();
            }
        }

        Ok(usage)
    }

    /// Build a path for a single file name, rejecting separators and
    /// traversal.
    fn safe_path(&self, file_name: &str) -> Result<PathBuf, ServerError> {
        if file_name.is_empty()
            || file_name.contains('/')
            || file_name.contains('\\')
            || file_name.contains("..")
        {
            return Err(ServerError::Validation("Path traversal detected".to_string()));
        }
        ensure_within(&self.base_path, &self.base_path.join(file_name))
    }
}
