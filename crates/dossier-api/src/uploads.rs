//! Local upload storage
//!
//! Uploaded attachments are written to `{root}/{uuid}/{sanitized name}` and referenced
//! from records as `uploads/{uuid}/{sanitized name}`, which is also the URL they are
//! served under.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use dossier_core::models::final_segment;
use dossier_core::{AppError, StoredFile};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// URL prefix and stored-path prefix of every upload.
pub const UPLOADS_PREFIX: &str = "uploads";

const MAX_FILENAME_LENGTH: usize = 255;

#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self, AppError> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(|e| {
            AppError::Storage(format!(
                "Failed to create upload directory {}: {}",
                root.display(),
                e
            ))
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes one upload and returns the file as the record will reference it.
    pub async fn save(&self, original_name: &str, data: Bytes) -> Result<StoredFile, AppError> {
        let safe_name = sanitize_filename(original_name)?;
        let key = format!("{}/{}", Uuid::new_v4(), safe_name);
        let path = self.key_to_path(&key)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&path).await.map_err(|e| {
            AppError::Storage(format!("Failed to create file {}: {}", path.display(), e))
        })?;
        file.write_all(&data).await.map_err(|e| {
            AppError::Storage(format!("Failed to write file {}: {}", path.display(), e))
        })?;
        file.sync_all().await?;

        tracing::info!(
            key = %key,
            size_bytes = data.len(),
            "Stored upload"
        );

        Ok(StoredFile::named(
            format!("{}/{}", UPLOADS_PREFIX, key),
            final_segment(original_name),
        ))
    }

    /// Removes a stored file and its per-upload directory. A missing file is not an error.
    pub async fn delete(&self, file: &StoredFile) -> Result<(), AppError> {
        let normalized = file.url_path();
        let key = normalized
            .trim_start_matches('/')
            .strip_prefix(UPLOADS_PREFIX)
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| {
                AppError::InvalidInput(format!("Not an upload path: {}", file.path))
            })?;
        let path = self.key_to_path(key)?;

        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Upload already removed");
            }
            Err(e) => return Err(e.into()),
        }

        if let Some(parent) = path.parent() {
            if parent != self.root {
                let _ = fs::remove_dir(parent).await;
            }
        }
        Ok(())
    }

    /// Best-effort removal of files nothing references any more.
    pub async fn discard<'a>(&self, files: impl IntoIterator<Item = &'a StoredFile>) {
        for file in files {
            if let Err(e) = self.delete(file).await {
                tracing::warn!(path = %file.path, error = %e, "Failed to remove upload");
            }
        }
    }

    fn key_to_path(&self, key: &str) -> Result<PathBuf, AppError> {
        let bad_segment = key
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..");
        if bad_segment || key.contains('\\') {
            return Err(AppError::InvalidInput(
                "Upload key contains invalid characters".to_string(),
            ));
        }
        Ok(self.root.join(key))
    }
}

/// Sanitize an uploaded file name: final segment only, no traversal, safe characters.
///
/// Names longer than `MAX_FILENAME_LENGTH` bytes are cut on a character boundary,
/// keeping the extension.
pub fn sanitize_filename(filename: &str) -> Result<String, AppError> {
    let filename_only = final_segment(filename);

    if filename_only == "." || filename_only == ".." {
        return Err(AppError::InvalidInput(
            "Filename contains invalid path traversal".to_string(),
        ));
    }

    let sanitized: String = filename_only
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.is_empty() {
        return Ok("file".to_string());
    }
    if sanitized.len() <= MAX_FILENAME_LENGTH {
        return Ok(sanitized);
    }

    let (stem, extension) = match sanitized.rfind('.') {
        Some(dot) if dot > 0 && sanitized.len() - dot <= 16 => sanitized.split_at(dot),
        _ => (sanitized.as_str(), ""),
    };
    let mut end = MAX_FILENAME_LENGTH - extension.len();
    while !stem.is_char_boundary(end) {
        end -= 1;
    }
    Ok(format!("{}{}", &stem[..end], extension))
}
