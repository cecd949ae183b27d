use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A file already persisted server-side, known to the client only by its location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    pub path: String,
    #[serde(rename = "name")]
    pub display_name: String,
}

impl StoredFile {
    /// Display name is the final path segment.
    pub fn from_path(path: impl Into<String>) -> Self {
        let path = path.into();
        let display_name = final_segment(&path).to_string();
        Self { path, display_name }
    }

    /// Server sent an explicit name alongside the path.
    pub fn named(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            display_name: name.into(),
        }
    }

    /// Path with Windows separators normalized, suitable for a download URL.
    pub fn url_path(&self) -> String {
        normalize_separators(&self.path)
    }
}

/// Opaque handle to bytes that have not been uploaded yet.
#[derive(Debug, Clone, PartialEq)]
pub enum BinaryHandle {
    /// File on local disk; read when the submission is sent.
    Path(PathBuf),
    /// Bytes already held in memory.
    Memory(Bytes),
}

/// A locally selected, not-yet-uploaded file.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingFile {
    pub display_name: String,
    pub handle: BinaryHandle,
}

impl PendingFile {
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let display_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("file")
            .to_string();
        Self {
            display_name,
            handle: BinaryHandle::Path(path.to_path_buf()),
        }
    }

    pub fn in_memory(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            display_name: name.into(),
            handle: BinaryHandle::Memory(data.into()),
        }
    }

    /// Lowercased extension of the display name, without the dot.
    pub fn extension(&self) -> Option<String> {
        extension_of(&self.display_name)
    }

    pub fn content_type(&self) -> &'static str {
        content_type_for(&self.display_name)
    }
}

/// Final segment of a stored path. Stored paths may use either separator.
pub fn final_segment(path: &str) -> &str {
    path.rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(path)
}

pub fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}

pub fn extension_of(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// MIME type for the document formats accepted by profile slots.
pub fn content_type_for(name: &str) -> &'static str {
    match extension_of(name).as_deref() {
        Some("pdf") => "application/pdf",
        Some("doc") => "application/msword",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "application/octet-stream",
    }
}
