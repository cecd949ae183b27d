//! Transport-agnostic multi-part message
//!
//! The flattened name → value form a record submission travels in. Repeated names
//! are allowed and meaningful (several uploads or keep markers for one slot).

use crate::models::PendingFile;

/// Name of the form part that carries the owning user's identifier.
pub const USER_ID_PART: &str = "userId";
/// Name of the form part that carries the record identifier, when one is known.
pub const RECORD_ID_PART: &str = "id";
/// Value of the keep marker for single-file slots.
pub const KEEP_SINGLE_VALUE: &str = "true";

/// Keep-marker part name for a slot: `resume` → `keepResume`.
pub fn keep_marker_name(slot: &str) -> String {
    let mut chars = slot.chars();
    match chars.next() {
        Some(first) => format!("keep{}{}", first.to_uppercase(), chars.as_str()),
        None => "keep".to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PartValue {
    Text(String),
    File(PendingFile),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessagePart {
    pub name: String,
    pub value: PartValue,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultipartMessage {
    parts: Vec<MessagePart>,
}

impl MultipartMessage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_text(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.parts.push(MessagePart {
            name: name.into(),
            value: PartValue::Text(value.into()),
        });
    }

    pub fn push_file(&mut self, name: impl Into<String>, file: PendingFile) {
        self.parts.push(MessagePart {
            name: name.into(),
            value: PartValue::File(file),
        });
    }

    pub fn parts(&self) -> &[MessagePart] {
        &self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// All text values sent under `name`, in order.
    pub fn texts(&self, name: &str) -> Vec<&str> {
        self.parts
            .iter()
            .filter(|p| p.name == name)
            .filter_map(|p| match &p.value {
                PartValue::Text(text) => Some(text.as_str()),
                PartValue::File(_) => None,
            })
            .collect()
    }

    /// All files sent under `name`, in order.
    pub fn files(&self, name: &str) -> Vec<&PendingFile> {
        self.parts
            .iter()
            .filter(|p| p.name == name)
            .filter_map(|p| match &p.value {
                PartValue::File(file) => Some(file),
                PartValue::Text(_) => None,
            })
            .collect()
    }

    pub fn file_count(&self) -> usize {
        self.parts
            .iter()
            .filter(|p| matches!(p.value, PartValue::File(_)))
            .count()
    }
}

impl IntoIterator for MultipartMessage {
    type Item = MessagePart;
    type IntoIter = std::vec::IntoIter<MessagePart>;

    fn into_iter(self) -> Self::IntoIter {
        self.parts.into_iter()
    }
}
