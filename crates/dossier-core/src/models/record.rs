use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

use super::file::StoredFile;
use super::schema::RecordSchema;
use super::slot::AttachmentSlot;

/// Document value as the server sends it: a bare path or an object with a path.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum DocumentRef {
    Path(String),
    Object {
        path: String,
        #[serde(default)]
        name: Option<String>,
    },
}

impl From<DocumentRef> for StoredFile {
    fn from(value: DocumentRef) -> Self {
        match value {
            DocumentRef::Path(path) => StoredFile::from_path(path),
            DocumentRef::Object {
                path,
                name: Some(name),
            } if !name.is_empty() => StoredFile::named(path, name),
            DocumentRef::Object { path, .. } => StoredFile::from_path(path),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordParseError {
    #[error("response has no record data")]
    MissingData,

    #[error("invalid value for document {slot}: {reason}")]
    InvalidDocument { slot: String, reason: String },
}

/// Normalized server representation of a record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerRecord {
    pub id: Option<String>,
    pub fields: BTreeMap<String, String>,
    pub documents: BTreeMap<String, Vec<StoredFile>>,
}

impl ServerRecord {
    /// Reads a response envelope of the form `{ "id": .., "data": { .. } }`.
    ///
    /// Fields and documents are picked by the schema; documents may sit under
    /// `data.documents.<slot>` or directly under `data.<slot>`.
    pub fn from_envelope(schema: &RecordSchema, envelope: &Value) -> Result<Self, RecordParseError> {
        let data = match envelope.get("data") {
            Some(data @ Value::Object(_)) => data,
            _ => return Err(RecordParseError::MissingData),
        };

        let id = [envelope.get("id"), data.get("id"), data.get("_id")]
            .into_iter()
            .flatten()
            .find_map(scalar_to_string);

        let fields = schema
            .fields
            .iter()
            .map(|def| {
                let value = data.get(def.name).and_then(scalar_to_string).unwrap_or_default();
                (def.name.to_string(), value)
            })
            .collect();

        let documents_object = data.get("documents");
        let mut documents = BTreeMap::new();
        for slot in &schema.slots {
            let raw = documents_object
                .and_then(|docs| docs.get(slot.name))
                .or_else(|| data.get(slot.name));
            documents.insert(slot.name.to_string(), parse_documents(slot.name, raw)?);
        }

        Ok(Self {
            id,
            fields,
            documents,
        })
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn parse_documents(slot: &str, raw: Option<&Value>) -> Result<Vec<StoredFile>, RecordParseError> {
    let invalid = |err: serde_json::Error| RecordParseError::InvalidDocument {
        slot: slot.to_string(),
        reason: err.to_string(),
    };
    match raw {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(s)) if s.is_empty() => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .filter(|item| !item.is_null())
            .map(|item| {
                DocumentRef::deserialize(item)
                    .map(StoredFile::from)
                    .map_err(invalid)
            })
            .collect(),
        Some(value) => DocumentRef::deserialize(value)
            .map(|doc| vec![StoredFile::from(doc)])
            .map_err(invalid),
    }
}

/// One user's profile record as edited locally.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Absent until the server has stored the record; submit then creates it.
    pub record_id: Option<String>,
    pub user_id: String,
    fields: BTreeMap<String, String>,
    slots: BTreeMap<String, AttachmentSlot>,
}

impl Record {
    /// No record exists yet for this user.
    pub fn empty(schema: &RecordSchema, user_id: impl Into<String>) -> Self {
        Self {
            record_id: None,
            user_id: user_id.into(),
            fields: schema
                .fields
                .iter()
                .map(|def| (def.name.to_string(), String::new()))
                .collect(),
            slots: schema
                .slots
                .iter()
                .map(|def| (def.name.to_string(), AttachmentSlot::empty(def)))
                .collect(),
        }
    }

    pub fn from_server(schema: &RecordSchema, user_id: impl Into<String>, server: ServerRecord) -> Self {
        let ServerRecord {
            id,
            mut fields,
            mut documents,
        } = server;
        Self {
            record_id: id,
            user_id: user_id.into(),
            fields: schema
                .fields
                .iter()
                .map(|def| {
                    let value = fields.remove(def.name).unwrap_or_default();
                    (def.name.to_string(), value)
                })
                .collect(),
            slots: schema
                .slots
                .iter()
                .map(|def| {
                    let files = documents.remove(def.name).unwrap_or_default();
                    (def.name.to_string(), AttachmentSlot::from_stored(def, files))
                })
                .collect(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    /// Returns false when the record has no such field.
    pub fn set_field(&mut self, name: &str, value: impl Into<String>) -> bool {
        match self.fields.get_mut(name) {
            Some(slot) => {
                *slot = value.into();
                true
            }
            None => false,
        }
    }

    pub fn slot(&self, name: &str) -> Option<&AttachmentSlot> {
        self.slots.get(name)
    }

    pub fn slot_mut(&mut self, name: &str) -> Option<&mut AttachmentSlot> {
        self.slots.get_mut(name)
    }

    pub fn slots(&self) -> impl Iterator<Item = &AttachmentSlot> {
        self.slots.values()
    }

    pub fn has_local_changes(&self) -> bool {
        self.slots.values().any(AttachmentSlot::has_local_changes)
    }
}
