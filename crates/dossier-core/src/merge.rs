//! Server-side interpretation of a record update
//!
//! The counterpart of the reconciliation engine: given the stored record and a decoded
//! update (fields, new uploads, keep markers), produce the new stored record and the
//! files it no longer references.
//!
//! Single slot:   upload → replaces | keep marker → retained | neither → cleared
//! Multiple slot: stored items whose original index is kept (storage order), then uploads

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::adapter::SaveAction;
use crate::error::AppError;
use crate::message::{KEEP_SINGLE_VALUE, RECORD_ID_PART, USER_ID_PART};
use crate::models::{Cardinality, RecordSchema, StoredFile};
use crate::validation::{missing_attachment, validate_fields, ValidationErrors};

/// A record as the server persists it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub id: Uuid,
    pub user_id: String,
    pub fields: BTreeMap<String, String>,
    pub documents: BTreeMap<String, Vec<StoredFile>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredRecord {
    /// Every file the record references, across all slots.
    pub fn files(&self) -> impl Iterator<Item = &StoredFile> {
        self.documents.values().flatten()
    }

    /// `data` object of a response: scalar fields plus a `documents` object.
    /// Single slots are an object or null, multiple slots an array.
    pub fn data_json(&self, schema: &RecordSchema) -> Value {
        let mut data = Map::new();
        data.insert("id".to_string(), json!(self.id));
        data.insert("userId".to_string(), json!(self.user_id));
        for def in &schema.fields {
            let value = self.fields.get(def.name).cloned().unwrap_or_default();
            data.insert(def.name.to_string(), Value::String(value));
        }

        let mut documents = Map::new();
        for def in &schema.slots {
            let files = self.documents.get(def.name).map(Vec::as_slice).unwrap_or_default();
            let value = match def.cardinality {
                Cardinality::Single => files.first().map_or(Value::Null, |f| json!(f)),
                Cardinality::Multiple => json!(files),
            };
            documents.insert(def.name.to_string(), value);
        }
        data.insert("documents".to_string(), Value::Object(documents));
        data.insert("createdAt".to_string(), json!(self.created_at));
        data.insert("updatedAt".to_string(), json!(self.updated_at));
        Value::Object(data)
    }

    /// Envelope returned by the fetch endpoint.
    pub fn envelope(&self, schema: &RecordSchema) -> Value {
        json!({
            "success": true,
            "id": self.id,
            "data": self.data_json(schema),
        })
    }

    /// Required fields, field formats and required slots of the stored state.
    pub fn validate(&self, schema: &RecordSchema) -> Result<(), ValidationErrors> {
        let mut errors = validate_fields(schema, &self.fields);
        for def in schema.slots.iter().filter(|s| s.is_required()) {
            let empty = self.documents.get(def.name).map_or(true, Vec::is_empty);
            if empty {
                errors.push(missing_attachment(def));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors::new(errors))
        }
    }
}

/// An update request after its multi-part body has been decoded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedUpdate {
    pub user_id: Option<String>,
    pub record_id: Option<String>,
    pub fields: BTreeMap<String, String>,
    pub uploads: BTreeMap<String, Vec<StoredFile>>,
    pub keep_single: BTreeSet<String>,
    pub keep_indices: BTreeMap<String, BTreeSet<usize>>,
}

impl DecodedUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interprets one text part. Unknown names are ignored.
    pub fn accept_text(
        &mut self,
        schema: &RecordSchema,
        name: &str,
        value: String,
    ) -> Result<(), AppError> {
        if name == USER_ID_PART {
            self.user_id = Some(value);
            return Ok(());
        }
        if name == RECORD_ID_PART {
            self.record_id = Some(value).filter(|v| !v.is_empty());
            return Ok(());
        }
        if schema.field(name).is_some() {
            self.fields.insert(name.to_string(), value);
            return Ok(());
        }
        let Some(slot) = schema.slot_for_keep_marker(name) else {
            tracing::warn!(part = %name, "Ignoring unknown form part");
            return Ok(());
        };

        match slot.cardinality {
            Cardinality::Single => {
                if value.trim().eq_ignore_ascii_case(KEEP_SINGLE_VALUE) {
                    self.keep_single.insert(slot.name.to_string());
                }
            }
            Cardinality::Multiple => {
                let index = value.trim().parse::<usize>().map_err(|_| {
                    AppError::BadRequest(format!("Invalid index '{}' for {}", value, name))
                })?;
                self.keep_indices
                    .entry(slot.name.to_string())
                    .or_default()
                    .insert(index);
            }
        }
        Ok(())
    }

    pub fn add_upload(&mut self, slot: &str, file: StoredFile) {
        self.uploads.entry(slot.to_string()).or_default().push(file);
    }

    /// Every file newly written for this update.
    pub fn uploaded_files(&self) -> impl Iterator<Item = &StoredFile> {
        self.uploads.values().flatten()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub record: StoredRecord,
    /// Stored files the new record no longer references.
    pub released: Vec<StoredFile>,
    pub action: SaveAction,
}

/// Applies `update` to `existing` (or creates a record when there is none).
pub fn apply_update(
    schema: &RecordSchema,
    user_id: &str,
    existing: Option<StoredRecord>,
    update: DecodedUpdate,
    now: DateTime<Utc>,
) -> MergeOutcome {
    let (mut record, action) = match existing {
        Some(record) => (record, SaveAction::Updated),
        None => (
            StoredRecord {
                id: Uuid::new_v4(),
                user_id: user_id.to_string(),
                fields: schema
                    .fields
                    .iter()
                    .map(|def| (def.name.to_string(), String::new()))
                    .collect(),
                documents: BTreeMap::new(),
                created_at: now,
                updated_at: now,
            },
            SaveAction::Created,
        ),
    };

    let DecodedUpdate {
        fields,
        mut uploads,
        keep_single,
        keep_indices,
        ..
    } = update;

    for (name, value) in fields {
        record.fields.insert(name, value);
    }

    let mut released = Vec::new();
    for def in &schema.slots {
        let stored = record.documents.remove(def.name).unwrap_or_default();
        let incoming = uploads.remove(def.name).unwrap_or_default();

        let next = match def.cardinality {
            Cardinality::Single => {
                if let Some(upload) = incoming.into_iter().next() {
                    released.extend(stored);
                    vec![upload]
                } else if keep_single.contains(def.name) {
                    stored
                } else {
                    released.extend(stored);
                    Vec::new()
                }
            }
            Cardinality::Multiple => {
                let kept = keep_indices.get(def.name);
                if let Some(indices) = kept {
                    if let Some(&bad) = indices.iter().find(|&&i| i >= stored.len()) {
                        tracing::warn!(
                            slot = %def.name,
                            index = bad,
                            stored = stored.len(),
                            "Ignoring keep marker beyond stored files"
                        );
                    }
                }
                let mut next = Vec::with_capacity(stored.len() + incoming.len());
                for (index, file) in stored.into_iter().enumerate() {
                    if kept.is_some_and(|set| set.contains(&index)) {
                        next.push(file);
                    } else {
                        released.push(file);
                    }
                }
                next.extend(incoming);
                next
            }
        };

        if !next.is_empty() {
            record.documents.insert(def.name.to_string(), next);
        }
    }

    record.updated_at = now;
    MergeOutcome {
        record,
        released,
        action,
    }
}
