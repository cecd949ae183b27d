//! Reconciliation engine
//!
//! Turns a record (fields, stored files, pending files, removals) into the minimal
//! update the server needs. Stored files that survive the edit are referenced by a
//! keep marker instead of being uploaded again; only pending files carry bytes.
//!
//! Single slot:   pending → upload | kept existing → keep marker | neither → nothing (clear)
//! Multiple slot: every pending file uploaded + one keep marker per surviving original index

use std::collections::BTreeMap;

use crate::models::{PendingFile, Record, RecordSchema, StoredFile};
use crate::validation::{
    missing_attachment, validate_fields, validate_file_type, ValidationError, ValidationErrors,
};

#[derive(Debug, Clone, PartialEq)]
pub enum AttachmentEntry {
    /// New bytes for the slot.
    Upload { slot: String, file: PendingFile },
    /// Retain the stored file of a single-file slot.
    Keep { slot: String },
    /// Retain the stored file at `index` (server storage order) of a multi-file slot.
    KeepIndex { slot: String, index: usize },
}

impl AttachmentEntry {
    pub fn slot(&self) -> &str {
        match self {
            AttachmentEntry::Upload { slot, .. }
            | AttachmentEntry::Keep { slot }
            | AttachmentEntry::KeepIndex { slot, .. } => slot,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdatePayload {
    /// Scalar fields in schema order, values verbatim.
    pub fields: Vec<(String, String)>,
    pub attachments: Vec<AttachmentEntry>,
}

impl UpdatePayload {
    pub fn uploads(&self, slot: &str) -> Vec<&PendingFile> {
        self.attachments
            .iter()
            .filter_map(|entry| match entry {
                AttachmentEntry::Upload { slot: s, file } if s == slot => Some(file),
                _ => None,
            })
            .collect()
    }

    pub fn keeps(&self, slot: &str) -> bool {
        self.attachments
            .iter()
            .any(|entry| matches!(entry, AttachmentEntry::Keep { slot: s } if s == slot))
    }

    pub fn kept_indices(&self, slot: &str) -> Vec<usize> {
        self.attachments
            .iter()
            .filter_map(|entry| match entry {
                AttachmentEntry::KeepIndex { slot: s, index } if s == slot => Some(*index),
                _ => None,
            })
            .collect()
    }

    pub fn upload_count(&self) -> usize {
        self.attachments
            .iter()
            .filter(|entry| matches!(entry, AttachmentEntry::Upload { .. }))
            .count()
    }

    pub fn keep_count(&self) -> usize {
        self.attachments.len() - self.upload_count()
    }
}

/// What a slot will hold once the server applies the payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectedSlot {
    pub kept: Vec<StoredFile>,
    /// Display names of the files about to be uploaded.
    pub incoming: Vec<String>,
}

impl ProjectedSlot {
    pub fn is_empty(&self) -> bool {
        self.kept.is_empty() && self.incoming.is_empty()
    }

    pub fn len(&self) -> usize {
        self.kept.len() + self.incoming.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub payload: UpdatePayload,
    pub projection: BTreeMap<String, ProjectedSlot>,
}

/// Computes the update payload for `record`, or every validation problem it has.
///
/// Pure: the same record always yields the same payload or the same errors.
pub fn reconcile(schema: &RecordSchema, record: &Record) -> Result<Reconciliation, ValidationErrors> {
    let mut errors = validate_fields(schema, record.fields());
    let mut attachments = Vec::new();
    let mut projection = BTreeMap::new();

    for def in &schema.slots {
        let Some(slot) = record.slot(def.name) else {
            if def.is_required() {
                errors.push(missing_attachment(def));
            }
            projection.insert(def.name.to_string(), ProjectedSlot::default());
            continue;
        };

        let pending = slot.pending_files();
        for file in &pending {
            if let Err(err) = validate_file_type(def, &file.display_name) {
                errors.push(err);
            }
        }

        let mut projected = ProjectedSlot::default();
        let kept = slot.kept_existing();

        if !pending.is_empty() {
            projected.incoming = pending.iter().map(|f| f.display_name.clone()).collect();
            attachments.extend(pending.iter().map(|file| AttachmentEntry::Upload {
                slot: def.name.to_string(),
                file: (*file).clone(),
            }));
        }

        for (origin, file) in kept {
            match origin {
                // A pending file replaces a single slot's stored file.
                None if !pending.is_empty() => {}
                None => {
                    attachments.push(AttachmentEntry::Keep {
                        slot: def.name.to_string(),
                    });
                    projected.kept.push(file.clone());
                }
                Some(index) => {
                    attachments.push(AttachmentEntry::KeepIndex {
                        slot: def.name.to_string(),
                        index,
                    });
                    projected.kept.push(file.clone());
                }
            }
        }

        if def.is_required() && projected.is_empty() {
            errors.push(missing_attachment(def));
        }
        projection.insert(def.name.to_string(), projected);
    }

    if !errors.is_empty() {
        return Err(ValidationErrors::new(errors));
    }

    let fields = schema
        .fields
        .iter()
        .map(|def| {
            let value = record.field(def.name).unwrap_or_default().to_string();
            (def.name.to_string(), value)
        })
        .collect();

    Ok(Reconciliation {
        payload: UpdatePayload {
            fields,
            attachments,
        },
        projection,
    })
}

/// Errors only, for previews that do not need the payload.
pub fn validate(schema: &RecordSchema, record: &Record) -> Vec<ValidationError> {
    match reconcile(schema, record) {
        Ok(_) => Vec::new(),
        Err(errors) => errors.into_vec(),
    }
}
