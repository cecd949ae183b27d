//! Argument parsing and output helpers for the `dossier` binary.

use std::collections::BTreeMap;
use std::path::PathBuf;

use dossier_core::{AttachmentEntry, PendingFile, Record, RecordSchema, UpdatePayload};
use serde_json::{json, Map, Value};

/// `--remove` target: a slot and, for multi-file slots, a position in its current list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal {
    pub slot: String,
    pub index: Option<usize>,
}

/// Parses `name=value`. The value may itself contain `=`.
pub fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing name in '{}'", raw));
    }
    Ok((name.to_string(), value.to_string()))
}

/// Parses `slot=path` into a slot name and a file selected from disk.
pub fn parse_file_selection(raw: &str) -> Result<(String, PathBuf), String> {
    let (slot, path) = parse_assignment(raw)?;
    if path.trim().is_empty() {
        return Err(format!("missing path in '{}'", raw));
    }
    Ok((slot, PathBuf::from(path)))
}

/// Parses `slot` or `slot:index`.
pub fn parse_removal(raw: &str) -> Result<Removal, String> {
    let (slot, index) = match raw.split_once(':') {
        Some((slot, index)) => {
            let index = index
                .trim()
                .parse::<usize>()
                .map_err(|_| format!("invalid index in '{}'", raw))?;
            (slot, Some(index))
        }
        None => (raw, None),
    };
    let slot = slot.trim();
    if slot.is_empty() {
        return Err(format!("missing slot in '{}'", raw));
    }
    Ok(Removal {
        slot: slot.to_string(),
        index,
    })
}

/// Groups `--file` selections per slot, keeping command-line order within a slot.
pub fn group_selections(selections: Vec<(String, PathBuf)>) -> BTreeMap<String, Vec<PendingFile>> {
    let mut grouped: BTreeMap<String, Vec<PendingFile>> = BTreeMap::new();
    for (slot, path) in selections {
        grouped
            .entry(slot)
            .or_default()
            .push(PendingFile::from_path(path));
    }
    grouped
}

/// The record as `show` prints it: fields and the stored files of every slot.
pub fn record_json(schema: &RecordSchema, record: &Record) -> Value {
    let mut documents = Map::new();
    for def in &schema.slots {
        let files: Vec<Value> = record
            .slot(def.name)
            .map(|slot| {
                slot.kept_existing()
                    .into_iter()
                    .map(|(_, file)| json!({ "name": file.display_name, "path": file.path }))
                    .collect()
            })
            .unwrap_or_default();
        documents.insert(def.name.to_string(), Value::Array(files));
    }

    json!({
        "kind": schema.kind,
        "id": record.record_id,
        "userId": record.user_id,
        "fields": record.fields(),
        "documents": documents,
    })
}

/// What a submit would send, without file contents.
pub fn payload_json(payload: &UpdatePayload) -> Value {
    let fields: Map<String, Value> = payload
        .fields
        .iter()
        .map(|(name, value)| (name.clone(), Value::String(value.clone())))
        .collect();
    let attachments: Vec<Value> = payload
        .attachments
        .iter()
        .map(|entry| match entry {
            AttachmentEntry::Upload { slot, file } => {
                json!({ "slot": slot, "upload": file.display_name })
            }
            AttachmentEntry::Keep { slot } => json!({ "slot": slot, "keep": true }),
            AttachmentEntry::KeepIndex { slot, index } => {
                json!({ "slot": slot, "keepIndex": index })
            }
        })
        .collect();

    json!({ "fields": fields, "attachments": attachments })
}

/// Initialize tracing for the CLI. Logs go to stderr so stdout stays machine-readable.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}
