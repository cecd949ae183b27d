//! Fetch and create-or-update handlers for profile records.
//!
//! Both record kinds share these handlers; the route table passes the kind in.

use axum::extract::{Multipart, Query, State};
use axum::Json;
use chrono::Utc;
use dossier_core::validation::validate_file_type;
use dossier_core::{
    apply_update, AppError, Cardinality, DecodedUpdate, RecordKind, RecordSchema, SaveAction,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::HttpAppError;
use crate::state::AppState;
use crate::uploads::UploadStore;

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

pub async fn fetch_record(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
    kind: RecordKind,
) -> Result<Json<Value>, HttpAppError> {
    let user_id = query
        .user_id
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .ok_or_else(|| AppError::BadRequest("userId query parameter is required".to_string()))?;

    let schema = kind.schema();
    let record = state
        .repository
        .find(kind, &user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No {} details for user", kind)))?;

    Ok(Json(record.envelope(&schema)))
}

pub async fn submit_record(
    State(state): State<AppState>,
    multipart: Multipart,
    kind: RecordKind,
) -> Result<Json<Value>, HttpAppError> {
    let schema = kind.schema();
    let mut update = DecodedUpdate::new();

    let result = async {
        read_update(&state.uploads, &schema, multipart, &mut update).await?;
        save_update(&state, &schema, update.clone()).await
    }
    .await;

    match result {
        Ok(body) => Ok(Json(body)),
        Err(err) => {
            // nothing references this request's uploads yet
            state.uploads.discard(update.uploaded_files()).await;
            Err(err)
        }
    }
}

/// Decodes the multi-part body. Slot-named file parts are written to upload storage
/// as they arrive; every other part goes through the text interpretation.
async fn read_update(
    uploads: &UploadStore,
    schema: &RecordSchema,
    mut multipart: Multipart,
    update: &mut DecodedUpdate,
) -> Result<(), HttpAppError> {
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string).unwrap_or_default();

        let Some(slot) = schema.slot(&name) else {
            let value = field.text().await?;
            update.accept_text(schema, &name, value)?;
            continue;
        };

        let Some(file_name) = field
            .file_name()
            .map(str::to_string)
            .filter(|n| !n.trim().is_empty())
        else {
            tracing::debug!(slot = %name, "Skipping slot part without a file");
            continue;
        };

        validate_file_type(slot, &file_name)
            .map_err(|e| AppError::InvalidInput(e.to_string()))?;
        if slot.cardinality == Cardinality::Single
            && update.uploads.get(slot.name).is_some_and(|v| !v.is_empty())
        {
            return Err(AppError::BadRequest(format!(
                "Only one file may be uploaded for {}",
                slot.label
            ))
            .into());
        }

        let data = field.bytes().await?;
        if data.is_empty() {
            return Err(AppError::InvalidInput(format!("{} is empty", file_name)).into());
        }
        let stored = uploads.save(&file_name, data).await?;
        update.add_upload(slot.name, stored);
    }
    Ok(())
}

async fn save_update(
    state: &AppState,
    schema: &RecordSchema,
    update: DecodedUpdate,
) -> Result<Value, HttpAppError> {
    let user_id = update
        .user_id
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::InvalidInput("userId is required".to_string()))?;

    let _guard = state.submit_lock.lock().await;
    let existing = state.repository.find(schema.kind, &user_id).await?;

    if let (Some(record), Some(claimed)) = (&existing, update.record_id.as_deref()) {
        if record.id.to_string() != claimed {
            tracing::warn!(
                user_id = %user_id,
                stored_id = %record.id,
                claimed_id = %claimed,
                "Record id in update does not match stored record"
            );
        }
    }

    let upload_count = update.uploaded_files().count();
    let outcome = apply_update(schema, &user_id, existing, update, Utc::now());
    outcome.record.validate(schema).map_err(AppError::from)?;
    state
        .repository
        .save(schema.kind, outcome.record.clone())
        .await?;
    drop(_guard);

    state.uploads.discard(&outcome.released).await;

    tracing::info!(
        kind = %schema.kind,
        user_id = %user_id,
        record_id = %outcome.record.id,
        action = ?outcome.action,
        uploads = upload_count,
        released = outcome.released.len(),
        "Record saved"
    );

    Ok(json!({
        "success": true,
        "action": outcome.action,
        "message": save_message(schema.kind, outcome.action),
        "id": outcome.record.id,
        "data": outcome.record.data_json(schema),
    }))
}

fn save_message(kind: RecordKind, action: SaveAction) -> String {
    let subject = match kind {
        RecordKind::Personal => "Personal",
        RecordKind::Company => "Company",
    };
    let verb = match action {
        SaveAction::Created => "saved",
        SaveAction::Updated => "updated",
    };
    format!("{} details {} successfully", subject, verb)
}
