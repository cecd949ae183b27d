//! Conversion of a transport-agnostic message into a reqwest multipart form.
//!
//! Files selected from disk are opened here and streamed into the request body, so a
//! pending selection costs nothing until it is sent and is read afresh on every attempt.

use dossier_core::{BinaryHandle, MessagePart, MultipartMessage, PartValue, PendingFile, TransportError};
use reqwest::multipart::{Form, Part};
use reqwest::Body;
use tokio_util::io::ReaderStream;

pub async fn to_form(message: MultipartMessage) -> Result<Form, TransportError> {
    let mut form = Form::new();
    for MessagePart { name, value } in message {
        form = match value {
            PartValue::Text(text) => form.text(name, text),
            PartValue::File(file) => form.part(name, file_part(file).await?),
        };
    }
    Ok(form)
}

async fn file_part(file: PendingFile) -> Result<Part, TransportError> {
    let content_type = file.content_type();
    let PendingFile {
        display_name,
        handle,
    } = file;
    let attachment_error = |reason: String| TransportError::Attachment {
        name: display_name.clone(),
        reason,
    };

    let part = match handle {
        BinaryHandle::Path(path) => {
            let file = tokio::fs::File::open(&path)
                .await
                .map_err(|e| attachment_error(e.to_string()))?;
            let length = file
                .metadata()
                .await
                .map_err(|e| attachment_error(e.to_string()))?
                .len();
            tracing::debug!(path = %path.display(), size_bytes = length, "Streaming attachment");
            Part::stream_with_length(Body::wrap_stream(ReaderStream::new(file)), length)
        }
        BinaryHandle::Memory(bytes) => Part::bytes(bytes.to_vec()),
    };

    part.file_name(display_name.clone())
        .mime_str(content_type)
        .map_err(|e| attachment_error(e.to_string()))
}
