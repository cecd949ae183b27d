//! Submission adapter
//!
//! Serializes a reconciled payload into a multi-part message, sends it through the
//! transport and interprets the server's create-or-update answer.

use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;

use crate::error::{FetchError, SubmissionError, GENERIC_SAVE_FAILURE};
use crate::message::{keep_marker_name, MultipartMessage, KEEP_SINGLE_VALUE, RECORD_ID_PART, USER_ID_PART};
use crate::models::{Record, RecordSchema, ServerRecord, StoredFile};
use crate::reconcile::{AttachmentEntry, UpdatePayload};
use crate::transport::{RecordTransport, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveAction {
    Created,
    Updated,
}

impl SaveAction {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "created" => Some(SaveAction::Created),
            "updated" => Some(SaveAction::Updated),
            _ => None,
        }
    }

    fn default_message(&self) -> &'static str {
        match self {
            SaveAction::Created => "Details saved successfully",
            SaveAction::Updated => "Details updated successfully",
        }
    }
}

/// The server's acknowledgement of a successful save.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitReceipt {
    pub action: SaveAction,
    pub message: String,
    /// The record as the server now stores it.
    pub record: ServerRecord,
}

pub struct SubmissionAdapter<T: RecordTransport + ?Sized> {
    transport: Arc<T>,
}

impl<T: RecordTransport + ?Sized> Clone for SubmissionAdapter<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<T: RecordTransport + ?Sized> SubmissionAdapter<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Flattens the payload: identity parts, scalar fields, then attachments.
    pub fn encode(record: &Record, payload: &UpdatePayload) -> MultipartMessage {
        let mut message = MultipartMessage::new();
        message.push_text(USER_ID_PART, record.user_id.as_str());
        if let Some(id) = &record.record_id {
            message.push_text(RECORD_ID_PART, id.as_str());
        }
        for (name, value) in &payload.fields {
            message.push_text(name.as_str(), value.as_str());
        }
        for entry in &payload.attachments {
            match entry {
                AttachmentEntry::Upload { slot, file } => {
                    message.push_file(slot.as_str(), file.clone());
                }
                AttachmentEntry::Keep { slot } => {
                    message.push_text(keep_marker_name(slot), KEEP_SINGLE_VALUE);
                }
                AttachmentEntry::KeepIndex { slot, index } => {
                    message.push_text(keep_marker_name(slot), index.to_string());
                }
            }
        }
        message
    }

    pub async fn submit(
        &self,
        schema: &RecordSchema,
        record: &Record,
        payload: &UpdatePayload,
    ) -> Result<SubmitReceipt, SubmissionError> {
        let message = Self::encode(record, payload);
        tracing::info!(
            kind = %schema.kind,
            user_id = %record.user_id,
            record_id = ?record.record_id,
            uploads = payload.upload_count(),
            keeps = payload.keep_count(),
            "Submitting record"
        );

        let response = self
            .transport
            .submit_record(&schema.endpoints, message)
            .await
            .map_err(|e| {
                tracing::warn!(kind = %schema.kind, error = %e, "Record submission failed");
                SubmissionError::from(e)
            })?;

        if response.get("success").and_then(Value::as_bool) == Some(false) {
            let message = response_message(&response).unwrap_or(GENERIC_SAVE_FAILURE);
            return Err(SubmissionError::Rejected(message.to_string()));
        }

        let action = response
            .get("action")
            .and_then(Value::as_str)
            .and_then(SaveAction::parse)
            .unwrap_or(match record.record_id {
                Some(_) => SaveAction::Updated,
                None => SaveAction::Created,
            });
        let message = response_message(&response)
            .unwrap_or(action.default_message())
            .to_string();

        let server_record = match response.get("data") {
            Some(Value::Object(_)) => ServerRecord::from_envelope(schema, &response)?,
            _ => {
                // Some endpoints acknowledge without echoing the record.
                tracing::debug!(kind = %schema.kind, "Save response carried no record, re-fetching");
                match fetch_record(self.transport.as_ref(), schema, &record.user_id).await {
                    Ok(Some(server)) => server,
                    Ok(None) => {
                        return Err(SubmissionError::MalformedResponse(
                            "record missing after save".to_string(),
                        ))
                    }
                    Err(e) => return Err(SubmissionError::MalformedResponse(e.to_string())),
                }
            }
        };

        tracing::info!(
            kind = %schema.kind,
            user_id = %record.user_id,
            action = ?action,
            "Record saved"
        );

        Ok(SubmitReceipt {
            action,
            message,
            record: server_record,
        })
    }

    pub async fn fetch(
        &self,
        schema: &RecordSchema,
        user_id: &str,
    ) -> Result<Option<ServerRecord>, FetchError> {
        fetch_record(self.transport.as_ref(), schema, user_id).await
    }

    /// Downloads a stored file's bytes.
    pub async fn download(&self, file: &StoredFile) -> Result<Bytes, TransportError> {
        self.transport.fetch_binary(&file.url_path()).await
    }
}

fn response_message(response: &Value) -> Option<&str> {
    ["message", "error"]
        .into_iter()
        .find_map(|key| response.get(key).and_then(Value::as_str))
        .filter(|m| !m.trim().is_empty())
}

/// Fetches and normalizes a user's record. `None` when the server has no record.
pub async fn fetch_record<T: RecordTransport + ?Sized>(
    transport: &T,
    schema: &RecordSchema,
    user_id: &str,
) -> Result<Option<ServerRecord>, FetchError> {
    let envelope = match transport.fetch_record(&schema.endpoints, user_id).await {
        Ok(envelope) => envelope,
        Err(e) => {
            return match FetchError::from(e) {
                FetchError::NotFound => Ok(None),
                other => Err(other),
            }
        }
    };

    if envelope.get("success").and_then(Value::as_bool) == Some(false) {
        return Ok(None);
    }
    match envelope.get("data") {
        None | Some(Value::Null) => Ok(None),
        Some(_) => Ok(Some(ServerRecord::from_envelope(schema, &envelope)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::PartValue;
    use crate::models::PendingFile;
    use crate::reconcile::reconcile;
    use crate::testing::MockTransport;
    use serde_json::json;

    fn loaded_company() -> Record {
        let schema = RecordSchema::company();
        let envelope = json!({
            "id": "rec-9",
            "data": {
                "companyName": "Acme",
                "jobTitle": "Engineer",
                "employmentPeriod": "2020-2023",
                "salary": "85000",
                "documents": {
                    "appointmentLetter": "uploads/a1.pdf",
                    "payslips": ["uploads/p1.pdf", "uploads/p2.pdf", "uploads/p3.pdf"]
                }
            }
        });
        let server = ServerRecord::from_envelope(&schema, &envelope).unwrap();
        Record::from_server(&schema, "user-7", server)
    }

    #[test]
    fn encode_orders_identity_fields_then_attachments() {
        let schema = RecordSchema::company();
        let mut record = loaded_company();
        let payslips = record.slot_mut("payslips").unwrap();
        payslips.mark_existing_removed(Some(0)).unwrap();
        payslips.select_pending(vec![PendingFile::in_memory("p4.pdf", "4")]);

        let payload = reconcile(&schema, &record).unwrap().payload;
        let message = SubmissionAdapter::<MockTransport>::encode(&record, &payload);

        let names: Vec<_> = message.parts().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(&names[..2], &["userId", "id"]);
        assert_eq!(&names[2..6], &["companyName", "jobTitle", "employmentPeriod", "salary"]);
        assert_eq!(message.texts("keepAppointmentLetter"), vec!["true"]);
        assert_eq!(message.texts("keepPayslips"), vec!["1", "2"]);
        assert_eq!(message.files("payslips")[0].display_name, "p4.pdf");
        assert!(message.files("appointmentLetter").is_empty());
    }

    #[test]
    fn new_record_omits_id_part() {
        let schema = RecordSchema::personal();
        let mut record = Record::empty(&schema, "user-1");
        for field in ["degree", "institution", "graduationYear", "portfolioLink"] {
            record.set_field(field, "x");
        }
        record
            .slot_mut("resume")
            .unwrap()
            .select_pending(vec![PendingFile::in_memory("cv.pdf", "cv")]);
        let payload = reconcile(&schema, &record).unwrap().payload;

        let message = SubmissionAdapter::<MockTransport>::encode(&record, &payload);
        assert!(message.texts("id").is_empty());
        assert_eq!(message.texts("userId"), vec!["user-1"]);
        assert!(matches!(
            message.parts().last().map(|p| &p.value),
            Some(PartValue::File(_))
        ));
    }

    #[tokio::test]
    async fn submit_reads_action_and_echoed_record() {
        let schema = RecordSchema::company();
        let record = loaded_company();
        let transport = Arc::new(MockTransport::new().on_submit(Ok(json!({
            "success": true,
            "action": "updated",
            "message": "Company details updated",
            "id": "rec-9",
            "data": {
                "companyName": "Acme",
                "documents": { "appointmentLetter": "uploads/a1.pdf" }
            }
        }))));
        let adapter = SubmissionAdapter::new(Arc::clone(&transport));

        let payload = reconcile(&schema, &record).unwrap().payload;
        let receipt = adapter.submit(&schema, &record, &payload).await.unwrap();

        assert_eq!(receipt.action, SaveAction::Updated);
        assert_eq!(receipt.message, "Company details updated");
        assert_eq!(receipt.record.id.as_deref(), Some("rec-9"));
        assert_eq!(transport.submitted().len(), 1);
        assert_eq!(transport.fetch_count(), 0);
    }

    #[tokio::test]
    async fn submit_without_data_refetches() {
        let schema = RecordSchema::company();
        let record = loaded_company();
        let transport = Arc::new(
            MockTransport::new()
                .on_submit(Ok(json!({ "message": "Saved" })))
                .on_fetch(Ok(json!({ "data": { "companyName": "Acme" } }))),
        );
        let adapter = SubmissionAdapter::new(Arc::clone(&transport));

        let payload = reconcile(&schema, &record).unwrap().payload;
        let receipt = adapter.submit(&schema, &record, &payload).await.unwrap();
        assert_eq!(receipt.action, SaveAction::Updated);
        assert_eq!(receipt.message, "Saved");
        assert_eq!(transport.fetch_count(), 1);
    }

    #[tokio::test]
    async fn success_false_is_a_rejection() {
        let schema = RecordSchema::company();
        let record = loaded_company();
        let transport = Arc::new(
            MockTransport::new()
                .on_submit(Ok(json!({ "success": false, "message": "User not found" }))),
        );
        let adapter = SubmissionAdapter::new(transport);

        let payload = reconcile(&schema, &record).unwrap().payload;
        let err = adapter.submit(&schema, &record, &payload).await.unwrap_err();
        assert_eq!(err, SubmissionError::Rejected("User not found".to_string()));
    }

    #[tokio::test]
    async fn status_error_without_body_is_generic() {
        let schema = RecordSchema::company();
        let record = loaded_company();
        let transport = Arc::new(MockTransport::new().on_submit(Err(TransportError::Status {
            status: 502,
            body: None,
        })));
        let adapter = SubmissionAdapter::new(transport);

        let payload = reconcile(&schema, &record).unwrap().payload;
        let err = adapter.submit(&schema, &record, &payload).await.unwrap_err();
        assert_eq!(err.user_message(), GENERIC_SAVE_FAILURE);
    }

    #[tokio::test]
    async fn fetch_treats_missing_record_as_none() {
        let schema = RecordSchema::personal();

        let transport = MockTransport::new();
        assert_eq!(fetch_record(&transport, &schema, "u").await, Ok(None));

        let transport = MockTransport::new().on_fetch(Ok(json!({ "success": false })));
        assert_eq!(fetch_record(&transport, &schema, "u").await, Ok(None));

        let transport = MockTransport::new().on_fetch(Ok(json!({ "data": null })));
        assert_eq!(fetch_record(&transport, &schema, "u").await, Ok(None));

        let transport =
            MockTransport::new().on_fetch(Err(TransportError::Network("refused".to_string())));
        assert!(matches!(
            fetch_record(&transport, &schema, "u").await,
            Err(FetchError::Other(_))
        ));
    }
}
