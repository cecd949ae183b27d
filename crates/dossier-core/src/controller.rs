//! Record form controller
//!
//! Session-scoped owner of one record being edited. Personal and company forms use
//! the same controller; the schema decides fields, slots and endpoints.
//!
//! Edit operations are synchronous and take the state lock briefly. `submit` takes a
//! snapshot under the lock, releases it, and only then awaits the transport, so the
//! lock is never held across an await point. While a submit is in flight edits fail
//! with `FormError::SubmitInProgress`; the server's answer replaces the whole record.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;

use crate::adapter::{SaveAction, SubmissionAdapter};
use crate::error::{FetchError, FormError};
use crate::identity::IdentityProvider;
use crate::models::{PendingFile, Record, RecordSchema, StoredFile};
use crate::reconcile::{reconcile, Reconciliation};
use crate::transport::RecordTransport;
use crate::validation::ValidationErrors;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The server had a record; slots hold its stored files.
    Existing,
    /// No record yet; the first submit creates it.
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Saved { action: SaveAction, message: String },
    /// Nothing was sent.
    Invalid(ValidationErrors),
    /// Another submission is in flight; this call did nothing.
    AlreadySubmitting,
}

#[derive(Debug, Default)]
struct FormState {
    record: Option<Record>,
    /// Last state the server confirmed, used to discard edits.
    acknowledged: Option<Record>,
}

/// Clears the in-flight flag when dropped, including when the submit future is dropped.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct RecordFormController<T: RecordTransport + ?Sized> {
    schema: RecordSchema,
    adapter: SubmissionAdapter<T>,
    state: Mutex<FormState>,
    submitting: AtomicBool,
}

impl<T: RecordTransport + ?Sized> RecordFormController<T> {
    pub fn new(schema: RecordSchema, transport: Arc<T>) -> Self {
        Self {
            schema,
            adapter: SubmissionAdapter::new(transport),
            state: Mutex::new(FormState::default()),
            submitting: AtomicBool::new(false),
        }
    }

    pub fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    fn lock(&self) -> MutexGuard<'_, FormState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_record<R>(
        &self,
        edit: impl FnOnce(&mut Record) -> Result<R, FormError>,
    ) -> Result<R, FormError> {
        let mut state = self.lock();
        self.ensure_idle()?;
        let record = state.record.as_mut().ok_or(FormError::NotLoaded)?;
        edit(record)
    }

    fn ensure_idle(&self) -> Result<(), FormError> {
        if self.is_submitting() {
            return Err(FormError::SubmitInProgress);
        }
        Ok(())
    }

    /// Loads the record for `user_id`, replacing any local state.
    ///
    /// A missing record is not an error: the form starts empty. Any other failure
    /// leaves the controller without a record until a later `load` succeeds.
    pub async fn load(&self, user_id: &str) -> Result<LoadOutcome, FetchError> {
        tracing::debug!(kind = %self.schema.kind, user_id = %user_id, "Loading record");
        let fetched = self.adapter.fetch(&self.schema, user_id).await;

        let mut state = self.lock();
        let (record, outcome) = match fetched {
            Ok(Some(server)) => (
                Record::from_server(&self.schema, user_id, server),
                LoadOutcome::Existing,
            ),
            Ok(None) => (Record::empty(&self.schema, user_id), LoadOutcome::Empty),
            Err(e) => {
                tracing::warn!(kind = %self.schema.kind, user_id = %user_id, error = %e, "Failed to load record");
                state.record = None;
                state.acknowledged = None;
                return Err(e);
            }
        };
        state.acknowledged = Some(record.clone());
        state.record = Some(record);
        tracing::info!(kind = %self.schema.kind, user_id = %user_id, outcome = ?outcome, "Record loaded");
        Ok(outcome)
    }

    /// Loads the record of the user the identity provider names.
    pub async fn load_current(
        &self,
        identity: &dyn IdentityProvider,
    ) -> Result<LoadOutcome, FormError> {
        let user_id = identity.user_id().ok_or(FormError::MissingIdentity)?;
        Ok(self.load(&user_id).await?)
    }

    pub fn is_loaded(&self) -> bool {
        self.lock().record.is_some()
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::Acquire)
    }

    /// Copy of the current local record.
    pub fn snapshot(&self) -> Option<Record> {
        self.lock().record.clone()
    }

    pub fn update_field(&self, name: &str, value: impl Into<String>) -> Result<(), FormError> {
        self.with_record(|record| {
            if record.set_field(name, value) {
                Ok(())
            } else {
                Err(FormError::UnknownField(name.to_string()))
            }
        })
    }

    /// Replaces the slot's pending selection. An empty selection clears it.
    pub fn select_files(&self, slot: &str, files: Vec<PendingFile>) -> Result<(), FormError> {
        self.with_record(|record| {
            let target = record
                .slot_mut(slot)
                .ok_or_else(|| FormError::UnknownSlot(slot.to_string()))?;
            tracing::debug!(slot = %slot, count = files.len(), "Files selected");
            target.select_pending(files);
            Ok(())
        })
    }

    /// Removes a stored file. For multi-file slots `index` addresses the current list.
    pub fn remove_existing(&self, slot: &str, index: Option<usize>) -> Result<StoredFile, FormError> {
        self.with_record(|record| {
            let target = record
                .slot_mut(slot)
                .ok_or_else(|| FormError::UnknownSlot(slot.to_string()))?;
            let removed = target.mark_existing_removed(index)?;
            tracing::debug!(slot = %slot, path = %removed.path, "Stored file marked for removal");
            Ok(removed)
        })
    }

    pub fn remove_pending(&self, slot: &str, index: Option<usize>) -> Result<PendingFile, FormError> {
        self.with_record(|record| {
            let target = record
                .slot_mut(slot)
                .ok_or_else(|| FormError::UnknownSlot(slot.to_string()))?;
            Ok(target.remove_pending(index)?)
        })
    }

    /// Drops every local edit and returns to the last server-confirmed state.
    pub fn discard_edits(&self) -> Result<(), FormError> {
        let mut state = self.lock();
        self.ensure_idle()?;
        let acknowledged = state.acknowledged.clone().ok_or(FormError::NotLoaded)?;
        state.record = Some(acknowledged);
        Ok(())
    }

    /// What a submit would send right now, without sending it.
    pub fn preview(&self) -> Result<Reconciliation, FormError> {
        let record = self.snapshot().ok_or(FormError::NotLoaded)?;
        reconcile(&self.schema, &record).map_err(FormError::Invalid)
    }

    pub async fn submit(&self) -> Result<SubmitOutcome, FormError> {
        let Some(_in_flight) = InFlight::acquire(&self.submitting) else {
            tracing::debug!(kind = %self.schema.kind, "Submit ignored, already submitting");
            return Ok(SubmitOutcome::AlreadySubmitting);
        };

        let record = self.snapshot().ok_or(FormError::NotLoaded)?;
        let reconciliation = match reconcile(&self.schema, &record) {
            Ok(reconciliation) => reconciliation,
            Err(errors) => {
                tracing::debug!(kind = %self.schema.kind, errors = errors.len(), "Submit blocked by validation");
                return Ok(SubmitOutcome::Invalid(errors));
            }
        };

        let receipt = self
            .adapter
            .submit(&self.schema, &record, &reconciliation.payload)
            .await?;

        let mut saved = Record::from_server(&self.schema, record.user_id.clone(), receipt.record);
        if saved.record_id.is_none() {
            saved.record_id = record.record_id.clone();
        }
        for before in record.slots() {
            if let Some(after) = saved.slot_mut(before.name()) {
                if before.stored_count() > 0 && after.stored_count() == 0 {
                    after.mark_cleared();
                }
            }
        }

        let mut state = self.lock();
        state.acknowledged = Some(saved.clone());
        state.record = Some(saved);

        Ok(SubmitOutcome::Saved {
            action: receipt.action,
            message: receipt.message,
        })
    }

    /// Downloads a stored file that is still part of the record.
    pub async fn download_existing(
        &self,
        slot: &str,
        index: Option<usize>,
    ) -> Result<(StoredFile, Bytes), FormError> {
        let file = {
            let state = self.lock();
            let record = state.record.as_ref().ok_or(FormError::NotLoaded)?;
            let target = record
                .slot(slot)
                .ok_or_else(|| FormError::UnknownSlot(slot.to_string()))?;
            let kept = target.kept_existing();
            let position = index.unwrap_or(0);
            kept.get(position)
                .map(|(_, file)| (*file).clone())
                .ok_or_else(|| {
                    FormError::Slot(crate::models::SlotError::IndexOutOfRange {
                        slot: slot.to_string(),
                        index: position,
                        len: kept.len(),
                    })
                })?
        };

        let bytes = self
            .adapter
            .download(&file)
            .await
            .map_err(|e| FormError::Fetch(FetchError::from(e)))?;
        tracing::debug!(slot = %slot, path = %file.path, size = bytes.len(), "Downloaded stored file");
        Ok((file, bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SlotPhase;
    use crate::testing::MockTransport;
    use crate::transport::TransportError;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tokio::sync::Notify;

    fn company_envelope(payslips: &[&str]) -> Value {
        json!({
            "id": "rec-9",
            "data": {
                "companyName": "Acme",
                "jobTitle": "Engineer",
                "employmentPeriod": "2020-2023",
                "salary": "85000",
                "documents": {
                    "appointmentLetter": "uploads/a1.pdf",
                    "promotionLetter": "uploads/promo.pdf",
                    "payslips": payslips
                }
            }
        })
    }

    async fn loaded(transport: MockTransport) -> (Arc<MockTransport>, RecordFormController<MockTransport>) {
        let transport = Arc::new(transport);
        let controller = RecordFormController::new(RecordSchema::company(), Arc::clone(&transport));
        controller.load("user-7").await.unwrap();
        (transport, controller)
    }

    #[tokio::test]
    async fn missing_record_loads_empty() {
        let controller =
            RecordFormController::new(RecordSchema::personal(), Arc::new(MockTransport::new()));
        assert_eq!(controller.load("user-1").await, Ok(LoadOutcome::Empty));

        let record = controller.snapshot().unwrap();
        assert_eq!(record.record_id, None);
        assert_eq!(record.slot("resume").unwrap().phase(), SlotPhase::Empty);
    }

    #[tokio::test]
    async fn failed_load_leaves_form_unavailable() {
        let transport = MockTransport::new()
            .on_fetch(Err(TransportError::Network("refused".to_string())));
        let controller = RecordFormController::new(RecordSchema::personal(), Arc::new(transport));

        assert!(matches!(controller.load("user-1").await, Err(FetchError::Other(_))));
        assert!(!controller.is_loaded());
        assert_eq!(controller.update_field("degree", "BSc"), Err(FormError::NotLoaded));
        assert_eq!(controller.submit().await, Err(FormError::NotLoaded));
    }

    #[tokio::test]
    async fn invalid_record_never_reaches_transport() {
        let (transport, controller) =
            loaded(MockTransport::new().on_fetch(Ok(company_envelope(&[])))).await;
        controller.update_field("employmentPeriod", "2020").unwrap();
        controller.remove_existing("appointmentLetter", None).unwrap();

        let outcome = controller.submit().await.unwrap();
        let SubmitOutcome::Invalid(errors) = outcome else {
            panic!("expected validation errors, got {outcome:?}");
        };
        assert_eq!(errors.len(), 2);
        assert!(transport.submitted().is_empty());
        assert!(!controller.is_submitting());
    }

    #[tokio::test]
    async fn successful_submit_replaces_state_with_server_echo() {
        let transport = MockTransport::new()
            .on_fetch(Ok(company_envelope(&["uploads/p1.pdf", "uploads/p2.pdf", "uploads/p3.pdf"])))
            .on_submit(Ok(json!({
                "success": true,
                "action": "updated",
                "message": "Company details updated",
                "id": "rec-9",
                "data": {
                    "companyName": "Acme",
                    "jobTitle": "Engineer",
                    "employmentPeriod": "2020-2023",
                    "salary": "85000",
                    "documents": {
                        "appointmentLetter": "uploads/a1.pdf",
                        "promotionLetter": null,
                        "payslips": ["uploads/p2.pdf", "uploads/p3.pdf", "uploads/p4.pdf"]
                    }
                }
            })));
        let (transport, controller) = loaded(transport).await;

        controller.remove_existing("payslips", Some(0)).unwrap();
        controller
            .select_files("payslips", vec![PendingFile::in_memory("p4.pdf", "4")])
            .unwrap();
        controller.remove_existing("promotionLetter", None).unwrap();

        let outcome = controller.submit().await.unwrap();
        assert_eq!(
            outcome,
            SubmitOutcome::Saved {
                action: SaveAction::Updated,
                message: "Company details updated".to_string(),
            }
        );

        let sent = &transport.submitted()[0];
        assert_eq!(sent.texts("keepPayslips"), vec!["1", "2"]);
        assert!(sent.texts("keepPromotionLetter").is_empty());

        let record = controller.snapshot().unwrap();
        let payslips = record.slot("payslips").unwrap();
        let names: Vec<_> = payslips
            .kept_existing()
            .into_iter()
            .map(|(_, f)| f.display_name.clone())
            .collect();
        assert_eq!(names, vec!["p2.pdf", "p3.pdf", "p4.pdf"]);
        assert!(!payslips.has_pending());
        assert!(!record.has_local_changes());
        assert_eq!(record.slot("promotionLetter").unwrap().phase(), SlotPhase::Cleared);
        assert_eq!(record.slot("incrementLetter").unwrap().phase(), SlotPhase::Empty);
    }

    #[tokio::test]
    async fn failed_submit_keeps_local_edits() {
        let transport = MockTransport::new()
            .on_fetch(Ok(company_envelope(&["uploads/p1.pdf"])))
            .on_submit(Err(TransportError::Status {
                status: 500,
                body: Some(json!({ "message": "Disk full" })),
            }));
        let (_, controller) = loaded(transport).await;
        controller
            .select_files("payslips", vec![PendingFile::in_memory("p2.pdf", "2")])
            .unwrap();
        let before = controller.snapshot();

        let err = controller.submit().await.unwrap_err();
        assert_eq!(
            err,
            FormError::Submission(crate::error::SubmissionError::Rejected("Disk full".to_string()))
        );
        assert_eq!(controller.snapshot(), before);
        assert!(!controller.is_submitting());
    }

    #[tokio::test]
    async fn second_submit_while_in_flight_is_a_no_op() {
        let gate = Arc::new(Notify::new());
        let transport = MockTransport::gated(Arc::clone(&gate))
            .on_fetch(Ok(company_envelope(&[])))
            .on_submit(Ok(json!({ "action": "updated", "data": { "companyName": "Acme" } })));
        let (transport, controller) = loaded(transport).await;

        let first = controller.submit();
        let second = async {
            while !controller.is_submitting() {
                tokio::task::yield_now().await;
            }
            let outcome = controller.submit().await;
            gate.notify_one();
            outcome
        };
        let (first, second) = tokio::join!(first, second);

        assert!(matches!(first, Ok(SubmitOutcome::Saved { .. })));
        assert_eq!(second, Ok(SubmitOutcome::AlreadySubmitting));
        assert_eq!(transport.submitted().len(), 1);
        assert!(!controller.is_submitting());
    }

    #[tokio::test]
    async fn edits_are_refused_while_submit_is_in_flight() {
        let gate = Arc::new(Notify::new());
        let transport = MockTransport::gated(Arc::clone(&gate))
            .on_fetch(Ok(company_envelope(&["uploads/p1.pdf"])))
            .on_submit(Ok(json!({
                "success": true,
                "action": "updated",
                "data": company_envelope(&["uploads/p1.pdf"])["data"],
            })));
        let (_, controller) = loaded(transport).await;

        let submit = controller.submit();
        let edit = async {
            while !controller.is_submitting() {
                tokio::task::yield_now().await;
            }
            let selected = controller
                .select_files("payslips", vec![PendingFile::in_memory("p9.pdf", "9")]);
            let updated = controller.update_field("salary", "999");
            let removed = controller.remove_existing("payslips", Some(0));
            let discarded = controller.discard_edits();
            gate.notify_one();
            (selected, updated, removed, discarded)
        };
        let (outcome, (selected, updated, removed, discarded)) = tokio::join!(submit, edit);

        assert!(matches!(outcome, Ok(SubmitOutcome::Saved { .. })));
        assert_eq!(selected, Err(FormError::SubmitInProgress));
        assert_eq!(updated, Err(FormError::SubmitInProgress));
        assert_eq!(removed, Err(FormError::SubmitInProgress));
        assert_eq!(discarded, Err(FormError::SubmitInProgress));

        controller.update_field("salary", "999").unwrap();
        controller
            .select_files("payslips", vec![PendingFile::in_memory("p9.pdf", "9")])
            .unwrap();
        let record = controller.snapshot().unwrap();
        assert_eq!(record.field("salary"), Some("999"));
        assert!(record.slot("payslips").unwrap().has_pending());
    }

    #[tokio::test]
    async fn dropping_submit_future_releases_flag() {
        let gate = Arc::new(Notify::new());
        let transport = MockTransport::gated(gate).on_fetch(Ok(company_envelope(&[])));
        let (_, controller) = loaded(transport).await;

        let result = tokio::time::timeout(Duration::from_millis(20), controller.submit()).await;
        assert!(result.is_err());
        assert!(!controller.is_submitting());
    }

    #[tokio::test]
    async fn discard_edits_restores_loaded_state() {
        let (_, controller) =
            loaded(MockTransport::new().on_fetch(Ok(company_envelope(&["uploads/p1.pdf"])))).await;
        let loaded_state = controller.snapshot();

        controller.update_field("salary", "1").unwrap();
        controller.remove_existing("payslips", Some(0)).unwrap();
        assert_ne!(controller.snapshot(), loaded_state);

        controller.discard_edits().unwrap();
        assert_eq!(controller.snapshot(), loaded_state);
    }

    #[tokio::test]
    async fn unknown_names_are_reported() {
        let (_, controller) = loaded(MockTransport::new().on_fetch(Ok(company_envelope(&[])))).await;
        assert_eq!(
            controller.update_field("degree", "BSc"),
            Err(FormError::UnknownField("degree".to_string()))
        );
        assert_eq!(
            controller.select_files("resume", Vec::new()),
            Err(FormError::UnknownSlot("resume".to_string()))
        );
    }

    #[tokio::test]
    async fn download_uses_normalized_path() {
        let transport = MockTransport::new()
            .on_fetch(Ok(json!({
                "data": { "documents": { "appointmentLetter": "uploads\\2024\\a1.pdf" } }
            })))
            .with_file("uploads/2024/a1.pdf", "letter");
        let (_, controller) = loaded(transport).await;

        let (file, bytes) = controller
            .download_existing("appointmentLetter", None)
            .await
            .unwrap();
        assert_eq!(file.display_name, "a1.pdf");
        assert_eq!(&bytes[..], b"letter");

        assert!(matches!(
            controller.download_existing("payslips", Some(0)).await,
            Err(FormError::Slot(_))
        ));
    }

    #[tokio::test]
    async fn preview_reports_payload_without_sending() {
        let (transport, controller) =
            loaded(MockTransport::new().on_fetch(Ok(company_envelope(&["uploads/p1.pdf"])))).await;
        let preview = controller.preview().unwrap();
        assert_eq!(preview.payload.kept_indices("payslips"), vec![0]);
        assert!(transport.submitted().is_empty());
    }
}
