//! Record persistence
//!
//! One record per (kind, user). The server only needs lookup and upsert; the
//! in-memory implementation is what the binary and the tests run on.

use std::collections::HashMap;

use async_trait::async_trait;
use dossier_core::{AppError, RecordKind, StoredRecord};
use tokio::sync::RwLock;

#[async_trait]
pub trait RecordRepository: Send + Sync {
    async fn find(&self, kind: RecordKind, user_id: &str)
        -> Result<Option<StoredRecord>, AppError>;

    /// Insert or replace the record for `record.user_id`.
    async fn save(&self, kind: RecordKind, record: StoredRecord) -> Result<(), AppError>;
}

#[derive(Default)]
pub struct InMemoryRecordRepository {
    records: RwLock<HashMap<(RecordKind, String), StoredRecord>>,
}

impl InMemoryRecordRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordRepository for InMemoryRecordRepository {
    async fn find(
        &self,
        kind: RecordKind,
        user_id: &str,
    ) -> Result<Option<StoredRecord>, AppError> {
        let records = self.records.read().await;
        Ok(records.get(&(kind, user_id.to_string())).cloned())
    }

    async fn save(&self, kind: RecordKind, record: StoredRecord) -> Result<(), AppError> {
        let mut records = self.records.write().await;
        records.insert((kind, record.user_id.clone()), record);
        Ok(())
    }
}
