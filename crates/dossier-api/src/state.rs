//! Application state shared by all handlers.

use std::sync::Arc;

use dossier_core::{AppError, ServerConfig};
use tokio::sync::Mutex;

use crate::repository::{InMemoryRecordRepository, RecordRepository};
use crate::uploads::UploadStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub repository: Arc<dyn RecordRepository>,
    pub uploads: Arc<UploadStore>,
    /// Serializes read-merge-write of records so concurrent saves cannot lose files.
    pub submit_lock: Arc<Mutex<()>>,
}

impl AppState {
    /// State backed by the in-memory repository and the configured upload directory.
    pub async fn new(config: ServerConfig) -> Result<Self, AppError> {
        let uploads = UploadStore::new(config.upload_dir.clone()).await?;
        Ok(Self::with_repository(
            config,
            Arc::new(InMemoryRecordRepository::new()),
            uploads,
        ))
    }

    pub fn with_repository(
        config: ServerConfig,
        repository: Arc<dyn RecordRepository>,
        uploads: UploadStore,
    ) -> Self {
        Self {
            config: Arc::new(config),
            repository,
            uploads: Arc::new(uploads),
            submit_lock: Arc::new(Mutex::new(())),
        }
    }
}
