//! Dossier API
//!
//! Reference server for personal and company profile records: fetch by user, and
//! create-or-update from a multi-part submission carrying fields, uploads and keep
//! markers. Uploaded files are stored on local disk and served under `/uploads`.

pub mod error;
pub mod handlers;
pub mod repository;
pub mod setup;
pub mod state;
pub mod telemetry;
pub mod uploads;

pub use error::{ErrorResponse, HttpAppError};
pub use repository::{InMemoryRecordRepository, RecordRepository};
pub use setup::routes::setup_routes;
pub use state::AppState;
pub use uploads::UploadStore;
