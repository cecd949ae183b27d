//! Dossier Core Library
//!
//! Record schemas, attachment slots, the reconciliation engine and the form controller
//! shared by the HTTP client, the reference server and the CLI.

pub mod adapter;
pub mod config;
pub mod controller;
pub mod error;
pub mod identity;
pub mod merge;
pub mod message;
pub mod models;
pub mod reconcile;
pub mod transport;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use adapter::{fetch_record, SaveAction, SubmissionAdapter, SubmitReceipt};
pub use config::{ClientConfig, ServerConfig};
pub use controller::{LoadOutcome, RecordFormController, SubmitOutcome};
pub use error::{AppError, ErrorMetadata, FetchError, FormError, LogLevel, SubmissionError};
pub use identity::{IdentityProvider, StaticIdentity};
pub use merge::{apply_update, DecodedUpdate, MergeOutcome, StoredRecord};
pub use message::{MessagePart, MultipartMessage, PartValue};
pub use models::{
    AttachmentSlot, BinaryHandle, Cardinality, PendingFile, Record, RecordKind, RecordSchema,
    ServerRecord, SlotPhase, StoredFile,
};
pub use reconcile::{reconcile, AttachmentEntry, Reconciliation, UpdatePayload};
pub use transport::{RecordTransport, TransportError};
pub use validation::{ValidationError, ValidationErrors};
