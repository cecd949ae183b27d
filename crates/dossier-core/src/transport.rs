//! Transport seam between the form logic and the network
//!
//! The adapter and controller only ever talk to a `RecordTransport`; the HTTP client
//! crate provides the real implementation and tests provide in-memory ones.

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;

use crate::error::{FetchError, SubmissionError};
use crate::message::MultipartMessage;
use crate::models::RecordEndpoints;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    /// The server answered with a non-success status.
    #[error("server returned status {status}")]
    Status { status: u16, body: Option<Value> },

    /// No answer: connection refused, timeout, TLS failure and so on.
    #[error("network error: {0}")]
    Network(String),

    /// A pending file could not be read while building the request.
    #[error("failed to read attachment {name}: {reason}")]
    Attachment { name: String, reason: String },

    /// A success status whose body was not JSON.
    #[error("invalid response body: {0}")]
    Decode(String),
}

impl TransportError {
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Explanation supplied by the server, if the error body carried one.
    ///
    /// Accepts `{"message": ..}`, `{"error": ..}` or a bare JSON string.
    pub fn server_message(&self) -> Option<String> {
        let TransportError::Status {
            body: Some(body), ..
        } = self
        else {
            return None;
        };
        let message = match body {
            Value::String(s) => Some(s.as_str()),
            Value::Object(map) => ["message", "error"]
                .into_iter()
                .find_map(|key| map.get(key).and_then(Value::as_str)),
            _ => None,
        }?;
        let message = message.trim();
        (!message.is_empty()).then(|| message.to_string())
    }
}

impl From<TransportError> for FetchError {
    fn from(err: TransportError) -> Self {
        match err.status() {
            Some(404) => FetchError::NotFound,
            _ => FetchError::Other(err.server_message().unwrap_or_else(|| err.to_string())),
        }
    }
}

impl From<TransportError> for SubmissionError {
    fn from(err: TransportError) -> Self {
        if let Some(message) = err.server_message() {
            return SubmissionError::Rejected(message);
        }
        match err {
            TransportError::Attachment { name, reason } => {
                SubmissionError::LocalFile(format!("{}: {}", name, reason))
            }
            TransportError::Decode(reason) => SubmissionError::MalformedResponse(reason),
            other => SubmissionError::Network(other.to_string()),
        }
    }
}

#[async_trait]
pub trait RecordTransport: Send + Sync {
    /// GET the record envelope for `user_id`. A missing record is a 404 status error.
    async fn fetch_record(
        &self,
        endpoints: &RecordEndpoints,
        user_id: &str,
    ) -> Result<Value, TransportError>;

    /// POST the multi-part update and return the response envelope.
    async fn submit_record(
        &self,
        endpoints: &RecordEndpoints,
        message: MultipartMessage,
    ) -> Result<Value, TransportError>;

    /// Download a stored file by its server path.
    async fn fetch_binary(&self, path: &str) -> Result<Bytes, TransportError>;
}
