//! In-memory transport for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use tokio::sync::Notify;

use crate::message::MultipartMessage;
use crate::models::RecordEndpoints;
use crate::transport::{RecordTransport, TransportError};

#[derive(Default)]
pub(crate) struct MockTransport {
    fetch_responses: Mutex<VecDeque<Result<Value, TransportError>>>,
    submit_responses: Mutex<VecDeque<Result<Value, TransportError>>>,
    submitted: Mutex<Vec<MultipartMessage>>,
    files: Mutex<HashMap<String, Bytes>>,
    fetches: AtomicUsize,
    gate: Option<Arc<Notify>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Submissions wait for `gate` to be notified before answering.
    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn on_fetch(self, response: Result<Value, TransportError>) -> Self {
        self.fetch_responses.lock().unwrap().push_back(response);
        self
    }

    pub fn on_submit(self, response: Result<Value, TransportError>) -> Self {
        self.submit_responses.lock().unwrap().push_back(response);
        self
    }

    pub fn with_file(self, path: &str, data: &'static str) -> Self {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), Bytes::from_static(data.as_bytes()));
        self
    }

    pub fn submitted(&self) -> Vec<MultipartMessage> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordTransport for MockTransport {
    async fn fetch_record(
        &self,
        _endpoints: &RecordEndpoints,
        _user_id: &str,
    ) -> Result<Value, TransportError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.fetch_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(TransportError::Status {
                status: 404,
                body: None,
            }))
    }

    async fn submit_record(
        &self,
        _endpoints: &RecordEndpoints,
        message: MultipartMessage,
    ) -> Result<Value, TransportError> {
        self.submitted.lock().unwrap().push(message);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.submit_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Network("no response queued".to_string())))
    }

    async fn fetch_binary(&self, path: &str) -> Result<Bytes, TransportError> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or(TransportError::Status {
                status: 404,
                body: None,
            })
    }
}
