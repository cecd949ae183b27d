//! HTTP client for dossier record servers.
//!
//! `ApiClient` is the reqwest implementation of the core `RecordTransport`: it
//! fetches record envelopes, posts multi-part updates and downloads stored files,
//! attaching the bearer token from the configured identity to every request.

pub mod form;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use dossier_core::models::{normalize_separators, RecordEndpoints};
use dossier_core::{
    ClientConfig, IdentityProvider, MultipartMessage, RecordTransport, StaticIdentity,
    TransportError,
};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    identity: Arc<dyn IdentityProvider>,
}

impl ApiClient {
    pub fn new(
        base_url: impl Into<String>,
        identity: Arc<dyn IdentityProvider>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            identity,
        })
    }

    /// Client whose identity is the configured user id and token.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let identity = StaticIdentity::new(config.user_id.clone(), config.token.clone());
        Self::new(
            config.api_url.clone(),
            Arc::new(identity),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn identity(&self) -> &Arc<dyn IdentityProvider> {
        &self.identity
    }

    pub fn build_url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn apply_auth(&self, request: RequestBuilder) -> RequestBuilder {
        match self.identity.bearer_token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Sends the request; any non-success status becomes `TransportError::Status`
    /// carrying the body, parsed as JSON when possible.
    async fn send(&self, request: RequestBuilder) -> Result<Response, TransportError> {
        let response = self
            .apply_auth(request)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let body = if text.trim().is_empty() {
            None
        } else {
            Some(serde_json::from_str(&text).unwrap_or(Value::String(text)))
        };
        tracing::debug!(status = status.as_u16(), "Request returned error status");
        Err(TransportError::Status {
            status: status.as_u16(),
            body,
        })
    }

    async fn read_json(response: Response) -> Result<Value, TransportError> {
        response
            .json::<Value>()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))
    }
}

#[async_trait]
impl RecordTransport for ApiClient {
    async fn fetch_record(
        &self,
        endpoints: &RecordEndpoints,
        user_id: &str,
    ) -> Result<Value, TransportError> {
        let request = self
            .client
            .get(self.build_url(endpoints.fetch_path))
            .query(&[("userId", user_id)]);
        let response = self.send(request).await?;
        Self::read_json(response).await
    }

    async fn submit_record(
        &self,
        endpoints: &RecordEndpoints,
        message: MultipartMessage,
    ) -> Result<Value, TransportError> {
        let parts = message.len();
        let form = form::to_form(message).await?;
        tracing::debug!(path = endpoints.submit_path, parts, "Submitting record");

        let request = self
            .client
            .post(self.build_url(endpoints.submit_path))
            .multipart(form);
        let response = self.send(request).await?;
        Self::read_json(response).await
    }

    async fn fetch_binary(&self, path: &str) -> Result<Bytes, TransportError> {
        let path = normalize_separators(path);
        let request = self.client.get(self.build_url(&path));
        let response = self.send(request).await?;
        response
            .bytes()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))
    }
}
