//! services/widget/src/adapters/backend.rs
//!
//! This module contains the HTTP adapter for the widget backend surface. It
//! implements the `BackendService` port from the `core` crate against the
//! verification/config/session/message endpoints.

use async_trait::async_trait;
use chatlite_core::ports::{
    BackendService, CreateSessionRequest, MessageReplyResponse, PortError, PortResult,
    SendMessageRequest, SessionCreatedResponse, VerifyRequest, VerifyResponse,
    WidgetConfigResponse, WidgetStatusResponse,
};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// An HTTP adapter that implements the `BackendService` port.
///
/// Every call carries an explicit deadline; expiry is reported as
/// `PortError::Timeout` and treated by callers exactly like any other
/// transport failure.
#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpBackend {
    /// Creates a new `HttpBackend` rooted at `base_url`, e.g.
    /// `http://localhost:8002/api/v1/widget`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> PortResult<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> PortResult<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);
        let response = tokio::time::timeout(self.timeout, self.client.get(&url).send())
            .await
            .map_err(|_| PortError::Timeout)?
            .map_err(|e| PortError::Transport(e.to_string()))?;
        Self::decode(response).await
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> PortResult<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);
        let response = tokio::time::timeout(self.timeout, self.client.post(&url).json(body).send())
            .await
            .map_err(|_| PortError::Timeout)?
            .map_err(|e| PortError::Transport(e.to_string()))?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> PortResult<T> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(PortError::NotFound(response.url().path().to_string()));
        }
        if !status.is_success() {
            return Err(PortError::Transport(format!(
                "backend returned HTTP {}",
                status
            )));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| PortError::Transport(e.to_string()))
    }
}

#[async_trait]
impl BackendService for HttpBackend {
    async fn widget_status(&self, widget_id: &str) -> PortResult<WidgetStatusResponse> {
        self.get_json(&format!("/{}/status", widget_id)).await
    }

    async fn verify_widget(
        &self,
        widget_id: &str,
        request: &VerifyRequest,
    ) -> PortResult<VerifyResponse> {
        self.post_json(&format!("/verify/{}", widget_id), request).await
    }

    async fn widget_config(&self, widget_id: &str) -> PortResult<WidgetConfigResponse> {
        self.get_json(&format!("/config/{}", widget_id)).await
    }

    async fn create_session(
        &self,
        request: &CreateSessionRequest,
    ) -> PortResult<SessionCreatedResponse> {
        self.post_json("/session", request).await
    }

    async fn send_message(
        &self,
        request: &SendMessageRequest,
    ) -> PortResult<MessageReplyResponse> {
        self.post_json("/message", request).await
    }
}
