//! crates/chatlite_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the widget runtime.
//! These traits form the boundary of the hexagonal architecture, allowing the
//! core to be independent of specific external implementations like the HTTP
//! backend, durable storage or the document environment the widget lives in.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::WidgetPosition;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., HTTP, storage).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Transport failure: {0}")]
    Transport(String),
    #[error("The request deadline expired")]
    Timeout,
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Backend Wire Types
//=========================================================================================
// Field names below are the backend's JSON spelling and must not drift; this
// is half of the compatibility surface (the other half is the cross-document
// protocol in `protocol.rs`).
//=========================================================================================

/// Response of `GET /widget/{id}/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WidgetStatusResponse {
    pub verification_status: String,
    pub status: String,
}

impl WidgetStatusResponse {
    pub fn is_verified(&self) -> bool {
        self.verification_status == "verified"
    }

    pub fn is_active(&self) -> bool {
        self.status == "active"
    }
}

/// Body of `POST /widget/verify/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub domain: String,
    pub mode: String,
    pub page_url: String,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub verified: bool,
}

/// The `config` object inside the widget-config response. Every field is
/// optional; absent fields fall back to the built-in defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteWidgetConfig {
    pub widget_position: Option<WidgetPosition>,
    pub widget_color: Option<String>,
    pub welcome_message: Option<String>,
    pub placeholder_text: Option<String>,
    pub company_name: Option<String>,
}

/// Response of `GET /widget/config/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WidgetConfigResponse {
    pub is_verified: bool,
    pub is_active: bool,
    #[serde(default)]
    pub config: Option<RemoteWidgetConfig>,
}

/// Body of `POST /widget/session`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    pub visitor_id: String,
    pub page_url: String,
    pub page_title: String,
    pub user_agent: String,
    pub referrer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCreatedResponse {
    pub session_id: String,
}

/// Body of `POST /widget/message`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub message: String,
    pub session_id: String,
    pub visitor_id: String,
    pub page_url: String,
    pub page_title: String,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageReplyResponse {
    #[serde(default)]
    pub message_id: Option<String>,
    pub response: String,
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The widget verification/config/session/message HTTP surface.
#[async_trait]
pub trait BackendService: Send + Sync {
    async fn widget_status(&self, widget_id: &str) -> PortResult<WidgetStatusResponse>;

    async fn verify_widget(
        &self,
        widget_id: &str,
        request: &VerifyRequest,
    ) -> PortResult<VerifyResponse>;

    async fn widget_config(&self, widget_id: &str) -> PortResult<WidgetConfigResponse>;

    async fn create_session(
        &self,
        request: &CreateSessionRequest,
    ) -> PortResult<SessionCreatedResponse>;

    async fn send_message(
        &self,
        request: &SendMessageRequest,
    ) -> PortResult<MessageReplyResponse>;
}

/// Durable per-origin string storage, the localStorage analog. Exactly one
/// visitor identity lives under each `(origin, key)` pair.
#[async_trait]
pub trait VisitorStore: Send + Sync {
    async fn get(&self, origin: &str, key: &str) -> PortResult<Option<String>>;

    async fn put(&self, origin: &str, key: &str, value: &str) -> PortResult<()>;
}

//=========================================================================================
// Embed Host Port
//=========================================================================================

/// The two visual skins of the embedded element: transparent and borderless
/// while the chat is closed, framed and opaque while it is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChromeSkin {
    Chromeless,
    Framed,
}

/// Everything the host environment needs to create the embedded container.
#[derive(Debug, Clone)]
pub struct EmbedSpec {
    pub url: String,
    pub position: WidgetPosition,
    pub width: u32,
    pub height: u32,
    pub primary_color: String,
    pub border_radius: String,
    pub font_family: String,
}

/// Handle to one mounted embed, returned by [`EmbedHost::create_embed`].
/// Holding the handle (instead of a document-wide identifier lookup) is what
/// makes `mount` idempotent and allows multiple independent embeds.
#[async_trait]
pub trait EmbedHandle: Send + Sync {
    async fn set_chrome(&self, skin: ChromeSkin) -> PortResult<()>;

    async fn set_height(&self, height_px: u32) -> PortResult<()>;

    async fn set_visible(&self, visible: bool) -> PortResult<()>;

    async fn remove(&self) -> PortResult<()>;
}

/// The document surface the loader mounts into.
#[async_trait]
pub trait EmbedHost: Send + Sync {
    async fn create_embed(&self, spec: &EmbedSpec) -> PortResult<Box<dyn EmbedHandle>>;

    /// Shows the static offline affordance with the given text. A second call
    /// while one is already shown is a no-op.
    async fn show_offline_notice(&self, position: WidgetPosition, text: &str) -> PortResult<()>;

    async fn remove_offline_notice(&self) -> PortResult<()>;
}
