//! crates/chatlite_core/src/domain.rs
//!
//! Defines the pure, core data structures for the widget runtime.
//! These structs are independent of any transport or storage mechanism.
//! The small vocabulary enums (position, size, theme) carry serde renames
//! because every layer of the system spells them the same way on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Storage key under which the visitor identity is persisted.
pub const VISITOR_ID_KEY: &str = "litechat_visitor_id";

/// Reserved id of the welcome/offline message pinned at position 0.
pub const WELCOME_MESSAGE_ID: &str = "welcome";

/// Corner of the host page the widget is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WidgetPosition {
    BottomRight,
    BottomLeft,
    TopRight,
    TopLeft,
}

impl Default for WidgetPosition {
    fn default() -> Self {
        WidgetPosition::BottomRight
    }
}

impl fmt::Display for WidgetPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WidgetPosition::BottomRight => "bottom-right",
            WidgetPosition::BottomLeft => "bottom-left",
            WidgetPosition::TopRight => "top-right",
            WidgetPosition::TopLeft => "top-left",
        };
        write!(f, "{}", s)
    }
}

/// Fixed size presets for the embedded container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WidgetSize {
    Small,
    Medium,
    Large,
}

impl Default for WidgetSize {
    fn default() -> Self {
        WidgetSize::Medium
    }
}

impl WidgetSize {
    /// Container dimensions in pixels as `(width, height)`.
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            WidgetSize::Small => (320, 500),
            WidgetSize::Medium => (380, 600),
            WidgetSize::Large => (420, 650),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    Auto,
}

impl Default for Theme {
    fn default() -> Self {
        Theme::Auto
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::Auto => "auto",
        };
        write!(f, "{}", s)
    }
}

/// How the embedded document was opened. Standalone is the full-page test
/// harness that fetches its own config; embedded receives config only over
/// the cross-document channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedMode {
    Standalone,
    Embedded,
}

impl EmbedMode {
    /// Resolves the mode from the `mode` query parameter of the embed URL.
    /// Anything other than `embedded` is treated as standalone.
    pub fn from_query(mode: Option<&str>) -> Self {
        match mode {
            Some("embedded") => EmbedMode::Embedded,
            _ => EmbedMode::Standalone,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EmbedMode::Standalone => "standalone",
            EmbedMode::Embedded => "embedded",
        }
    }
}

/// Outcome of the backend verification pre-flight. `active` is only
/// meaningful when `verified` is true; the pair jointly gates whether the
/// runtime connects or degrades to the offline affordance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationStatus {
    pub verified: bool,
    pub active: bool,
}

impl VerificationStatus {
    pub fn is_online(self) -> bool {
        self.verified && self.active
    }
}

/// The complete, immutable-per-update configuration of one widget instance.
/// Replaced wholesale whenever an authoritative source delivers a full
/// settings object; never partially merged across sources.
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetSettings {
    pub widget_id: String,
    pub position: WidgetPosition,
    pub primary_color: String,
    pub size: WidgetSize,
    pub border_radius: String,
    pub font_family: String,
    pub theme: Theme,
    pub title: String,
    pub welcome_message: String,
    pub placeholder_text: String,
    pub offline_message: String,
    pub api_base: String,
}

impl WidgetSettings {
    /// The defaults the embedded document starts from before any
    /// authoritative source has delivered a settings object.
    pub fn defaults(widget_id: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            widget_id: widget_id.into(),
            position: WidgetPosition::BottomRight,
            primary_color: "#0066CC".to_string(),
            size: WidgetSize::Medium,
            border_radius: "12px".to_string(),
            font_family: "-apple-system,BlinkMacSystemFont,Segoe UI,sans-serif".to_string(),
            theme: Theme::Auto,
            title: "ChatLite Support".to_string(),
            welcome_message: "Hello! How can I help you today?".to_string(),
            placeholder_text: "Type your message...".to_string(),
            offline_message: "We're currently offline. Please try again later.".to_string(),
            api_base: api_base.into(),
        }
    }
}

/// A backend-issued session correlating the messages of one embedding
/// instance. Created lazily on the first outgoing message and never
/// recreated for the lifetime of the embedded document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSession {
    pub session_id: String,
    pub visitor_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// Delivery lifecycle of a message. User messages transition
/// `Sending -> (Delivered | Error)` exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sending,
    Sent,
    Delivered,
    Error,
}

/// One entry of the append-only chat transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: String,
    pub content: String,
    pub role: MessageRole,
    pub timestamp: DateTime<Utc>,
    pub status: DeliveryStatus,
}

impl Message {
    /// A user message in its optimistic pre-delivery state.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            role: MessageRole::User,
            timestamp: Utc::now(),
            status: DeliveryStatus::Sending,
        }
    }

    /// An assistant reply that has already been delivered by the backend.
    /// Falls back to a fresh id when the backend did not supply one.
    pub fn assistant(id: Option<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            content: content.into(),
            role: MessageRole::Assistant,
            timestamp: Utc::now(),
            status: DeliveryStatus::Delivered,
        }
    }

    /// The synthetic assistant entry announcing a failed send.
    pub fn assistant_error(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            role: MessageRole::Assistant,
            timestamp: Utc::now(),
            status: DeliveryStatus::Error,
        }
    }

    /// The welcome/offline entry carrying the reserved id. Always inserted
    /// at position 0, superseding any earlier entry with the same id.
    pub fn welcome(content: impl Into<String>) -> Self {
        Self {
            id: WELCOME_MESSAGE_ID.to_string(),
            content: content.into(),
            role: MessageRole::Assistant,
            timestamp: Utc::now(),
            status: DeliveryStatus::Delivered,
        }
    }
}

/// The widget-visible lifecycle flags driving what the rendering layer
/// shows. Mutated only by the embedded document's own timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeState {
    pub is_open: bool,
    pub is_minimized: bool,
    pub is_loading: bool,
    pub is_connected: bool,
    pub is_typing: bool,
    pub has_error: bool,
    pub error_message: Option<String>,
}

impl Default for RuntimeState {
    fn default() -> Self {
        Self {
            is_open: false,
            is_minimized: false,
            is_loading: true,
            is_connected: false,
            is_typing: false,
            has_error: false,
            error_message: None,
        }
    }
}

/// Facts about the host page carried into verification, session creation
/// and message sends.
#[derive(Debug, Clone)]
pub struct PageContext {
    pub origin: String,
    pub url: String,
    pub title: String,
    pub user_agent: String,
    pub referrer: String,
}

/// Generates a fresh opaque visitor identity. Callers persist it before
/// first use; an existing identity is never regenerated.
pub fn new_visitor_id() -> String {
    format!("visitor_{}", Uuid::new_v4().simple())
}
