//! crates/chatlite_core/src/protocol.rs
//!
//! Defines the cross-document message protocol between the host document
//! (loader) and the embedded document (widget runtime). This is the bit-exact
//! compatibility surface between the two independently-deployable halves of
//! the system: field names follow the wire spelling, not Rust convention.
//!
//! Delivery is fire-and-forget and at-most-once per dispatch, with no
//! ordering guarantee across message types. Receivers validate on receipt:
//! anything that does not parse into a known variant, or arrives from an
//! unexpected origin, is silently dropped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Theme, VerificationStatus, WidgetPosition, WidgetSize};

/// The full configuration bag the host loader pushes with `widget-config`.
/// Only `widgetId` is mandatory; everything else falls back to defaults on
/// the embedded side. `_internalStatus` carries the loader's verification
/// outcome so the very first push already gates connectivity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScriptConfig {
    pub widget_id: String,
    pub position: Option<WidgetPosition>,
    pub primary_color: Option<String>,
    pub size: Option<WidgetSize>,
    pub border_radius: Option<String>,
    pub font_family: Option<String>,
    pub theme: Option<Theme>,
    pub welcome_message: Option<String>,
    pub placeholder_text: Option<String>,
    pub company_name: Option<String>,
    pub offline_message: Option<String>,
    pub api_base: Option<String>,
    pub frontend_base: Option<String>,
    #[serde(rename = "_internalStatus", skip_serializing_if = "Option::is_none")]
    pub internal_status: Option<VerificationStatus>,
}

/// The partial cosmetic patch carried by `widget-config-update`. Identity
/// bearing fields (widget id, api base) are deliberately absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsPatch {
    pub position: Option<WidgetPosition>,
    pub primary_color: Option<String>,
    pub border_radius: Option<String>,
    pub font_family: Option<String>,
    pub theme: Option<Theme>,
    pub welcome_message: Option<String>,
    pub placeholder_text: Option<String>,
    pub company_name: Option<String>,
    pub offline_message: Option<String>,
}

/// Payload of `widget-ready`. Informational; the host may log it only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadyPayload {
    pub widget_id: String,
    pub verified: bool,
    pub status: String,
}

/// Payload of `widget-error`. Best-effort: a failure to deliver it must
/// never crash the embedded document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// The closed set of messages that may travel between the two documents.
/// The envelope on the wire is `{"type": ..., ...payload}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ChannelMessage {
    /// host -> embedded: replaces WidgetSettings wholesale iff the carried
    /// widget id equals the embedded document's own id.
    WidgetConfig { config: ScriptConfig },

    /// host -> embedded: shallow-merged into the current settings.
    WidgetConfigUpdate { data: SettingsPatch },

    /// embedded -> host: the runtime finished its embedded-mode init.
    WidgetReady { data: ReadyPayload },

    /// embedded -> host: the chat was opened or closed; the host switches
    /// the container chrome accordingly.
    #[serde(rename_all = "camelCase")]
    WidgetToggle { is_open: bool },

    /// embedded -> host: apply a new pixel height to the embedded element.
    WidgetResize { height: u32 },

    /// embedded -> host: the rendering layer was contained after a fault.
    WidgetError { data: ErrorPayload },
}

impl ChannelMessage {
    /// Serializes for dispatch over the channel.
    pub fn to_payload(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parses an inbound payload. Returns `None` for anything outside the
    /// closed set above; callers drop such envelopes without further effect.
    pub fn decode(payload: &str) -> Option<ChannelMessage> {
        serde_json::from_str(payload).ok()
    }
}

/// A message as it travels between documents: the serialized payload tagged
/// with the sender's origin. Receivers reject envelopes whose origin does
/// not match the expected peer.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub origin: String,
    pub payload: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_uses_the_original_wire_spelling() {
        let json = ChannelMessage::WidgetToggle { is_open: true }
            .to_payload()
            .unwrap();
        assert_eq!(json, r#"{"type":"widget-toggle","isOpen":true}"#);
    }

    #[test]
    fn config_round_trips_with_internal_status() {
        let msg = ChannelMessage::WidgetConfig {
            config: ScriptConfig {
                widget_id: "w-1".to_string(),
                primary_color: Some("#0066CC".to_string()),
                internal_status: Some(VerificationStatus {
                    verified: true,
                    active: true,
                }),
                ..ScriptConfig::default()
            },
        };
        let json = msg.to_payload().unwrap();
        assert!(json.contains(r#""type":"widget-config""#));
        assert!(json.contains(r#""widgetId":"w-1""#));
        assert!(json.contains(r#""_internalStatus":{"verified":true,"active":true}"#));
        assert_eq!(ChannelMessage::decode(&json), Some(msg));
    }

    #[test]
    fn ready_payload_nests_under_data() {
        let json = ChannelMessage::WidgetReady {
            data: ReadyPayload {
                widget_id: "w-1".to_string(),
                verified: false,
                status: "loaded".to_string(),
            },
        }
        .to_payload()
        .unwrap();
        assert!(json.contains(r#""data":{"widgetId":"w-1","verified":false,"status":"loaded"}"#));
    }

    #[test]
    fn unknown_types_are_rejected_not_guessed() {
        assert_eq!(ChannelMessage::decode(r#"{"type":"widget-selfdestruct"}"#), None);
        assert_eq!(ChannelMessage::decode("not even json"), None);
        // A known type with a malformed payload is also outside the set.
        assert_eq!(ChannelMessage::decode(r#"{"type":"widget-resize","height":"tall"}"#), None);
    }

    #[test]
    fn config_parses_from_loader_script_json() {
        let raw = r#"{
            "type": "widget-config",
            "config": {
                "widgetId": "abc123",
                "position": "bottom-left",
                "size": "large",
                "theme": "dark",
                "welcomeMessage": "Hi!",
                "_internalStatus": {"verified": true, "active": false}
            }
        }"#;
        match ChannelMessage::decode(raw) {
            Some(ChannelMessage::WidgetConfig { config }) => {
                assert_eq!(config.widget_id, "abc123");
                assert_eq!(config.position, Some(WidgetPosition::BottomLeft));
                assert_eq!(config.size, Some(WidgetSize::Large));
                assert_eq!(config.theme, Some(Theme::Dark));
                assert_eq!(config.welcome_message.as_deref(), Some("Hi!"));
                let status = config.internal_status.unwrap();
                assert!(status.verified);
                assert!(!status.active);
            }
            other => panic!("expected widget-config, got {:?}", other),
        }
    }
}
