//! services/widget/src/runtime/controller.rs
//!
//! The embedded runtime controller: owns the widget lifecycle state machine
//! inside the embedded document, reconciles backend-fetched config with
//! host-pushed config, and exposes the resulting `RuntimeState` and message
//! transcript to the rendering layer.

use crate::adapters::channel::{ChannelReceiver, ChannelSender};
use crate::runtime::chat::ChatExchange;
use chatlite_core::domain::{
    EmbedMode, Message, PageContext, RuntimeState, VerificationStatus, WidgetSettings,
};
use chatlite_core::ports::{BackendService, VisitorStore};
use chatlite_core::protocol::{
    ChannelMessage, Envelope, ErrorPayload, ReadyPayload, ScriptConfig, SettingsPatch,
};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// The friendly text surfaced when standalone initialization fails. The raw
/// failure only ever reaches the log.
const INIT_FAILURE_TEXT: &str = "The chat widget is temporarily unavailable.";

/// Lifecycle phases of the embedded document.
///
/// Standalone mode moves `Initializing -> Connected` (or `-> Error`, which is
/// terminal); embedded mode moves `Initializing -> AwaitingChannelConfig ->
/// Connected`. Open/closed is an orthogonal flag and never leaves
/// `Connected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    AwaitingChannelConfig,
    Connected,
    Error,
}

pub struct WidgetController {
    widget_id: String,
    mode: EmbedMode,
    phase: Phase,
    state: RuntimeState,
    settings: Option<WidgetSettings>,
    verification: VerificationStatus,
    /// Whether an authoritative `widget-config` has been applied yet.
    config_received: bool,
    default_api_base: String,
    chat: ChatExchange,
    sender: ChannelSender,
    backend: Arc<dyn BackendService>,
    store: Arc<dyn VisitorStore>,
}

impl WidgetController {
    pub fn new(
        widget_id: impl Into<String>,
        mode: EmbedMode,
        sender: ChannelSender,
        backend: Arc<dyn BackendService>,
        store: Arc<dyn VisitorStore>,
        page: PageContext,
        default_api_base: impl Into<String>,
    ) -> Self {
        let widget_id = widget_id.into();
        let chat = ChatExchange::new(widget_id.clone(), backend.clone(), page);
        Self {
            widget_id,
            mode,
            phase: Phase::Initializing,
            state: RuntimeState::default(),
            settings: None,
            verification: VerificationStatus::default(),
            config_received: false,
            default_api_base: default_api_base.into(),
            chat,
            sender,
            backend,
            store,
        }
    }

    //=====================================================================================
    // Initialization
    //=====================================================================================

    /// Runs the mount branch of the state machine. Embedded mode never
    /// touches the backend config endpoint: the channel is the sole config
    /// source there, which is what resolves the race between backend-fetched
    /// and host-pushed configuration.
    pub async fn init(&mut self) {
        self.state.is_loading = true;
        self.chat.ensure_visitor(self.store.as_ref()).await;

        match self.mode {
            EmbedMode::Embedded => self.init_embedded(),
            EmbedMode::Standalone => self.init_standalone().await,
        }

        self.state.is_loading = false;
    }

    fn init_embedded(&mut self) {
        if self.settings.is_none() {
            self.settings = Some(WidgetSettings::defaults(
                &self.widget_id,
                &self.default_api_base,
            ));
        }
        // Connectivity comes from the first config push if it already
        // arrived; otherwise the widget starts disconnected and waits.
        self.state.is_connected = self.config_received && self.verification.is_online();
        if self.phase == Phase::Initializing {
            self.phase = if self.config_received {
                Phase::Connected
            } else {
                Phase::AwaitingChannelConfig
            };
        }
        self.refresh_greeting();

        self.sender.post(&ChannelMessage::WidgetReady {
            data: ReadyPayload {
                widget_id: self.widget_id.clone(),
                verified: self.verification.verified,
                status: "loaded".to_string(),
            },
        });
    }

    async fn init_standalone(&mut self) {
        match self.backend.widget_config(&self.widget_id).await {
            Ok(response) => {
                self.verification = VerificationStatus {
                    verified: response.is_verified,
                    active: response.is_active,
                };

                let mut settings =
                    WidgetSettings::defaults(&self.widget_id, &self.default_api_base);
                if let Some(remote) = response.config {
                    if let Some(v) = remote.widget_position {
                        settings.position = v;
                    }
                    if let Some(v) = remote.widget_color {
                        settings.primary_color = v;
                    }
                    if let Some(v) = remote.welcome_message {
                        settings.welcome_message = v;
                    }
                    if let Some(v) = remote.placeholder_text {
                        settings.placeholder_text = v;
                    }
                    if let Some(v) = remote.company_name {
                        settings.title = v;
                    }
                }
                self.settings = Some(settings);
                self.phase = Phase::Connected;
                self.state.is_connected = self.verification.is_online();
                self.refresh_greeting();
            }
            Err(e) => {
                error!("widget initialization failed: {}", e);
                // Terminal: no retry, no settings. The rendering layer
                // suppresses output entirely in this state.
                self.phase = Phase::Error;
                self.state.has_error = true;
                self.state.error_message = Some(INIT_FAILURE_TEXT.to_string());
            }
        }
    }

    //=====================================================================================
    // Channel input
    //=====================================================================================

    /// Processes one inbound envelope. Anything outside the closed message
    /// set is dropped without effect; so is a config push for a different
    /// widget id.
    pub fn handle_envelope(&mut self, envelope: Envelope) {
        let Some(message) = ChannelMessage::decode(&envelope.payload) else {
            return;
        };
        match message {
            ChannelMessage::WidgetConfig { config } => self.apply_config(config),
            ChannelMessage::WidgetConfigUpdate { data } => self.apply_patch(data),
            // Host-bound notifications are not ours to act on.
            _ => {}
        }
    }

    fn apply_config(&mut self, config: ScriptConfig) {
        if self.phase == Phase::Error {
            return;
        }
        if config.widget_id != self.widget_id {
            debug!(
                "ignoring config addressed to widget {} (we are {})",
                config.widget_id, self.widget_id
            );
            return;
        }

        self.verification = config.internal_status.unwrap_or_default();

        // Replaced wholesale on every authoritative push; fields from an
        // earlier source never leak through.
        let api_base = config
            .api_base
            .clone()
            .unwrap_or_else(|| self.default_api_base.clone());
        let mut settings = WidgetSettings::defaults(&self.widget_id, api_base);
        if let Some(v) = config.position {
            settings.position = v;
        }
        if let Some(v) = config.primary_color {
            settings.primary_color = v;
        }
        if let Some(v) = config.size {
            settings.size = v;
        }
        if let Some(v) = config.border_radius {
            settings.border_radius = v;
        }
        if let Some(v) = config.font_family {
            settings.font_family = v;
        }
        if let Some(v) = config.theme {
            settings.theme = v;
        }
        if let Some(v) = config.welcome_message {
            settings.welcome_message = v;
        }
        if let Some(v) = config.placeholder_text {
            settings.placeholder_text = v;
        }
        if let Some(v) = config.company_name {
            settings.title = v;
        }
        if let Some(v) = config.offline_message {
            settings.offline_message = v;
        }
        self.settings = Some(settings);

        self.config_received = true;
        self.state.is_connected = self.verification.is_online();
        if matches!(self.phase, Phase::Initializing | Phase::AwaitingChannelConfig) {
            self.phase = Phase::Connected;
        }
        self.refresh_greeting();
    }

    /// Cosmetic post-mount tweaks. No phase transition, no identity fields.
    fn apply_patch(&mut self, patch: SettingsPatch) {
        if self.phase == Phase::Error {
            return;
        }
        let Some(settings) = self.settings.as_mut() else {
            return;
        };
        if let Some(v) = patch.position {
            settings.position = v;
        }
        if let Some(v) = patch.primary_color {
            settings.primary_color = v;
        }
        if let Some(v) = patch.border_radius {
            settings.border_radius = v;
        }
        if let Some(v) = patch.font_family {
            settings.font_family = v;
        }
        if let Some(v) = patch.theme {
            settings.theme = v;
        }
        if let Some(v) = patch.welcome_message {
            settings.welcome_message = v;
        }
        if let Some(v) = patch.placeholder_text {
            settings.placeholder_text = v;
        }
        if let Some(v) = patch.company_name {
            settings.title = v;
        }
        if let Some(v) = patch.offline_message {
            settings.offline_message = v;
        }
        self.refresh_greeting();
    }

    /// The welcome/offline selection rule: unless the widget is both
    /// verified and active, the greeting uses the configured offline text.
    /// The result supersedes any prior entry with the reserved id and is
    /// re-pinned to position 0.
    fn refresh_greeting(&mut self) {
        let Some(settings) = &self.settings else {
            return;
        };
        let content = if self.verification.is_online() {
            settings.welcome_message.clone()
        } else {
            settings.offline_message.clone()
        };
        self.chat.set_greeting(&content);
    }

    //=====================================================================================
    // User actions
    //=====================================================================================

    /// Flips open/closed and notifies the host so it can switch the
    /// container chrome. Chrome never changes by local guesswork on the
    /// host side; this dispatch is the only trigger.
    pub fn toggle(&mut self) {
        self.state.is_open = !self.state.is_open;
        self.sender.post(&ChannelMessage::WidgetToggle {
            is_open: self.state.is_open,
        });
    }

    pub fn close(&mut self) {
        if self.state.is_open {
            self.toggle();
        }
    }

    pub fn toggle_minimize(&mut self) {
        self.state.is_minimized = !self.state.is_minimized;
    }

    /// Asks the host to resize the embedded element.
    pub fn request_resize(&self, height_px: u32) {
        self.sender.post(&ChannelMessage::WidgetResize { height: height_px });
    }

    /// Best-effort fault notification on behalf of the rendering boundary.
    /// A failed dispatch must never take the embedded document down.
    pub fn report_error(&self, message: &str) {
        self.sender.post(&ChannelMessage::WidgetError {
            data: ErrorPayload {
                message: message.to_string(),
                timestamp: Utc::now(),
            },
        });
    }

    /// Sends a chat message through the exchange. Standalone mode without
    /// resolved settings drops the send; the exchange itself drops blank
    /// input and sends without a visitor identity.
    pub async fn send(&mut self, content: &str) {
        if self.mode == EmbedMode::Standalone && self.settings.is_none() {
            warn!("dropping send: standalone mode has no resolved settings");
            return;
        }
        if !self.chat.can_send(content) {
            return;
        }
        self.state.is_typing = true;
        self.chat.send(content).await;
        self.state.is_typing = false;
    }

    //=====================================================================================
    // Read surface for the rendering layer
    //=====================================================================================

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn state(&self) -> &RuntimeState {
        &self.state
    }

    pub fn settings(&self) -> Option<&WidgetSettings> {
        self.settings.as_ref()
    }

    pub fn verification(&self) -> VerificationStatus {
        self.verification
    }

    pub fn messages(&self) -> &[Message] {
        self.chat.messages()
    }

    pub fn visitor_id(&self) -> Option<&str> {
        self.chat.visitor_id()
    }

    /// The rendering layer draws nothing at all when initialization failed
    /// before any settings existed.
    pub fn should_render(&self) -> bool {
        !(self.state.has_error && self.settings.is_none())
    }
}

/// Drives the controller from its channel receiver until the peer goes away
/// or the token is cancelled.
pub async fn run_widget(
    controller: Arc<Mutex<WidgetController>>,
    mut receiver: ChannelReceiver,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            envelope = receiver.recv() => match envelope {
                Some(envelope) => controller.lock().await.handle_envelope(envelope),
                None => break,
            },
        }
    }
    debug!("widget channel pump finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::channel::{self, DocumentEnd};
    use crate::adapters::storage::MemoryVisitorStore;
    use crate::testutil::{test_page, MockBackend};
    use chatlite_core::domain::WELCOME_MESSAGE_ID;

    const HOST_ORIGIN: &str = "https://shop.example";
    const WIDGET_ORIGIN: &str = "http://localhost:5175";

    fn build(mode: EmbedMode) -> (WidgetController, Arc<MockBackend>, DocumentEnd) {
        let backend = Arc::new(MockBackend::new());
        let (host_end, widget_end) = channel::pair(HOST_ORIGIN, WIDGET_ORIGIN);
        let controller = WidgetController::new(
            "w-1",
            mode,
            widget_end.sender,
            backend.clone(),
            Arc::new(MemoryVisitorStore::new()),
            test_page(),
            "http://localhost:8002/api/v1/widget",
        );
        (controller, backend, host_end)
    }

    fn config_envelope(config: ScriptConfig) -> Envelope {
        Envelope {
            origin: HOST_ORIGIN.to_string(),
            payload: ChannelMessage::WidgetConfig { config }.to_payload().unwrap(),
        }
    }

    fn verified_config(widget_id: &str) -> ScriptConfig {
        ScriptConfig {
            widget_id: widget_id.to_string(),
            welcome_message: Some("Welcome aboard!".to_string()),
            offline_message: Some("Back soon.".to_string()),
            internal_status: Some(VerificationStatus {
                verified: true,
                active: true,
            }),
            ..ScriptConfig::default()
        }
    }

    #[tokio::test]
    async fn embedded_init_waits_for_the_channel_and_announces_readiness() {
        let (mut controller, backend, mut host_end) = build(EmbedMode::Embedded);
        controller.init().await;

        assert_eq!(controller.phase(), Phase::AwaitingChannelConfig);
        assert!(!controller.state().is_connected);
        assert!(!controller.state().is_loading);
        // Embedded mode never fetches config from the backend.
        assert_eq!(backend.count("widget_config"), 0);

        let envelope = host_end.receiver.recv().await.unwrap();
        assert_eq!(envelope.origin, WIDGET_ORIGIN);
        match ChannelMessage::decode(&envelope.payload) {
            Some(ChannelMessage::WidgetReady { data }) => {
                assert_eq!(data.widget_id, "w-1");
                assert!(!data.verified);
                assert_eq!(data.status, "loaded");
            }
            other => panic!("expected widget-ready, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn foreign_widget_config_never_mutates_settings() {
        let (mut controller, _backend, _host_end) = build(EmbedMode::Embedded);
        controller.init().await;
        let before = controller.settings().cloned();

        controller.handle_envelope(config_envelope(verified_config("someone-else")));

        assert_eq!(controller.settings().cloned(), before);
        assert_eq!(controller.phase(), Phase::AwaitingChannelConfig);
        assert!(!controller.state().is_connected);
    }

    #[tokio::test]
    async fn matching_config_connects_and_selects_the_welcome_text() {
        let (mut controller, _backend, _host_end) = build(EmbedMode::Embedded);
        controller.init().await;

        controller.handle_envelope(config_envelope(verified_config("w-1")));

        assert_eq!(controller.phase(), Phase::Connected);
        assert!(controller.state().is_connected);
        let greeting = &controller.messages()[0];
        assert_eq!(greeting.id, WELCOME_MESSAGE_ID);
        assert_eq!(greeting.content, "Welcome aboard!");
    }

    #[tokio::test]
    async fn unverified_config_selects_the_offline_text_until_status_flips() {
        let (mut controller, _backend, _host_end) = build(EmbedMode::Embedded);
        controller.init().await;

        let mut offline = verified_config("w-1");
        offline.internal_status = Some(VerificationStatus {
            verified: false,
            active: false,
        });
        controller.handle_envelope(config_envelope(offline));

        assert!(!controller.state().is_connected);
        assert_eq!(controller.messages()[0].content, "Back soon.");

        // A real message lands after the greeting, then the status flips.
        controller.send("hello").await;
        let user_content = controller.messages()[1].content.clone();

        controller.handle_envelope(config_envelope(verified_config("w-1")));

        assert!(controller.state().is_connected);
        let messages = controller.messages();
        assert_eq!(messages[0].content, "Welcome aboard!");
        // Non-welcome entries are preserved across the replacement.
        assert_eq!(messages[1].content, user_content);
        assert_eq!(
            messages.iter().filter(|m| m.id == WELCOME_MESSAGE_ID).count(),
            1
        );
    }

    #[tokio::test]
    async fn toggling_twice_round_trips_and_emits_alternating_events() {
        let (mut controller, _backend, mut host_end) = build(EmbedMode::Embedded);
        controller.init().await;
        // Drain the widget-ready announcement.
        host_end.receiver.recv().await.unwrap();

        let initially_open = controller.state().is_open;
        controller.toggle();
        controller.toggle();
        assert_eq!(controller.state().is_open, initially_open);

        let mut observed = Vec::new();
        for _ in 0..2 {
            let envelope = host_end.receiver.recv().await.unwrap();
            match ChannelMessage::decode(&envelope.payload) {
                Some(ChannelMessage::WidgetToggle { is_open }) => observed.push(is_open),
                other => panic!("expected widget-toggle, got {:?}", other),
            }
        }
        assert_eq!(observed, vec![!initially_open, initially_open]);
    }

    #[tokio::test]
    async fn standalone_init_fetches_config_and_connects() {
        let (mut controller, backend, _host_end) = build(EmbedMode::Standalone);
        controller.init().await;

        assert_eq!(backend.count("widget_config"), 1);
        assert_eq!(controller.phase(), Phase::Connected);
        assert!(controller.state().is_connected);

        let settings = controller.settings().unwrap();
        assert_eq!(settings.primary_color, "#a08831");
        assert_eq!(settings.title, "Support");
        assert_eq!(controller.messages()[0].content, "Hi! Ask your queries?");
    }

    #[tokio::test]
    async fn standalone_init_failure_is_terminal_and_suppresses_rendering() {
        let (mut controller, backend, _host_end) = build(EmbedMode::Standalone);
        backend.fail_config();
        controller.init().await;

        assert_eq!(controller.phase(), Phase::Error);
        assert!(controller.state().has_error);
        assert!(controller.settings().is_none());
        assert!(!controller.should_render());

        // Error is terminal: a late config push changes nothing.
        controller.handle_envelope(config_envelope(verified_config("w-1")));
        assert_eq!(controller.phase(), Phase::Error);
        assert!(controller.settings().is_none());
    }

    #[tokio::test]
    async fn config_update_patches_cosmetics_without_a_transition() {
        let (mut controller, _backend, _host_end) = build(EmbedMode::Embedded);
        controller.init().await;
        controller.handle_envelope(config_envelope(verified_config("w-1")));

        let patch = SettingsPatch {
            primary_color: Some("#112233".to_string()),
            welcome_message: Some("Patched hello".to_string()),
            ..SettingsPatch::default()
        };
        controller.handle_envelope(Envelope {
            origin: HOST_ORIGIN.to_string(),
            payload: ChannelMessage::WidgetConfigUpdate { data: patch }
                .to_payload()
                .unwrap(),
        });

        assert_eq!(controller.phase(), Phase::Connected);
        let settings = controller.settings().unwrap();
        assert_eq!(settings.primary_color, "#112233");
        // The greeting re-evaluates against the patched text.
        assert_eq!(controller.messages()[0].content, "Patched hello");
        // Identity is untouched.
        assert_eq!(settings.widget_id, "w-1");
    }

    #[tokio::test]
    async fn unrecognized_payloads_are_dropped_without_effect() {
        let (mut controller, _backend, _host_end) = build(EmbedMode::Embedded);
        controller.init().await;
        let before = controller.settings().cloned();

        controller.handle_envelope(Envelope {
            origin: HOST_ORIGIN.to_string(),
            payload: r#"{"type":"widget-takeover","config":{"widgetId":"w-1"}}"#.to_string(),
        });

        assert_eq!(controller.settings().cloned(), before);
        assert_eq!(controller.phase(), Phase::AwaitingChannelConfig);
    }
}
