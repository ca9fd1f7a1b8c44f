//! services/widget/src/loader.rs
//!
//! The host-page loader bootstrap. Performs the status/verification
//! pre-flight, mounts the embedded document, pushes the first config over
//! the channel, and owns the container chrome in response to widget events.
//! A pre-flight failure is never fatal: the visible affordance always
//! appears, at worst in its offline form.

use crate::adapters::channel::{ChannelReceiver, ChannelSender, DocumentEnd};
use crate::config::Config;
use chatlite_core::domain::{PageContext, Theme, VerificationStatus, WidgetPosition, WidgetSize};
use chatlite_core::ports::{
    BackendService, ChromeSkin, EmbedHandle, EmbedHost, EmbedSpec, VerifyRequest,
};
use chatlite_core::protocol::{ChannelMessage, ScriptConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// The configuration bag accepted by the embedding surface. Everything but
/// the widget id has a default.
#[derive(Debug, Clone)]
pub struct EmbedOptions {
    pub widget_id: String,
    pub frontend_base: String,
    pub api_base: String,
    pub position: WidgetPosition,
    pub size: WidgetSize,
    pub primary_color: String,
    pub border_radius: String,
    pub font_family: String,
    pub theme: Theme,
    pub welcome_message: Option<String>,
    pub placeholder_text: Option<String>,
    pub company_name: Option<String>,
    pub offline_message: Option<String>,
}

impl EmbedOptions {
    pub fn new(
        widget_id: impl Into<String>,
        frontend_base: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            widget_id: widget_id.into(),
            frontend_base: frontend_base.into(),
            api_base: api_base.into(),
            position: WidgetPosition::default(),
            size: WidgetSize::default(),
            primary_color: "#0066CC".to_string(),
            border_radius: "12px".to_string(),
            font_family: "-apple-system,BlinkMacSystemFont,Segoe UI,sans-serif".to_string(),
            theme: Theme::default(),
            welcome_message: None,
            placeholder_text: None,
            company_name: None,
            offline_message: None,
        }
    }

    pub fn from_config(config: &Config, widget_id: impl Into<String>) -> Self {
        Self::new(
            widget_id,
            config.frontend_base.as_str(),
            config.api_base.as_str(),
        )
    }

    fn offline_text(&self) -> String {
        self.offline_message
            .clone()
            .unwrap_or_else(|| "We're currently offline. Please try again later.".to_string())
    }
}

/// The loader instance living in one host document.
pub struct Loader {
    options: EmbedOptions,
    backend: Arc<dyn BackendService>,
    host: Arc<dyn EmbedHost>,
    sender: ChannelSender,
    receiver: Mutex<Option<ChannelReceiver>>,
    page: PageContext,
    /// Origin the embedded document is served from; the only origin whose
    /// envelopes the host processes.
    embed_origin: String,
    handle: Arc<Mutex<Option<Box<dyn EmbedHandle>>>>,
    visible: AtomicBool,
    /// Set after a successful verification; later pre-flights short-circuit.
    verified: AtomicBool,
    pump_cancel: Mutex<Option<CancellationToken>>,
}

impl Loader {
    pub fn new(
        options: EmbedOptions,
        backend: Arc<dyn BackendService>,
        host: Arc<dyn EmbedHost>,
        end: DocumentEnd,
        page: PageContext,
    ) -> Self {
        let embed_origin = origin_of(&options.frontend_base);
        Self {
            options,
            backend,
            host,
            sender: end.sender,
            receiver: Mutex::new(Some(end.receiver)),
            page,
            embed_origin,
            handle: Arc::new(Mutex::new(None)),
            visible: AtomicBool::new(false),
            verified: AtomicBool::new(false),
            pump_cancel: Mutex::new(None),
        }
    }

    //=====================================================================================
    // Pre-flight
    //=====================================================================================

    /// Checks whether the widget may go online. Verified and active passes
    /// straight through; an unverified widget gets exactly one verification
    /// attempt whose outcome is the answer (a success implies active, so the
    /// status is not re-read). Inactive widgets and transport failures
    /// answer false.
    pub async fn check_status(&self) -> bool {
        if self.verified.load(Ordering::SeqCst) {
            return true;
        }

        let status = match self.backend.widget_status(&self.options.widget_id).await {
            Ok(status) => status,
            Err(e) => {
                warn!("status check failed: {}", e);
                return false;
            }
        };

        if status.is_verified() && status.is_active() {
            debug!("widget verified and active");
            return true;
        }

        if !status.is_verified() {
            debug!("widget not verified, attempting verification");
            let verified = self.verify().await;
            if verified {
                self.verified.store(true, Ordering::SeqCst);
            }
            return verified;
        }

        warn!("widget is verified but inactive");
        false
    }

    /// One verification round trip. True only when the backend explicitly
    /// marks the attempt verified.
    pub async fn verify(&self) -> bool {
        let request = VerifyRequest {
            domain: hostname_of(&self.page.origin).to_string(),
            mode: "embedded".to_string(),
            page_url: self.page.url.clone(),
            user_agent: self.page.user_agent.clone(),
        };
        match self
            .backend
            .verify_widget(&self.options.widget_id, &request)
            .await
        {
            Ok(response) if response.verified => {
                info!("widget verification successful");
                true
            }
            Ok(_) => {
                warn!("widget verification unsuccessful");
                false
            }
            Err(e) => {
                warn!("widget verification error: {}", e);
                false
            }
        }
    }

    //=====================================================================================
    // Control surface
    //=====================================================================================

    /// Initializes the widget: runs the pre-flight once, then mounts.
    /// Idempotent, and the only entry point that performs verification.
    pub async fn init(&self) {
        if self.handle.lock().await.is_some() {
            return;
        }

        let ready = self.check_status().await;
        info!(
            "status check completed: {}",
            if ready { "ready" } else { "not ready" }
        );
        self.mount(VerificationStatus {
            verified: ready,
            active: ready,
        })
        .await;
    }

    /// Creates the embedded container and pushes the first config. The
    /// verification outcome lands in the config object before the embed
    /// exists, so the very first `widget-config` push already carries
    /// correct status. Idempotent: an existing embed handle means there is
    /// nothing to do.
    async fn mount(&self, status: VerificationStatus) {
        if self.handle.lock().await.is_some() {
            return;
        }
        let config = self.script_config(status);

        let (width, height) = self.options.size.dimensions();
        let spec = EmbedSpec {
            url: self.embed_url(),
            position: self.options.position,
            width,
            height,
            primary_color: self.options.primary_color.clone(),
            border_radius: self.options.border_radius.clone(),
            font_family: self.options.font_family.clone(),
        };

        let embed = match self.host.create_embed(&spec).await {
            Ok(embed) => embed,
            Err(e) => {
                warn!("failed to create embed, degrading to offline notice: {}", e);
                if let Err(e) = self
                    .host
                    .show_offline_notice(self.options.position, &self.options.offline_text())
                    .await
                {
                    warn!("failed to show offline notice: {}", e);
                }
                return;
            }
        };
        *self.handle.lock().await = Some(embed);
        self.visible.store(true, Ordering::SeqCst);

        let cancel = CancellationToken::new();
        if let Some(receiver) = self.receiver.lock().await.take() {
            tokio::spawn(run_host_events(
                self.handle.clone(),
                receiver,
                self.embed_origin.clone(),
                cancel.clone(),
            ));
        }
        *self.pump_cancel.lock().await = Some(cancel);

        self.sender.post(&ChannelMessage::WidgetConfig { config });
    }

    /// Removes the widget container and any offline notice, and stops the
    /// event pump.
    pub async fn destroy(&self) {
        if let Some(cancel) = self.pump_cancel.lock().await.take() {
            cancel.cancel();
        }
        if let Some(handle) = self.handle.lock().await.take() {
            if let Err(e) = handle.remove().await {
                warn!("failed to remove embed: {}", e);
            }
        }
        self.visible.store(false, Ordering::SeqCst);
        if let Err(e) = self.host.remove_offline_notice().await {
            warn!("failed to remove offline notice: {}", e);
        }
    }

    pub async fn open(&self) {
        self.set_visible(true).await;
    }

    pub async fn close(&self) {
        self.set_visible(false).await;
    }

    pub async fn toggle(&self) {
        let target = !self.visible.load(Ordering::SeqCst);
        self.set_visible(target).await;
    }

    async fn set_visible(&self, visible: bool) {
        let handle = self.handle.lock().await;
        if let Some(embed) = handle.as_ref() {
            match embed.set_visible(visible).await {
                Ok(()) => self.visible.store(visible, Ordering::SeqCst),
                Err(e) => warn!("failed to change container visibility: {}", e),
            }
        }
    }

    //=====================================================================================
    // Internals
    //=====================================================================================

    fn embed_url(&self) -> String {
        format!(
            "{}/widget?id={}&mode=embedded&theme={}",
            self.options.frontend_base.trim_end_matches('/'),
            self.options.widget_id,
            self.options.theme
        )
    }

    fn script_config(&self, status: VerificationStatus) -> ScriptConfig {
        ScriptConfig {
            widget_id: self.options.widget_id.clone(),
            position: Some(self.options.position),
            primary_color: Some(self.options.primary_color.clone()),
            size: Some(self.options.size),
            border_radius: Some(self.options.border_radius.clone()),
            font_family: Some(self.options.font_family.clone()),
            theme: Some(self.options.theme),
            welcome_message: self.options.welcome_message.clone(),
            placeholder_text: self.options.placeholder_text.clone(),
            company_name: self.options.company_name.clone(),
            offline_message: self.options.offline_message.clone(),
            api_base: Some(self.options.api_base.clone()),
            frontend_base: Some(self.options.frontend_base.clone()),
            internal_status: Some(status),
        }
    }
}

/// Host-side event pump: switches the container chrome on toggles, applies
/// resize requests, and logs readiness/errors. Envelopes from any origin
/// other than the embedded document's are dropped outright, never logged.
async fn run_host_events(
    handle: Arc<Mutex<Option<Box<dyn EmbedHandle>>>>,
    mut receiver: ChannelReceiver,
    expected_origin: String,
    cancel: CancellationToken,
) {
    loop {
        let envelope = tokio::select! {
            _ = cancel.cancelled() => break,
            envelope = receiver.recv() => match envelope {
                Some(envelope) => envelope,
                None => break,
            },
        };

        if envelope.origin != expected_origin {
            continue;
        }
        let Some(message) = ChannelMessage::decode(&envelope.payload) else {
            continue;
        };

        match message {
            ChannelMessage::WidgetToggle { is_open } => {
                let skin = if is_open {
                    ChromeSkin::Framed
                } else {
                    ChromeSkin::Chromeless
                };
                let guard = handle.lock().await;
                if let Some(embed) = guard.as_ref() {
                    if let Err(e) = embed.set_chrome(skin).await {
                        warn!("failed to switch container chrome: {}", e);
                    }
                }
            }
            ChannelMessage::WidgetResize { height } => {
                let guard = handle.lock().await;
                if let Some(embed) = guard.as_ref() {
                    if let Err(e) = embed.set_height(height).await {
                        warn!("failed to resize embed: {}", e);
                    }
                }
            }
            ChannelMessage::WidgetReady { data } => {
                info!("widget {} ready ({})", data.widget_id, data.status);
            }
            ChannelMessage::WidgetError { data } => {
                warn!(
                    "embedded widget reported an error at {}: {}",
                    data.timestamp, data.message
                );
            }
            // Config pushes travel host -> embedded; an echo is ignored.
            ChannelMessage::WidgetConfig { .. } | ChannelMessage::WidgetConfigUpdate { .. } => {}
        }
    }
    debug!("host event pump finished");
}

/// `https://shop.example:8443/a/b` -> `shop.example`
fn hostname_of(origin: &str) -> &str {
    let rest = origin.split("://").nth(1).unwrap_or(origin);
    let host = rest.split('/').next().unwrap_or(rest);
    host.split(':').next().unwrap_or(host)
}

/// Origin (`scheme://host[:port]`) of a base URL.
fn origin_of(url: &str) -> String {
    match url.split_once("://") {
        Some((scheme, rest)) => {
            let host = rest.split('/').next().unwrap_or(rest);
            format!("{}://{}", scheme, host)
        }
        None => url.to_string(),
    }
}
