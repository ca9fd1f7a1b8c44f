//! services/widget/src/testutil.rs
//!
//! Shared test doubles: a scriptable in-memory `BackendService` with call
//! recording, and a canned host-page context.

use async_trait::async_trait;
use chatlite_core::domain::PageContext;
use chatlite_core::ports::{
    BackendService, CreateSessionRequest, MessageReplyResponse, PortError, PortResult,
    RemoteWidgetConfig, SendMessageRequest, SessionCreatedResponse, VerifyRequest,
    VerifyResponse, WidgetConfigResponse, WidgetStatusResponse,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

pub fn test_page() -> PageContext {
    PageContext {
        origin: "https://shop.example".to_string(),
        url: "https://shop.example/products".to_string(),
        title: "Products".to_string(),
        user_agent: "test-agent/1.0".to_string(),
        referrer: "https://search.example".to_string(),
    }
}

/// A `BackendService` whose outcomes are toggled per test. Every call is
/// recorded in order so tests can assert counts and sequencing.
pub struct MockBackend {
    calls: Mutex<Vec<&'static str>>,
    status_verified: AtomicBool,
    status_active: AtomicBool,
    status_fails: AtomicBool,
    verify_grants: AtomicBool,
    config_verified: AtomicBool,
    config_active: AtomicBool,
    config_fails: AtomicBool,
    messages_fail: AtomicBool,
}

impl MockBackend {
    /// A healthy backend: verified, active, every call succeeds.
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            status_verified: AtomicBool::new(true),
            status_active: AtomicBool::new(true),
            status_fails: AtomicBool::new(false),
            verify_grants: AtomicBool::new(true),
            config_verified: AtomicBool::new(true),
            config_active: AtomicBool::new(true),
            config_fails: AtomicBool::new(false),
            messages_fail: AtomicBool::new(false),
        }
    }

    pub fn unverified(&self) {
        self.status_verified.store(false, Ordering::SeqCst);
    }

    pub fn inactive(&self) {
        self.status_active.store(false, Ordering::SeqCst);
    }

    pub fn fail_status(&self) {
        self.status_fails.store(true, Ordering::SeqCst);
    }

    pub fn deny_verification(&self) {
        self.verify_grants.store(false, Ordering::SeqCst);
    }

    pub fn fail_config(&self) {
        self.config_fails.store(true, Ordering::SeqCst);
    }

    pub fn fail_messages(&self) {
        self.messages_fail.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().expect("mock lock").clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls().iter().filter(|c| **c == name).count()
    }

    fn record(&self, name: &'static str) {
        self.calls.lock().expect("mock lock").push(name);
    }
}

#[async_trait]
impl BackendService for MockBackend {
    async fn widget_status(&self, _widget_id: &str) -> PortResult<WidgetStatusResponse> {
        self.record("widget_status");
        if self.status_fails.load(Ordering::SeqCst) {
            return Err(PortError::Transport("connection refused".to_string()));
        }
        Ok(WidgetStatusResponse {
            verification_status: if self.status_verified.load(Ordering::SeqCst) {
                "verified".to_string()
            } else {
                "pending".to_string()
            },
            status: if self.status_active.load(Ordering::SeqCst) {
                "active".to_string()
            } else {
                "inactive".to_string()
            },
        })
    }

    async fn verify_widget(
        &self,
        _widget_id: &str,
        _request: &VerifyRequest,
    ) -> PortResult<VerifyResponse> {
        self.record("verify_widget");
        Ok(VerifyResponse {
            verified: self.verify_grants.load(Ordering::SeqCst),
        })
    }

    async fn widget_config(&self, _widget_id: &str) -> PortResult<WidgetConfigResponse> {
        self.record("widget_config");
        if self.config_fails.load(Ordering::SeqCst) {
            return Err(PortError::Transport("connection refused".to_string()));
        }
        Ok(WidgetConfigResponse {
            is_verified: self.config_verified.load(Ordering::SeqCst),
            is_active: self.config_active.load(Ordering::SeqCst),
            config: Some(RemoteWidgetConfig {
                widget_position: None,
                widget_color: Some("#a08831".to_string()),
                welcome_message: Some("Hi! Ask your queries?".to_string()),
                placeholder_text: Some("Typing...".to_string()),
                company_name: Some("Support".to_string()),
            }),
        })
    }

    async fn create_session(
        &self,
        _request: &CreateSessionRequest,
    ) -> PortResult<SessionCreatedResponse> {
        self.record("create_session");
        Ok(SessionCreatedResponse {
            session_id: "sess-1".to_string(),
        })
    }

    async fn send_message(
        &self,
        request: &SendMessageRequest,
    ) -> PortResult<MessageReplyResponse> {
        self.record("send_message");
        if self.messages_fail.load(Ordering::SeqCst) {
            return Err(PortError::Transport("connection reset".to_string()));
        }
        Ok(MessageReplyResponse {
            message_id: Some("m-1".to_string()),
            response: format!("Echo: {}", request.message),
        })
    }
}
