//! services/widget/src/runtime/chat.rs
//!
//! The session and message exchange. Owns the visitor identity, the lazily
//! created chat session and the append-only message transcript, and drives
//! the optimistic delivery-status transitions around each send.

use chatlite_core::domain::{
    new_visitor_id, ChatSession, DeliveryStatus, Message, PageContext, VISITOR_ID_KEY,
    WELCOME_MESSAGE_ID,
};
use chatlite_core::ports::{
    BackendService, CreateSessionRequest, PortResult, SendMessageRequest, VisitorStore,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// The friendly text shown in place of a reply when a send fails. Raw errors
/// never reach the transcript.
const SEND_FAILURE_TEXT: &str = "Sorry, I encountered an error. Please try again.";

/// One embedded document's chat exchange with the backend.
///
/// The exchange is owned by a single document timeline and mutated through
/// `&mut self`; that exclusive borrow is what single-flights session creation
/// when sends overlap.
pub struct ChatExchange {
    widget_id: String,
    backend: Arc<dyn BackendService>,
    page: PageContext,
    visitor_id: Option<String>,
    session: Option<ChatSession>,
    messages: Vec<Message>,
}

impl ChatExchange {
    pub fn new(
        widget_id: impl Into<String>,
        backend: Arc<dyn BackendService>,
        page: PageContext,
    ) -> Self {
        Self {
            widget_id: widget_id.into(),
            backend,
            page,
            visitor_id: None,
            session: None,
            messages: Vec::new(),
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn visitor_id(&self) -> Option<&str> {
        self.visitor_id.as_deref()
    }

    pub fn session(&self) -> Option<&ChatSession> {
        self.session.as_ref()
    }

    /// Resolves the durable visitor identity, generating and persisting a
    /// fresh one on first need. An existing identity is never regenerated.
    /// A broken store degrades to an unpersisted identity rather than a
    /// broken chat.
    pub async fn ensure_visitor(&mut self, store: &dyn VisitorStore) {
        if self.visitor_id.is_some() {
            return;
        }
        match store.get(&self.page.origin, VISITOR_ID_KEY).await {
            Ok(Some(existing)) => {
                debug!("reusing visitor identity {}", existing);
                self.visitor_id = Some(existing);
            }
            Ok(None) => {
                let fresh = new_visitor_id();
                if let Err(e) = store.put(&self.page.origin, VISITOR_ID_KEY, &fresh).await {
                    warn!("failed to persist visitor identity: {}", e);
                }
                self.visitor_id = Some(fresh);
            }
            Err(e) => {
                warn!("visitor store unavailable, using ephemeral identity: {}", e);
                self.visitor_id = Some(new_visitor_id());
            }
        }
    }

    /// Replaces the welcome/offline entry. The reserved id supersedes any
    /// prior entry carrying it, and the result is always re-pinned to
    /// position 0; every other message keeps its place.
    pub fn set_greeting(&mut self, content: &str) {
        self.messages.retain(|m| m.id != WELCOME_MESSAGE_ID);
        self.messages.insert(0, Message::welcome(content));
    }

    /// Whether `send` would actually dispatch anything.
    pub fn can_send(&self, content: &str) -> bool {
        !content.trim().is_empty() && self.visitor_id.is_some()
    }

    /// Sends a user message: appends it optimistically with status
    /// `Sending`, lazily creates the session on first use, then flips the
    /// message to `Delivered` with the assistant's reply appended, or to
    /// `Error` with a synthetic failure reply. Empty input or a missing
    /// visitor identity make this a no-op.
    pub async fn send(&mut self, content: &str) {
        let content = content.trim();
        if content.is_empty() {
            return;
        }
        let Some(visitor_id) = self.visitor_id.clone() else {
            warn!("dropping send: no visitor identity resolved yet");
            return;
        };

        let user_message = Message::user(content);
        let user_message_id = user_message.id.clone();
        self.messages.push(user_message);

        let reply = match self.ensure_session(&visitor_id).await {
            Ok(session_id) => {
                self.backend
                    .send_message(&SendMessageRequest {
                        message: content.to_string(),
                        session_id,
                        visitor_id,
                        page_url: self.page.url.clone(),
                        page_title: self.page.title.clone(),
                        user_agent: self.page.user_agent.clone(),
                    })
                    .await
            }
            Err(e) => Err(e),
        };

        match reply {
            Ok(response) => {
                self.set_status(&user_message_id, DeliveryStatus::Delivered);
                self.messages
                    .push(Message::assistant(response.message_id, response.response));
            }
            Err(e) => {
                warn!("message send failed: {}", e);
                self.set_status(&user_message_id, DeliveryStatus::Error);
                self.messages.push(Message::assistant_error(SEND_FAILURE_TEXT));
            }
        }
    }

    /// Returns the session id, creating the session on first need. Exactly
    /// one session exists per document lifetime; a session that was created
    /// is never replaced, while a failed creation is retried on the next
    /// send.
    async fn ensure_session(&mut self, visitor_id: &str) -> PortResult<String> {
        if let Some(session) = &self.session {
            return Ok(session.session_id.clone());
        }

        let created = self
            .backend
            .create_session(&CreateSessionRequest {
                visitor_id: visitor_id.to_string(),
                page_url: self.page.url.clone(),
                page_title: self.page.title.clone(),
                user_agent: self.page.user_agent.clone(),
                referrer: self.page.referrer.clone(),
            })
            .await?;

        debug!("created chat session {}", created.session_id);
        self.session = Some(ChatSession {
            session_id: created.session_id.clone(),
            visitor_id: visitor_id.to_string(),
        });
        Ok(created.session_id)
    }

    fn set_status(&mut self, message_id: &str, status: DeliveryStatus) {
        if let Some(message) = self.messages.iter_mut().find(|m| m.id == message_id) {
            message.status = status;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::MemoryVisitorStore;
    use crate::testutil::{test_page, MockBackend};
    use chatlite_core::domain::MessageRole;

    async fn exchange_with(backend: Arc<MockBackend>) -> ChatExchange {
        let mut exchange = ChatExchange::new("w-1", backend, test_page());
        exchange.ensure_visitor(&MemoryVisitorStore::new()).await;
        exchange
    }

    #[tokio::test]
    async fn blank_input_produces_no_message_and_no_network_call() {
        let backend = Arc::new(MockBackend::new());
        let mut exchange = exchange_with(backend.clone()).await;

        exchange.send("").await;
        exchange.send("   ").await;

        assert!(exchange.messages().is_empty());
        assert_eq!(backend.calls(), Vec::<&str>::new());
    }

    #[tokio::test]
    async fn send_without_visitor_identity_is_a_no_op() {
        let backend = Arc::new(MockBackend::new());
        let mut exchange = ChatExchange::new("w-1", backend.clone(), test_page());

        exchange.send("hello").await;

        assert!(exchange.messages().is_empty());
        assert_eq!(backend.calls(), Vec::<&str>::new());
    }

    #[tokio::test]
    async fn first_send_creates_the_session_then_delivers() {
        let backend = Arc::new(MockBackend::new());
        let mut exchange = exchange_with(backend.clone()).await;
        exchange.set_greeting("Welcome!");

        exchange.send("hello").await;

        assert_eq!(backend.calls(), vec!["create_session", "send_message"]);

        let messages = exchange.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].id, WELCOME_MESSAGE_ID);
        assert_eq!(messages[1].role, MessageRole::User);
        assert_eq!(messages[1].status, DeliveryStatus::Delivered);
        assert_eq!(messages[2].role, MessageRole::Assistant);
        assert_eq!(messages[2].status, DeliveryStatus::Delivered);
        assert_eq!(exchange.session().unwrap().session_id, "sess-1");
    }

    #[tokio::test]
    async fn the_session_is_created_exactly_once() {
        let backend = Arc::new(MockBackend::new());
        let mut exchange = exchange_with(backend.clone()).await;

        exchange.send("one").await;
        exchange.send("two").await;

        assert_eq!(
            backend.calls(),
            vec!["create_session", "send_message", "send_message"]
        );
    }

    #[tokio::test]
    async fn failed_send_flips_the_user_message_and_appends_one_error_reply() {
        let backend = Arc::new(MockBackend::new());
        let mut exchange = exchange_with(backend.clone()).await;
        exchange.set_greeting("Welcome!");
        exchange.send("works").await;

        backend.fail_messages();
        let before = exchange.messages().to_vec();
        exchange.send("breaks").await;

        let messages = exchange.messages();
        // The prior transcript is untouched.
        assert_eq!(&messages[..before.len()], &before[..]);

        let user = &messages[before.len()];
        let error_reply = &messages[before.len() + 1];
        assert_eq!(user.role, MessageRole::User);
        assert_eq!(user.status, DeliveryStatus::Error);
        assert_eq!(error_reply.role, MessageRole::Assistant);
        assert_eq!(error_reply.status, DeliveryStatus::Error);
        assert_eq!(error_reply.content, SEND_FAILURE_TEXT);
        assert_eq!(messages.len(), before.len() + 2);
    }

    #[tokio::test]
    async fn visitor_identity_survives_a_second_initialization() {
        let backend = Arc::new(MockBackend::new());
        let store = MemoryVisitorStore::new();

        let mut first = ChatExchange::new("w-1", backend.clone(), test_page());
        first.ensure_visitor(&store).await;
        let first_id = first.visitor_id().unwrap().to_string();

        let mut second = ChatExchange::new("w-1", backend, test_page());
        second.ensure_visitor(&store).await;

        assert_eq!(second.visitor_id().unwrap(), first_id);
    }

    #[tokio::test]
    async fn greeting_is_always_repinned_to_position_zero() {
        let backend = Arc::new(MockBackend::new());
        let mut exchange = exchange_with(backend).await;

        exchange.set_greeting("first");
        exchange.send("hello").await;
        exchange.set_greeting("second");

        let messages = exchange.messages();
        assert_eq!(messages[0].id, WELCOME_MESSAGE_ID);
        assert_eq!(messages[0].content, "second");
        // Exactly one entry carries the reserved id.
        assert_eq!(
            messages.iter().filter(|m| m.id == WELCOME_MESSAGE_ID).count(),
            1
        );
        assert_eq!(messages.len(), 3);
    }
}
