//! services/widget/src/adapters/channel.rs
//!
//! In-process carrier for the cross-document channel. Each document gets a
//! sender stamped with its own origin and a receiver for its peer's
//! dispatches. Posting is fire-and-forget: a gone peer makes the dispatch a
//! silent no-op, matching the at-most-once, no-retry contract.

use chatlite_core::protocol::{ChannelMessage, Envelope};
use tokio::sync::mpsc;
use tracing::warn;

/// The posting half held by one document. Cloneable so long-lived tasks can
/// dispatch without coordinating.
#[derive(Clone)]
pub struct ChannelSender {
    origin: String,
    tx: mpsc::UnboundedSender<Envelope>,
}

impl ChannelSender {
    /// Serializes and dispatches `message`, stamping the sender origin.
    /// Failures are swallowed: delivery is best-effort by design.
    pub fn post(&self, message: &ChannelMessage) {
        let payload = match message.to_payload() {
            Ok(payload) => payload,
            Err(e) => {
                warn!("failed to encode channel message: {}", e);
                return;
            }
        };
        let _ = self.tx.send(Envelope {
            origin: self.origin.clone(),
            payload,
        });
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }
}

/// The receiving half held by one document.
pub struct ChannelReceiver {
    rx: mpsc::UnboundedReceiver<Envelope>,
}

impl ChannelReceiver {
    /// Waits for the next inbound envelope. `None` means the peer dropped
    /// its sender and nothing further will arrive.
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.rx.recv().await
    }

    /// Whether any envelopes are currently queued.
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

/// One document's end of the channel.
pub struct DocumentEnd {
    pub sender: ChannelSender,
    pub receiver: ChannelReceiver,
}

/// Builds a connected channel between two documents identified by their
/// origins. Returns `(first_end, second_end)` where each end posts to the
/// other's receiver.
pub fn pair(first_origin: &str, second_origin: &str) -> (DocumentEnd, DocumentEnd) {
    let (tx_to_second, rx_at_second) = mpsc::unbounded_channel();
    let (tx_to_first, rx_at_first) = mpsc::unbounded_channel();

    let first = DocumentEnd {
        sender: ChannelSender {
            origin: first_origin.to_string(),
            tx: tx_to_second,
        },
        receiver: ChannelReceiver { rx: rx_at_first },
    };
    let second = DocumentEnd {
        sender: ChannelSender {
            origin: second_origin.to_string(),
            tx: tx_to_first,
        },
        receiver: ChannelReceiver { rx: rx_at_second },
    };
    (first, second)
}
