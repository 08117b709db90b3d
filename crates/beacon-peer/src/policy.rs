//! Accept policy — who decides whether an inbound chat request is taken.
//!
//! The protocol layer never prompts anyone. It asks a policy object, and a
//! pending decision blocks only the one handshake task that is waiting —
//! never the accept loop or other sessions.

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::session::{EventSender, PeerEvent};

#[async_trait]
pub trait AcceptPolicy: Send + Sync {
    /// Decide on an inbound request from `peer_username`.
    async fn decide(&self, peer_username: &str) -> bool;
}

/// Accept every request. Useful for automation and tests.
pub struct AcceptAll;

#[async_trait]
impl AcceptPolicy for AcceptAll {
    async fn decide(&self, _peer_username: &str) -> bool {
        true
    }
}

/// Reject every request.
pub struct DenyAll;

#[async_trait]
impl AcceptPolicy for DenyAll {
    async fn decide(&self, _peer_username: &str) -> bool {
        false
    }
}

/// Forward each decision to whoever consumes the event stream, one oneshot
/// per request. A dropped responder counts as a rejection, so a consumer
/// that goes away cannot leave handshakes accepted by default.
pub struct EventPolicy {
    events: EventSender,
}

impl EventPolicy {
    pub fn new(events: EventSender) -> Self {
        Self { events }
    }
}

#[async_trait]
impl AcceptPolicy for EventPolicy {
    async fn decide(&self, peer_username: &str) -> bool {
        let (tx, rx) = oneshot::channel();
        let sent = self.events.send(PeerEvent::IncomingRequest {
            from: peer_username.to_string(),
            respond: tx,
        });
        if sent.is_err() {
            return false;
        }
        rx.await.unwrap_or(false)
    }
}
