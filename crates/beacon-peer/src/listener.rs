//! Inbound chat listener.
//!
//! Accepts TCP connections and runs the receiving side of the control
//! exchange. Each accepted connection gets its own handshake task, so a
//! slow policy decision on one connection never stalls the accept loop or
//! other handshakes.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::time::timeout;

use beacon_core::proto;

use crate::node::install_session;
use crate::policy::AcceptPolicy;
use crate::session::{Direction, EventSender, SessionTable};

pub struct SessionListener {
    listener: TcpListener,
    sessions: SessionTable,
    policy: Arc<dyn AcceptPolicy>,
    events: EventSender,
    shutdown: broadcast::Sender<()>,
}

impl SessionListener {
    pub fn new(
        listener: TcpListener,
        sessions: SessionTable,
        policy: Arc<dyn AcceptPolicy>,
        events: EventSender,
        shutdown: broadcast::Sender<()>,
    ) -> Self {
        Self {
            listener,
            sessions,
            policy,
            events,
            shutdown,
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let mut shutdown = self.shutdown.subscribe();

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("chat listener shutting down");
                    return Ok(());
                }

                result = self.listener.accept() => {
                    let (stream, peer_addr) = match result {
                        Ok(r) => r,
                        Err(e) => {
                            tracing::warn!(error = %e, "accept failed");
                            continue;
                        }
                    };
                    tracing::debug!(%peer_addr, "incoming connection");

                    let sessions = self.sessions.clone();
                    let policy = self.policy.clone();
                    let events = self.events.clone();
                    let shutdown = self.shutdown.clone();
                    tokio::spawn(async move {
                        handle_inbound(stream, sessions, policy, events, shutdown).await;
                    });
                }
            }
        }
    }
}

/// Receiver side of the control exchange:
/// read `CONNECT <username>` → decide → reply → promote to a session.
async fn handle_inbound(
    mut stream: TcpStream,
    sessions: SessionTable,
    policy: Arc<dyn AcceptPolicy>,
    events: EventSender,
    shutdown: broadcast::Sender<()>,
) {
    let peer_addr = match stream.peer_addr() {
        Ok(a) => a,
        Err(e) => {
            tracing::warn!(error = %e, "could not resolve peer address");
            return;
        }
    };

    // One request frame, bounded in both size and wait.
    let mut buf = vec![0u8; proto::HANDSHAKE_BUF_LEN];
    let read = timeout(
        Duration::from_secs(proto::HANDSHAKE_TIMEOUT_SECS),
        stream.read(&mut buf),
    )
    .await;
    let len = match read {
        Err(_) => {
            tracing::debug!(%peer_addr, "silent connection, closing");
            return;
        }
        Ok(Ok(0)) => {
            tracing::debug!(%peer_addr, "connection closed before request frame");
            return;
        }
        Ok(Ok(n)) => n,
        Ok(Err(e)) => {
            tracing::warn!(%peer_addr, error = %e, "failed to read request frame");
            return;
        }
    };

    let peer_username = match proto::parse_connect(&buf[..len]) {
        Some(name) => name.to_string(),
        None => {
            tracing::warn!(%peer_addr, "malformed request frame, closing");
            return;
        }
    };

    // A peer we already hold a session with is refused outright; the live
    // stream wins.
    if sessions.contains_key(&peer_username) {
        tracing::debug!(peer = %peer_username, "duplicate connect attempt, rejecting");
        let _ = stream.write_all(proto::REJECTED).await;
        return;
    }

    // May wait on a human. Only this task blocks.
    if !policy.decide(&peer_username).await {
        tracing::info!(peer = %peer_username, "chat request rejected");
        let _ = stream.write_all(proto::REJECTED).await;
        return;
    }

    if let Err(e) = stream.write_all(proto::ACCEPTED).await {
        tracing::warn!(peer = %peer_username, error = %e, "failed to send accept frame");
        return;
    }

    install_session(
        stream,
        peer_username,
        peer_addr,
        Direction::Inbound,
        sessions,
        events,
        shutdown,
    );
}
