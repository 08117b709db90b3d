//! Beacon integration test harness.
//!
//! Everything runs in-process on loopback: each test spins up its own
//! directory on an ephemeral port and as many peers as the scenario needs,
//! so tests stay independent and safe to run in parallel.

mod messaging;
mod sessions;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};

use beacon_directory::{api, ApiState, Directory, MemoryStore};
use beacon_peer::{AcceptPolicy, DirectoryClient, PeerEvent, PeerNode};

// ── Harness ───────────────────────────────────────────────────────────────────

/// Start an in-process directory with a memory store on an ephemeral port.
/// Returns its base URL and the shutdown sender that keeps it alive.
pub async fn start_directory() -> Result<(String, broadcast::Sender<()>)> {
    let directory = Arc::new(Directory::new(Arc::new(MemoryStore::new())));
    let state = ApiState { directory };

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let (shutdown_tx, _) = broadcast::channel(1);
    let rx = shutdown_tx.subscribe();
    tokio::spawn(async move {
        let _ = api::serve_with_listener(state, listener, rx).await;
    });

    Ok((format!("http://{addr}"), shutdown_tx))
}

/// A registered, listening peer with the given accept policy.
pub struct TestPeer {
    pub node: PeerNode,
    pub events: mpsc::UnboundedReceiver<PeerEvent>,
    pub addr: SocketAddr,
}

pub async fn spawn_peer(
    directory_url: &str,
    username: &str,
    policy: Arc<dyn AcceptPolicy>,
) -> Result<TestPeer> {
    let (node, events) = PeerNode::new(username, DirectoryClient::new(directory_url));
    let addr = node.listen("127.0.0.1:0", policy).await?;
    node.directory()
        .register(username, "127.0.0.1", addr.port())
        .await?;
    Ok(TestPeer { node, events, addr })
}

/// Poll `predicate` until it holds or ~2 seconds pass.
pub async fn wait_for(mut predicate: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    predicate()
}

/// Receive the next event or panic after a deadline.
pub async fn next_event(events: &mut mpsc::UnboundedReceiver<PeerEvent>) -> PeerEvent {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for a peer event")
        .expect("event channel closed")
}

/// Drain events until the next chat message, returning (from, text).
pub async fn next_message(events: &mut mpsc::UnboundedReceiver<PeerEvent>) -> (String, String) {
    loop {
        if let PeerEvent::Message { from, text } = next_event(events).await {
            return (from, text);
        }
    }
}
