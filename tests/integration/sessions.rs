//! Handshake and session-table behavior between live peers.

use crate::*;

use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use beacon_core::proto;
use beacon_peer::{
    AcceptAll, DenyAll, DirectoryClient, EventPolicy, PeerEvent, PeerNode, SessionError,
};

#[tokio::test]
async fn accepted_handshake_creates_sessions_on_both_sides() {
    let (url, _dir) = start_directory().await.unwrap();
    let alice = spawn_peer(&url, "alice", Arc::new(AcceptAll)).await.unwrap();
    let bob = spawn_peer(&url, "bob", Arc::new(AcceptAll)).await.unwrap();

    bob.node.connect("alice").await.unwrap();

    assert!(bob.node.is_connected("alice"));
    assert_eq!(bob.node.active_peers(), vec!["alice".to_string()]);

    // The receiver installs its session right after replying; give it a beat.
    assert!(wait_for(|| alice.node.is_connected("bob")).await);
    assert_eq!(alice.node.active_peers(), vec!["bob".to_string()]);
}

#[tokio::test]
async fn rejected_handshake_leaves_no_sessions() {
    let (url, _dir) = start_directory().await.unwrap();
    let alice = spawn_peer(&url, "alice", Arc::new(DenyAll)).await.unwrap();
    let bob = spawn_peer(&url, "bob", Arc::new(AcceptAll)).await.unwrap();

    let err = bob.node.connect("alice").await.unwrap_err();
    assert!(matches!(err, SessionError::HandshakeRejected));

    assert!(bob.node.active_peers().is_empty());
    assert!(alice.node.active_peers().is_empty());
}

#[tokio::test]
async fn connect_to_unregistered_peer_is_peer_not_found() {
    let (url, _dir) = start_directory().await.unwrap();
    let bob = spawn_peer(&url, "bob", Arc::new(AcceptAll)).await.unwrap();

    let err = bob.node.connect("carol").await.unwrap_err();
    assert!(matches!(err, SessionError::PeerNotFound));
    assert!(bob.node.active_peers().is_empty());
}

#[tokio::test]
async fn second_connect_to_same_peer_is_rejected_locally() {
    let (url, _dir) = start_directory().await.unwrap();
    let _alice = spawn_peer(&url, "alice", Arc::new(AcceptAll)).await.unwrap();
    let bob = spawn_peer(&url, "bob", Arc::new(AcceptAll)).await.unwrap();

    bob.node.connect("alice").await.unwrap();
    let err = bob.node.connect("alice").await.unwrap_err();
    assert!(matches!(err, SessionError::AlreadyConnected(ref p) if p == "alice"));

    // The live session survives the refused attempt.
    assert_eq!(bob.node.active_peers(), vec!["alice".to_string()]);
}

#[tokio::test]
async fn inbound_duplicate_username_gets_rejected_frame() {
    let (url, _dir) = start_directory().await.unwrap();
    let alice = spawn_peer(&url, "alice", Arc::new(AcceptAll)).await.unwrap();
    let bob = spawn_peer(&url, "bob", Arc::new(AcceptAll)).await.unwrap();

    bob.node.connect("alice").await.unwrap();
    assert!(wait_for(|| alice.node.is_connected("bob")).await);

    // A second raw connection claiming to be bob must be refused without
    // touching the established session.
    let mut raw = tokio::net::TcpStream::connect(alice.addr).await.unwrap();
    raw.write_all(&proto::connect_frame("bob")).await.unwrap();
    let mut buf = [0u8; 16];
    let n = raw.read(&mut buf).await.unwrap();
    assert_eq!(&buf[..n], proto::REJECTED);

    assert!(alice.node.is_connected("bob"));
    assert!(bob.node.is_connected("alice"));
}

#[tokio::test]
async fn malformed_first_frame_closes_without_reply() {
    let (url, _dir) = start_directory().await.unwrap();
    let alice = spawn_peer(&url, "alice", Arc::new(AcceptAll)).await.unwrap();

    let mut raw = tokio::net::TcpStream::connect(alice.addr).await.unwrap();
    raw.write_all(b"HELLO alice").await.unwrap();

    // The receiver closes silently: the next read sees EOF, not a frame.
    let mut buf = [0u8; 16];
    let n = raw.read(&mut buf).await.unwrap();
    assert_eq!(n, 0);
    assert!(alice.node.active_peers().is_empty());
}

#[tokio::test]
async fn prompt_policy_decides_through_the_event_stream() {
    let (url, _dir) = start_directory().await.unwrap();

    // Hand-built peer so the accept decision flows through its own events.
    let (node, mut events) = PeerNode::new("alice", DirectoryClient::new(&url));
    let policy = Arc::new(EventPolicy::new(node.events()));
    let addr = node.listen("127.0.0.1:0", policy).await.unwrap();
    node.directory()
        .register("alice", "127.0.0.1", addr.port())
        .await
        .unwrap();

    let bob = spawn_peer(&url, "bob", Arc::new(AcceptAll)).await.unwrap();
    let bob_node = bob.node;
    let connect = tokio::spawn(async move {
        let result = bob_node.connect("alice").await;
        (bob_node, result)
    });

    // Alice's consumer sees the request and approves it; only then does
    // bob's connect resolve.
    match next_event(&mut events).await {
        PeerEvent::IncomingRequest { from, respond } => {
            assert_eq!(from, "bob");
            respond.send(true).unwrap();
        }
        other => panic!("unexpected event: {other:?}"),
    }

    let (bob_node, result) = connect.await.unwrap();
    result.unwrap();
    assert!(bob_node.is_connected("alice"));
    assert!(wait_for(|| node.is_connected("bob")).await);
}
