//! Chat delivery and per-session teardown isolation.

use crate::*;

use std::sync::Arc;

use beacon_peer::{AcceptAll, SessionError};

#[tokio::test]
async fn send_delivers_text_attributed_to_the_sender() {
    let (url, _dir) = start_directory().await.unwrap();
    let mut alice = spawn_peer(&url, "alice", Arc::new(AcceptAll)).await.unwrap();
    let bob = spawn_peer(&url, "bob", Arc::new(AcceptAll)).await.unwrap();

    bob.node.connect("alice").await.unwrap();
    bob.node.send("alice", "hi").await.unwrap();

    let (from, text) = next_message(&mut alice.events).await;
    assert_eq!(from, "bob");
    assert_eq!(text, "hi");
}

#[tokio::test]
async fn chat_flows_both_ways_on_one_session() {
    let (url, _dir) = start_directory().await.unwrap();
    let mut alice = spawn_peer(&url, "alice", Arc::new(AcceptAll)).await.unwrap();
    let mut bob = spawn_peer(&url, "bob", Arc::new(AcceptAll)).await.unwrap();

    bob.node.connect("alice").await.unwrap();
    assert!(wait_for(|| alice.node.is_connected("bob")).await);

    bob.node.send("alice", "ping").await.unwrap();
    let (from, text) = next_message(&mut alice.events).await;
    assert_eq!((from.as_str(), text.as_str()), ("bob", "ping"));

    alice.node.send("bob", "pong").await.unwrap();
    let (from, text) = next_message(&mut bob.events).await;
    assert_eq!((from.as_str(), text.as_str()), ("alice", "pong"));
}

#[tokio::test]
async fn send_without_a_session_is_not_connected() {
    let (url, _dir) = start_directory().await.unwrap();
    let alice = spawn_peer(&url, "alice", Arc::new(AcceptAll)).await.unwrap();

    let err = alice.node.send("bob", "hi").await.unwrap_err();
    assert!(matches!(err, SessionError::NotConnected(ref p) if p == "bob"));
}

#[tokio::test]
async fn closing_one_session_leaves_the_others_untouched() {
    let (url, _dir) = start_directory().await.unwrap();
    let mut alice = spawn_peer(&url, "alice", Arc::new(AcceptAll)).await.unwrap();
    let bob = spawn_peer(&url, "bob", Arc::new(AcceptAll)).await.unwrap();
    let carol = spawn_peer(&url, "carol", Arc::new(AcceptAll)).await.unwrap();

    bob.node.connect("alice").await.unwrap();
    carol.node.connect("alice").await.unwrap();
    assert!(wait_for(|| alice.node.active_peers().len() == 2).await);

    // Bob goes away; his read loops close his sockets on exit.
    bob.node.shutdown();

    assert!(wait_for(|| !alice.node.is_connected("bob")).await);
    assert!(alice.node.is_connected("carol"), "carol's session must survive");

    // The dead session is gone from the table, so send now fails fast...
    let err = alice.node.send("bob", "hi").await.unwrap_err();
    assert!(matches!(err, SessionError::NotConnected(_)));

    // ...while the surviving session still carries chat.
    carol.node.send("alice", "still here").await.unwrap();
    let (from, text) = next_message(&mut alice.events).await;
    assert_eq!((from.as_str(), text.as_str()), ("carol", "still here"));
}
