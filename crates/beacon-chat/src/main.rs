//! beacon-chat — interactive chat peer.
//!
//! Registers a username with the rendezvous directory, listens for inbound
//! chat requests, and drives sessions from a line-based command shell. The
//! shell is a thin layer: every command maps onto one `PeerNode` operation.

use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, oneshot};

use beacon_core::config::BeaconConfig;
use beacon_peer::{Direction, DirectoryClient, EventPolicy, PeerEvent, PeerNode};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = BeaconConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        BeaconConfig::default()
    });

    let args: Vec<String> = std::env::args().skip(1).collect();
    let username = args
        .first()
        .cloned()
        .unwrap_or_else(|| config.peer.username.clone());
    if username.is_empty() {
        bail!("usage: beacon-chat <username> [listen_port]");
    }
    let listen_port: u16 = match args.get(1) {
        Some(p) => p.parse().context("listen_port must be a number")?,
        None => config.peer.listen_port,
    };

    let advertise_ip = if config.peer.advertise_ip.is_empty() {
        match local_ip_address::local_ip() {
            Ok(ip) => ip.to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "could not detect local IP, advertising 127.0.0.1");
                "127.0.0.1".to_string()
            }
        }
    } else {
        config.peer.advertise_ip.clone()
    };

    let directory = DirectoryClient::new(&config.peer.directory_url);
    let (node, events) = PeerNode::new(&username, directory);

    // Bind before registering so the advertised port is real even when the
    // configured one was 0.
    let policy = Arc::new(EventPolicy::new(node.events()));
    let local = node
        .listen(&format!("0.0.0.0:{listen_port}"), policy)
        .await
        .context("failed to bind chat listener")?;

    // A username we cannot register is fatal; there is no unregister, so
    // the entry is held until the directory restarts.
    node.directory()
        .register(&username, &advertise_ip, local.port())
        .await
        .with_context(|| format!("failed to register as {username}"))?;
    println!("Registered as {username} at {advertise_ip}:{}", local.port());
    println!("Commands: list, peers, connect <username>, send <username> <message>, exit");

    run_shell(node, events).await
}

// ── Command shell ─────────────────────────────────────────────────────────────

async fn run_shell(node: PeerNode, mut events: mpsc::UnboundedReceiver<PeerEvent>) -> Result<()> {
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    // Inbound requests waiting for a y/n answer, oldest first. While one is
    // pending, the next typed line is its answer rather than a command.
    let mut pending: VecDeque<(String, oneshot::Sender<bool>)> = VecDeque::new();

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                handle_event(event, &mut pending);
            }

            line = stdin.next_line() => {
                let Some(line) = line.context("stdin closed unexpectedly")? else { break };
                let line = line.trim().to_string();

                if let Some((from, respond)) = pending.pop_front() {
                    let accept = line.eq_ignore_ascii_case("y") || line.eq_ignore_ascii_case("yes");
                    if !accept {
                        println!("Rejected {from}.");
                    }
                    let _ = respond.send(accept);
                    if let Some((next, _)) = pending.front() {
                        println!("{next} wants to connect. Accept? (y/n)");
                    }
                } else if handle_command(&node, &line).await {
                    break;
                }
            }
        }
    }

    node.shutdown();
    Ok(())
}

fn handle_event(event: PeerEvent, pending: &mut VecDeque<(String, oneshot::Sender<bool>)>) {
    match event {
        PeerEvent::IncomingRequest { from, respond } => {
            pending.push_back((from, respond));
            if pending.len() == 1 {
                let (from, _) = pending.front().unwrap();
                println!("{from} wants to connect. Accept? (y/n)");
            }
        }
        PeerEvent::SessionEstablished { peer, direction } => {
            if direction == Direction::Inbound {
                println!("Connected with {peer}");
            }
        }
        PeerEvent::Message { from, text } => {
            println!("{from}: {text}");
        }
        PeerEvent::SessionClosed { peer } => {
            println!("Connection with {peer} closed");
        }
    }
}

/// Run one shell command. Returns true when the shell should exit.
async fn handle_command(node: &PeerNode, line: &str) -> bool {
    let parts: Vec<&str> = line.split_whitespace().collect();
    match parts.as_slice() {
        [] => {}

        ["list"] => match node.directory().peers().await {
            Ok(peers) => {
                let others: Vec<&str> = peers
                    .iter()
                    .map(|p| p.as_str())
                    .filter(|p| *p != node.username())
                    .collect();
                if others.is_empty() {
                    println!("No other peers registered.");
                } else {
                    println!("Available peers: {}", others.join(", "));
                }
            }
            Err(e) => println!("Failed to list peers: {e}"),
        },

        ["peers"] => {
            let active = node.active_peers();
            if active.is_empty() {
                println!("No active sessions.");
            } else {
                println!("Connected: {}", active.join(", "));
            }
        }

        ["connect", peer] => match node.connect(peer).await {
            Ok(()) => println!("Connected to {peer}"),
            Err(e) => println!("Connect failed: {e}"),
        },

        ["send", peer, rest @ ..] if !rest.is_empty() => {
            let text = rest.join(" ");
            if let Err(e) = node.send(peer, &text).await {
                println!("Send failed: {e}");
            }
        }

        ["exit"] => return true,

        _ => println!("Invalid command"),
    }
    false
}
