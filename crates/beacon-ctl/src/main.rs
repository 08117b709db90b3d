//! beacon-ctl — command-line interface for the Beacon directory.

use anyhow::{bail, Context, Result};
use serde::Deserialize;

const DEFAULT_URL: &str = "http://127.0.0.1:5000";

// ── Response types ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct RegisterResponse {
    message: String,
}

#[derive(Deserialize)]
struct PeersResponse {
    peers: Vec<String>,
}

#[derive(Deserialize)]
struct PeerInfoResponse {
    ip: String,
    port: u16,
}

#[derive(Deserialize, Default)]
struct ErrorResponse {
    #[serde(default)]
    error: String,
}

// ── HTTP helpers ──────────────────────────────────────────────────────────────

async fn get(url: &str) -> Result<reqwest::Response> {
    reqwest::get(url)
        .await
        .with_context(|| format!("failed to connect to the directory at {url} — is it running?"))
}

async fn error_text(resp: reqwest::Response) -> String {
    resp.json::<ErrorResponse>()
        .await
        .map(|e| e.error)
        .unwrap_or_default()
}

// ── Subcommand handlers ───────────────────────────────────────────────────────

async fn cmd_register(base: &str, username: &str, ip: &str, port: u16) -> Result<()> {
    let resp = reqwest::Client::new()
        .post(format!("{base}/register"))
        .json(&serde_json::json!({ "username": username, "ip": ip, "port": port }))
        .send()
        .await
        .with_context(|| format!("failed to connect to the directory at {base} — is it running?"))?;

    let status = resp.status();
    if status.is_success() {
        let body: RegisterResponse = resp.json().await.context("failed to parse response")?;
        println!("✓ {} ({username} at {ip}:{port})", body.message);
        Ok(())
    } else {
        bail!("register failed ({status}): {}", error_text(resp).await)
    }
}

async fn cmd_peers(base: &str) -> Result<()> {
    let resp = get(&format!("{base}/peers")).await?;
    if !resp.status().is_success() {
        bail!("peers failed ({}): {}", resp.status(), error_text(resp).await);
    }
    let body: PeersResponse = resp.json().await.context("failed to parse response")?;

    if body.peers.is_empty() {
        println!("No peers registered.");
        return Ok(());
    }

    println!("═══════════════════════════════════════");
    println!("  Registered Peers ({})", body.peers.len());
    println!("═══════════════════════════════════════");
    for p in &body.peers {
        println!("  - {p}");
    }
    Ok(())
}

async fn cmd_lookup(base: &str, username: &str) -> Result<()> {
    let resp = get(&format!("{base}/peerinfo?username={username}")).await?;
    let status = resp.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        bail!("no peer registered as {username}");
    }
    if !status.is_success() {
        bail!("lookup failed ({status}): {}", error_text(resp).await);
    }
    let body: PeerInfoResponse = resp.json().await.context("failed to parse response")?;

    println!("═══════════════════════════════════════");
    println!("  Peer Info");
    println!("═══════════════════════════════════════");
    println!("  Username : {username}");
    println!("  IP       : {}", body.ip);
    println!("  Port     : {}", body.port);
    Ok(())
}

fn print_usage() {
    println!("Usage: beacon-ctl [--url <base-url>] <command>");
    println!();
    println!("Commands:");
    println!("  peers                            List registered usernames");
    println!("  lookup <username>                Show a peer's address");
    println!("  register <username> <ip> <port>  Register a peer by hand");
    println!();
    println!("Options:");
    println!("  --url <base-url>   Directory base URL (default: {DEFAULT_URL})");
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    // Parse --url option
    let mut base = DEFAULT_URL.to_string();
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--url" {
            i += 1;
            base = args
                .get(i)
                .context("--url requires a value")?
                .trim_end_matches('/')
                .to_string();
        } else {
            remaining.push(&args[i]);
        }
        i += 1;
    }

    match remaining.as_slice() {
        ["peers"] | [] => cmd_peers(&base).await,
        ["lookup", username] => cmd_lookup(&base, username).await,
        ["register", username, ip, port] => {
            let port: u16 = port.parse().context("port must be a number")?;
            cmd_register(&base, username, ip, port).await
        }
        ["help"] | ["--help"] | ["-h"] => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
