//! Directory HTTP client — the peer's view of the rendezvous service.

use serde::{Deserialize, Serialize};

use beacon_core::{DirectoryError, Registration};

/// Typed client for the directory API. Cheap to clone; the underlying
/// connection pool is shared.
#[derive(Clone)]
pub struct DirectoryClient {
    base_url: String,
    http: reqwest::Client,
}

#[derive(Serialize)]
struct RegisterRequest<'a> {
    username: &'a str,
    ip: &'a str,
    port: u16,
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

impl DirectoryClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Register `username` at `ip:port`. The directory never overwrites an
    /// existing entry, so a duplicate comes back as `DuplicateUsername`.
    pub async fn register(&self, username: &str, ip: &str, port: u16) -> Result<(), DirectoryError> {
        let resp = self
            .http
            .post(format!("{}/register", self.base_url))
            .json(&RegisterRequest { username, ip, port })
            .send()
            .await
            .map_err(transport_err)?;

        match resp.status() {
            s if s.is_success() => Ok(()),
            reqwest::StatusCode::CONFLICT => Err(DirectoryError::DuplicateUsername),
            reqwest::StatusCode::BAD_REQUEST => Err(DirectoryError::InvalidInput("registration")),
            s => Err(unexpected(s)),
        }
    }

    /// Every username the directory knows, including our own.
    pub async fn peers(&self) -> Result<Vec<String>, DirectoryError> {
        let resp = self
            .http
            .get(format!("{}/peers", self.base_url))
            .send()
            .await
            .map_err(transport_err)?;
        if !resp.status().is_success() {
            return Err(unexpected(resp.status()));
        }
        let body: PeersResponse = resp.json().await.map_err(transport_err)?;
        Ok(body.peers)
    }

    /// Address registered under `username`.
    pub async fn lookup(&self, username: &str) -> Result<Registration, DirectoryError> {
        let resp = self
            .http
            .get(format!("{}/peerinfo", self.base_url))
            .query(&[("username", username)])
            .send()
            .await
            .map_err(transport_err)?;

        match resp.status() {
            reqwest::StatusCode::NOT_FOUND => Err(DirectoryError::NotFound),
            reqwest::StatusCode::BAD_REQUEST => Err(DirectoryError::InvalidInput("username")),
            s if s.is_success() => {
                let body: PeerInfoResponse = resp.json().await.map_err(transport_err)?;
                Ok(Registration {
                    username: username.to_string(),
                    ip: body.ip,
                    port: body.port,
                })
            }
            s => Err(unexpected(s)),
        }
    }
}

fn transport_err(e: reqwest::Error) -> DirectoryError {
    DirectoryError::Backend(e.to_string())
}

fn unexpected(status: reqwest::StatusCode) -> DirectoryError {
    DirectoryError::Backend(format!("directory returned unexpected status {status}"))
}
