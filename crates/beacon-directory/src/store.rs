//! Registry store — the pluggable key/value backend under the directory.
//!
//! Two interchangeable implementations satisfy one contract: an in-process
//! concurrent map and a remote HTTP key/value service. The backend is
//! chosen once at daemon startup and never switched at runtime.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use beacon_core::{DirectoryError, Registration};

/// Capability interface the directory needs from its storage.
///
/// `put_new` must be atomic at the key level: under concurrent calls for
/// the same username, exactly one returns `true`.
#[async_trait]
pub trait RegistryStore: Send + Sync {
    async fn get(&self, username: &str) -> Result<Option<Registration>, DirectoryError>;

    /// Insert iff the username is not already present. Returns whether
    /// the insert happened.
    async fn put_new(&self, registration: Registration) -> Result<bool, DirectoryError>;

    async fn exists(&self, username: &str) -> Result<bool, DirectoryError>;

    async fn usernames(&self) -> Result<Vec<String>, DirectoryError>;
}

// ── In-process backend ────────────────────────────────────────────────────────

/// Registrations held in a concurrent map. Cleared only by process restart.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, Registration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

#[async_trait]
impl RegistryStore for MemoryStore {
    async fn get(&self, username: &str) -> Result<Option<Registration>, DirectoryError> {
        Ok(self.entries.get(username).map(|e| e.value().clone()))
    }

    async fn put_new(&self, registration: Registration) -> Result<bool, DirectoryError> {
        // The vacant-entry path holds the key's shard lock, so two racing
        // registrations for one username cannot both land.
        match self.entries.entry(registration.username.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(registration);
                Ok(true)
            }
        }
    }

    async fn exists(&self, username: &str) -> Result<bool, DirectoryError> {
        Ok(self.entries.contains_key(username))
    }

    async fn usernames(&self) -> Result<Vec<String>, DirectoryError> {
        Ok(self.entries.iter().map(|e| e.key().clone()).collect())
    }
}

// ── Remote backend ────────────────────────────────────────────────────────────

/// Client for a remote HTTP key/value service.
///
/// Contract:
///   `GET {base}/kv/{key}`                        → 200 JSON | 404
///   `PUT {base}/kv/{key}` + `If-None-Match: *`   → 201 created | 412 exists
///   `GET {base}/kv`                              → 200 `{"keys": [...]}`
///
/// The conditional PUT carries the per-key check-and-set; the store, not
/// this client, arbitrates concurrent writers.
pub struct RemoteStore {
    base_url: String,
    http: reqwest::Client,
}

impl RemoteStore {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    fn key_url(&self, username: &str) -> String {
        format!("{}/kv/{}", self.base_url, username)
    }
}

fn backend_err(e: reqwest::Error) -> DirectoryError {
    DirectoryError::Backend(e.to_string())
}

fn status_err(status: reqwest::StatusCode) -> DirectoryError {
    DirectoryError::Backend(format!("unexpected status {status} from store"))
}

#[derive(serde::Deserialize)]
struct KeysResponse {
    keys: Vec<String>,
}

#[async_trait]
impl RegistryStore for RemoteStore {
    async fn get(&self, username: &str) -> Result<Option<Registration>, DirectoryError> {
        let resp = self
            .http
            .get(self.key_url(username))
            .send()
            .await
            .map_err(backend_err)?;
        match resp.status() {
            reqwest::StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => Ok(Some(resp.json().await.map_err(backend_err)?)),
            s => Err(status_err(s)),
        }
    }

    async fn put_new(&self, registration: Registration) -> Result<bool, DirectoryError> {
        let resp = self
            .http
            .put(self.key_url(&registration.username))
            .header(reqwest::header::IF_NONE_MATCH, "*")
            .json(&registration)
            .send()
            .await
            .map_err(backend_err)?;
        match resp.status() {
            reqwest::StatusCode::PRECONDITION_FAILED => Ok(false),
            s if s.is_success() => Ok(true),
            s => Err(status_err(s)),
        }
    }

    async fn exists(&self, username: &str) -> Result<bool, DirectoryError> {
        Ok(self.get(username).await?.is_some())
    }

    async fn usernames(&self) -> Result<Vec<String>, DirectoryError> {
        let resp = self
            .http
            .get(format!("{}/kv", self.base_url))
            .send()
            .await
            .map_err(backend_err)?;
        if !resp.status().is_success() {
            return Err(status_err(resp.status()));
        }
        let body: KeysResponse = resp.json().await.map_err(backend_err)?;
        Ok(body.keys)
    }
}
