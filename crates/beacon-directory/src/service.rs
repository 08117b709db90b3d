//! Directory service — register / list / lookup over an injected store.

use std::sync::Arc;

use beacon_core::{DirectoryError, Registration};

use crate::store::RegistryStore;

/// The rendezvous directory. Validates input and enforces username
/// uniqueness; storage semantics are delegated to the injected store, so
/// the in-process and remote backends behave identically from here up.
pub struct Directory {
    store: Arc<dyn RegistryStore>,
}

impl Directory {
    pub fn new(store: Arc<dyn RegistryStore>) -> Self {
        Self { store }
    }

    /// Register a username at an address. First writer wins; an existing
    /// entry is never updated in place.
    pub async fn register(&self, username: &str, ip: &str, port: u16) -> Result<(), DirectoryError> {
        if username.trim().is_empty() {
            return Err(DirectoryError::InvalidInput("username"));
        }
        if ip.trim().is_empty() {
            return Err(DirectoryError::InvalidInput("ip"));
        }
        if port == 0 {
            return Err(DirectoryError::InvalidInput("port"));
        }

        // Cheap pre-check; put_new below remains the authority under races.
        if self.store.exists(username).await? {
            tracing::debug!(username, "rejected duplicate registration");
            return Err(DirectoryError::DuplicateUsername);
        }

        let registration = Registration {
            username: username.to_string(),
            ip: ip.to_string(),
            port,
        };
        if !self.store.put_new(registration).await? {
            tracing::debug!(username, "rejected duplicate registration");
            return Err(DirectoryError::DuplicateUsername);
        }
        tracing::info!(username, ip, port, "peer registered");
        Ok(())
    }

    /// Every registered username. Order is not meaningful.
    pub async fn list(&self) -> Result<Vec<String>, DirectoryError> {
        self.store.usernames().await
    }

    /// Address registered under a username.
    pub async fn lookup(&self, username: &str) -> Result<Registration, DirectoryError> {
        self.store.get(username).await?.ok_or(DirectoryError::NotFound)
    }
}
