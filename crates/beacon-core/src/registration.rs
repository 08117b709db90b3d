//! Registration record — what the directory holds per username.

use serde::{Deserialize, Serialize};

/// A peer's directory entry.
///
/// Written once by the first successful register call for a username and
/// never updated in place. It disappears only when the directory's store
/// is cleared (process restart for the in-memory backend).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    /// Unique chat handle. Non-empty.
    pub username: String,
    /// Address the peer accepts chat connections on.
    pub ip: String,
    pub port: u16,
}
