//! Session management — tracks active chat sessions keyed by peer username.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::{mpsc, oneshot, Mutex};

use beacon_core::DirectoryError;

/// Which side opened the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
}

/// Metadata about an active session.
#[derive(Debug)]
pub struct SessionMeta {
    pub peer_username: String,
    pub peer_addr: SocketAddr,
    pub direction: Direction,
    /// When the handshake completed.
    pub established_at: Instant,
}

/// An established chat session. The read half lives in the session's read
/// loop task; only the write half is shared, behind a lock so `send` has a
/// single writer at a time.
pub struct ActiveSession {
    pub meta: SessionMeta,
    pub writer: Arc<Mutex<OwnedWriteHalf>>,
}

/// The session table — shared between the accept loop's handshake tasks,
/// outbound connects, read loops, and `send`. At most one session per
/// peer username.
pub type SessionTable = Arc<DashMap<String, ActiveSession>>;

/// Create a new empty session table.
pub fn new_session_table() -> SessionTable {
    Arc::new(DashMap::new())
}

/// What a peer process observes from its session manager.
#[derive(Debug)]
pub enum PeerEvent {
    /// An inbound `CONNECT` awaiting a decision. Answer on `respond`;
    /// dropping the sender counts as a rejection.
    IncomingRequest {
        from: String,
        respond: oneshot::Sender<bool>,
    },
    SessionEstablished {
        peer: String,
        direction: Direction,
    },
    /// One received chunk of chat text. Chunk boundaries are
    /// transport-defined, not message-defined.
    Message {
        from: String,
        text: String,
    },
    SessionClosed {
        peer: String,
    },
}

pub type EventSender = mpsc::UnboundedSender<PeerEvent>;

/// Session error taxonomy. Every variant affects at most the one session
/// it names; the process keeps running and other sessions are untouched.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("peer is not registered with the directory")]
    PeerNotFound,

    #[error("peer host refused the connection")]
    ConnectionRefused,

    #[error("peer rejected the chat request")]
    HandshakeRejected,

    #[error("timed out waiting for the peer's reply")]
    HandshakeTimeout,

    /// A second connect to a peer we already hold a session with. The
    /// live session wins; reconnect after it closes.
    #[error("already connected to {0}")]
    AlreadyConnected(String),

    #[error("not connected to {0}")]
    NotConnected(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("directory lookup failed: {0}")]
    Directory(DirectoryError),
}
