//! Peer session manager — the facade one peer process drives.
//!
//! Owns the session table and event stream. Outbound connects, sends, and
//! the read loop shared by both directions live here; the inbound side is
//! in [`crate::listener`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::time::timeout;

use beacon_core::{proto, DirectoryError};

use crate::client::DirectoryClient;
use crate::listener::SessionListener;
use crate::policy::AcceptPolicy;
use crate::session::{
    new_session_table, ActiveSession, Direction, EventSender, PeerEvent, SessionError,
    SessionMeta, SessionTable,
};

const REPLY_TIMEOUT: Duration = Duration::from_secs(proto::HANDSHAKE_TIMEOUT_SECS);

/// Chat reads are chunked at this size; a longer message simply arrives as
/// several chunks. Unlike the control phase this is not a protocol limit.
const CHAT_BUF_LEN: usize = 1024;

pub struct PeerNode {
    username: String,
    sessions: SessionTable,
    directory: DirectoryClient,
    events: EventSender,
    shutdown: broadcast::Sender<()>,
}

impl PeerNode {
    /// Create a node and the event stream its owner consumes.
    pub fn new(
        username: &str,
        directory: DirectoryClient,
    ) -> (Self, mpsc::UnboundedReceiver<PeerEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let (shutdown, _) = broadcast::channel(1);
        (
            Self {
                username: username.to_string(),
                sessions: new_session_table(),
                directory,
                events,
                shutdown,
            },
            events_rx,
        )
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// A clone of the event sender, for policies that resolve through the
    /// event stream.
    pub fn events(&self) -> EventSender {
        self.events.clone()
    }

    pub fn directory(&self) -> &DirectoryClient {
        &self.directory
    }

    /// Bind `bind_addr` and start accepting inbound chat requests under
    /// `policy`. Returns the bound address (useful when the port was 0).
    pub async fn listen(
        &self,
        bind_addr: &str,
        policy: Arc<dyn AcceptPolicy>,
    ) -> Result<SocketAddr, SessionError> {
        let listener = TcpListener::bind(bind_addr).await?;
        let local = listener.local_addr()?;
        tracing::info!(addr = %local, "listening for chat connections");

        let task = SessionListener::new(
            listener,
            self.sessions.clone(),
            policy,
            self.events.clone(),
            self.shutdown.clone(),
        );
        tokio::spawn(async move {
            if let Err(e) = task.run().await {
                tracing::error!(error = %e, "chat listener failed");
            }
        });
        Ok(local)
    }

    /// Look the peer up in the directory, then run the initiator side of
    /// the control exchange. On success the session is in the table and
    /// its read loop is running.
    pub async fn connect(&self, peer_username: &str) -> Result<(), SessionError> {
        if self.sessions.contains_key(peer_username) {
            return Err(SessionError::AlreadyConnected(peer_username.to_string()));
        }

        // No socket is opened for a name the directory does not know.
        let reg = match self.directory.lookup(peer_username).await {
            Ok(r) => r,
            Err(DirectoryError::NotFound) => return Err(SessionError::PeerNotFound),
            Err(e) => return Err(SessionError::Directory(e)),
        };

        let addr = format!("{}:{}", reg.ip, reg.port);
        tracing::debug!(peer = %peer_username, %addr, "connecting");
        let mut stream = match TcpStream::connect(&addr).await {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::ConnectionRefused => {
                return Err(SessionError::ConnectionRefused)
            }
            Err(e) => return Err(SessionError::Io(e)),
        };

        stream
            .write_all(&proto::connect_frame(&self.username))
            .await?;

        let mut buf = vec![0u8; proto::HANDSHAKE_BUF_LEN];
        let len = match timeout(REPLY_TIMEOUT, stream.read(&mut buf)).await {
            Err(_) => return Err(SessionError::HandshakeTimeout),
            Ok(Err(e)) => return Err(SessionError::Io(e)),
            Ok(Ok(n)) => n,
        };
        if !proto::reply_is_accept(&buf[..len]) {
            tracing::info!(peer = %peer_username, "chat request rejected by peer");
            return Err(SessionError::HandshakeRejected);
        }

        let peer_addr = stream.peer_addr()?;
        install_session(
            stream,
            peer_username.to_string(),
            peer_addr,
            Direction::Outbound,
            self.sessions.clone(),
            self.events.clone(),
            self.shutdown.clone(),
        );
        Ok(())
    }

    /// Write one chat message to an established session. A failed write
    /// tears that session down before the error is returned; other
    /// sessions are untouched.
    pub async fn send(&self, peer_username: &str, text: &str) -> Result<(), SessionError> {
        let writer = match self.sessions.get(peer_username) {
            Some(session) => session.writer.clone(),
            None => return Err(SessionError::NotConnected(peer_username.to_string())),
        };

        let result = writer.lock().await.write_all(text.as_bytes()).await;
        if let Err(e) = result {
            tracing::warn!(peer = %peer_username, error = %e, "write failed, dropping session");
            self.drop_session(peer_username);
            return Err(SessionError::Io(e));
        }
        Ok(())
    }

    /// Usernames with an established session.
    pub fn active_peers(&self) -> Vec<String> {
        self.sessions.iter().map(|e| e.key().clone()).collect()
    }

    pub fn is_connected(&self, peer_username: &str) -> bool {
        self.sessions.contains_key(peer_username)
    }

    /// Stop the accept loop and every session read loop. Read loops
    /// remove their sessions on the way out, which closes the sockets.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }

    fn drop_session(&self, peer_username: &str) {
        if self.sessions.remove(peer_username).is_some() {
            let _ = self.events.send(PeerEvent::SessionClosed {
                peer: peer_username.to_string(),
            });
        }
    }
}

// ── Session installation and the read loop ────────────────────────────────────

/// Promote an accepted connection into the session table and start its
/// read loop. Used by both the inbound handshake handler and `connect`.
///
/// Insertion goes through the entry API: if a session for this peer landed
/// between the handshake's duplicate check and now, the newcomer is
/// dropped rather than orphaning the live stream.
pub(crate) fn install_session(
    stream: TcpStream,
    peer_username: String,
    peer_addr: SocketAddr,
    direction: Direction,
    sessions: SessionTable,
    events: EventSender,
    shutdown: broadcast::Sender<()>,
) {
    let (read_half, write_half) = stream.into_split();
    let writer = Arc::new(Mutex::new(write_half));

    match sessions.entry(peer_username.clone()) {
        Entry::Occupied(_) => {
            tracing::warn!(peer = %peer_username, "session raced an existing one, dropping the newcomer");
            return;
        }
        Entry::Vacant(slot) => {
            slot.insert(ActiveSession {
                meta: SessionMeta {
                    peer_username: peer_username.clone(),
                    peer_addr,
                    direction,
                    established_at: Instant::now(),
                },
                writer,
            });
        }
    }

    tracing::info!(peer = %peer_username, %peer_addr, ?direction, "session established");
    let _ = events.send(PeerEvent::SessionEstablished {
        peer: peer_username.clone(),
        direction,
    });

    let shutdown_rx = shutdown.subscribe();
    tokio::spawn(read_loop(read_half, peer_username, sessions, events, shutdown_rx));
}

/// Deliver inbound chunks as chat messages until the stream closes, then
/// remove exactly this session from the table.
async fn read_loop(
    mut reader: OwnedReadHalf,
    peer_username: String,
    sessions: SessionTable,
    events: EventSender,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut buf = vec![0u8; CHAT_BUF_LEN];

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::debug!(peer = %peer_username, "read loop shutting down");
                break;
            }

            result = reader.read(&mut buf) => {
                match result {
                    Ok(0) => {
                        tracing::info!(peer = %peer_username, "peer closed the connection");
                        break;
                    }
                    Ok(n) => {
                        let text = String::from_utf8_lossy(&buf[..n]).into_owned();
                        let _ = events.send(PeerEvent::Message {
                            from: peer_username.clone(),
                            text,
                        });
                    }
                    Err(e) => {
                        tracing::warn!(peer = %peer_username, error = %e, "read failed");
                        break;
                    }
                }
            }
        }
    }

    if sessions.remove(&peer_username).is_some() {
        let _ = events.send(PeerEvent::SessionClosed {
            peer: peer_username.clone(),
        });
    }
}
