//! Chat control protocol — the text frames exchanged before a session opens.
//!
//! The control phase is two frames over a fresh TCP stream:
//!
//!   initiator → receiver   `CONNECT <username>`
//!   receiver  → initiator  `ACCEPTED` | `REJECTED`
//!
//! Frames are raw ASCII with no delimiter; each side reads at most one
//! buffer of `HANDSHAKE_BUF_LEN` bytes per step. The bound applies to the
//! control phase only — chat payloads after acceptance are opaque chunks of
//! arbitrary total length. There is no version negotiation and no retry.

/// Largest control frame either side will read. A longer first frame is
/// truncated and therefore malformed.
pub const HANDSHAKE_BUF_LEN: usize = 1024;

/// Seconds either side waits for the other's control frame before giving
/// up and closing the connection.
pub const HANDSHAKE_TIMEOUT_SECS: u64 = 10;

const CONNECT_PREFIX: &str = "CONNECT ";

/// Reply frame promoting the connection into a session.
pub const ACCEPTED: &[u8] = b"ACCEPTED";
/// Reply frame refusing the request.
pub const REJECTED: &[u8] = b"REJECTED";

/// Build the request frame an initiator sends.
pub fn connect_frame(username: &str) -> Vec<u8> {
    format!("{CONNECT_PREFIX}{username}").into_bytes()
}

/// Parse a received request frame, yielding the initiator's username.
///
/// Anything that does not start with the literal `CONNECT ` prefix, or
/// that carries an empty or space-containing name, is malformed — the
/// caller closes the connection without replying.
pub fn parse_connect(frame: &[u8]) -> Option<&str> {
    let text = std::str::from_utf8(frame).ok()?;
    let name = text.strip_prefix(CONNECT_PREFIX)?;
    if name.is_empty() || name.contains(' ') {
        return None;
    }
    Some(name)
}

/// Interpret the receiver's reply. Only the literal `ACCEPTED` opens a
/// session; every other frame is a rejection.
pub fn reply_is_accept(frame: &[u8]) -> bool {
    frame == ACCEPTED
}
