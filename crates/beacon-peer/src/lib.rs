//! beacon-peer — the peer session manager: accepts inbound chat requests,
//! initiates outbound ones, and routes chat text between named peers once
//! the directory has introduced them.

pub mod client;
pub mod listener;
pub mod node;
pub mod policy;
pub mod session;

pub use client::DirectoryClient;
pub use node::PeerNode;
pub use policy::{AcceptAll, AcceptPolicy, DenyAll, EventPolicy};
pub use session::{
    new_session_table, ActiveSession, Direction, PeerEvent, SessionError, SessionMeta,
    SessionTable,
};
