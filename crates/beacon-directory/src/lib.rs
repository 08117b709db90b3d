//! beacon-directory — registry store contract, directory service, HTTP API.

pub mod api;
pub mod service;
pub mod store;

pub use api::ApiState;
pub use service::Directory;
pub use store::{MemoryStore, RegistryStore, RemoteStore};
