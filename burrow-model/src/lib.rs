//! Shared leaf types for the burrow workspace
//!
//! - Strong id newtypes used across the net and store layers
//! - The pluggable `StorageBackend` abstraction and its in-memory default

pub mod storage;
pub mod types;

pub use storage::{MemoryStore, StorageBackend, StorageError};
pub use types::{HandlerId, PeerId, WriteTicket};
