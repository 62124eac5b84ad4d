//! Burrow replicated store
//!
//! Key-value store semantics over a pub/sub topic:
//! - **Master**: single authoritative writer, exclusively owns its backend
//! - **Replica**: local reads, forwarded writes, eventual convergence
//! - **ResponseQueue**: pollable bridge from the async actors to blocking consumers

pub mod error;
pub mod flare;
pub mod master;
pub mod replica;
pub mod response_queue;

mod proto;

pub use error::StoreError;
pub use flare::Flare;
pub use master::Master;
pub use replica::Replica;
pub use response_queue::{ResponseQueue, ResponseSender};

/// A resolved read, as delivered through a [`ResponseQueue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResult {
    pub key: Vec<u8>,
    pub value: Option<Vec<u8>>,
}
