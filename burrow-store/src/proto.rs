//! Replication payloads carried inside publishes on the store's topic
//!
//! One topic carries both directions: replicas publish `Request`s that only
//! the master acts on, and the master publishes `Update`s that only replicas
//! apply. Snapshot messages bootstrap late-attaching replicas.

use burrow_model::WriteTicket;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One write of record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WriteOp {
    Put { key: Vec<u8>, value: Vec<u8> },
    Erase { key: Vec<u8> },
}

/// Messages exchanged on a store's topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StoreMessage {
    /// A replica asks the master to apply a write. The ticket lets the
    /// originating replica match the eventual update back to its pending set.
    Request { ticket: WriteTicket, op: WriteOp },
    /// The master applied a write; replicas converge by applying it too.
    /// `origin` echoes the ticket when the write came from a replica.
    Update {
        origin: Option<WriteTicket>,
        op: WriteOp,
    },
    /// A replica asks for the master's full state.
    SyncRequest { replica: Uuid },
    /// The master's full state, addressed to one replica.
    SyncSnapshot {
        replica: Uuid,
        entries: Vec<(Vec<u8>, Vec<u8>)>,
    },
}

impl StoreMessage {
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
