//! Peer wire protocol
//!
//! The logical contract is topic-addressed messages with ordered delivery per
//! peer channel; the concrete encoding (serde_json inside length-delimited
//! frames) is an implementation detail and not load-bearing.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity exchange sent by both sides when a connection is established.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hello {
    /// The remote endpoint's stable identity.
    pub endpoint: Uuid,
    /// Descriptive endpoint name, for diagnostics only.
    pub name: String,
    /// Interests at handshake time, each with the sender's hop distance to
    /// the nearest subscriber (0 = subscribed locally).
    pub topics: Vec<(String, u8)>,
}

/// Messages exchanged between peered endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WireMessage {
    Hello(Hello),
    /// The sender is interested in `topic`; `hops` is its distance to the
    /// nearest subscriber. Re-sent whenever the distance changes.
    Subscribe { topic: String, hops: u8 },
    /// The sender is no longer interested in `topic`.
    Unsubscribe { topic: String },
    /// A published payload. `id` deduplicates redundant paths through the mesh.
    Publish {
        id: Uuid,
        topic: String,
        payload: Vec<u8>,
    },
}
