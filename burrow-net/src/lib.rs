//! Burrow networking
//!
//! Peer-to-peer pub/sub mesh:
//! - **Endpoint**: public handle; owns peers, subscriptions, and routing
//! - **Router**: actor serializing all routing state changes
//! - **Connection manager**: TCP listen/dial lifecycle with fixed-interval retry

pub mod connector;
pub mod endpoint;
pub mod error;
pub mod framing;
pub mod proto;

mod conn;
mod router;

pub use connector::{Connector, PeerStream, TcpConnector};
pub use endpoint::{Endpoint, Peer, PeerStatus, DEFAULT_RETRY};
pub use error::NetError;
