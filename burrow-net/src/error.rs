//! Error types for the burrow-net crate

use thiserror::Error;

/// Network layer errors for endpoint operations
#[derive(Error, Debug)]
pub enum NetError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("wire decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("handshake error: {0}")]
    Handshake(String),

    #[error("router channel closed")]
    ChannelClosed,
}
