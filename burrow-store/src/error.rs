//! Error types for the burrow-store crate

use burrow_model::StorageError;
use thiserror::Error;

/// Errors surfaced by store facade operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("payload encode error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("store actor stopped")]
    ChannelClosed,
}
