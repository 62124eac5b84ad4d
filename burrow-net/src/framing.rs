//! Message framing for peer streams using tokio-util LengthDelimitedCodec
//!
//! Provides a clean interface for sending/receiving length-prefixed
//! `WireMessage` over byte streams without manual buffer management.

use crate::error::NetError;
use crate::proto::WireMessage;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};

/// Framed writer for sending WireMessage over the send half of a stream
pub struct MessageSink<W> {
    inner: FramedWrite<W, LengthDelimitedCodec>,
}

impl<W: AsyncWrite + Unpin> MessageSink<W> {
    pub fn new(write: W) -> Self {
        Self {
            inner: FramedWrite::new(write, LengthDelimitedCodec::new()),
        }
    }

    /// Send a WireMessage (length-prefixed).
    pub async fn send(&mut self, msg: &WireMessage) -> Result<(), NetError> {
        let bytes = serde_json::to_vec(msg)?;
        self.inner.send(bytes.into()).await?;
        Ok(())
    }
}

/// Framed reader for receiving WireMessage from the receive half of a stream
pub struct MessageStream<R> {
    inner: FramedRead<R, LengthDelimitedCodec>,
}

impl<R: AsyncRead + Unpin> MessageStream<R> {
    pub fn new(read: R) -> Self {
        Self {
            inner: FramedRead::new(read, LengthDelimitedCodec::new()),
        }
    }

    /// Receive the next WireMessage (or None if the stream closed).
    pub async fn recv(&mut self) -> Result<Option<WireMessage>, NetError> {
        match self.inner.next().await {
            Some(Ok(bytes)) => {
                let msg = serde_json::from_slice(&bytes)?;
                Ok(Some(msg))
            }
            Some(Err(e)) => Err(NetError::Io(e)),
            None => Ok(None),
        }
    }
}
