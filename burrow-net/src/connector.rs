//! Connector abstraction for outbound peer connections
//!
//! Decouples the dial/retry loop from TCP so test harnesses can substitute a
//! recording or in-memory transport. Production uses `TcpConnector`.

use futures_util::future::BoxFuture;
use std::io;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// A bidirectional byte stream to a remote peer, already split into halves.
pub struct PeerStream {
    pub read: Box<dyn AsyncRead + Send + Unpin>,
    pub write: Box<dyn AsyncWrite + Send + Unpin>,
}

/// Transport seam for outbound connections.
///
/// Object-safe (boxed future) so the endpoint can hold `Arc<dyn Connector>`
/// without becoming generic over the transport.
pub trait Connector: Send + Sync + 'static {
    fn connect(&self, addr: &str, port: u16) -> BoxFuture<'static, io::Result<PeerStream>>;
}

/// Default connector: plain TCP.
#[derive(Debug, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    fn connect(&self, addr: &str, port: u16) -> BoxFuture<'static, io::Result<PeerStream>> {
        let addr = addr.to_string();
        Box::pin(async move {
            let stream = TcpStream::connect((addr.as_str(), port)).await?;
            stream.set_nodelay(true).ok();
            let (read, write) = stream.into_split();
            Ok(PeerStream {
                read: Box::new(read),
                write: Box::new(write),
            })
        })
    }
}
