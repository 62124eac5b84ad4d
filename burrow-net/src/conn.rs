//! Connection lifecycle tasks
//!
//! - Listener: accepts inbound connections and promotes them to peers after
//!   the identity handshake.
//! - Dialer: one task per outbound peer; retries at a fixed interval forever
//!   until the peer is removed or the endpoint shuts down, and falls back to
//!   the same retry loop when an established connection drops.
//! - Reader/writer: one ordered channel per live connection, so messages to a
//!   given peer arrive in send order.

use crate::connector::{Connector, PeerStream};
use crate::framing::{MessageSink, MessageStream};
use crate::proto::{Hello, WireMessage};
use crate::router::{peer_channel, RouterCmd};
use burrow_model::PeerId;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// Both sides must complete the Hello exchange within this window.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Where a dial task currently is, reported to the router for introspection.
#[derive(Debug, Clone, Copy)]
pub(crate) enum DialPhase {
    /// A connect attempt is in flight.
    Attempting,
    /// The last attempt failed; sleeping out the retry interval.
    Waiting,
}

/// Accept loop for an endpoint's listening socket.
pub(crate) fn spawn_listener(
    listener: TcpListener,
    router: mpsc::Sender<RouterCmd>,
    cancel: CancellationToken,
) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            tracing::debug!(%addr, "inbound connection");
                            stream.set_nodelay(true).ok();
                            let router = router.clone();
                            let cancel = cancel.child_token();
                            tokio::spawn(async move {
                                let (read, write) = stream.into_split();
                                if let Err(e) = handle_inbound(read, write, router, cancel).await {
                                    tracing::debug!(%addr, error = %e, "inbound connection ended");
                                }
                            });
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "accept failed");
                        }
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }
    });
}

/// Handshake an accepted connection and, if the router admits it, run its IO
/// loops until either side goes away.
async fn handle_inbound<R, W>(
    read: R,
    write: W,
    router: mpsc::Sender<RouterCmd>,
    cancel: CancellationToken,
) -> Result<(), crate::error::NetError>
where
    R: AsyncRead + Send + Unpin + 'static,
    W: AsyncWrite + Send + Unpin + 'static,
{
    let mut stream = MessageStream::new(read);
    let mut sink = MessageSink::new(write);

    let remote = match tokio::time::timeout(HANDSHAKE_TIMEOUT, stream.recv()).await {
        Ok(Ok(Some(WireMessage::Hello(hello)))) => hello,
        Ok(Ok(_)) => {
            return Err(crate::error::NetError::Handshake(
                "expected Hello".to_string(),
            ))
        }
        Ok(Err(e)) => return Err(e),
        Err(_) => {
            return Err(crate::error::NetError::Handshake(
                "handshake timed out".to_string(),
            ))
        }
    };

    let ours = current_hello(&router).await?;
    let advertised = ours.topics.clone();

    // Register before answering the handshake: by the time the remote sees
    // our Hello and reports itself established, this side already routes.
    let (out_tx, out_rx) = peer_channel();
    let (resp_tx, resp_rx) = oneshot::channel();
    router
        .send(RouterCmd::InboundPeer {
            hello: remote,
            advertised,
            out_tx,
            cancel: cancel.clone(),
            resp: resp_tx,
        })
        .await
        .map_err(|_| crate::error::NetError::ChannelClosed)?;
    let Some(peer) = resp_rx
        .await
        .map_err(|_| crate::error::NetError::ChannelClosed)?
    else {
        // Duplicate of an existing peering: drop the connection.
        return Ok(());
    };

    sink.send(&WireMessage::Hello(ours)).await?;
    spawn_writer(out_rx, sink, cancel.clone());
    read_loop(peer, &mut stream, &router, &cancel).await;
    let _ = router.send(RouterCmd::InboundClosed { peer }).await;
    Ok(())
}

/// Outbound connection task for one remote peer.
pub(crate) fn spawn_dialer(
    peer: PeerId,
    addr: String,
    port: u16,
    retry: Duration,
    connector: Arc<dyn Connector>,
    router: mpsc::Sender<RouterCmd>,
    cancel: CancellationToken,
) {
    tokio::spawn(async move {
        loop {
            if router
                .send(RouterCmd::DialState {
                    peer,
                    phase: DialPhase::Attempting,
                })
                .await
                .is_err()
            {
                return;
            }

            let connected = tokio::select! {
                result = connector.connect(&addr, port) => result,
                _ = cancel.cancelled() => return,
            };

            match connected {
                Ok(stream) => {
                    match run_outbound(peer, stream, &router, &cancel).await {
                        Ok(()) => {
                            // Connection was up and then dropped; tell the
                            // router before falling back into the retry loop.
                            if router
                                .send(RouterCmd::OutboundDown { peer })
                                .await
                                .is_err()
                            {
                                return;
                            }
                        }
                        Err(e) => {
                            tracing::debug!(%peer, error = %e, "outbound handshake failed");
                        }
                    }
                }
                Err(e) => {
                    tracing::debug!(%peer, addr = %addr, port, error = %e, "connect failed");
                }
            }

            if cancel.is_cancelled() {
                return;
            }
            if router
                .send(RouterCmd::DialState {
                    peer,
                    phase: DialPhase::Waiting,
                })
                .await
                .is_err()
            {
                return;
            }
            // Fixed interval, no backoff growth.
            tokio::select! {
                _ = tokio::time::sleep(retry) => {}
                _ = cancel.cancelled() => return,
            }
        }
    });
}

/// Handshake and serve one outbound connection until it ends. An error means
/// the handshake never completed and no peering was established.
async fn run_outbound(
    peer: PeerId,
    stream: PeerStream,
    router: &mpsc::Sender<RouterCmd>,
    cancel: &CancellationToken,
) -> Result<(), crate::error::NetError> {
    let PeerStream { read, write } = stream;
    let mut stream = MessageStream::new(read);
    let mut sink = MessageSink::new(write);

    let ours = current_hello(router).await?;
    let advertised = ours.topics.clone();
    sink.send(&WireMessage::Hello(ours)).await?;

    let remote = match tokio::time::timeout(HANDSHAKE_TIMEOUT, stream.recv()).await {
        Ok(Ok(Some(WireMessage::Hello(hello)))) => hello,
        Ok(Ok(_)) => {
            return Err(crate::error::NetError::Handshake(
                "expected Hello".to_string(),
            ))
        }
        Ok(Err(e)) => return Err(e),
        Err(_) => {
            return Err(crate::error::NetError::Handshake(
                "handshake timed out".to_string(),
            ))
        }
    };

    let (out_tx, out_rx) = peer_channel();
    router
        .send(RouterCmd::OutboundUp {
            peer,
            hello: remote,
            advertised,
            out_tx,
        })
        .await
        .map_err(|_| crate::error::NetError::ChannelClosed)?;

    let io_cancel = cancel.child_token();
    spawn_writer(out_rx, sink, io_cancel.clone());
    read_loop(peer, &mut stream, router, cancel).await;
    io_cancel.cancel();
    Ok(())
}

/// Drain the connection's outbound channel into the framed sink.
/// Ends when the router drops the sender or the connection breaks.
fn spawn_writer<W>(
    mut out_rx: mpsc::Receiver<WireMessage>,
    mut sink: MessageSink<W>,
    cancel: CancellationToken,
) where
    W: AsyncWrite + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        loop {
            tokio::select! {
                msg = out_rx.recv() => {
                    let Some(msg) = msg else { break };
                    if let Err(e) = sink.send(&msg).await {
                        tracing::debug!(error = %e, "peer write failed");
                        break;
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }
    });
}

/// Pump inbound frames into the router until EOF, error, or cancellation.
async fn read_loop<R>(
    peer: PeerId,
    stream: &mut MessageStream<R>,
    router: &mpsc::Sender<RouterCmd>,
    cancel: &CancellationToken,
) where
    R: AsyncRead + Send + Unpin,
{
    loop {
        tokio::select! {
            received = stream.recv() => {
                match received {
                    Ok(Some(msg)) => {
                        if router.send(RouterCmd::Inbound { peer, msg }).await.is_err() {
                            return;
                        }
                    }
                    Ok(None) => return,
                    Err(e) => {
                        tracing::debug!(%peer, error = %e, "peer read failed");
                        return;
                    }
                }
            }
            _ = cancel.cancelled() => return,
        }
    }
}

async fn current_hello(router: &mpsc::Sender<RouterCmd>) -> Result<Hello, crate::error::NetError> {
    let (resp_tx, resp_rx) = oneshot::channel();
    router
        .send(RouterCmd::CurrentHello { resp: resp_tx })
        .await
        .map_err(|_| crate::error::NetError::ChannelClosed)?;
    resp_rx
        .await
        .map_err(|_| crate::error::NetError::ChannelClosed)
}
