//! Endpoint - one participant in the peer mesh
//!
//! The public surface is a narrow, cheaply cloneable handle; all mutable
//! routing state lives in the router actor behind a command channel, so every
//! method here is a message send (plus a oneshot round-trip where a result is
//! needed). Clones share the same underlying endpoint and do not own it;
//! teardown is explicit via `shutdown`.

use crate::connector::{Connector, TcpConnector};
use crate::router::{Handler, LocalLink, Router, RouterCmd};
use burrow_model::{HandlerId, PeerId};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Router mailbox capacity.
const ROUTER_CHANNEL_CAP: usize = 256;

/// Retry interval applied by `add_peer`.
pub const DEFAULT_RETRY: Duration = Duration::from_secs(5);

/// Connection state of one peer, from the owning endpoint's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerStatus {
    /// Registered; no connection attempt currently in flight.
    Pending,
    /// A connect attempt is in flight.
    Connecting,
    /// Handshake complete; the peer participates in routing.
    Established,
    /// Torn down; the handle is no longer valid.
    Closed,
}

/// Handle to one peering, usable only with the endpoint that produced it.
///
/// The handle is a lookup key, not an owner: dropping it changes nothing,
/// and the peering lives until `rem_peer` or endpoint shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Peer {
    id: PeerId,
    endpoint: Uuid,
}

impl Peer {
    pub(crate) fn new(id: PeerId, endpoint: Uuid) -> Self {
        Self { id, endpoint }
    }

    pub(crate) fn id(&self) -> PeerId {
        self.id
    }

    pub(crate) fn endpoint(&self) -> Uuid {
        self.endpoint
    }
}

/// Most recent failed operation on an endpoint.
#[derive(Debug, Clone, Default)]
pub(crate) struct LastError {
    pub errno: i32,
    pub message: String,
}

/// One participant in the peer mesh; owns connections and routing.
#[derive(Clone)]
pub struct Endpoint {
    id: Uuid,
    name: Arc<str>,
    flags: u32,
    tx: mpsc::Sender<RouterCmd>,
    last_error: Arc<Mutex<LastError>>,
    bound: Arc<Mutex<Option<SocketAddr>>>,
    cancel: CancellationToken,
}

impl Endpoint {
    /// Create a local endpoint with the default TCP transport.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_connector(name, 0, Arc::new(TcpConnector))
    }

    /// Create a local endpoint with behavior flags. No flags are defined yet;
    /// the bitset is reserved.
    pub fn with_flags(name: impl Into<String>, flags: u32) -> Self {
        let mut endpoint = Self::new(name);
        endpoint.flags = flags;
        endpoint
    }

    /// Create an endpoint with a custom transport. This is the seam test
    /// harnesses use to observe or fail connection attempts.
    pub fn with_connector(
        name: impl Into<String>,
        flags: u32,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let id = Uuid::new_v4();
        let name: Arc<str> = name.into().into();
        let last_error = Arc::new(Mutex::new(LastError::default()));
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel(ROUTER_CHANNEL_CAP);
        let router = Router::new(
            id,
            name.to_string(),
            rx,
            tx.clone(),
            connector,
            cancel.clone(),
            last_error.clone(),
        );
        tokio::spawn(router.run());
        Self {
            id,
            name,
            flags,
            tx,
            last_error,
            bound: Arc::new(Mutex::new(None)),
            cancel,
        }
    }

    /// The descriptive name given at construction.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reserved behavior bitset.
    pub fn flags(&self) -> u32 {
        self.flags
    }

    /// Stable identity of this endpoint within the mesh.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// OS error code of the last failed operation, zero if none applied.
    pub fn last_errno(&self) -> i32 {
        self.last_error.lock().map(|e| e.errno).unwrap_or(0)
    }

    /// Descriptive text for the last failed operation.
    pub fn last_error(&self) -> String {
        self.last_error
            .lock()
            .map(|e| e.message.clone())
            .unwrap_or_default()
    }

    /// Make this endpoint available for remote peer connections.
    ///
    /// Returns false on failure, with the bind error recorded in
    /// `last_errno`/`last_error`. There is no automatic rebind; callers decide
    /// whether to try again.
    pub async fn listen(&self, port: u16, addr: Option<IpAddr>) -> bool {
        let ip = addr.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        let listener = match TcpListener::bind((ip, port)).await {
            Ok(listener) => listener,
            Err(e) => {
                self.record_error(
                    e.raw_os_error().unwrap_or(0),
                    &format!("bind {}:{}: {}", ip, port, e),
                );
                return false;
            }
        };
        let local = match listener.local_addr() {
            Ok(local) => local,
            Err(e) => {
                self.record_error(
                    e.raw_os_error().unwrap_or(0),
                    &format!("local_addr: {}", e),
                );
                return false;
            }
        };
        if let Ok(mut guard) = self.bound.lock() {
            *guard = Some(local);
        }
        tracing::info!(endpoint = %self.name, %local, "listening");
        crate::conn::spawn_listener(listener, self.tx.clone(), self.cancel.child_token());
        true
    }

    /// Address actually bound by `listen` (resolves port 0).
    pub fn bound_addr(&self) -> Option<SocketAddr> {
        self.bound.lock().ok().and_then(|g| *g)
    }

    /// Connect to a remote endpoint with the default retry interval.
    pub async fn add_peer(&self, addr: impl Into<String>, port: u16) -> Peer {
        self.add_peer_with_retry(addr, port, DEFAULT_RETRY).await
    }

    /// Connect to a remote endpoint, retrying failed attempts at a fixed
    /// interval until the connection succeeds or the peer is removed.
    ///
    /// Returns immediately; establishment is asynchronous. Calling this again
    /// for the same (addr, port) returns the existing handle rather than
    /// opening a parallel connection.
    pub async fn add_peer_with_retry(
        &self,
        addr: impl Into<String>,
        port: u16,
        retry: Duration,
    ) -> Peer {
        let (resp_tx, resp_rx) = oneshot::channel();
        let cmd = RouterCmd::AddRemote {
            addr: addr.into(),
            port,
            retry,
            resp: resp_tx,
        };
        if self.tx.send(cmd).await.is_err() {
            return self.dead_peer();
        }
        resp_rx.await.unwrap_or_else(|_| self.dead_peer())
    }

    /// Link directly to another in-process endpoint, with no sockets involved.
    pub async fn add_local_peer(&self, other: &Endpoint) -> Peer {
        let (resp_tx, resp_rx) = oneshot::channel();
        let cmd = RouterCmd::AddLocal {
            remote: LocalLink {
                tx: other.tx.clone(),
                endpoint: other.id,
                name: other.name.to_string(),
            },
            resp: resp_tx,
        };
        if self.tx.send(cmd).await.is_err() {
            return self.dead_peer();
        }
        resp_rx.await.unwrap_or_else(|_| self.dead_peer())
    }

    /// Remove a peering. Returns false for unknown handles, or for handles
    /// minted by a different endpoint; otherwise cancels any pending retry,
    /// closes the connection, and removes all routing state for the peer.
    pub async fn rem_peer(&self, peer: Peer) -> bool {
        let (resp_tx, resp_rx) = oneshot::channel();
        if self
            .tx
            .send(RouterCmd::RemPeer {
                peer,
                resp: resp_tx,
            })
            .await
            .is_err()
        {
            return false;
        }
        resp_rx.await.unwrap_or(false)
    }

    /// Current connection state of a peer, None if the handle is unknown here.
    pub async fn peer_status(&self, peer: Peer) -> Option<PeerStatus> {
        let (resp_tx, resp_rx) = oneshot::channel();
        if self
            .tx
            .send(RouterCmd::PeerStatusOf {
                peer,
                resp: resp_tx,
            })
            .await
            .is_err()
        {
            return None;
        }
        resp_rx.await.unwrap_or(None)
    }

    /// Register a handler for messages published to `topic` (exact match, no
    /// wildcards). The handler runs inline in the router actor and must not
    /// block; hand work off through a channel if needed.
    pub async fn subscribe<F>(&self, topic: impl Into<String>, handler: F) -> HandlerId
    where
        F: Fn(&str, &[u8]) + Send + Sync + 'static,
    {
        let id = HandlerId::new();
        let handler: Handler = Arc::new(handler);
        let _ = self
            .tx
            .send(RouterCmd::Subscribe {
                topic: topic.into(),
                id,
                handler,
            })
            .await;
        id
    }

    /// Remove a previously registered handler. Idempotent.
    pub async fn unsubscribe(&self, topic: impl Into<String>, id: HandlerId) {
        let _ = self
            .tx
            .send(RouterCmd::Unsubscribe {
                topic: topic.into(),
                id,
            })
            .await;
    }

    /// Publish a payload to every subscriber of `topic`, local or reachable
    /// through peers. Fire-and-forget: delivery is at-most-once per
    /// subscriber, and peers without a live connection are skipped.
    pub async fn publish(&self, topic: impl Into<String>, payload: Vec<u8>) {
        let _ = self
            .tx
            .send(RouterCmd::Publish {
                topic: topic.into(),
                payload,
            })
            .await;
    }

    /// Publish a message string to all print handlers for `topic`.
    pub async fn print(&self, topic: impl Into<String>, msg: impl Into<String>) {
        self.publish(topic, msg.into().into_bytes()).await;
    }

    /// Shut down: stop listening, disconnect every peer, end the router.
    /// Safe to call while operations are in flight; in-flight work completes
    /// or is abandoned, and every clone of this handle goes inert.
    pub async fn shutdown(&self) {
        let (resp_tx, resp_rx) = oneshot::channel();
        if self
            .tx
            .send(RouterCmd::Shutdown { resp: resp_tx })
            .await
            .is_ok()
        {
            let _ = resp_rx.await;
        }
        self.cancel.cancel();
    }

    /// Placeholder handle for operations on a router that is already gone.
    /// Never resolves to a peer; `last_error` explains why.
    fn dead_peer(&self) -> Peer {
        self.record_error(0, "endpoint is shut down");
        Peer::new(PeerId::new(), self.id)
    }

    fn record_error(&self, errno: i32, msg: &str) {
        if let Ok(mut guard) = self.last_error.lock() {
            *guard = LastError {
                errno,
                message: msg.to_string(),
            };
        }
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("flags", &self.flags)
            .finish()
    }
}
