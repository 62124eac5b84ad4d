//! Router actor - owns the peer registry and subscription table for one endpoint
//!
//! All routing state lives inside this single-consumer task, so subscription
//! changes, peer teardown, and publish fan-out are serialized with respect to
//! each other. Handlers run inline in the actor loop and therefore never race.

use crate::conn::{spawn_dialer, DialPhase};
use crate::connector::Connector;
use crate::endpoint::{LastError, Peer, PeerStatus};
use crate::proto::{Hello, WireMessage};
use burrow_model::{HandlerId, PeerId};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Local subscription callback, invoked inline by the router.
pub type Handler = Arc<dyn Fn(&str, &[u8]) + Send + Sync>;

/// Capacity of the per-peer outbound channel. A full channel means the peer's
/// writer has stalled; further forwards to it are dropped (fire-and-forget).
const PEER_CHANNEL_CAP: usize = 64;

/// How many recent publish ids the dedup cache remembers.
const SEEN_CAP: usize = 1024;

/// Maximum hop distance an interest advert may claim. Each node re-advertises
/// an interest learned from a peer at one hop more; in a cyclic mesh a stale
/// interest therefore counts up past this limit and drains instead of
/// circulating forever.
const MAX_INTEREST_HOPS: u8 = 8;

/// Everything another in-process endpoint needs to link to this one directly.
#[derive(Clone)]
pub(crate) struct LocalLink {
    pub tx: mpsc::Sender<RouterCmd>,
    pub endpoint: Uuid,
    pub name: String,
}

/// Commands processed by the router actor
pub(crate) enum RouterCmd {
    Subscribe {
        topic: String,
        id: HandlerId,
        handler: Handler,
    },
    Unsubscribe {
        topic: String,
        id: HandlerId,
    },
    Publish {
        topic: String,
        payload: Vec<u8>,
    },
    AddRemote {
        addr: String,
        port: u16,
        retry: Duration,
        resp: oneshot::Sender<Peer>,
    },
    AddLocal {
        remote: LocalLink,
        resp: oneshot::Sender<Peer>,
    },
    RemPeer {
        peer: Peer,
        resp: oneshot::Sender<bool>,
    },
    PeerStatusOf {
        peer: Peer,
        resp: oneshot::Sender<Option<PeerStatus>>,
    },
    /// Identity + current interests, for a handshake in progress.
    CurrentHello {
        resp: oneshot::Sender<Hello>,
    },
    /// A dial task changed phase (attempting vs. waiting out the retry interval).
    DialState {
        peer: PeerId,
        phase: DialPhase,
    },
    /// An outbound connection completed its handshake.
    OutboundUp {
        peer: PeerId,
        hello: Hello,
        advertised: Vec<(String, u8)>,
        out_tx: mpsc::Sender<WireMessage>,
    },
    /// An established outbound connection dropped; the dial task keeps retrying.
    OutboundDown {
        peer: PeerId,
    },
    /// An accepted inbound connection completed its handshake.
    /// Responds with None when the remote endpoint is already peered (keep-first).
    InboundPeer {
        hello: Hello,
        advertised: Vec<(String, u8)>,
        out_tx: mpsc::Sender<WireMessage>,
        cancel: CancellationToken,
        resp: oneshot::Sender<Option<PeerId>>,
    },
    InboundClosed {
        peer: PeerId,
    },
    /// A message arrived on an established wire connection.
    Inbound {
        peer: PeerId,
        msg: WireMessage,
    },
    /// Router-to-router: another in-process endpoint wants to link with us.
    LocalLinkRequest {
        link: Uuid,
        from: LocalLink,
        topics: Vec<(String, u8)>,
    },
    /// Router-to-router: the link we requested is up; here are their interests.
    LocalLinkAccept {
        link: Uuid,
        topics: Vec<(String, u8)>,
    },
    /// Router-to-router: the other side removed the link.
    LocalLinkClosed {
        link: Uuid,
    },
    /// Router-to-router: a message delivered over a local link.
    LocalInbound {
        link: Uuid,
        msg: WireMessage,
    },
    Shutdown {
        resp: oneshot::Sender<()>,
    },
}

enum PeerLink {
    /// Connection-backed peer. `out` is None while no connection is live.
    Wire { out: Option<mpsc::Sender<WireMessage>> },
    /// Direct in-process linkage to another endpoint's router.
    Local {
        link: Uuid,
        tx: mpsc::Sender<RouterCmd>,
    },
}

struct PeerEntry {
    status: PeerStatus,
    link: PeerLink,
    /// Interests the remote side has advertised to us, with their hop
    /// distance to the nearest subscriber.
    topics: HashMap<String, u8>,
    /// Interests we have advertised to them, with the distance we claimed.
    advertised: HashMap<String, u8>,
    /// Stable identity learned from the handshake, for inbound dedup.
    remote_endpoint: Option<Uuid>,
    /// Cancels the dial task (outbound) or nothing (inbound/local).
    cancel: Option<CancellationToken>,
    dial_target: Option<(String, u16)>,
}

/// Bounded id cache giving at-most-once delivery across redundant mesh paths.
struct SeenCache {
    set: HashSet<Uuid>,
    order: VecDeque<Uuid>,
}

impl SeenCache {
    fn new() -> Self {
        Self {
            set: HashSet::new(),
            order: VecDeque::new(),
        }
    }

    /// Returns true if the id was not seen before.
    fn insert(&mut self, id: Uuid) -> bool {
        if !self.set.insert(id) {
            return false;
        }
        self.order.push_back(id);
        if self.order.len() > SEEN_CAP {
            if let Some(old) = self.order.pop_front() {
                self.set.remove(&old);
            }
        }
        true
    }
}

pub(crate) struct Router {
    endpoint_id: Uuid,
    name: String,
    rx: mpsc::Receiver<RouterCmd>,
    self_tx: mpsc::Sender<RouterCmd>,
    connector: Arc<dyn Connector>,
    cancel: CancellationToken,
    last_error: Arc<Mutex<LastError>>,
    subs: HashMap<String, Vec<(HandlerId, Handler)>>,
    peers: HashMap<PeerId, PeerEntry>,
    /// One active connection per (addr, port): repeat add_peer returns this.
    dial_index: HashMap<(String, u16), PeerId>,
    /// Local link id -> our peer entry for that link.
    link_index: HashMap<Uuid, PeerId>,
    seen: SeenCache,
}

impl Router {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        endpoint_id: Uuid,
        name: String,
        rx: mpsc::Receiver<RouterCmd>,
        self_tx: mpsc::Sender<RouterCmd>,
        connector: Arc<dyn Connector>,
        cancel: CancellationToken,
        last_error: Arc<Mutex<LastError>>,
    ) -> Self {
        Self {
            endpoint_id,
            name,
            rx,
            self_tx,
            connector,
            cancel,
            last_error,
            subs: HashMap::new(),
            peers: HashMap::new(),
            dial_index: HashMap::new(),
            link_index: HashMap::new(),
            seen: SeenCache::new(),
        }
    }

    pub(crate) async fn run(mut self) {
        loop {
            tokio::select! {
                cmd = self.rx.recv() => {
                    match cmd {
                        Some(RouterCmd::Shutdown { resp }) => {
                            self.teardown();
                            let _ = resp.send(());
                            break;
                        }
                        Some(cmd) => self.handle(cmd).await,
                        None => {
                            self.teardown();
                            break;
                        }
                    }
                }
                _ = self.cancel.cancelled() => {
                    self.teardown();
                    break;
                }
            }
        }
        tracing::debug!(endpoint = %self.name, "router stopped");
    }

    async fn handle(&mut self, cmd: RouterCmd) {
        match cmd {
            RouterCmd::Subscribe { topic, id, handler } => {
                let handlers = self.subs.entry(topic).or_default();
                if !handlers.iter().any(|(hid, _)| *hid == id) {
                    handlers.push((id, handler));
                }
                self.readvertise();
            }
            RouterCmd::Unsubscribe { topic, id } => {
                if let Some(handlers) = self.subs.get_mut(&topic) {
                    handlers.retain(|(hid, _)| *hid != id);
                    if handlers.is_empty() {
                        self.subs.remove(&topic);
                    }
                }
                self.readvertise();
            }
            RouterCmd::Publish { topic, payload } => {
                self.route_publish(Uuid::new_v4(), &topic, &payload, None);
            }
            RouterCmd::AddRemote {
                addr,
                port,
                retry,
                resp,
            } => {
                let peer = self.add_remote(addr, port, retry);
                let _ = resp.send(peer);
            }
            RouterCmd::AddLocal { remote, resp } => {
                let peer = self.add_local(remote);
                let _ = resp.send(peer);
            }
            RouterCmd::RemPeer { peer, resp } => {
                let removed = self.rem_peer(peer);
                let _ = resp.send(removed);
            }
            RouterCmd::PeerStatusOf { peer, resp } => {
                let status = if peer.endpoint() == self.endpoint_id {
                    self.peers.get(&peer.id()).map(|e| e.status)
                } else {
                    None
                };
                let _ = resp.send(status);
            }
            RouterCmd::CurrentHello { resp } => {
                let _ = resp.send(Hello {
                    endpoint: self.endpoint_id,
                    name: self.name.clone(),
                    topics: self.aggregate_interests(None).into_iter().collect(),
                });
            }
            RouterCmd::DialState { peer, phase } => {
                if let Some(entry) = self.peers.get_mut(&peer) {
                    if entry.status != PeerStatus::Established {
                        entry.status = match phase {
                            DialPhase::Attempting => PeerStatus::Connecting,
                            DialPhase::Waiting => PeerStatus::Pending,
                        };
                    }
                }
            }
            RouterCmd::OutboundUp {
                peer,
                hello,
                advertised,
                out_tx,
            } => {
                let Some(entry) = self.peers.get_mut(&peer) else {
                    return; // removed while the handshake ran
                };
                tracing::debug!(
                    endpoint = %self.name,
                    remote = %hello.name,
                    "outbound peer established"
                );
                entry.status = PeerStatus::Established;
                entry.remote_endpoint = Some(hello.endpoint);
                entry.topics = hello.topics.into_iter().collect();
                entry.advertised = advertised.into_iter().collect();
                if let PeerLink::Wire { out, .. } = &mut entry.link {
                    *out = Some(out_tx);
                }
                self.readvertise();
            }
            RouterCmd::OutboundDown { peer } => {
                if let Some(entry) = self.peers.get_mut(&peer) {
                    tracing::debug!(endpoint = %self.name, %peer, "outbound peer lost");
                    entry.status = PeerStatus::Pending;
                    entry.topics.clear();
                    entry.advertised.clear();
                    if let PeerLink::Wire { out, .. } = &mut entry.link {
                        *out = None;
                    }
                    self.readvertise();
                }
            }
            RouterCmd::InboundPeer {
                hello,
                advertised,
                out_tx,
                cancel,
                resp,
            } => {
                let duplicate = self.peers.values().any(|e| {
                    e.status == PeerStatus::Established
                        && e.remote_endpoint == Some(hello.endpoint)
                });
                if duplicate || hello.endpoint == self.endpoint_id {
                    tracing::debug!(
                        endpoint = %self.name,
                        remote = %hello.name,
                        "dropping duplicate inbound connection"
                    );
                    let _ = resp.send(None);
                    return;
                }
                let peer = PeerId::new();
                self.peers.insert(
                    peer,
                    PeerEntry {
                        status: PeerStatus::Established,
                        link: PeerLink::Wire { out: Some(out_tx) },
                        topics: hello.topics.into_iter().collect(),
                        advertised: advertised.into_iter().collect(),
                        remote_endpoint: Some(hello.endpoint),
                        cancel: Some(cancel),
                        dial_target: None,
                    },
                );
                self.readvertise();
                let _ = resp.send(Some(peer));
            }
            RouterCmd::InboundClosed { peer } => {
                if self.peers.remove(&peer).is_some() {
                    self.readvertise();
                }
            }
            RouterCmd::Inbound { peer, msg } => {
                self.handle_peer_message(peer, msg);
            }
            RouterCmd::LocalLinkRequest { link, from, topics } => {
                let peer = PeerId::new();
                let want: Vec<(String, u8)> =
                    self.aggregate_interests(Some(peer)).into_iter().collect();
                let accepted = from
                    .tx
                    .try_send(RouterCmd::LocalLinkAccept {
                        link,
                        topics: want.clone(),
                    })
                    .is_ok();
                if !accepted {
                    return;
                }
                self.peers.insert(
                    peer,
                    PeerEntry {
                        status: PeerStatus::Established,
                        link: PeerLink::Local { link, tx: from.tx },
                        topics: topics.into_iter().collect(),
                        advertised: want.into_iter().collect(),
                        remote_endpoint: Some(from.endpoint),
                        cancel: None,
                        dial_target: None,
                    },
                );
                self.link_index.insert(link, peer);
                self.readvertise();
            }
            RouterCmd::LocalLinkAccept { link, topics } => {
                if let Some(&peer) = self.link_index.get(&link) {
                    if let Some(entry) = self.peers.get_mut(&peer) {
                        entry.status = PeerStatus::Established;
                        entry.topics = topics.into_iter().collect();
                    }
                    self.readvertise();
                }
            }
            RouterCmd::LocalLinkClosed { link } => {
                if let Some(peer) = self.link_index.remove(&link) {
                    self.peers.remove(&peer);
                    self.readvertise();
                }
            }
            RouterCmd::LocalInbound { link, msg } => {
                if let Some(&peer) = self.link_index.get(&link) {
                    self.handle_peer_message(peer, msg);
                }
            }
            RouterCmd::Shutdown { .. } => unreachable!("handled in run loop"),
        }
    }

    fn handle_peer_message(&mut self, peer: PeerId, msg: WireMessage) {
        if !self.peers.contains_key(&peer) {
            return; // peer removed while the message was in flight
        }
        match msg {
            WireMessage::Hello(hello) => {
                tracing::warn!(
                    endpoint = %self.name,
                    remote = %hello.name,
                    "unexpected Hello after handshake, ignoring"
                );
            }
            WireMessage::Subscribe { topic, hops } => {
                if let Some(entry) = self.peers.get_mut(&peer) {
                    entry.topics.insert(topic, hops);
                }
                self.readvertise();
            }
            WireMessage::Unsubscribe { topic } => {
                if let Some(entry) = self.peers.get_mut(&peer) {
                    entry.topics.remove(&topic);
                }
                self.readvertise();
            }
            WireMessage::Publish { id, topic, payload } => {
                self.route_publish(id, &topic, &payload, Some(peer));
            }
        }
    }

    /// Deliver to local subscribers of the exact topic, then forward to every
    /// established peer whose advertised interest covers it, except the peer
    /// the message arrived from. The seen-cache drops redundant copies that
    /// reach us over a second path.
    fn route_publish(&mut self, id: Uuid, topic: &str, payload: &[u8], from: Option<PeerId>) {
        if !self.seen.insert(id) {
            return;
        }
        if let Some(handlers) = self.subs.get(topic) {
            for (_, handler) in handlers {
                handler(topic, payload);
            }
        }
        let forward = WireMessage::Publish {
            id,
            topic: topic.to_string(),
            payload: payload.to_vec(),
        };
        for (pid, entry) in &self.peers {
            if Some(*pid) == from
                || entry.status != PeerStatus::Established
                || !entry.topics.contains_key(topic)
            {
                continue;
            }
            Self::send_to_peer(&self.name, *pid, entry, forward.clone());
        }
    }

    fn send_to_peer(name: &str, pid: PeerId, entry: &PeerEntry, msg: WireMessage) {
        match &entry.link {
            PeerLink::Wire { out: Some(tx), .. } => {
                if tx.try_send(msg).is_err() {
                    tracing::warn!(endpoint = %name, peer = %pid, "peer channel full, dropping message");
                }
            }
            PeerLink::Wire { out: None, .. } => {
                // Not connected: dropped by design, no buffering across outages.
            }
            PeerLink::Local { link, tx } => {
                let cmd = RouterCmd::LocalInbound { link: *link, msg };
                if tx.try_send(cmd).is_err() {
                    tracing::warn!(endpoint = %name, peer = %pid, "local peer mailbox full, dropping message");
                }
            }
        }
    }

    fn add_remote(&mut self, addr: String, port: u16, retry: Duration) -> Peer {
        let key = (addr.clone(), port);
        if let Some(&existing) = self.dial_index.get(&key) {
            // One active connection per target: return the existing handle.
            return Peer::new(existing, self.endpoint_id);
        }
        let peer = PeerId::new();
        let cancel = self.cancel.child_token();
        self.peers.insert(
            peer,
            PeerEntry {
                status: PeerStatus::Pending,
                link: PeerLink::Wire { out: None },
                topics: HashMap::new(),
                advertised: HashMap::new(),
                remote_endpoint: None,
                cancel: Some(cancel.clone()),
                dial_target: Some(key.clone()),
            },
        );
        self.dial_index.insert(key, peer);
        spawn_dialer(
            peer,
            addr,
            port,
            retry,
            self.connector.clone(),
            self.self_tx.clone(),
            cancel,
        );
        Peer::new(peer, self.endpoint_id)
    }

    fn add_local(&mut self, remote: LocalLink) -> Peer {
        let peer = PeerId::new();
        let link = Uuid::new_v4();
        let topics: Vec<(String, u8)> =
            self.aggregate_interests(Some(peer)).into_iter().collect();
        let request = RouterCmd::LocalLinkRequest {
            link,
            from: LocalLink {
                tx: self.self_tx.clone(),
                endpoint: self.endpoint_id,
                name: self.name.clone(),
            },
            topics: topics.clone(),
        };
        // try_send keeps the actor non-blocking even if the other router's
        // mailbox is saturated; a failed link surfaces as a Closed peer.
        let delivered = remote.tx.try_send(request).is_ok();
        self.peers.insert(
            peer,
            PeerEntry {
                status: if delivered {
                    PeerStatus::Pending
                } else {
                    PeerStatus::Closed
                },
                link: PeerLink::Local {
                    link,
                    tx: remote.tx,
                },
                topics: HashMap::new(),
                advertised: topics.into_iter().collect(),
                remote_endpoint: Some(remote.endpoint),
                cancel: None,
                dial_target: None,
            },
        );
        self.link_index.insert(link, peer);
        Peer::new(peer, self.endpoint_id)
    }

    fn rem_peer(&mut self, peer: Peer) -> bool {
        if peer.endpoint() != self.endpoint_id {
            // A handle minted by some other endpoint: reject defensively.
            self.record_error(0, "peer handle belongs to a different endpoint");
            return false;
        }
        let Some(entry) = self.peers.remove(&peer.id()) else {
            self.record_error(0, "unknown peer");
            return false;
        };
        if let Some(cancel) = &entry.cancel {
            cancel.cancel();
        }
        if let Some(target) = &entry.dial_target {
            self.dial_index.remove(target);
        }
        if let PeerLink::Local { link, tx } = &entry.link {
            self.link_index.remove(link);
            let _ = tx.try_send(RouterCmd::LocalLinkClosed { link: *link });
        }
        // Dropping the entry drops its outbound sender, which ends the writer
        // task and closes the connection.
        self.readvertise();
        true
    }

    fn teardown(&mut self) {
        self.cancel.cancel();
        for (_, entry) in self.peers.drain() {
            if let Some(cancel) = &entry.cancel {
                cancel.cancel();
            }
            if let PeerLink::Local { link, tx } = &entry.link {
                let _ = tx.try_send(RouterCmd::LocalLinkClosed { link: *link });
            }
        }
        self.dial_index.clear();
        self.link_index.clear();
        self.subs.clear();
    }

    /// Topics this endpoint should advertise to `except`, each with its hop
    /// distance to the nearest subscriber: local subscriptions at 0, plus
    /// every interest advertised by its *other* peers at one hop more
    /// (split-horizon, so interest never reflects straight back). Interests
    /// whose distance would exceed the hop limit are dropped, which is what
    /// lets a subscriber-less interest drain out of a cyclic mesh.
    fn aggregate_interests(&self, except: Option<PeerId>) -> HashMap<String, u8> {
        let mut set: HashMap<String, u8> = self.subs.keys().map(|t| (t.clone(), 0)).collect();
        for (pid, entry) in &self.peers {
            if Some(*pid) == except {
                continue;
            }
            for (topic, hops) in &entry.topics {
                let via = hops.saturating_add(1);
                if via > MAX_INTEREST_HOPS {
                    continue;
                }
                set.entry(topic.clone())
                    .and_modify(|h| *h = (*h).min(via))
                    .or_insert(via);
            }
        }
        set
    }

    /// Push Subscribe/Unsubscribe diffs to every established peer whose view
    /// of our interests went stale. A changed hop distance counts as stale:
    /// distances must keep propagating for the hop limit to ever be reached.
    fn readvertise(&mut self) {
        let wants: Vec<(PeerId, HashMap<String, u8>)> = self
            .peers
            .iter()
            .filter(|(_, e)| e.status == PeerStatus::Established)
            .map(|(pid, _)| (*pid, self.aggregate_interests(Some(*pid))))
            .collect();
        for (pid, want) in wants {
            let Some(entry) = self.peers.get(&pid) else {
                continue;
            };
            let mut diffs = Vec::new();
            for (topic, hops) in &want {
                if entry.advertised.get(topic) != Some(hops) {
                    diffs.push(WireMessage::Subscribe {
                        topic: topic.clone(),
                        hops: *hops,
                    });
                }
            }
            for topic in entry.advertised.keys() {
                if !want.contains_key(topic) {
                    diffs.push(WireMessage::Unsubscribe {
                        topic: topic.clone(),
                    });
                }
            }
            if diffs.is_empty() {
                continue;
            }
            for msg in diffs {
                Self::send_to_peer(&self.name, pid, entry, msg);
            }
            if let Some(entry) = self.peers.get_mut(&pid) {
                entry.advertised = want;
            }
        }
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

/// Channel capacity used between peer IO tasks and the router.
pub(crate) fn peer_channel() -> (mpsc::Sender<WireMessage>, mpsc::Receiver<WireMessage>) {
    mpsc::channel(PEER_CHANNEL_CAP)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::TcpConnector;

    #[test]
    fn seen_cache_dedups_and_evicts() {
        let mut cache = SeenCache::new();
        let id = Uuid::new_v4();
        assert!(cache.insert(id));
        assert!(!cache.insert(id));

        for _ in 0..SEEN_CAP {
            assert!(cache.insert(Uuid::new_v4()));
        }
        // The first id aged out, so it counts as new again.
        assert!(cache.insert(id));
    }

    fn test_router() -> Router {
        let (tx, rx) = mpsc::channel(8);
        Router::new(
            Uuid::new_v4(),
            "test".to_string(),
            rx,
            tx,
            Arc::new(TcpConnector),
            CancellationToken::new(),
            Arc::new(Mutex::new(LastError::default())),
        )
    }

    fn established_peer(topics: &[(&str, u8)]) -> PeerEntry {
        PeerEntry {
            status: PeerStatus::Established,
            link: PeerLink::Wire { out: None },
            topics: topics.iter().map(|(t, h)| (t.to_string(), *h)).collect(),
            advertised: HashMap::new(),
            remote_endpoint: Some(Uuid::new_v4()),
            cancel: None,
            dial_target: None,
        }
    }

    #[test]
    fn relayed_interests_gain_a_hop() {
        let mut router = test_router();
        router
            .peers
            .insert(PeerId::new(), established_peer(&[("news", 2)]));

        let agg = router.aggregate_interests(None);
        assert_eq!(agg.get("news"), Some(&3));
    }

    #[test]
    fn nearest_subscriber_distance_wins() {
        let mut router = test_router();
        router
            .peers
            .insert(PeerId::new(), established_peer(&[("news", 4)]));
        router
            .peers
            .insert(PeerId::new(), established_peer(&[("news", 1)]));
        router.subs.insert("chat".to_string(), Vec::new());

        let agg = router.aggregate_interests(None);
        assert_eq!(agg.get("news"), Some(&2));
        assert_eq!(agg.get("chat"), Some(&0));
    }

    #[test]
    fn interests_past_the_hop_limit_drain() {
        // An interest circulating a subscriber-less cycle counts upward each
        // readvertisement; once the claimed distance hits the limit it stops
        // being re-advertised and the cycle drains.
        let mut router = test_router();
        router
            .peers
            .insert(PeerId::new(), established_peer(&[("stale", MAX_INTEREST_HOPS)]));

        let agg = router.aggregate_interests(None);
        assert!(!agg.contains_key("stale"));
    }

    #[test]
    fn split_horizon_excludes_the_target_peer() {
        let mut router = test_router();
        let source = PeerId::new();
        router
            .peers
            .insert(source, established_peer(&[("news", 0)]));

        assert!(!router.aggregate_interests(Some(source)).contains_key("news"));
        assert!(router.aggregate_interests(None).contains_key("news"));
    }
}
