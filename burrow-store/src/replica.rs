//! Replica - a converging copy of a master's store
//!
//! A replica never writes its own backend directly: reads are served locally,
//! while puts and erases are forwarded to the master as ticketed requests and
//! applied only when the master's update echoes back. Until then the ticket
//! sits in an observable pending set; if the master is unreachable the write
//! stays pending indefinitely rather than failing or being dropped.

use crate::error::StoreError;
use crate::proto::{StoreMessage, WriteOp};
use crate::{QueryResult, ResponseSender};
use burrow_model::{HandlerId, MemoryStore, StorageBackend, WriteTicket};
use burrow_net::Endpoint;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

enum ReplicaCmd {
    Get {
        key: Vec<u8>,
        resp: oneshot::Sender<Result<Option<Vec<u8>>, StoreError>>,
    },
    Put {
        key: Vec<u8>,
        value: Vec<u8>,
        resp: oneshot::Sender<Result<WriteTicket, StoreError>>,
    },
    Erase {
        key: Vec<u8>,
        resp: oneshot::Sender<Result<WriteTicket, StoreError>>,
    },
    Snapshot {
        resp: oneshot::Sender<Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError>>,
    },
    Pending {
        resp: oneshot::Sender<Vec<WriteTicket>>,
    },
    IsPending {
        ticket: WriteTicket,
        resp: oneshot::Sender<bool>,
    },
    GetInto {
        key: Vec<u8>,
        sender: ResponseSender<QueryResult>,
    },
    Sync,
    Remote(StoreMessage),
    Shutdown {
        resp: oneshot::Sender<()>,
    },
}

/// Handle to a replica of a master's store for one topic.
pub struct Replica {
    endpoint: Endpoint,
    topic: String,
    handler: HandlerId,
    tx: mpsc::UnboundedSender<ReplicaCmd>,
}

impl Replica {
    /// Attach a replica with the default in-memory backend and request an
    /// initial snapshot from the master.
    pub async fn attach(endpoint: &Endpoint, topic: impl Into<String>) -> Self {
        Self::attach_with_backend(endpoint, topic, Box::new(MemoryStore::new())).await
    }

    /// Attach a replica holding its local state in the given backend.
    ///
    /// The snapshot request issued at attach time only reaches a master whose
    /// interest has already propagated here; when attaching before the mesh
    /// is up, call `sync` again once it is.
    pub async fn attach_with_backend(
        endpoint: &Endpoint,
        topic: impl Into<String>,
        backend: Box<dyn StorageBackend>,
    ) -> Self {
        let topic = topic.into();
        let (tx, rx) = mpsc::unbounded_channel();

        let mailbox = tx.clone();
        let handler = endpoint
            .subscribe(topic.clone(), move |_topic, payload| {
                match StoreMessage::decode(payload) {
                    Ok(msg) => {
                        let _ = mailbox.send(ReplicaCmd::Remote(msg));
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "undecodable store payload, ignoring");
                    }
                }
            })
            .await;

        let actor = ReplicaActor {
            endpoint: endpoint.clone(),
            topic: topic.clone(),
            replica_id: Uuid::new_v4(),
            backend,
            pending: Vec::new(),
            rx,
        };
        let replica = Self {
            endpoint: endpoint.clone(),
            topic,
            handler,
            tx,
        };
        tokio::spawn(actor.run());
        replica.sync();
        replica
    }

    /// The topic this store replicates over.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Read from the local replica state (eventually consistent).
    pub async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx
            .send(ReplicaCmd::Get {
                key: key.to_vec(),
                resp: resp_tx,
            })
            .map_err(|_| StoreError::ChannelClosed)?;
        resp_rx.await.map_err(|_| StoreError::ChannelClosed)?
    }

    /// Forward a put to the master. Resolves locally only when the master's
    /// update echoes the returned ticket back; until then it is pending.
    pub async fn put(&self, key: Vec<u8>, value: Vec<u8>) -> Result<WriteTicket, StoreError> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx
            .send(ReplicaCmd::Put {
                key,
                value,
                resp: resp_tx,
            })
            .map_err(|_| StoreError::ChannelClosed)?;
        resp_rx.await.map_err(|_| StoreError::ChannelClosed)?
    }

    /// Forward an erase to the master; same pending semantics as `put`.
    pub async fn erase(&self, key: &[u8]) -> Result<WriteTicket, StoreError> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx
            .send(ReplicaCmd::Erase {
                key: key.to_vec(),
                resp: resp_tx,
            })
            .map_err(|_| StoreError::ChannelClosed)?;
        resp_rx.await.map_err(|_| StoreError::ChannelClosed)?
    }

    /// Full dump of the local replica state, key-ordered.
    pub async fn snapshot(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx
            .send(ReplicaCmd::Snapshot { resp: resp_tx })
            .map_err(|_| StoreError::ChannelClosed)?;
        resp_rx.await.map_err(|_| StoreError::ChannelClosed)?
    }

    /// Tickets of forwarded writes whose updates have not come back yet,
    /// oldest first. Non-empty while the master is unreachable.
    pub async fn pending(&self) -> Vec<WriteTicket> {
        let (resp_tx, resp_rx) = oneshot::channel();
        if self
            .tx
            .send(ReplicaCmd::Pending { resp: resp_tx })
            .is_err()
        {
            return Vec::new();
        }
        resp_rx.await.unwrap_or_default()
    }

    /// Whether one forwarded write is still awaiting its echo.
    pub async fn is_pending(&self, ticket: WriteTicket) -> bool {
        let (resp_tx, resp_rx) = oneshot::channel();
        if self
            .tx
            .send(ReplicaCmd::IsPending {
                ticket,
                resp: resp_tx,
            })
            .is_err()
        {
            return false;
        }
        resp_rx.await.unwrap_or(false)
    }

    /// Resolve a local read asynchronously onto a response queue.
    pub fn get_into(&self, key: &[u8], sender: &ResponseSender<QueryResult>) {
        let _ = self.tx.send(ReplicaCmd::GetInto {
            key: key.to_vec(),
            sender: sender.clone(),
        });
    }

    /// Ask the master for a fresh snapshot of its full state.
    pub fn sync(&self) {
        let _ = self.tx.send(ReplicaCmd::Sync);
    }

    /// Unsubscribe from the topic and stop the actor.
    pub async fn detach(self) {
        self.endpoint
            .unsubscribe(self.topic.clone(), self.handler)
            .await;
        let (resp_tx, resp_rx) = oneshot::channel();
        if self.tx.send(ReplicaCmd::Shutdown { resp: resp_tx }).is_ok() {
            let _ = resp_rx.await;
        }
    }
}

struct ReplicaActor {
    endpoint: Endpoint,
    topic: String,
    replica_id: Uuid,
    backend: Box<dyn StorageBackend>,
    pending: Vec<WriteTicket>,
    rx: mpsc::UnboundedReceiver<ReplicaCmd>,
}

impl ReplicaActor {
    async fn run(mut self) {
        while let Some(cmd) = self.rx.recv().await {
            match cmd {
                ReplicaCmd::Get { key, resp } => {
                    let _ = resp.send(self.backend.get(&key).map_err(StoreError::from));
                }
                ReplicaCmd::Put { key, value, resp } => {
                    let result = self.forward(WriteOp::Put { key, value }).await;
                    let _ = resp.send(result);
                }
                ReplicaCmd::Erase { key, resp } => {
                    let result = self.forward(WriteOp::Erase { key }).await;
                    let _ = resp.send(result);
                }
                ReplicaCmd::Snapshot { resp } => {
                    let _ = resp.send(self.backend.snapshot().map_err(StoreError::from));
                }
                ReplicaCmd::Pending { resp } => {
                    let _ = resp.send(self.pending.clone());
                }
                ReplicaCmd::IsPending { ticket, resp } => {
                    let _ = resp.send(self.pending.contains(&ticket));
                }
                ReplicaCmd::GetInto { key, sender } => {
                    let value = self.backend.get(&key).unwrap_or_else(|e| {
                        tracing::error!(error = %e, "replica read failed");
                        None
                    });
                    sender.send(QueryResult { key, value });
                }
                ReplicaCmd::Sync => {
                    self.publish(StoreMessage::SyncRequest {
                        replica: self.replica_id,
                    })
                    .await;
                }
                ReplicaCmd::Remote(msg) => self.handle_remote(msg),
                ReplicaCmd::Shutdown { resp } => {
                    let _ = resp.send(());
                    break;
                }
            }
        }
        tracing::debug!(topic = %self.topic, "replica stopped");
    }

    /// Record the ticket and publish the request toward the master. The local
    /// backend stays untouched until the echo arrives.
    async fn forward(&mut self, op: WriteOp) -> Result<WriteTicket, StoreError> {
        let ticket = WriteTicket::new();
        let msg = StoreMessage::Request { ticket, op };
        let payload = msg.encode()?;
        self.pending.push(ticket);
        self.endpoint.publish(self.topic.clone(), payload).await;
        Ok(ticket)
    }

    fn handle_remote(&mut self, msg: StoreMessage) {
        match msg {
            StoreMessage::Update { origin, op } => {
                self.apply(op);
                if let Some(ticket) = origin {
                    self.pending.retain(|t| *t != ticket);
                }
            }
            StoreMessage::SyncSnapshot { replica, entries } => {
                if replica == self.replica_id {
                    self.replace_state(entries);
                }
            }
            // Requests are the master's business, including our own echoes.
            StoreMessage::Request { .. } | StoreMessage::SyncRequest { .. } => {}
        }
    }

    fn apply(&mut self, op: WriteOp) {
        let result = match op {
            WriteOp::Put { key, value } => self.backend.put(key, value),
            WriteOp::Erase { key } => self.backend.erase(&key),
        };
        if let Err(e) = result {
            tracing::error!(topic = %self.topic, error = %e, "replica apply failed");
        }
    }

    /// Replace local state with the master's snapshot. Updates already queued
    /// behind the snapshot re-apply idempotently (last writer wins).
    fn replace_state(&mut self, entries: Vec<(Vec<u8>, Vec<u8>)>) {
        let current = match self.backend.snapshot() {
            Ok(current) => current,
            Err(e) => {
                tracing::error!(topic = %self.topic, error = %e, "replica snapshot failed");
                return;
            }
        };
        for (key, _) in &current {
            if !entries.iter().any(|(k, _)| k == key) {
                if let Err(e) = self.backend.erase(key) {
                    tracing::error!(topic = %self.topic, error = %e, "replica erase failed");
                }
            }
        }
        for (key, value) in entries {
            if let Err(e) = self.backend.put(key, value) {
                tracing::error!(topic = %self.topic, error = %e, "replica put failed");
            }
        }
    }

    async fn publish(&self, msg: StoreMessage) {
        match msg.encode() {
            Ok(payload) => self.endpoint.publish(self.topic.clone(), payload).await,
            Err(e) => tracing::error!(error = %e, "store message encode failed"),
        }
    }
}
