//! Master - the single authoritative writer for a replicated store topic
//!
//! The master actor exclusively owns its storage backend. Writes arriving via
//! its handle and write requests arriving over the topic are applied serially
//! by the same loop, which is what makes the master the source of truth: no
//! concurrent writers ever race on the backend. Each applied write is
//! published as an update so replicas converge.

use crate::error::StoreError;
use crate::proto::{StoreMessage, WriteOp};
use crate::{QueryResult, ResponseSender};
use burrow_model::{HandlerId, MemoryStore, StorageBackend};
use burrow_net::Endpoint;
use tokio::sync::{mpsc, oneshot};

enum MasterCmd {
    Get {
        key: Vec<u8>,
        resp: oneshot::Sender<Result<Option<Vec<u8>>, StoreError>>,
    },
    Put {
        key: Vec<u8>,
        value: Vec<u8>,
        resp: oneshot::Sender<Result<(), StoreError>>,
    },
    Erase {
        key: Vec<u8>,
        resp: oneshot::Sender<Result<(), StoreError>>,
    },
    Snapshot {
        resp: oneshot::Sender<Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError>>,
    },
    /// Resolve a read and enqueue it on a response queue instead of awaiting.
    GetInto {
        key: Vec<u8>,
        sender: ResponseSender<QueryResult>,
    },
    /// A store message arrived on the topic.
    Remote(StoreMessage),
    Shutdown {
        resp: oneshot::Sender<()>,
    },
}

/// Handle to the master actor for one replicated store topic.
pub struct Master {
    endpoint: Endpoint,
    topic: String,
    handler: HandlerId,
    tx: mpsc::UnboundedSender<MasterCmd>,
}

impl Master {
    /// Bind a master to an endpoint and topic with the default in-memory
    /// backend.
    pub async fn attach(endpoint: &Endpoint, topic: impl Into<String>) -> Self {
        Self::attach_with_backend(endpoint, topic, Box::new(MemoryStore::new())).await
    }

    /// Bind a master to an endpoint and topic, taking exclusive ownership of
    /// the given backend. The master subscribes itself to the topic so write
    /// requests from replicas reach it through the mesh.
    pub async fn attach_with_backend(
        endpoint: &Endpoint,
        topic: impl Into<String>,
        backend: Box<dyn StorageBackend>,
    ) -> Self {
        let topic = topic.into();
        // Unbounded so the subscription handler can enqueue without blocking
        // the router actor.
        let (tx, rx) = mpsc::unbounded_channel();

        let mailbox = tx.clone();
        let handler = endpoint
            .subscribe(topic.clone(), move |_topic, payload| {
                match StoreMessage::decode(payload) {
                    Ok(msg) => {
                        let _ = mailbox.send(MasterCmd::Remote(msg));
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "undecodable store payload, ignoring");
                    }
                }
            })
            .await;

        let actor = MasterActor {
            endpoint: endpoint.clone(),
            topic: topic.clone(),
            backend,
            rx,
        };
        tokio::spawn(actor.run());

        Self {
            endpoint: endpoint.clone(),
            topic,
            handler,
            tx,
        }
    }

    /// The topic this store replicates over.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx
            .send(MasterCmd::Get {
                key: key.to_vec(),
                resp: resp_tx,
            })
            .map_err(|_| StoreError::ChannelClosed)?;
        resp_rx.await.map_err(|_| StoreError::ChannelClosed)?
    }

    /// Apply a write directly to the backend, then publish it so replicas
    /// converge. Backend failures propagate to the caller and are not
    /// published.
    pub async fn put(&self, key: Vec<u8>, value: Vec<u8>) -> Result<(), StoreError> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx
            .send(MasterCmd::Put {
                key,
                value,
                resp: resp_tx,
            })
            .map_err(|_| StoreError::ChannelClosed)?;
        resp_rx.await.map_err(|_| StoreError::ChannelClosed)?
    }

    pub async fn erase(&self, key: &[u8]) -> Result<(), StoreError> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx
            .send(MasterCmd::Erase {
                key: key.to_vec(),
                resp: resp_tx,
            })
            .map_err(|_| StoreError::ChannelClosed)?;
        resp_rx.await.map_err(|_| StoreError::ChannelClosed)?
    }

    /// Full dump of the backend, key-ordered.
    pub async fn snapshot(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx
            .send(MasterCmd::Snapshot { resp: resp_tx })
            .map_err(|_| StoreError::ChannelClosed)?;
        resp_rx.await.map_err(|_| StoreError::ChannelClosed)?
    }

    /// Resolve a read asynchronously onto a response queue, for synchronous
    /// consumers multiplexing on the queue's descriptor.
    pub fn get_into(&self, key: &[u8], sender: &ResponseSender<QueryResult>) {
        let _ = self.tx.send(MasterCmd::GetInto {
            key: key.to_vec(),
            sender: sender.clone(),
        });
    }

    /// Unsubscribe from the topic and stop the actor. The backend is dropped
    /// with it.
    pub async fn detach(self) {
        self.endpoint
            .unsubscribe(self.topic.clone(), self.handler)
            .await;
        let (resp_tx, resp_rx) = oneshot::channel();
        if self.tx.send(MasterCmd::Shutdown { resp: resp_tx }).is_ok() {
            let _ = resp_rx.await;
        }
    }
}

struct MasterActor {
    endpoint: Endpoint,
    topic: String,
    backend: Box<dyn StorageBackend>,
    rx: mpsc::UnboundedReceiver<MasterCmd>,
}

impl MasterActor {
    async fn run(mut self) {
        while let Some(cmd) = self.rx.recv().await {
            match cmd {
                MasterCmd::Get { key, resp } => {
                    let _ = resp.send(self.backend.get(&key).map_err(StoreError::from));
                }
                MasterCmd::Put { key, value, resp } => {
                    let result = self.apply_and_publish(
                        WriteOp::Put { key, value },
                        None,
                    )
                    .await;
                    let _ = resp.send(result);
                }
                MasterCmd::Erase { key, resp } => {
                    let result = self.apply_and_publish(WriteOp::Erase { key }, None).await;
                    let _ = resp.send(result);
                }
                MasterCmd::Snapshot { resp } => {
                    let _ = resp.send(self.backend.snapshot().map_err(StoreError::from));
                }
                MasterCmd::GetInto { key, sender } => {
                    let value = self.backend.get(&key).unwrap_or_else(|e| {
                        tracing::error!(error = %e, "backend read failed");
                        None
                    });
                    sender.send(QueryResult { key, value });
                }
                MasterCmd::Remote(msg) => self.handle_remote(msg).await,
                MasterCmd::Shutdown { resp } => {
                    let _ = resp.send(());
                    break;
                }
            }
        }
        tracing::debug!(topic = %self.topic, "master stopped");
    }

    async fn handle_remote(&mut self, msg: StoreMessage) {
        match msg {
            StoreMessage::Request { ticket, op } => {
                // Serial application in arrival order; a failed write is
                // logged and never published, leaving the request pending on
                // the originating replica.
                if let Err(e) = self.apply_and_publish(op, Some(ticket)).await {
                    tracing::error!(topic = %self.topic, %ticket, error = %e, "replicated write failed");
                }
            }
            StoreMessage::SyncRequest { replica } => match self.backend.snapshot() {
                Ok(entries) => {
                    self.publish(StoreMessage::SyncSnapshot { replica, entries })
                        .await;
                }
                Err(e) => {
                    tracing::error!(topic = %self.topic, error = %e, "snapshot failed");
                }
            },
            // Updates and snapshots originate here; local echoes are ignored.
            StoreMessage::Update { .. } | StoreMessage::SyncSnapshot { .. } => {}
        }
    }

    async fn apply_and_publish(
        &mut self,
        op: WriteOp,
        origin: Option<burrow_model::WriteTicket>,
    ) -> Result<(), StoreError> {
        match &op {
            WriteOp::Put { key, value } => {
                self.backend.put(key.clone(), value.clone())?;
            }
            WriteOp::Erase { key } => {
                self.backend.erase(key)?;
            }
        }
        self.publish(StoreMessage::Update { origin, op }).await;
        Ok(())
    }

    async fn publish(&self, msg: StoreMessage) {
        match msg.encode() {
            Ok(payload) => self.endpoint.publish(self.topic.clone(), payload).await,
            Err(e) => tracing::error!(error = %e, "store message encode failed"),
        }
    }
}
