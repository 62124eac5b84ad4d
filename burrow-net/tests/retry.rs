mod common;

use burrow_net::connector::{Connector, PeerStream};
use burrow_net::{Endpoint, PeerStatus};
use common::{eventually, init_tracing};
use futures_util::future::BoxFuture;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::time::sleep;

/// Transport double that refuses every attempt and records when it was asked.
#[derive(Default)]
struct RefusingConnector {
    attempts: Arc<Mutex<Vec<Instant>>>,
}

impl RefusingConnector {
    fn attempts(&self) -> Vec<Instant> {
        self.attempts.lock().unwrap().clone()
    }
}

impl Connector for RefusingConnector {
    fn connect(&self, _addr: &str, _port: u16) -> BoxFuture<'static, io::Result<PeerStream>> {
        self.attempts.lock().unwrap().push(Instant::now());
        Box::pin(async {
            Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "refused by test double",
            ))
        })
    }
}

#[tokio::test]
async fn connect_retries_at_fixed_interval_until_removed() {
    init_tracing();
    let connector = Arc::new(RefusingConnector::default());
    let endpoint = Endpoint::with_connector("dialer", 0, connector.clone());

    let retry = Duration::from_millis(50);
    let peer = endpoint
        .add_peer_with_retry("198.51.100.7", 7777, retry)
        .await;

    assert!(
        eventually(Duration::from_secs(2), || async {
            connector.attempts().len() >= 4
        })
        .await,
        "dialer stopped retrying"
    );

    // Attempts are spaced by at least the configured interval (small
    // tolerance for timestamp capture before the failure resolves).
    let attempts = connector.attempts();
    for pair in attempts.windows(2) {
        let gap = pair[1].duration_since(pair[0]);
        assert!(
            gap >= Duration::from_millis(45),
            "attempts only {}ms apart",
            gap.as_millis()
        );
    }

    // The peer never left the pending/connecting states.
    let status = endpoint.peer_status(peer).await;
    assert!(
        matches!(status, Some(PeerStatus::Pending) | Some(PeerStatus::Connecting)),
        "unexpected status {:?}",
        status
    );

    assert!(endpoint.rem_peer(peer).await);
    // Allow an attempt already past the cancellation check to finish.
    sleep(Duration::from_millis(120)).await;
    let after_removal = connector.attempts().len();
    sleep(Duration::from_millis(250)).await;
    assert_eq!(
        connector.attempts().len(),
        after_removal,
        "dial task survived rem_peer"
    );

    endpoint.shutdown().await;
}

#[tokio::test]
async fn a_failed_peer_does_not_affect_local_delivery() {
    init_tracing();
    let connector = Arc::new(RefusingConnector::default());
    let endpoint = Endpoint::with_connector("dialer", 0, connector.clone());
    endpoint
        .add_peer_with_retry("198.51.100.7", 7777, Duration::from_millis(20))
        .await;

    let collector = common::Collector::new();
    endpoint.subscribe("news", collector.handler()).await;
    endpoint.print("news", "still works").await;

    assert!(
        eventually(Duration::from_secs(1), || async { collector.count() == 1 }).await,
        "unrelated publish failed alongside a failing peer"
    );

    endpoint.shutdown().await;
}
