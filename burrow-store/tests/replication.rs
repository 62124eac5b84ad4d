mod common;

use burrow_net::{Endpoint, PeerStatus};
use burrow_store::{Master, Replica};
use common::{eventually, init_tracing};
use std::time::Duration;
use tokio::time::sleep;

/// Two in-process endpoints with an established local peering.
async fn linked_pair() -> (Endpoint, Endpoint) {
    let left = Endpoint::new("store-left");
    let right = Endpoint::new("store-right");
    let peer = left.add_local_peer(&right).await;
    assert!(
        eventually(Duration::from_secs(1), || async {
            left.peer_status(peer).await == Some(PeerStatus::Established)
        })
        .await,
        "local peering never established"
    );
    (left, right)
}

#[tokio::test]
async fn master_applies_writes_synchronously() {
    init_tracing();
    let endpoint = Endpoint::new("solo-master");
    let master = Master::attach(&endpoint, "kv").await;

    master.put(b"name".to_vec(), b"burrow".to_vec()).await.unwrap();
    assert_eq!(
        master.get(b"name").await.unwrap(),
        Some(b"burrow".to_vec())
    );

    master.erase(b"name").await.unwrap();
    assert_eq!(master.get(b"name").await.unwrap(), None);

    master.put(b"a".to_vec(), b"1".to_vec()).await.unwrap();
    master.put(b"b".to_vec(), b"2".to_vec()).await.unwrap();
    let snap = master.snapshot().await.unwrap();
    assert_eq!(
        snap,
        vec![(b"a".to_vec(), b"1".to_vec()), (b"b".to_vec(), b"2".to_vec())]
    );

    master.detach().await;
    endpoint.shutdown().await;
}

#[tokio::test]
async fn replica_converges_after_master_writes() {
    init_tracing();
    let (left, right) = linked_pair().await;
    let master = Master::attach(&left, "kv").await;
    let replica = Replica::attach(&right, "kv").await;

    for i in 0..10u8 {
        master
            .put(format!("k{}", i).into_bytes(), vec![i])
            .await
            .unwrap();
    }
    master.erase(b"k3").await.unwrap();

    let expected = master.snapshot().await.unwrap();
    assert!(
        eventually(Duration::from_secs(5), || async {
            // Re-request in case early updates raced interest propagation.
            replica.sync();
            sleep(Duration::from_millis(50)).await;
            replica.snapshot().await.unwrap() == expected
        })
        .await,
        "replica never converged to the master's state"
    );

    master.detach().await;
    replica.detach().await;
    left.shutdown().await;
    right.shutdown().await;
}

#[tokio::test]
async fn replica_write_round_trips_through_master() {
    init_tracing();
    let (left, right) = linked_pair().await;
    let master = Master::attach(&left, "kv").await;
    let replica = Replica::attach(&right, "kv").await;

    // A completed snapshot round trip proves interest has propagated in both
    // directions, so the forwarded write below cannot be dropped.
    master.put(b"warm".to_vec(), b"up".to_vec()).await.unwrap();
    assert!(
        eventually(Duration::from_secs(5), || async {
            replica.sync();
            sleep(Duration::from_millis(50)).await;
            replica.get(b"warm").await.unwrap() == Some(b"up".to_vec())
        })
        .await,
        "stores never saw each other"
    );

    // The write resolves locally only after the master's update echoes back.
    let ticket = replica
        .put(b"city".to_vec(), b"vienna".to_vec())
        .await
        .unwrap();

    assert!(
        eventually(Duration::from_secs(5), || async {
            master.get(b"city").await.unwrap() == Some(b"vienna".to_vec())
        })
        .await,
        "request never reached the master"
    );
    assert!(
        eventually(Duration::from_secs(5), || async {
            replica.get(b"city").await.unwrap() == Some(b"vienna".to_vec())
        })
        .await,
        "update never echoed back to the replica"
    );
    assert!(
        eventually(Duration::from_secs(5), || async {
            !replica.is_pending(ticket).await
        })
        .await,
        "ticket stuck in the pending set"
    );
    assert!(replica.pending().await.is_empty());

    master.detach().await;
    replica.detach().await;
    left.shutdown().await;
    right.shutdown().await;
}

#[tokio::test]
async fn replica_write_stays_pending_without_a_master() {
    init_tracing();
    let endpoint = Endpoint::new("orphan");
    let replica = Replica::attach(&endpoint, "kv").await;

    let ticket = replica
        .put(b"key".to_vec(), b"value".to_vec())
        .await
        .unwrap();

    sleep(Duration::from_millis(200)).await;
    // Nothing resolved, nothing dropped: the write is observable as pending
    // and the local state is untouched.
    assert!(replica.is_pending(ticket).await);
    assert_eq!(replica.pending().await, vec![ticket]);
    assert_eq!(replica.get(b"key").await.unwrap(), None);

    replica.detach().await;
    endpoint.shutdown().await;
}

#[tokio::test]
async fn late_replica_bootstraps_from_snapshot() {
    init_tracing();
    let (left, right) = linked_pair().await;
    let master = Master::attach(&left, "kv").await;
    master.put(b"old".to_vec(), b"data".to_vec()).await.unwrap();
    master.put(b"more".to_vec(), b"state".to_vec()).await.unwrap();

    // Attach after the writes happened; the snapshot protocol has to carry
    // the existing state over.
    let replica = Replica::attach(&right, "kv").await;
    let expected = master.snapshot().await.unwrap();
    assert!(
        eventually(Duration::from_secs(5), || async {
            // Re-request in case the attach-time sync raced interest
            // propagation through the mesh.
            replica.sync();
            sleep(Duration::from_millis(50)).await;
            replica.snapshot().await.unwrap() == expected
        })
        .await,
        "snapshot bootstrap never completed"
    );

    master.detach().await;
    replica.detach().await;
    left.shutdown().await;
    right.shutdown().await;
}

#[tokio::test]
async fn last_write_wins_on_one_key() {
    init_tracing();
    let (left, right) = linked_pair().await;
    let master = Master::attach(&left, "kv").await;
    let replica = Replica::attach(&right, "kv").await;

    for i in 0..50u8 {
        master.put(b"counter".to_vec(), vec![i]).await.unwrap();
    }

    // Updates arrive in the order the master applied them, so the replica
    // settles on the final value.
    assert!(
        eventually(Duration::from_secs(5), || async {
            replica.sync();
            sleep(Duration::from_millis(50)).await;
            replica.get(b"counter").await.unwrap() == Some(vec![49])
        })
        .await,
        "replica did not settle on the last write"
    );
    sleep(Duration::from_millis(100)).await;
    assert_eq!(replica.get(b"counter").await.unwrap(), Some(vec![49]));

    master.detach().await;
    replica.detach().await;
    left.shutdown().await;
    right.shutdown().await;
}
