mod common;

use burrow_net::Endpoint;
use burrow_store::{Master, QueryResult, ResponseQueue};
use common::{eventually, init_tracing};
use std::os::fd::RawFd;
use std::thread;
use std::time::Duration;

/// poll(2) with a zero timeout: is the descriptor readable right now?
fn readable(fd: RawFd) -> bool {
    let mut fds = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    let n = unsafe { libc::poll(&mut fds, 1, 0) };
    n == 1 && (fds.revents & libc::POLLIN) != 0
}

#[test]
fn pops_in_fifo_order() {
    init_tracing();
    let (queue, sender) = ResponseQueue::new().unwrap();
    sender.send("a");
    sender.send("b");
    sender.send("c");

    assert_eq!(queue.len(), 3);
    assert_eq!(queue.pop(), Some("a"));
    assert_eq!(queue.pop(), Some("b"));
    assert_eq!(queue.pop(), Some("c"));
    assert!(queue.is_empty());
    assert_eq!(queue.try_pop(), None);
}

#[test]
fn descriptor_tracks_queue_contents() {
    init_tracing();
    let (queue, sender) = ResponseQueue::new().unwrap();
    assert!(!readable(queue.fd()));

    sender.send(1u32);
    sender.send(2u32);
    assert!(readable(queue.fd()));

    // Still readable while something remains queued.
    assert_eq!(queue.try_pop(), Some(1));
    assert!(readable(queue.fd()));

    // Drained on the nonempty-to-empty transition.
    assert_eq!(queue.try_pop(), Some(2));
    assert!(!readable(queue.fd()));
}

#[test]
fn pop_blocks_until_a_response_arrives() {
    init_tracing();
    let (queue, sender) = ResponseQueue::new().unwrap();

    let producer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        sender.send(42u32);
    });

    // Blocks here until the producer thread delivers.
    assert_eq!(queue.pop(), Some(42));
    producer.join().unwrap();
}

#[test]
fn close_wakes_poppers_and_pollers() {
    init_tracing();
    let (queue, sender) = ResponseQueue::new().unwrap();
    sender.send("last");
    drop(sender);

    // Queued items survive the close, then end-of-stream.
    assert_eq!(queue.pop(), Some("last"));
    assert_eq!(queue.pop(), None);
    assert_eq!(queue.pop(), None);

    // The close itself fires the flare so a poller parked on the descriptor
    // wakes up to observe it.
    assert!(readable(queue.fd()));
}

#[test]
fn draining_after_close_keeps_the_descriptor_readable() {
    init_tracing();
    let (queue, sender) = ResponseQueue::new().unwrap();
    sender.send(1u8);
    sender.send(2u8);
    drop(sender);

    // Popping the final item must not drain the close notification: a poller
    // parked on the descriptor still has to wake and observe end-of-stream.
    assert_eq!(queue.pop(), Some(1));
    assert!(readable(queue.fd()));
    assert_eq!(queue.pop(), Some(2));
    assert!(readable(queue.fd()));
    assert_eq!(queue.pop(), None);
    assert!(readable(queue.fd()));
}

#[test]
fn clones_keep_the_queue_open() {
    init_tracing();
    let (queue, sender) = ResponseQueue::new().unwrap();
    let extra = sender.clone();
    drop(sender);

    extra.send("still open");
    assert_eq!(queue.pop(), Some("still open"));

    drop(extra);
    assert_eq!(queue.pop(), None);
}

#[test]
fn blocked_pop_observes_the_close() {
    init_tracing();
    let (queue, sender) = ResponseQueue::<u32>::new().unwrap();

    let producer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        drop(sender);
    });

    assert_eq!(queue.pop(), None);
    producer.join().unwrap();
}

#[tokio::test]
async fn master_resolves_reads_onto_a_queue() {
    init_tracing();
    let endpoint = Endpoint::new("query");
    let master = Master::attach(&endpoint, "kv").await;
    master.put(b"name".to_vec(), b"burrow".to_vec()).await.unwrap();

    let (queue, sender) = ResponseQueue::<QueryResult>::new().unwrap();
    master.get_into(b"name", &sender);
    master.get_into(b"missing", &sender);

    assert!(
        eventually(Duration::from_secs(2), || async { queue.len() == 2 }).await,
        "reads never resolved onto the queue"
    );
    assert!(readable(queue.fd()));

    let hit = queue.try_pop().unwrap();
    assert_eq!(hit.key, b"name".to_vec());
    assert_eq!(hit.value, Some(b"burrow".to_vec()));

    let miss = queue.try_pop().unwrap();
    assert_eq!(miss.key, b"missing".to_vec());
    assert_eq!(miss.value, None);
    assert!(!readable(queue.fd()));

    master.detach().await;
    endpoint.shutdown().await;
}
