//! Response queue - bridges async producers to a synchronous consumer
//!
//! Actors enqueue results without blocking; a consumer thread either blocks
//! in `pop` or multiplexes on the flare descriptor with select/poll and then
//! drains with `try_pop`. The flare is armed on the empty-to-nonempty
//! transition and drained on the nonempty-to-empty transition, so the
//! descriptor is readable exactly while items are queued. Once the queue is
//! closed the flare stays lit for good, so pollers always wake to observe
//! end-of-stream no matter how the final items were drained.

use crate::flare::Flare;
use std::collections::VecDeque;
use std::io;
use std::os::fd::{AsRawFd, RawFd};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

struct State<T> {
    queue: VecDeque<T>,
    senders: usize,
    closed: bool,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    cond: Condvar,
    flare: Flare,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        // A poisoned lock only means a panicking thread held it; the queue
        // state itself is still consistent (single push/pop operations).
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Consumer half: FIFO removal plus the readiness descriptor.
pub struct ResponseQueue<T> {
    shared: Arc<Shared<T>>,
}

/// Producer half: non-blocking enqueue, cheap to clone into handlers.
pub struct ResponseSender<T> {
    shared: Arc<Shared<T>>,
}

impl<T> ResponseQueue<T> {
    /// Create an empty queue and its producer handle.
    pub fn new() -> io::Result<(ResponseQueue<T>, ResponseSender<T>)> {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                queue: VecDeque::new(),
                senders: 1,
                closed: false,
            }),
            cond: Condvar::new(),
            flare: Flare::new()?,
        });
        Ok((
            ResponseQueue {
                shared: shared.clone(),
            },
            ResponseSender { shared },
        ))
    }

    /// The readiness descriptor: readable while the queue is non-empty.
    pub fn fd(&self) -> RawFd {
        self.shared.flare.fd()
    }

    /// Remove and return the oldest response, blocking the calling thread
    /// until one is available. Returns None once the queue is closed (every
    /// producer dropped) and drained.
    pub fn pop(&self) -> Option<T> {
        let mut state = self.shared.lock();
        loop {
            if let Some(value) = state.queue.pop_front() {
                // Once closed the flare stays lit: extinguishing here would
                // eat the close notification and strand pollers.
                if state.queue.is_empty() && !state.closed {
                    self.shared.flare.extinguish();
                }
                return Some(value);
            }
            if state.closed {
                return None;
            }
            state = self
                .shared
                .cond
                .wait(state)
                .unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Non-blocking variant of `pop`.
    pub fn try_pop(&self) -> Option<T> {
        let mut state = self.shared.lock();
        let value = state.queue.pop_front()?;
        if state.queue.is_empty() && !state.closed {
            self.shared.flare.extinguish();
        }
        Some(value)
    }

    pub fn len(&self) -> usize {
        self.shared.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.lock().queue.is_empty()
    }
}

impl<T> AsRawFd for ResponseQueue<T> {
    fn as_raw_fd(&self) -> RawFd {
        self.fd()
    }
}

impl<T> ResponseSender<T> {
    /// Append a response. Lock-light and never blocks: safe to call from a
    /// message handler or actor loop.
    pub fn send(&self, value: T) {
        let mut state = self.shared.lock();
        if state.closed {
            return;
        }
        let was_empty = state.queue.is_empty();
        state.queue.push_back(value);
        if was_empty {
            self.shared.flare.fire();
        }
        drop(state);
        self.shared.cond.notify_one();
    }
}

impl<T> Clone for ResponseSender<T> {
    fn clone(&self) -> Self {
        self.shared.lock().senders += 1;
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> Drop for ResponseSender<T> {
    fn drop(&mut self) {
        let mut state = self.shared.lock();
        state.senders -= 1;
        if state.senders == 0 {
            state.closed = true;
            drop(state);
            // Wake a blocked pop and any poller so they observe end-of-stream.
            self.shared.cond.notify_all();
            self.shared.flare.fire();
        }
    }
}

impl<T> Drop for ResponseQueue<T> {
    fn drop(&mut self) {
        // Stop producers from queueing into a queue nobody will drain.
        let mut state = self.shared.lock();
        state.closed = true;
        state.queue.clear();
    }
}
