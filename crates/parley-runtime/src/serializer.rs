//! Per-thread FIFO serialization.
//!
//! Each thread identifier has a "tail": the completion signal of the most
//! recently enqueued task. Enqueueing swaps in a new tail and waits on the
//! previous one. The swap happens synchronously when
//! [`ThreadSerializer::run_exclusive`] is called, so call order is run order.
//!
//! A task that is dropped while still waiting hands its own pending
//! predecessor to its successor, so cancelling a queued request never lets
//! a later one overtake a running one.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use parley_core::ThreadId;
use tokio::sync::oneshot;

/// Sent when a task settles. Carries the predecessor a cancelled waiter was
/// still blocked on, if any.
struct Handoff(Option<oneshot::Receiver<Handoff>>);

struct Tail {
    ticket: u64,
    done: oneshot::Receiver<Handoff>,
}

/// Runs at most one task per thread at a time, in call order.
#[derive(Default)]
pub struct ThreadSerializer {
    tails: Mutex<HashMap<ThreadId, Tail>>,
    next_ticket: AtomicU64,
}

impl ThreadSerializer {
    /// Empty serializer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue `task` behind every earlier task for `thread`.
    ///
    /// The position in the queue is taken now, not when the returned future
    /// is first polled. `task` starts only after all earlier tasks for the
    /// same thread have settled (completed, panicked or been dropped).
    pub fn run_exclusive<'a, F, T>(
        &'a self,
        thread: &ThreadId,
        task: F,
    ) -> impl Future<Output = T> + Send + use<'a, F, T>
    where
        F: Future<Output = T> + Send + 'a,
        T: Send + 'a,
    {
        let (tx, rx) = oneshot::channel();
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let previous = self
            .tails
            .lock()
            .insert(thread.clone(), Tail { ticket, done: rx });

        let mut guard = SettleGuard {
            serializer: self,
            thread: thread.clone(),
            ticket,
            done: Some(tx),
            pending: previous.map(|tail| tail.done),
        };

        async move {
            while let Some(rx) = guard.pending.as_mut() {
                let handoff = rx.await;
                guard.pending = handoff.ok().and_then(|h| h.0);
            }
            let output = task.await;
            drop(guard);
            output
        }
    }

    /// Number of thread identifiers that currently hold queue state.
    pub fn tracked_threads(&self) -> usize {
        self.tails.lock().len()
    }
}

/// Settles a task on every exit path: completion, panic or drop.
struct SettleGuard<'a> {
    serializer: &'a ThreadSerializer,
    thread: ThreadId,
    ticket: u64,
    done: Option<oneshot::Sender<Handoff>>,
    pending: Option<oneshot::Receiver<Handoff>>,
}

impl Drop for SettleGuard<'_> {
    fn drop(&mut self) {
        // A still-pending predecessor means our successor (present or future)
        // must inherit the wait, so the tail entry has to stay.
        if self.pending.is_none() {
            let mut tails = self.serializer.tails.lock();
            if tails.get(&self.thread).is_some_and(|t| t.ticket == self.ticket) {
                let _ = tails.remove(&self.thread);
            }
        }
        if let Some(tx) = self.done.take() {
            let _ = tx.send(Handoff(self.pending.take()));
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
