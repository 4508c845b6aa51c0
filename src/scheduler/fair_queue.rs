//! Round-robin queue across clients.
//!
//! Entries are kept in arrival order. A dequeue takes the oldest entry whose
//! client has not been served in the current round; once every client with
//! pending work has been served, the round resets and the oldest entry wins.
//! A round also ends when the queue runs empty. Per-client order is FIFO.

use std::collections::{HashSet, VecDeque};

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::net::ClientId;
use crate::observability::metrics;

#[derive(Debug)]
struct Pending<T> {
    client: ClientId,
    seq: u64,
    item: T,
}

#[derive(Debug)]
struct QueueState<T> {
    pending: VecDeque<Pending<T>>,
    served: HashSet<ClientId>,
    next_seq: u64,
}

impl<T> QueueState<T> {
    fn take_next(&mut self) -> Option<Pending<T>> {
        if self.pending.is_empty() {
            return None;
        }

        let next = match self
            .pending
            .iter()
            .position(|p| !self.served.contains(&p.client))
        {
            Some(index) => self.pending.remove(index),
            None => {
                self.served.clear();
                self.pending.pop_front()
            }
        }?;

        if self.pending.is_empty() {
            self.served.clear();
        } else {
            self.served.insert(next.client);
        }
        Some(next)
    }
}

/// An entry handed out by the queue.
#[derive(Debug)]
pub struct Scheduled<T> {
    pub client: ClientId,
    /// Arrival sequence number.
    pub seq: u64,
    pub item: T,
}

/// Fairness scheduler.
#[derive(Debug)]
pub struct FairQueue<T> {
    state: Mutex<QueueState<T>>,
    available: Notify,
}

impl<T> Default for FairQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FairQueue<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                pending: VecDeque::new(),
                served: HashSet::new(),
                next_seq: 0,
            }),
            available: Notify::new(),
        }
    }

    /// Append an entry for `client`. Returns its sequence number.
    pub fn enqueue(&self, client: ClientId, item: T) -> u64 {
        let (seq, len) = {
            let mut state = self.state.lock();
            let seq = state.next_seq;
            state.next_seq += 1;
            state.pending.push_back(Pending { client, seq, item });
            (seq, state.pending.len())
        };
        metrics::record_pending(len);
        self.available.notify_one();
        seq
    }

    /// Take the next entry in fairness order, if any.
    pub fn try_dequeue(&self) -> Option<Scheduled<T>> {
        let (next, len) = {
            let mut state = self.state.lock();
            let next = state.take_next();
            (next, state.pending.len())
        };
        let next = next?;
        metrics::record_pending(len);
        Some(Scheduled {
            client: next.client,
            seq: next.seq,
            item: next.item,
        })
    }

    /// Wait for the next entry in fairness order.
    pub async fn dequeue(&self) -> Scheduled<T> {
        loop {
            if let Some(next) = self.try_dequeue() {
                return next;
            }
            self.available.notified().await;
        }
    }

    /// Remove every pending entry of `client`, oldest first.
    pub fn purge_client(&self, client: ClientId) -> Vec<T> {
        let (purged, len) = {
            let mut state = self.state.lock();
            let mut purged = Vec::new();
            let mut kept = VecDeque::with_capacity(state.pending.len());
            for pending in state.pending.drain(..) {
                if pending.client == client {
                    purged.push(pending.item);
                } else {
                    kept.push_back(pending);
                }
            }
            state.pending = kept;
            state.served.remove(&client);
            (purged, state.pending.len())
        };
        metrics::record_pending(len);
        purged
    }

    /// Remove everything.
    pub fn drain(&self) -> Vec<T> {
        let drained: Vec<T> = {
            let mut state = self.state.lock();
            state.served.clear();
            state.pending.drain(..).map(|p| p.item).collect()
        };
        metrics::record_pending(0);
        drained
    }

    pub fn len(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pending_for(&self, client: ClientId) -> usize {
        self.state
            .lock()
            .pending
            .iter()
            .filter(|p| p.client == client)
            .count()
    }
}
