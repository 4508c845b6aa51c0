//! Per-client outstanding request counts.
//!
//! A client's count covers its pending and active requests. It only changes
//! through [`AdmissionTicket`]: issuing one increments, dropping it
//! decrements, so teardown can never be skipped or doubled.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::net::ClientId;

type CountMap = HashMap<ClientId, usize>;

/// Shared outstanding-request counts.
#[derive(Debug, Clone, Default)]
pub struct ClientCounters {
    inner: Arc<Mutex<CountMap>>,
}

impl ClientCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the counts for a check-then-increment sequence.
    pub(crate) fn lock(&self) -> CounterTable<'_> {
        CounterTable {
            counts: self.inner.lock(),
            shared: &self.inner,
        }
    }

    /// Outstanding requests for a client. Unknown clients have zero.
    pub fn outstanding(&self, client: ClientId) -> usize {
        self.inner.lock().get(&client).copied().unwrap_or(0)
    }

    /// Issue a ticket without a threshold check.
    pub fn issue(&self, client: ClientId) -> AdmissionTicket {
        self.lock().issue(client)
    }

    /// Clients with non-zero counts.
    pub fn snapshot(&self) -> Vec<(ClientId, usize)> {
        let mut all: Vec<_> = self.inner.lock().iter().map(|(c, n)| (*c, *n)).collect();
        all.sort();
        all
    }
}

pub(crate) struct CounterTable<'a> {
    counts: MutexGuard<'a, CountMap>,
    shared: &'a Arc<Mutex<CountMap>>,
}

impl CounterTable<'_> {
    pub(crate) fn outstanding(&self, client: ClientId) -> usize {
        self.counts.get(&client).copied().unwrap_or(0)
    }

    pub(crate) fn issue(&mut self, client: ClientId) -> AdmissionTicket {
        *self.counts.entry(client).or_insert(0) += 1;
        AdmissionTicket {
            client,
            counts: Arc::clone(self.shared),
        }
    }
}

/// One unit of a client's outstanding count. Must not be dropped while the
/// counters lock is held by the same thread.
#[derive(Debug)]
pub struct AdmissionTicket {
    client: ClientId,
    counts: Arc<Mutex<CountMap>>,
}

impl AdmissionTicket {
    pub fn client(&self) -> ClientId {
        self.client
    }
}

impl Drop for AdmissionTicket {
    fn drop(&mut self) {
        let mut counts = self.counts.lock();
        if let Some(count) = counts.get_mut(&self.client) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                counts.remove(&self.client);
            }
        }
    }
}
