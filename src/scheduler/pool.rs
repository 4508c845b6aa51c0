//! Worker pool.
//!
//! A semaphore bounds how many requests are processed at once. A slot is
//! held for the whole of a request and combined with the client's admission
//! ticket into an [`ActiveRequestLease`].

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

use crate::net::{ClientId, CorrelationId};
use crate::observability::metrics;
use crate::security::AdmissionTicket;

/// Bounded pool of processing slots.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    slots: Arc<Semaphore>,
    active: Arc<AtomicUsize>,
    capacity: usize,
}

impl WorkerPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(capacity)),
            active: Arc::new(AtomicUsize::new(0)),
            capacity,
        }
    }

    /// Wait for a free slot. Fails only once the pool has been closed.
    pub async fn acquire(&self) -> Result<WorkerSlot, AcquireError> {
        let permit = Arc::clone(&self.slots).acquire_owned().await?;
        Ok(self.slot(permit))
    }

    pub fn try_acquire(&self) -> Option<WorkerSlot> {
        let permit = Arc::clone(&self.slots).try_acquire_owned().ok()?;
        Some(self.slot(permit))
    }

    fn slot(&self, permit: OwnedSemaphorePermit) -> WorkerSlot {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::record_active_leases(active);
        WorkerSlot {
            _permit: permit,
            active: Arc::clone(&self.active),
        }
    }

    /// Stop handing out slots; pending and future `acquire` calls fail.
    pub fn close(&self) {
        self.slots.close();
    }

    /// Slots currently in use.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// A held processing slot. Released on drop.
#[derive(Debug)]
pub struct WorkerSlot {
    _permit: OwnedSemaphorePermit,
    active: Arc<AtomicUsize>,
}

impl WorkerSlot {
    /// Bind this slot to an admitted request.
    pub fn lease(self, ticket: AdmissionTicket, correlation_id: CorrelationId) -> ActiveRequestLease {
        ActiveRequestLease {
            client: ticket.client(),
            correlation_id,
            _ticket: ticket,
            _slot: self,
        }
    }
}

impl Drop for WorkerSlot {
    fn drop(&mut self) {
        let active = self.active.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::record_active_leases(active);
    }
}

/// One in-flight request. Dropping it frees the worker slot and decrements
/// the client's outstanding count, whatever the outcome of the request.
#[derive(Debug)]
pub struct ActiveRequestLease {
    client: ClientId,
    correlation_id: CorrelationId,
    _ticket: AdmissionTicket,
    _slot: WorkerSlot,
}

impl ActiveRequestLease {
    pub fn client(&self) -> ClientId {
        self.client
    }

    pub fn correlation_id(&self) -> CorrelationId {
        self.correlation_id
    }
}

impl Drop for ActiveRequestLease {
    fn drop(&mut self) {
        tracing::trace!(
            client = %self.client,
            correlation_id = %self.correlation_id,
            "Lease released"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::ClientCounters;
    use std::net::IpAddr;
    use std::time::Duration;

    #[tokio::test]
    async fn never_exceeds_capacity() {
        let pool = WorkerPool::new(2);
        let first = pool.acquire().await.unwrap();
        let _second = pool.acquire().await.unwrap();
        assert_eq!(pool.active(), 2);
        assert!(pool.try_acquire().is_none());

        let waiting = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.acquire().await.map(|_| ()) })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiting.is_finished());

        drop(first);
        tokio::time::timeout(Duration::from_secs(1), waiting)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(pool.active() <= pool.capacity());
    }

    #[tokio::test]
    async fn lease_drop_releases_slot_and_count() {
        let client = ClientId::from(IpAddr::from([127, 0, 0, 2]));
        let pool = WorkerPool::new(1);
        let counters = ClientCounters::new();

        let lease = pool
            .acquire()
            .await
            .unwrap()
            .lease(counters.issue(client), CorrelationId::new());
        assert_eq!(pool.active(), 1);
        assert_eq!(counters.outstanding(client), 1);

        drop(lease);
        assert_eq!(pool.active(), 0);
        assert_eq!(counters.outstanding(client), 0);
    }

    #[tokio::test]
    async fn lease_released_when_task_panics() {
        let client = ClientId::from(IpAddr::from([127, 0, 0, 3]));
        let pool = WorkerPool::new(1);
        let counters = ClientCounters::new();
        let lease = pool
            .acquire()
            .await
            .unwrap()
            .lease(counters.issue(client), CorrelationId::new());

        let result = tokio::spawn(async move {
            let _lease = lease;
            panic!("handler blew up");
        })
        .await;

        assert!(result.is_err());
        assert_eq!(pool.active(), 0);
        assert_eq!(counters.outstanding(client), 0);
    }

    #[tokio::test]
    async fn closed_pool_refuses_slots() {
        let pool = WorkerPool::new(1);
        pool.close();
        assert!(pool.acquire().await.is_err());
    }
}
