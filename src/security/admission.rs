//! Admission gate.
//!
//! Every accepted connection passes through [`AdmissionGate::admit`]:
//! - a banned client is dropped without a response;
//! - a client whose outstanding count would exceed the threshold is banned,
//!   loses all of its pending connections, and the new one is dropped;
//! - otherwise the connection gets an admission ticket and is queued.
//!
//! Lock order is bans, then counters, then the scheduler queue. Purged
//! entries are released only after every lock has been let go, since their
//! tickets take the counters lock on drop.

use std::sync::Arc;

use crate::config::AdmissionConfig;
use crate::net::ClientId;
use crate::observability::metrics;
use crate::scheduler::FairQueue;
use crate::security::bans::{BanEntry, BanList};
use crate::security::counters::{AdmissionTicket, ClientCounters};

/// A connection that made it past the gate.
#[derive(Debug)]
pub struct Admitted<T> {
    pub ticket: AdmissionTicket,
    pub item: T,
}

/// Why a connection was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The client was already banned.
    Banned,
    /// This connection pushed the client over the threshold; `purged` pending
    /// connections were discarded with it.
    Overload { purged: usize },
}

/// Outcome of [`AdmissionGate::admit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted,
    Dropped(DropReason),
}

/// Per-client abuse control in front of the fairness scheduler.
#[derive(Debug)]
pub struct AdmissionGate<T> {
    bans: BanList,
    counters: ClientCounters,
    queue: Arc<FairQueue<Admitted<T>>>,
    threshold: usize,
}

impl<T> AdmissionGate<T> {
    pub fn new(config: &AdmissionConfig, queue: Arc<FairQueue<Admitted<T>>>) -> Self {
        Self {
            bans: BanList::new(config.ban),
            counters: ClientCounters::new(),
            queue,
            threshold: config.max_requests_per_client,
        }
    }

    /// Admit, drop, or ban. `item` is dropped (closed) unless accepted.
    pub fn admit(&self, client: ClientId, item: T) -> Admission {
        let purged = {
            let mut bans = self.bans.lock();
            if bans.is_banned(client) {
                drop(bans);
                drop(item);
                tracing::debug!(client = %client, "Dropped connection from banned client");
                metrics::record_admission("banned");
                return Admission::Dropped(DropReason::Banned);
            }

            let mut counts = self.counters.lock();
            if counts.outstanding(client) + 1 <= self.threshold {
                let ticket = counts.issue(client);
                self.queue.enqueue(client, Admitted { ticket, item });
                metrics::record_admission("accepted");
                return Admission::Accepted;
            }

            bans.ban(client);
            self.queue.purge_client(client)
        };

        let count = purged.len();
        drop(purged);
        drop(item);

        tracing::warn!(
            client = %client,
            threshold = self.threshold,
            purged = count,
            "Client exceeded outstanding request limit, banned"
        );
        metrics::record_admission("overload");
        Admission::Dropped(DropReason::Overload { purged: count })
    }

    pub fn queue(&self) -> &Arc<FairQueue<Admitted<T>>> {
        &self.queue
    }

    pub fn outstanding(&self, client: ClientId) -> usize {
        self.counters.outstanding(client)
    }

    pub fn outstanding_all(&self) -> Vec<(ClientId, usize)> {
        self.counters.snapshot()
    }

    pub fn is_banned(&self, client: ClientId) -> bool {
        self.bans.is_banned(client)
    }

    pub fn bans(&self) -> Vec<BanEntry> {
        self.bans.list()
    }

    /// Lift a ban. Returns whether the client was banned.
    pub fn lift_ban(&self, client: ClientId) -> bool {
        let lifted = self.bans.lift(client);
        if lifted {
            tracing::info!(client = %client, "Ban lifted");
        }
        lifted
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BanPolicy;
    use std::net::IpAddr;

    fn client(last: u8) -> ClientId {
        ClientId::from(IpAddr::from([172, 16, 0, last]))
    }

    fn gate(threshold: usize) -> AdmissionGate<u32> {
        let config = AdmissionConfig {
            max_requests_per_client: threshold,
            ban: BanPolicy::Permanent,
        };
        AdmissionGate::new(&config, Arc::new(FairQueue::new()))
    }

    #[test]
    fn admits_up_to_threshold() {
        let gate = gate(10);
        for i in 0..10 {
            assert_eq!(gate.admit(client(1), i), Admission::Accepted);
        }
        assert_eq!(gate.outstanding(client(1)), 10);
        assert_eq!(gate.queue().len(), 10);
    }

    #[test]
    fn eleventh_request_bans_and_purges() {
        let gate = gate(10);
        for i in 0..10 {
            gate.admit(client(1), i);
        }
        gate.admit(client(2), 100);

        assert_eq!(
            gate.admit(client(1), 10),
            Admission::Dropped(DropReason::Overload { purged: 10 })
        );
        assert!(gate.is_banned(client(1)));
        assert_eq!(gate.outstanding(client(1)), 0);
        assert_eq!(gate.queue().pending_for(client(1)), 0);
        assert_eq!(gate.queue().len(), 1);
        assert!(!gate.is_banned(client(2)));
    }

    #[test]
    fn banned_client_stays_banned() {
        let gate = gate(1);
        gate.admit(client(1), 1);
        gate.admit(client(1), 2);
        assert!(gate.is_banned(client(1)));

        let _ = gate.queue().drain();
        for i in 0..5 {
            assert_eq!(gate.admit(client(1), i), Admission::Dropped(DropReason::Banned));
        }
        assert_eq!(gate.outstanding(client(1)), 0);
    }

    #[test]
    fn completed_requests_free_budget() {
        let gate = gate(2);
        gate.admit(client(1), 1);
        gate.admit(client(1), 2);

        let done = gate.queue().try_dequeue().unwrap();
        drop(done);
        assert_eq!(gate.outstanding(client(1)), 1);
        assert_eq!(gate.admit(client(1), 3), Admission::Accepted);
    }

    #[test]
    fn active_requests_count_towards_threshold() {
        let gate = gate(2);
        gate.admit(client(1), 1);
        gate.admit(client(1), 2);
        let _active = gate.queue().try_dequeue().unwrap();

        assert!(matches!(
            gate.admit(client(1), 3),
            Admission::Dropped(DropReason::Overload { purged: 1 })
        ));
        assert_eq!(gate.outstanding(client(1)), 1);
    }

    #[test]
    fn lifted_ban_admits_again() {
        let gate = gate(1);
        gate.admit(client(1), 1);
        gate.admit(client(1), 2);
        assert!(gate.lift_ban(client(1)));
        assert_eq!(gate.admit(client(1), 3), Admission::Accepted);
    }
}
