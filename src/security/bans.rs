//! Ban list.
//!
//! A ban is either permanent or expires after the configured duration.
//! Expired records are removed lazily, on the next lookup for that client.

use std::collections::HashMap;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;

use crate::config::BanPolicy;
use crate::net::ClientId;

#[derive(Debug, Clone, Copy)]
struct BanRecord {
    banned_at: SystemTime,
    expires_at: Option<Instant>,
}

impl BanRecord {
    fn is_active(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// A ban as reported to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BanEntry {
    pub client: ClientId,
    /// Seconds since the Unix epoch.
    pub banned_at: u64,
    /// `None` for permanent bans.
    pub remaining_secs: Option<u64>,
}

/// The set of banned clients.
#[derive(Debug)]
pub struct BanList {
    records: Mutex<HashMap<ClientId, BanRecord>>,
    policy: BanPolicy,
}

impl BanList {
    pub fn new(policy: BanPolicy) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            policy,
        }
    }

    /// Lock the list for a check-then-ban sequence.
    pub(crate) fn lock(&self) -> BanTable<'_> {
        BanTable {
            records: self.records.lock(),
            policy: self.policy,
        }
    }

    pub fn is_banned(&self, client: ClientId) -> bool {
        self.lock().is_banned(client)
    }

    pub fn ban(&self, client: ClientId) {
        self.lock().ban(client);
    }

    /// Lift a ban. Returns whether the client was banned.
    pub fn lift(&self, client: ClientId) -> bool {
        let now = Instant::now();
        self.records
            .lock()
            .remove(&client)
            .is_some_and(|record| record.is_active(now))
    }

    /// All currently active bans, ordered by client.
    pub fn list(&self) -> Vec<BanEntry> {
        let now = Instant::now();
        let mut records = self.records.lock();
        records.retain(|_, record| record.is_active(now));

        let mut entries: Vec<BanEntry> = records
            .iter()
            .map(|(client, record)| BanEntry {
                client: *client,
                banned_at: record
                    .banned_at
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_secs())
                    .unwrap_or_default(),
                remaining_secs: record
                    .expires_at
                    .map(|at| at.saturating_duration_since(now).as_secs()),
            })
            .collect();
        entries.sort_by_key(|entry| entry.client);
        entries
    }

    pub fn len(&self) -> usize {
        self.list().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive access to the ban records.
pub(crate) struct BanTable<'a> {
    records: MutexGuard<'a, HashMap<ClientId, BanRecord>>,
    policy: BanPolicy,
}

impl BanTable<'_> {
    pub(crate) fn is_banned(&mut self, client: ClientId) -> bool {
        let now = Instant::now();
        match self.records.get(&client) {
            Some(record) if record.is_active(now) => true,
            Some(_) => {
                self.records.remove(&client);
                tracing::info!(client = %client, "Ban expired");
                false
            }
            None => false,
        }
    }

    pub(crate) fn ban(&mut self, client: ClientId) {
        let record = BanRecord {
            banned_at: SystemTime::now(),
            expires_at: self.policy.duration().map(|d: Duration| Instant::now() + d),
        };
        self.records.insert(client, record);
    }
}
