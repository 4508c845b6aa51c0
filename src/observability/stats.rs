//! In-process service statistics, reported by the admin API.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

/// Running totals over every dispatched request.
#[derive(Debug, Default)]
pub struct ServiceStats {
    served: AtomicU64,
    service_micros: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time view of [`ServiceStats`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub connections_served: u64,
    pub failed_requests: u64,
    pub total_service_time_ms: f64,
    /// Connections per second of accumulated service time.
    pub service_rate: f64,
}

impl ServiceStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, status: u16, service_time: Duration) {
        self.served.fetch_add(1, Ordering::Relaxed);
        self.service_micros
            .fetch_add(service_time.as_micros() as u64, Ordering::Relaxed);
        if status >= 500 {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let served = self.served.load(Ordering::Relaxed);
        let micros = self.service_micros.load(Ordering::Relaxed);
        let seconds = micros as f64 / 1_000_000.0;
        StatsSnapshot {
            connections_served: served,
            failed_requests: self.failed.load(Ordering::Relaxed),
            total_service_time_ms: micros as f64 / 1_000.0,
            service_rate: if seconds > 0.0 { served as f64 / seconds } else { 0.0 },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_stats_have_zero_rate() {
        let snapshot = ServiceStats::new().snapshot();
        assert_eq!(snapshot.connections_served, 0);
        assert_eq!(snapshot.service_rate, 0.0);
    }

    #[test]
    fn rate_is_connections_per_service_second() {
        let stats = ServiceStats::new();
        stats.record(200, Duration::from_millis(250));
        stats.record(500, Duration::from_millis(250));

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.connections_served, 2);
        assert_eq!(snapshot.failed_requests, 1);
        assert!((snapshot.service_rate - 4.0).abs() < 1e-9);
    }
}
