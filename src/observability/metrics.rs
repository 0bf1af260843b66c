//! Accessor counters
//!
//! Counters only, monotonic, reset on process start. Relaxed atomics;
//! exact totals are only guaranteed once concurrent callers have finished.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Per-accessor operational counters
#[derive(Debug, Default)]
pub struct AccessorMetrics {
    statements_executed: AtomicU64,
    statements_failed: AtomicU64,
    writes_rejected: AtomicU64,
    connections_opened: AtomicU64,
}

impl AccessorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_executed(&self) {
        self.statements_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.statements_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// A write statement was refused on a replica
    pub fn record_write_rejected(&self) {
        self.writes_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connection_opened(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn statements_executed(&self) -> u64 {
        self.statements_executed.load(Ordering::Relaxed)
    }

    pub fn statements_failed(&self) -> u64 {
        self.statements_failed.load(Ordering::Relaxed)
    }

    pub fn writes_rejected(&self) -> u64 {
        self.writes_rejected.load(Ordering::Relaxed)
    }

    pub fn connections_opened(&self) -> u64 {
        self.connections_opened.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            statements_executed: self.statements_executed(),
            statements_failed: self.statements_failed(),
            writes_rejected: self.writes_rejected(),
            connections_opened: self.connections_opened(),
        }
    }
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MetricsSnapshot {
    pub statements_executed: u64,
    pub statements_failed: u64,
    pub writes_rejected: u64,
    pub connections_opened: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_starts_at_zero() {
        assert_eq!(AccessorMetrics::new().snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_counters_are_independent() {
        let metrics = AccessorMetrics::new();
        metrics.record_executed();
        metrics.record_executed();
        metrics.record_write_rejected();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.statements_executed, 2);
        assert_eq!(snapshot.writes_rejected, 1);
        assert_eq!(snapshot.statements_failed, 0);
        assert_eq!(snapshot.connections_opened, 0);
    }

    #[test]
    fn test_concurrent_increments() {
        let metrics = Arc::new(AccessorMetrics::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let metrics = Arc::clone(&metrics);
                thread::spawn(move || {
                    for _ in 0..100 {
                        metrics.record_executed();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(metrics.statements_executed(), 800);
    }

    #[test]
    fn test_snapshot_serializes() {
        let json = serde_json::to_value(AccessorMetrics::new().snapshot()).unwrap();
        assert_eq!(json["connections_opened"], 0);
    }
}
