//! Query metrics
//!
//! Counters only, monotonic, reset only when the registry is recreated.
//! Relaxed atomics: exact totals matter, cross-counter ordering does not.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters describing planner and executor activity
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    queries_planned: AtomicU64,
    queries_executed: AtomicU64,
    queries_rejected: AtomicU64,
    rows_returned: AtomicU64,
    full_scans: AtomicU64,
    index_fetches: AtomicU64,
    parallel_plans: AtomicU64,
    sorts_performed: AtomicU64,
    order_by_eliminations: AtomicU64,
    timeouts: AtomicU64,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_queries_planned(&self) {
        self.queries_planned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_queries_executed(&self) {
        self.queries_executed.fetch_add(1, Ordering::Relaxed);
    }

    /// A statement failed to plan
    pub fn increment_queries_rejected(&self) {
        self.queries_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_rows_returned(&self, rows: u64) {
        self.rows_returned.fetch_add(rows, Ordering::Relaxed);
    }

    pub fn increment_full_scans(&self) {
        self.full_scans.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_index_fetches(&self) {
        self.index_fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_parallel_plans(&self) {
        self.parallel_plans.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_sorts(&self) {
        self.sorts_performed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_order_by_eliminations(&self) {
        self.order_by_eliminations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_timeouts(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queries_planned: self.queries_planned.load(Ordering::Relaxed),
            queries_executed: self.queries_executed.load(Ordering::Relaxed),
            queries_rejected: self.queries_rejected.load(Ordering::Relaxed),
            rows_returned: self.rows_returned.load(Ordering::Relaxed),
            full_scans: self.full_scans.load(Ordering::Relaxed),
            index_fetches: self.index_fetches.load(Ordering::Relaxed),
            parallel_plans: self.parallel_plans.load(Ordering::Relaxed),
            sorts_performed: self.sorts_performed.load(Ordering::Relaxed),
            order_by_eliminations: self.order_by_eliminations.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
        }
    }

    /// Current values as a JSON object
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_else(|_| String::from("{}"))
    }
}

/// A point-in-time copy of all counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub queries_planned: u64,
    pub queries_executed: u64,
    pub queries_rejected: u64,
    pub rows_returned: u64,
    pub full_scans: u64,
    pub index_fetches: u64,
    pub parallel_plans: u64,
    pub sorts_performed: u64,
    pub order_by_eliminations: u64,
    pub timeouts: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_registry_is_zero() {
        let snapshot = MetricsRegistry::new().snapshot();
        assert_eq!(snapshot.queries_planned, 0);
        assert_eq!(snapshot.rows_returned, 0);
        assert_eq!(snapshot.timeouts, 0);
    }

    #[test]
    fn test_counters() {
        let registry = MetricsRegistry::new();
        registry.increment_queries_planned();
        registry.increment_queries_executed();
        registry.add_rows_returned(7);
        registry.add_rows_returned(3);
        registry.increment_full_scans();
        registry.increment_index_fetches();
        registry.increment_index_fetches();
        registry.increment_order_by_eliminations();

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.queries_planned, 1);
        assert_eq!(snapshot.rows_returned, 10);
        assert_eq!(snapshot.index_fetches, 2);
        assert_eq!(snapshot.order_by_eliminations, 1);
    }

    #[test]
    fn test_to_json() {
        let registry = MetricsRegistry::new();
        registry.increment_sorts();
        let parsed: serde_json::Value = serde_json::from_str(&registry.to_json()).unwrap();
        assert_eq!(parsed["sorts_performed"], 1);
        assert_eq!(parsed["parallel_plans"], 0);
    }

    #[test]
    fn test_thread_safety() {
        use std::sync::Arc;
        use std::thread;

        let registry = Arc::new(MetricsRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let reg = Arc::clone(&registry);
                thread::spawn(move || {
                    for _ in 0..100 {
                        reg.increment_queries_executed();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.snapshot().queries_executed, 800);
    }
}
