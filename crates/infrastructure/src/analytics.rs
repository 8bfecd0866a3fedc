use sentinel_dns_application::ports::AnalyticsSinkPort;
use sentinel_dns_domain::outcome::QueryRecord;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::Notify;
use tracing::warn;

/// Bounded analytics queue (§5): `submit` never awaits and never blocks the
/// pipeline. On overflow the oldest queued record is dropped and a counter
/// incremented, rather than rejecting the newest one — the sink favors
/// recency. Shipping records onward to the actual analytics store is the
/// external collaborator's job; this type only owns the backpressure
/// contract and hands records to whatever drains it via `recv`.
pub struct BoundedAnalyticsSink {
    queue: Mutex<VecDeque<QueryRecord>>,
    capacity: usize,
    dropped: AtomicU64,
    notify: Notify,
}

impl BoundedAnalyticsSink {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            dropped: AtomicU64::new(0),
            notify: Notify::new(),
        }
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Waits for and returns the next record, for a consumer task forwarding
    /// to the real analytics store.
    pub async fn recv(&self) -> QueryRecord {
        loop {
            if let Some(record) = self.queue.lock().unwrap().pop_front() {
                return record;
            }
            self.notify.notified().await;
        }
    }
}

impl AnalyticsSinkPort for BoundedAnalyticsSink {
    fn submit(&self, record: QueryRecord) -> bool {
        let mut queue = self.queue.lock().unwrap();
        let dropped_oldest = if queue.len() >= self.capacity {
            queue.pop_front();
            true
        } else {
            false
        };
        queue.push_back(record);
        drop(queue);

        if dropped_oldest {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            warn!(dropped_total = self.dropped_count(), "analytics queue overflow, dropped oldest record");
        }
        self.notify.notify_one();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_dns_domain::outcome::DurationBreakdown;
    use sentinel_dns_domain::Outcome;

    fn sample(name: &str) -> QueryRecord {
        QueryRecord {
            name: name.to_string(),
            qtype: "A".to_string(),
            outcome: Outcome::Cached,
            stale_served: false,
            upstream_addr: None,
            duration: DurationBreakdown::default(),
            timestamp: 0,
        }
    }

    #[test]
    fn submit_never_blocks_and_returns_true() {
        let sink = BoundedAnalyticsSink::new(2);
        assert!(sink.submit(sample("a.com")));
        assert!(sink.submit(sample("b.com")));
    }

    #[test]
    fn overflow_drops_oldest_and_counts_it() {
        let sink = BoundedAnalyticsSink::new(2);
        sink.submit(sample("a.com"));
        sink.submit(sample("b.com"));
        sink.submit(sample("c.com"));
        assert_eq!(sink.dropped_count(), 1);
    }

    #[tokio::test]
    async fn recv_yields_records_in_fifo_order() {
        let sink = BoundedAnalyticsSink::new(4);
        sink.submit(sample("a.com"));
        sink.submit(sample("b.com"));
        assert_eq!(sink.recv().await.name, "a.com");
        assert_eq!(sink.recv().await.name, "b.com");
    }
}
