use sentinel_dns_domain::Fingerprint;

use crate::ports::{HitCounterPort, L0CachePort};

#[derive(Debug, Clone, Copy)]
pub struct SweepConfig {
    pub window_s: i64,
    pub min_hits: u64,
    pub max_inflight: usize,
}

/// Pure candidate-selection logic for the refresh scheduler (C9, sweep step
/// 1-2). Enumerates L0 directly rather than scanning the shared store (see
/// DESIGN.md's resolution of the sweeper-candidate-source open question),
/// then filters by hit count, then bounds the result at `max_inflight` —
/// excess candidates are dropped for this sweep, never queued across sweeps.
pub async fn select_candidates(
    l0: &dyn L0CachePort,
    hit_counter: &dyn HitCounterPort,
    now: u64,
    cfg: &SweepConfig,
) -> (Vec<Fingerprint>, usize) {
    let expiring = l0.expiring_within(now, cfg.window_s);
    let mut hot_enough = Vec::new();
    for fp in expiring {
        if hit_counter.peek_sweep_window(&fp).await >= cfg.min_hits {
            hot_enough.push(fp);
        }
    }
    let dropped = hot_enough.len().saturating_sub(cfg.max_inflight);
    hot_enough.truncate(cfg.max_inflight);
    (hot_enough, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::L0Stats;
    use sentinel_dns_domain::fingerprint::QClass;
    use sentinel_dns_domain::{CacheEntry, CacheStatus, RecordType};
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct StubL0(Vec<Fingerprint>);
    impl L0CachePort for StubL0 {
        fn get(&self, _fp: &Fingerprint) -> (Option<CacheEntry>, CacheStatus) {
            (None, CacheStatus::Miss)
        }
        fn put(&self, _fp: &Fingerprint, _entry: CacheEntry) {}
        fn stats(&self) -> L0Stats {
            L0Stats::default()
        }
        fn expiring_within(&self, _now: u64, _window_s: i64) -> Vec<Fingerprint> {
            self.0.clone()
        }
        fn flush(&self, _fp: Option<&Fingerprint>) {}
    }

    struct StubHits(Mutex<HashMap<Fingerprint, u64>>);
    #[async_trait::async_trait]
    impl HitCounterPort for StubHits {
        async fn record_hit(&self, fp: &Fingerprint) -> u64 {
            self.peek(fp).await
        }
        async fn peek(&self, fp: &Fingerprint) -> u64 {
            *self.0.lock().unwrap().get(fp).unwrap_or(&0)
        }
        async fn peek_sweep_window(&self, fp: &Fingerprint) -> u64 {
            self.peek(fp).await
        }
        fn is_hot(&self, count: u64) -> bool {
            count >= 20
        }
    }

    #[tokio::test]
    async fn filters_by_min_hits_and_bounds_inflight() {
        let popular = Fingerprint::new("popular.com", RecordType::A, QClass::In);
        let quiet = Fingerprint::new("quiet.com", RecordType::A, QClass::In);
        let l0 = StubL0(vec![popular.clone(), quiet.clone()]);
        let mut counts = HashMap::new();
        counts.insert(popular.clone(), 50);
        counts.insert(quiet.clone(), 0);
        let hits = StubHits(Mutex::new(counts));

        let cfg = SweepConfig {
            window_s: 120,
            min_hits: 1,
            max_inflight: 50,
        };
        let (candidates, dropped) = select_candidates(&l0, &hits, 0, &cfg).await;
        assert_eq!(candidates, vec![popular]);
        assert_eq!(dropped, 0);
    }

    #[tokio::test]
    async fn bounds_candidates_at_max_inflight() {
        let fps: Vec<_> = (0..5)
            .map(|i| Fingerprint::new(&format!("host{i}.com"), RecordType::A, QClass::In))
            .collect();
        let l0 = StubL0(fps.clone());
        let mut counts = HashMap::new();
        for fp in &fps {
            counts.insert(fp.clone(), 100);
        }
        let hits = StubHits(Mutex::new(counts));
        let cfg = SweepConfig {
            window_s: 120,
            min_hits: 1,
            max_inflight: 2,
        };
        let (candidates, dropped) = select_candidates(&l0, &hits, 0, &cfg).await;
        assert_eq!(candidates.len(), 2);
        assert_eq!(dropped, 3);
    }
}
