use sentinel_dns_application::ports::{HitCounterPort, L0CachePort};
use sentinel_dns_application::{select_candidates, QueryPipeline, SweepConfig};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Refresh scheduler (C9): periodically selects hot, soon-to-expire entries
/// and refreshes them ahead of expiry so a client request never has to pay
/// for the upstream round trip.
pub struct RefreshSweepJob {
    pipeline: Arc<QueryPipeline>,
    l0: Arc<dyn L0CachePort>,
    hit_counter: Arc<dyn HitCounterPort>,
    cfg: SweepConfig,
    interval: Duration,
    lock_ttl: Duration,
    shutdown: CancellationToken,
}

impl RefreshSweepJob {
    pub fn new(
        pipeline: Arc<QueryPipeline>,
        l0: Arc<dyn L0CachePort>,
        hit_counter: Arc<dyn HitCounterPort>,
        cfg: SweepConfig,
        interval: Duration,
        lock_ttl: Duration,
    ) -> Self {
        Self {
            pipeline,
            l0,
            hit_counter,
            cfg,
            interval,
            lock_ttl,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn start(self: Arc<Self>) {
        info!(
            interval_s = self.interval.as_secs(),
            window_s = self.cfg.window_s,
            min_hits = self.cfg.min_hits,
            max_inflight = self.cfg.max_inflight,
            "starting refresh sweep job"
        );

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            loop {
                tokio::select! {
                    _ = self.shutdown.cancelled() => {
                        info!("refresh sweep job shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        self.run_once().await;
                    }
                }
            }
        });
    }

    async fn run_once(&self) {
        let (candidates, dropped) =
            select_candidates(self.l0.as_ref(), self.hit_counter.as_ref(), now_unix(), &self.cfg).await;

        if dropped > 0 {
            warn!(dropped, "sweep candidates exceeded max_inflight, excess dropped for this round");
        }
        if candidates.is_empty() {
            debug!("sweep found no refresh candidates");
            return;
        }

        let deadline = Instant::now() + self.lock_ttl;
        let refreshes = candidates.into_iter().map(|fp| {
            let pipeline = self.pipeline.clone();
            async move { pipeline.refresh_candidate(&fp, deadline).await }
        });
        futures::future::join_all(refreshes).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sentinel_dns_application::ports::{
        AnalyticsSinkPort, BlockDecision, BlocklistPort, CodecPort, DecodedRequest, L1CachePort,
        LocalRecordsPort, RefreshLockPort, SynthAnswer, UpstreamPort, UpstreamResolution,
    };
    use sentinel_dns_application::{PipelineConfig, QueryPipeline};
    use sentinel_dns_domain::cache_entry::TtlPolicy;
    use sentinel_dns_domain::config::response::BlockedResponse;
    use sentinel_dns_domain::fingerprint::QClass;
    use sentinel_dns_domain::{CacheEntry, CacheStatus, DomainError, Fingerprint, RecordType};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeCodec;
    impl CodecPort for FakeCodec {
        fn decode(&self, _bytes: &[u8], _is_tcp: bool) -> Result<DecodedRequest, DomainError> {
            unreachable!("sweep test never decodes a wire request")
        }
        fn encode_from_cache(&self, _req: &DecodedRequest, entry: &CacheEntry) -> Vec<u8> {
            entry.wire.to_vec()
        }
        fn encode_synthetic(&self, _req: &DecodedRequest, _answer: SynthAnswer, _ttl: u32) -> Vec<u8> {
            Vec::new()
        }
        fn encode_raw_formerr(&self, _raw: &[u8]) -> Vec<u8> {
            Vec::new()
        }
    }

    struct EmptyLocalRecords;
    impl LocalRecordsPort for EmptyLocalRecords {
        fn lookup(&self, _fp: &Fingerprint) -> Option<CacheEntry> {
            None
        }
    }

    struct AllowAll;
    impl BlocklistPort for AllowAll {
        fn check(&self, _fp: &Fingerprint) -> BlockDecision {
            BlockDecision::Allow
        }
        fn pause(&self, _duration: Duration) {}
        fn resume(&self) {}
        fn is_paused(&self) -> bool {
            false
        }
        fn compiled_domain_count(&self) -> usize {
            0
        }
    }

    #[derive(Default)]
    struct FakeL0 {
        map: Mutex<HashMap<Fingerprint, CacheEntry>>,
        expiring: Mutex<Vec<Fingerprint>>,
    }
    impl L0CachePort for FakeL0 {
        fn get(&self, fp: &Fingerprint) -> (Option<CacheEntry>, CacheStatus) {
            (self.map.lock().unwrap().get(fp).cloned(), CacheStatus::Miss)
        }
        fn put(&self, fp: &Fingerprint, entry: CacheEntry) {
            self.map.lock().unwrap().insert(fp.clone(), entry);
        }
        fn stats(&self) -> sentinel_dns_application::ports::L0Stats {
            Default::default()
        }
        fn expiring_within(&self, _now: u64, _window_s: i64) -> Vec<Fingerprint> {
            self.expiring.lock().unwrap().clone()
        }
        fn flush(&self, _fp: Option<&Fingerprint>) {}
    }

    #[derive(Default)]
    struct FakeL1 {
        map: Mutex<HashMap<Fingerprint, CacheEntry>>,
    }
    #[async_trait]
    impl L1CachePort for FakeL1 {
        async fn get(&self, fp: &Fingerprint) -> Option<CacheEntry> {
            self.map.lock().unwrap().get(fp).cloned()
        }
        async fn set(&self, fp: &Fingerprint, entry: &CacheEntry) {
            self.map.lock().unwrap().insert(fp.clone(), entry.clone());
        }
    }

    struct FakeHitCounter {
        counts: HashMap<Fingerprint, u64>,
    }
    #[async_trait]
    impl HitCounterPort for FakeHitCounter {
        async fn record_hit(&self, _fp: &Fingerprint) -> u64 {
            0
        }
        async fn peek(&self, fp: &Fingerprint) -> u64 {
            self.counts.get(fp).copied().unwrap_or(0)
        }
        async fn peek_sweep_window(&self, fp: &Fingerprint) -> u64 {
            self.counts.get(fp).copied().unwrap_or(0)
        }
        fn is_hot(&self, count: u64) -> bool {
            count >= 20
        }
    }

    struct NoopLock;
    #[async_trait]
    impl RefreshLockPort for NoopLock {
        async fn try_acquire(&self, _fp: &Fingerprint, _instance_id: &str) -> bool {
            true
        }
        async fn release(&self, _fp: &Fingerprint, _instance_id: &str) -> bool {
            true
        }
        fn lock_ttl(&self) -> Duration {
            Duration::from_secs(10)
        }
    }

    struct CountingUpstream {
        calls: AtomicUsize,
    }
    #[async_trait]
    impl UpstreamPort for CountingUpstream {
        async fn resolve(
            &self,
            _fp: &Fingerprint,
            _deadline: Instant,
        ) -> Result<UpstreamResolution, DomainError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(UpstreamResolution {
                wire: vec![1, 2, 3, 4],
                rcode: 0,
                upstream_addr: "1.1.1.1:53".into(),
                min_answer_ttl: 300,
                is_negative: false,
                soa_ttl: 0,
            })
        }
    }

    struct NoopAnalytics;
    impl AnalyticsSinkPort for NoopAnalytics {
        fn submit(&self, _record: sentinel_dns_domain::outcome::QueryRecord) -> bool {
            true
        }
    }

    fn fp(name: &str) -> Fingerprint {
        Fingerprint::new(name, RecordType::A, QClass::In)
    }

    #[tokio::test]
    async fn run_once_refreshes_hot_expiring_candidates_and_skips_cold_ones() {
        let l0 = Arc::new(FakeL0::default());
        *l0.expiring.lock().unwrap() = vec![fp("hot.example.com"), fp("cold.example.com")];

        let mut counts = HashMap::new();
        counts.insert(fp("hot.example.com"), 50);
        counts.insert(fp("cold.example.com"), 0);
        let hit_counter = Arc::new(FakeHitCounter { counts });

        let calls = Arc::new(AtomicUsize::new(0));
        let upstream = Arc::new(CountingUpstream { calls: AtomicUsize::new(0) });

        let pipeline = Arc::new(QueryPipeline::new(
            Arc::new(FakeCodec),
            Arc::new(EmptyLocalRecords),
            Arc::new(AllowAll),
            l0.clone() as Arc<dyn L0CachePort>,
            Arc::new(FakeL1::default()),
            hit_counter.clone(),
            Arc::new(NoopLock),
            upstream.clone(),
            Arc::new(NoopAnalytics),
            PipelineConfig {
                instance_id: "test".into(),
                read_timeout: Duration::from_secs(5),
                ttl_policy: TtlPolicy::default(),
                blocked_response: BlockedResponse::Nxdomain,
                blocked_ttl: 3600,
            },
        ));

        let job = RefreshSweepJob::new(
            pipeline,
            l0.clone(),
            hit_counter,
            SweepConfig { window_s: 120, min_hits: 1, max_inflight: 50 },
            Duration::from_secs(15),
            Duration::from_secs(10),
        );

        job.run_once().await;

        assert_eq!(calls.load(Ordering::SeqCst), 0, "count snapshot taken before run_once");
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 1, "only the hot candidate should be refreshed");
        assert!(l0.map.lock().unwrap().contains_key(&fp("hot.example.com")));
        assert!(!l0.map.lock().unwrap().contains_key(&fp("cold.example.com")));
    }
}
