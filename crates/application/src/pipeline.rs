use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use sentinel_dns_domain::cache_entry::UpstreamOutcomeKind;
use sentinel_dns_domain::config::response::BlockedResponse;
use sentinel_dns_domain::outcome::{DurationBreakdown, QueryRecord};
use sentinel_dns_domain::{CacheEntry, CacheStatus, DomainError, Fingerprint, Outcome, Source, TtlPolicy};

use crate::ports::{
    AnalyticsSinkPort, BlockDecision, BlocklistPort, CodecPort, DecodedRequest, HitCounterPort,
    L0CachePort, L1CachePort, LocalRecordsPort, RefreshLockPort, SynthAnswer, UpstreamPort,
};
use crate::single_flight::CrossInstanceCoordinator;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub instance_id: String,
    pub read_timeout: Duration,
    pub ttl_policy: TtlPolicy,
    pub blocked_response: BlockedResponse,
    pub blocked_ttl: u32,
}

pub struct PipelineResult {
    pub wire: Vec<u8>,
    pub outcome: Outcome,
    pub stale_served: bool,
}

pub struct QueryPipeline {
    codec: Arc<dyn CodecPort>,
    local_records: Arc<dyn LocalRecordsPort>,
    blocklist: Arc<dyn BlocklistPort>,
    l0: Arc<dyn L0CachePort>,
    l1: Arc<dyn L1CachePort>,
    hit_counter: Arc<dyn HitCounterPort>,
    refresh_lock: Arc<dyn RefreshLockPort>,
    upstream: Arc<dyn UpstreamPort>,
    analytics: Arc<dyn AnalyticsSinkPort>,
    coordinator: CrossInstanceCoordinator,
    config: PipelineConfig,
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}

impl QueryPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        codec: Arc<dyn CodecPort>,
        local_records: Arc<dyn LocalRecordsPort>,
        blocklist: Arc<dyn BlocklistPort>,
        l0: Arc<dyn L0CachePort>,
        l1: Arc<dyn L1CachePort>,
        hit_counter: Arc<dyn HitCounterPort>,
        refresh_lock: Arc<dyn RefreshLockPort>,
        upstream: Arc<dyn UpstreamPort>,
        analytics: Arc<dyn AnalyticsSinkPort>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            codec,
            local_records,
            blocklist,
            l0,
            l1,
            hit_counter,
            refresh_lock,
            upstream,
            analytics,
            coordinator: CrossInstanceCoordinator::new(),
            config,
        }
    }

    // --- admin entry points, callable on the shared pipeline handle ---

    pub fn pause(&self, duration: Duration) {
        self.blocklist.pause(duration);
    }

    pub fn resume(&self) {
        self.blocklist.resume();
    }

    pub fn flush_cache(&self, fp: Option<&Fingerprint>) {
        self.l0.flush(fp);
    }

    pub fn stats(&self) -> crate::ports::L0Stats {
        self.l0.stats()
    }

    /// Run the full per-request state machine for one decoded message.
    pub async fn handle(&self, raw: &[u8], is_tcp: bool) -> PipelineResult {
        let started = Instant::now();
        let deadline = started + self.config.read_timeout;

        let req = match self.codec.decode(raw, is_tcp) {
            Ok(req) => req,
            Err(e) => {
                warn!(error = %e, "malformed DNS message");
                let record = QueryRecord {
                    name: String::new(),
                    qtype: String::new(),
                    outcome: Outcome::Invalid,
                    stale_served: false,
                    upstream_addr: None,
                    duration: DurationBreakdown {
                        cache_lookup_ms: 0.0,
                        network_write_ms: 0.0,
                        duration_ms: elapsed_ms(started),
                    },
                    timestamp: now_unix(),
                };
                if !self.analytics.submit(record) {
                    debug!("analytics sink backpressure, invalid-query record dropped");
                }
                return PipelineResult {
                    wire: self.codec.encode_raw_formerr(raw),
                    outcome: Outcome::Invalid,
                    stale_served: false,
                };
            }
        };

        let fp = req.fingerprint.clone();
        let hit_count = self.hit_counter.record_hit(&fp).await;
        let is_hot = self.hit_counter.is_hot(hit_count);

        let mut cache_lookup_ms = 0.0;
        let mut stale_served = false;

        let (wire, outcome, upstream_addr) = if let Some(entry) = self.local_records.lookup(&fp) {
            self.l0.put(&fp, entry.clone());
            (self.codec.encode_from_cache(&req, &entry), Outcome::Local, None)
        } else if self.blocklist.check(&fp) == BlockDecision::Block {
            let (wire, entry) = self.synthesize_blocked(&req);
            self.l0.put(&fp, entry.clone());
            self.l1.set(&fp, &entry).await;
            (wire, Outcome::Blocked, None)
        } else {
            let lookup_started = Instant::now();
            let l0_result = self.l0.get(&fp);
            cache_lookup_ms += elapsed_ms(lookup_started);

            match self.serve_from_cache(&fp, l0_result, is_hot, deadline).await {
                Some((wire, outcome, addr, was_stale)) => {
                    stale_served = was_stale;
                    (wire, outcome, addr)
                }
                None => {
                    let l1_started = Instant::now();
                    let l1_entry = self.l1.get(&fp).await;
                    cache_lookup_ms += elapsed_ms(l1_started);

                    match self.serve_from_l1(&fp, l1_entry, is_hot, deadline).await {
                        Some((wire, outcome, addr, was_stale)) => {
                            stale_served = was_stale;
                            (wire, outcome, addr)
                        }
                        None => self.fetch_from_upstream(&req, &fp, deadline).await,
                    }
                }
            }
        };

        let network_write_started = Instant::now();
        // Actual socket write happens in the listener; this field captures
        // the time already spent preparing the wire reply here.
        let network_write_ms = elapsed_ms(network_write_started);

        let record = QueryRecord {
            name: fp.name().to_string(),
            qtype: fp.qtype().to_string(),
            outcome,
            stale_served,
            upstream_addr,
            duration: DurationBreakdown {
                cache_lookup_ms,
                network_write_ms,
                duration_ms: elapsed_ms(started),
            },
            timestamp: now_unix(),
        };
        if !self.analytics.submit(record) {
            debug!(fp = %fp, "analytics sink backpressure, record dropped");
        }

        PipelineResult {
            wire,
            outcome,
            stale_served,
        }
    }

    fn synthesize_blocked(&self, req: &DecodedRequest) -> (Vec<u8>, CacheEntry) {
        let answer = match self.config.blocked_response {
            BlockedResponse::Nxdomain => SynthAnswer::Nxdomain,
            BlockedResponse::Sinkhole(ip) => SynthAnswer::Sinkhole(ip),
        };
        let wire = self
            .codec
            .encode_synthetic(req, answer, self.config.blocked_ttl);
        let entry = CacheEntry {
            wire: Arc::from(wire.clone()),
            rcode: matches!(self.config.blocked_response, BlockedResponse::Nxdomain)
                .then_some(3)
                .unwrap_or(0),
            stored_at: now_unix(),
            ttl_s: self.config.blocked_ttl,
            stale_until_s: 0,
            source: Source::Blocked,
            upstream_addr: None,
        };
        (wire, entry)
    }

    /// Returns `Some((wire, outcome, upstream_addr, stale_served))` if L0
    /// served the query (fresh or stale); `None` on miss/expired to fall
    /// through to L1.
    async fn serve_from_cache(
        &self,
        fp: &Fingerprint,
        (entry, status): (Option<CacheEntry>, CacheStatus),
        is_hot: bool,
        deadline: Instant,
    ) -> Option<(Vec<u8>, Outcome, Option<String>, bool)> {
        let entry = entry?;
        match status {
            CacheStatus::Fresh => Some((entry.wire.to_vec(), Outcome::Cached, None, false)),
            CacheStatus::Stale if is_hot => {
                self.spawn_background_refresh(fp.clone(), deadline);
                Some((entry.wire.to_vec(), Outcome::Cached, None, true))
            }
            CacheStatus::Stale | CacheStatus::Expired | CacheStatus::Miss => None,
        }
    }

    async fn serve_from_l1(
        &self,
        fp: &Fingerprint,
        entry: Option<CacheEntry>,
        is_hot: bool,
        deadline: Instant,
    ) -> Option<(Vec<u8>, Outcome, Option<String>, bool)> {
        let entry = entry?;
        let status = entry.status_at(now_unix());
        match status {
            CacheStatus::Fresh => {
                self.l0.put(fp, entry.clone());
                Some((entry.wire.to_vec(), Outcome::Cached, None, false))
            }
            CacheStatus::Stale if is_hot => {
                self.l0.put(fp, entry.clone());
                self.spawn_background_refresh(fp.clone(), deadline);
                Some((entry.wire.to_vec(), Outcome::Cached, None, true))
            }
            CacheStatus::Stale | CacheStatus::Expired | CacheStatus::Miss => None,
        }
    }

    /// Enqueue a single-flight background refresh without blocking the
    /// caller. Errors are swallowed; the stale value already answered the
    /// client.
    fn spawn_background_refresh(&self, fp: Fingerprint, deadline: Instant) {
        let upstream = self.upstream.clone();
        let l1 = self.l1.clone();
        let l0 = self.l0.clone();
        let refresh_lock = self.refresh_lock.clone();
        let instance_id = self.config.instance_id.clone();
        let ttl_policy = self.config.ttl_policy;
        tokio::spawn(async move {
            run_refresh(&fp, deadline, &upstream, &l1, &l0, &refresh_lock, &instance_id, &ttl_policy).await;
        });
    }

    /// Proactively refresh one fingerprint outside of any client request
    /// (C9 sweep step 3). Takes the same refresh lock a stale-serve
    /// background refresh would, so the two never race on the same key.
    pub async fn refresh_candidate(&self, fp: &Fingerprint, deadline: Instant) {
        run_refresh(
            fp,
            deadline,
            &self.upstream,
            &self.l1,
            &self.l0,
            &self.refresh_lock,
            &self.config.instance_id,
            &self.config.ttl_policy,
        )
        .await;
    }

    async fn fetch_from_upstream(
        &self,
        req: &DecodedRequest,
        fp: &Fingerprint,
        deadline: Instant,
    ) -> (Vec<u8>, Outcome, Option<String>) {
        let upstream = self.upstream.clone();
        let ttl_policy = self.config.ttl_policy;
        let fetch_fp = fp.clone();
        let result = self
            .coordinator
            .fetch(
                fp,
                self.refresh_lock.as_ref(),
                self.l1.as_ref(),
                &self.config.instance_id,
                move || async move {
                    let resolution = upstream.resolve(&fetch_fp, deadline).await?;
                    Ok(build_entry_from_upstream(&ttl_policy, &resolution))
                },
            )
            .await;

        match result {
            Ok(coordinated) => {
                self.l0.put(fp, coordinated.entry.clone());
                let outcome = if coordinated.we_fetched {
                    if coordinated.entry.rcode == 2 {
                        Outcome::Servfail
                    } else {
                        Outcome::Upstream
                    }
                } else {
                    Outcome::Cached
                };
                let addr = coordinated.entry.upstream_addr.as_ref().map(|s| s.to_string());
                (coordinated.entry.wire.to_vec(), outcome, addr)
            }
            Err(_) => {
                let wire = self.codec.encode_synthetic(req, SynthAnswer::Servfail, 0);
                (wire, Outcome::UpstreamError, None)
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_refresh(
    fp: &Fingerprint,
    deadline: Instant,
    upstream: &Arc<dyn UpstreamPort>,
    l1: &Arc<dyn L1CachePort>,
    l0: &Arc<dyn L0CachePort>,
    refresh_lock: &Arc<dyn RefreshLockPort>,
    instance_id: &str,
    ttl_policy: &TtlPolicy,
) {
    if !refresh_lock.try_acquire(fp, instance_id).await {
        return;
    }
    if let Ok(resolution) = upstream.resolve(fp, deadline).await {
        let entry = build_entry_from_upstream(ttl_policy, &resolution);
        l1.set(fp, &entry).await;
        l0.put(fp, entry);
    }
    refresh_lock.release(fp, instance_id).await;
}

fn build_entry_from_upstream(
    policy: &TtlPolicy,
    resolution: &crate::ports::UpstreamResolution,
) -> CacheEntry {
    let kind = if resolution.rcode == 2 {
        UpstreamOutcomeKind::Servfail
    } else if resolution.is_negative {
        UpstreamOutcomeKind::Negative {
            soa_ttl: resolution.soa_ttl,
        }
    } else {
        UpstreamOutcomeKind::Positive {
            min_answer_ttl: resolution.min_answer_ttl,
        }
    };
    let (ttl_s, stale_until_s, source) = policy.derive(kind);
    CacheEntry {
        wire: Arc::from(resolution.wire.clone()),
        rcode: resolution.rcode,
        stored_at: now_unix(),
        ttl_s,
        stale_until_s,
        source,
        upstream_addr: Some(Arc::from(resolution.upstream_addr.as_str())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{L0Stats, UpstreamResolution};
    use sentinel_dns_domain::fingerprint::QClass;
    use sentinel_dns_domain::RecordType;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeCodec;
    impl CodecPort for FakeCodec {
        fn decode(&self, bytes: &[u8], is_tcp: bool) -> Result<DecodedRequest, DomainError> {
            if bytes == b"bad" {
                return Err(DomainError::MalformedMessage("too short".into()));
            }
            Ok(DecodedRequest {
                id: 42,
                fingerprint: Fingerprint::new("example.com", RecordType::A, QClass::In),
                edns_bufsize: None,
                is_tcp,
            })
        }
        fn encode_from_cache(&self, _req: &DecodedRequest, entry: &CacheEntry) -> Vec<u8> {
            entry.wire.to_vec()
        }
        fn encode_synthetic(&self, _req: &DecodedRequest, _answer: SynthAnswer, _ttl: u32) -> Vec<u8> {
            vec![9, 9]
        }
        fn encode_raw_formerr(&self, _raw: &[u8]) -> Vec<u8> {
            vec![0xFF]
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
    struct MemL0 {
        map: Mutex<HashMap<Fingerprint, CacheEntry>>,
    }
    impl L0CachePort for MemL0 {
        fn get(&self, fp: &Fingerprint) -> (Option<CacheEntry>, CacheStatus) {
            let map = self.map.lock().unwrap();
            match map.get(fp) {
                Some(e) => {
                    let status = e.status_at(now_unix());
                    (Some(e.clone()), status)
                }
                None => (None, CacheStatus::Miss),
            }
        }
        fn put(&self, fp: &Fingerprint, entry: CacheEntry) {
            self.map.lock().unwrap().insert(fp.clone(), entry);
        }
        fn stats(&self) -> L0Stats {
            L0Stats::default()
        }
        fn expiring_within(&self, _now: u64, _window_s: i64) -> Vec<Fingerprint> {
            Vec::new()
        }
        fn flush(&self, fp: Option<&Fingerprint>) {
            match fp {
                Some(fp) => {
                    self.map.lock().unwrap().remove(fp);
                }
                None => self.map.lock().unwrap().clear(),
            }
        }
    }

    #[derive(Default)]
    struct MemL1 {
        map: Mutex<HashMap<Fingerprint, CacheEntry>>,
    }
    #[async_trait::async_trait]
    impl L1CachePort for MemL1 {
        async fn get(&self, fp: &Fingerprint) -> Option<CacheEntry> {
            self.map.lock().unwrap().get(fp).cloned()
        }
        async fn set(&self, fp: &Fingerprint, entry: &CacheEntry) {
            self.map.lock().unwrap().insert(fp.clone(), entry.clone());
        }
    }

    struct NoopHitCounter;
    #[async_trait::async_trait]
    impl HitCounterPort for NoopHitCounter {
        async fn record_hit(&self, _fp: &Fingerprint) -> u64 {
            1
        }
        async fn peek(&self, _fp: &Fingerprint) -> u64 {
            1
        }
        async fn peek_sweep_window(&self, _fp: &Fingerprint) -> u64 {
            1
        }
        fn is_hot(&self, count: u64) -> bool {
            count >= 20
        }
    }

    struct NoopLock;
    #[async_trait::async_trait]
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

    struct OneShotUpstream {
        calls: std::sync::atomic::AtomicUsize,
    }
    #[async_trait::async_trait]
    impl UpstreamPort for OneShotUpstream {
        async fn resolve(
            &self,
            _fp: &Fingerprint,
            _deadline: Instant,
        ) -> Result<UpstreamResolution, DomainError> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
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
        fn submit(&self, _record: QueryRecord) -> bool {
            true
        }
    }

    #[derive(Default)]
    struct RecordingAnalytics {
        records: std::sync::Mutex<Vec<QueryRecord>>,
    }
    impl AnalyticsSinkPort for RecordingAnalytics {
        fn submit(&self, record: QueryRecord) -> bool {
            self.records.lock().unwrap().push(record);
            true
        }
    }

    fn test_pipeline() -> QueryPipeline {
        QueryPipeline::new(
            Arc::new(FakeCodec),
            Arc::new(EmptyLocalRecords),
            Arc::new(AllowAll),
            Arc::new(MemL0::default()),
            Arc::new(MemL1::default()),
            Arc::new(NoopHitCounter),
            Arc::new(NoopLock),
            Arc::new(OneShotUpstream {
                calls: Default::default(),
            }),
            Arc::new(NoopAnalytics),
            PipelineConfig {
                instance_id: "test".into(),
                read_timeout: Duration::from_secs(5),
                ttl_policy: TtlPolicy::default(),
                blocked_response: BlockedResponse::Nxdomain,
                blocked_ttl: 3600,
            },
        )
    }

    #[tokio::test]
    async fn miss_then_hit_is_cached_on_second_query() {
        let pipeline = test_pipeline();
        let first = pipeline.handle(b"query", false).await;
        assert_eq!(first.outcome, Outcome::Upstream);
        let second = pipeline.handle(b"query", false).await;
        assert_eq!(second.outcome, Outcome::Cached);
    }

    #[tokio::test]
    async fn malformed_message_yields_invalid_outcome() {
        let pipeline = test_pipeline();
        let result = pipeline.handle(b"bad", false).await;
        assert_eq!(result.outcome, Outcome::Invalid);
        assert_eq!(result.wire, vec![0xFF]);
    }

    #[tokio::test]
    async fn malformed_message_still_emits_a_query_record() {
        let analytics = Arc::new(RecordingAnalytics::default());
        let pipeline = QueryPipeline::new(
            Arc::new(FakeCodec),
            Arc::new(EmptyLocalRecords),
            Arc::new(AllowAll),
            Arc::new(MemL0::default()),
            Arc::new(MemL1::default()),
            Arc::new(NoopHitCounter),
            Arc::new(NoopLock),
            Arc::new(OneShotUpstream {
                calls: Default::default(),
            }),
            analytics.clone(),
            PipelineConfig {
                instance_id: "test".into(),
                read_timeout: Duration::from_secs(5),
                ttl_policy: TtlPolicy::default(),
                blocked_response: BlockedResponse::Nxdomain,
                blocked_ttl: 3600,
            },
        );

        pipeline.handle(b"bad", false).await;

        let records = analytics.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].outcome, Outcome::Invalid);
    }

    #[tokio::test]
    async fn refresh_candidate_populates_l0_without_a_client_request() {
        let pipeline = test_pipeline();
        assert_eq!(pipeline.stats().entries, 0);

        let fp = Fingerprint::new("example.com", RecordType::A, QClass::In);
        pipeline
            .refresh_candidate(&fp, Instant::now() + Duration::from_secs(1))
            .await;

        assert_eq!(pipeline.stats().entries, 1);
    }
}
