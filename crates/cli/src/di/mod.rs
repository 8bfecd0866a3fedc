use std::sync::Arc;
use std::time::Duration;

use sentinel_dns_application::ports::{HitCounterPort, L0CachePort, UpstreamPort};
use sentinel_dns_application::{PipelineConfig, QueryPipeline};
use sentinel_dns_domain::cache_entry::TtlPolicy;
use sentinel_dns_domain::{Config, DomainError};
use sentinel_dns_infrastructure::blocklist::compile_snapshot;
use sentinel_dns_infrastructure::{
    BlockFilterEngine, BoundedAnalyticsSink, HickoryCodec, L0Cache, RedisHitCounter, RedisL1Cache,
    RedisRefreshLock, StaticRecords, UpstreamPool,
};

/// Everything the composition root needs to start listeners and the refresh
/// scheduler, wired behind its ports. This is where every adapter from
/// `sentinel-dns-infrastructure` meets its port trait from
/// `sentinel-dns-application`; nothing outside this module constructs a
/// concrete adapter type.
pub struct Services {
    pub pipeline: Arc<QueryPipeline>,
    pub l0: Arc<dyn L0CachePort>,
    pub hit_counter: Arc<dyn HitCounterPort>,
    pub blocklist: Arc<BlockFilterEngine>,
}

pub async fn build(config: &Config) -> Result<Services, DomainError> {
    let redis_url = config
        .cache
        .redis_url
        .as_deref()
        .ok_or_else(|| DomainError::ConfigMissing("cache.redis_url must be set".into()))?;

    let l1 = Arc::new(RedisL1Cache::connect(redis_url).await?);

    let hit_counter_conn = redis::Client::open(redis_url)
        .map_err(|e| DomainError::L1Unavailable(e.to_string()))?
        .get_connection_manager()
        .await
        .map_err(|e| DomainError::L1Unavailable(e.to_string()))?;
    let hit_counter = Arc::new(RedisHitCounter::new(
        hit_counter_conn,
        config.refresh.hit_window_s,
        config.refresh.sweep_hit_window_s,
        config.refresh.hit_count_sample_rate,
        config.refresh.hot_threshold,
    ));

    let lock_conn = redis::Client::open(redis_url)
        .map_err(|e| DomainError::L1Unavailable(e.to_string()))?
        .get_connection_manager()
        .await
        .map_err(|e| DomainError::L1Unavailable(e.to_string()))?;
    let refresh_lock = Arc::new(RedisRefreshLock::new(
        lock_conn,
        Duration::from_secs(config.refresh.lock_ttl_s),
    ));

    let l0: Arc<dyn L0CachePort> = Arc::new(L0Cache::new(config.cache.l0_size));
    let codec = Arc::new(HickoryCodec::new());
    let local_records = Arc::new(StaticRecords::compile(&config.local_records));

    let snapshot = compile_snapshot(&config.blocklist.deny_sources, &config.blocklist.allow_sources)?;
    let blocklist = Arc::new(BlockFilterEngine::new(snapshot));

    let upstream: Arc<dyn UpstreamPort> = Arc::new(UpstreamPool::new(&config.upstreams)?);
    let analytics = Arc::new(BoundedAnalyticsSink::new(config.cache.l0_size));

    let ttl_policy: TtlPolicy = config
        .cache
        .ttl_policy(config.response.blocked_ttl, config.response.local_ttl);

    let pipeline_config = PipelineConfig {
        instance_id: config.instance_id.clone(),
        read_timeout: Duration::from_secs(config.read_timeout_s),
        ttl_policy,
        blocked_response: config.response.blocked.clone(),
        blocked_ttl: config.response.blocked_ttl,
    };

    let pipeline = Arc::new(QueryPipeline::new(
        codec,
        local_records,
        blocklist.clone(),
        l0.clone(),
        l1,
        hit_counter.clone(),
        refresh_lock,
        upstream,
        analytics,
        pipeline_config,
    ));

    Ok(Services {
        pipeline,
        l0,
        hit_counter: hit_counter as Arc<dyn HitCounterPort>,
        blocklist,
    })
}
