use async_trait::async_trait;
use sentinel_dns_domain::Fingerprint;

/// Hit counter & hot-set (C5). The counter is advisory: loss of increments
/// under load or sampling is acceptable.
#[async_trait]
pub trait HitCounterPort: Send + Sync {
    /// Record a hit and return the current (grossed-up, if sampled) count.
    async fn record_hit(&self, fp: &Fingerprint) -> u64;

    /// Read the current (short-window) count without incrementing. Used by
    /// the pipeline's synchronous `is_hot` check.
    async fn peek(&self, fp: &Fingerprint) -> u64;

    /// Read the long-window count (`sweep_hit_window_s`, default 7 days)
    /// the sweeper filters candidates against via `sweep_min_hits`. Distinct
    /// from `peek`'s short hot-path window so a domain popular earlier in
    /// the week still counts as refresh-worthy even if it's quiet right now.
    async fn peek_sweep_window(&self, fp: &Fingerprint) -> u64;

    fn is_hot(&self, count: u64) -> bool;
}
