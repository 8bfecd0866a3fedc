use async_trait::async_trait;
use sentinel_dns_domain::{CacheEntry, Fingerprint};

/// Shared key-value store client (C4). Implementations MUST degrade
/// gracefully: any I/O error is a miss, never propagated to the caller.
#[async_trait]
pub trait L1CachePort: Send + Sync {
    async fn get(&self, fp: &Fingerprint) -> Option<CacheEntry>;
    async fn set(&self, fp: &Fingerprint, entry: &CacheEntry);
}
