use async_trait::async_trait;
use sentinel_dns_domain::Fingerprint;
use std::time::Duration;

/// Cross-instance mutex preventing duplicate upstream fetches for the same
/// fingerprint (part of C8). Backed by `dnsmeta:lock:<FP>` in the shared
/// store.
#[async_trait]
pub trait RefreshLockPort: Send + Sync {
    /// Attempt `SET dnsmeta:lock:<FP> <instance_id> NX EX lock_ttl_s`.
    async fn try_acquire(&self, fp: &Fingerprint, instance_id: &str) -> bool;

    /// Compare-and-delete: release only if we are still the holder.
    async fn release(&self, fp: &Fingerprint, instance_id: &str) -> bool;

    fn lock_ttl(&self) -> Duration;
}
