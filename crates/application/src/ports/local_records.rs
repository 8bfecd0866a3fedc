use sentinel_dns_domain::{CacheEntry, Fingerprint};

/// Configured static A/AAAA/CNAME/PTR/TXT answers (§4.9 step 2). Pure
/// in-memory lookup, loaded once from config.
pub trait LocalRecordsPort: Send + Sync {
    fn lookup(&self, fp: &Fingerprint) -> Option<CacheEntry>;
}
