use sentinel_dns_domain::{CacheEntry, CacheStatus, Fingerprint};

#[derive(Debug, Clone, Copy, Default)]
pub struct L0Stats {
    pub entries: usize,
    pub fresh: usize,
    pub stale: usize,
    pub expired: usize,
    pub max: usize,
}

/// Process-local bounded LRU (C3). CPU-only: implementations must not
/// perform I/O while holding their internal lock.
pub trait L0CachePort: Send + Sync {
    fn get(&self, fp: &Fingerprint) -> (Option<CacheEntry>, CacheStatus);
    fn put(&self, fp: &Fingerprint, entry: CacheEntry);
    fn stats(&self) -> L0Stats;

    /// Fingerprints whose fresh-boundary falls within `window_s` seconds of
    /// `now` — the sweeper's candidate source (see DESIGN.md open question).
    fn expiring_within(&self, now: u64, window_s: i64) -> Vec<Fingerprint>;

    fn flush(&self, fp: Option<&Fingerprint>);
}
