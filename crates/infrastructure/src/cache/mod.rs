use lru::LruCache;
use rustc_hash::FxBuildHasher;
use sentinel_dns_application::ports::{L0CachePort, L0Stats};
use sentinel_dns_domain::{CacheEntry, CacheStatus, Fingerprint};
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Process-local bounded LRU (C3). A single mutex guards the map+list;
/// every operation here is O(1) and performs no I/O, per the resource
/// discipline the design assigns to this tier. This replaces the teacher's
/// DashMap-sharded, bloom-gated, LFU-K-evicting cache: that design exists to
/// serve the teacher's admin-configurable eviction policy, which this spec
/// does not have — a single bounded LRU behind one lock is what the
/// concurrency model actually calls for.
pub struct L0Cache {
    inner: Mutex<LruCache<Fingerprint, CacheEntry, FxBuildHasher>>,
    max_entries: usize,
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl L0Cache {
    pub fn new(max_entries: usize) -> Self {
        let cap = NonZeroUsize::new(max_entries.max(1)).unwrap();
        Self {
            inner: Mutex::new(LruCache::with_hasher(cap, FxBuildHasher)),
            max_entries,
        }
    }
}

impl L0CachePort for L0Cache {
    fn get(&self, fp: &Fingerprint) -> (Option<CacheEntry>, CacheStatus) {
        let mut guard = self.inner.lock().unwrap();
        match guard.get(fp) {
            Some(entry) => {
                let status = entry.status_at(now_unix());
                (Some(entry.clone()), status)
            }
            None => (None, CacheStatus::Miss),
        }
    }

    fn put(&self, fp: &Fingerprint, entry: CacheEntry) {
        self.inner.lock().unwrap().put(fp.clone(), entry);
    }

    fn stats(&self) -> L0Stats {
        let guard = self.inner.lock().unwrap();
        let now = now_unix();
        let mut stats = L0Stats {
            entries: guard.len(),
            max: self.max_entries,
            ..Default::default()
        };
        for (_, entry) in guard.iter() {
            match entry.status_at(now) {
                CacheStatus::Fresh => stats.fresh += 1,
                CacheStatus::Stale => stats.stale += 1,
                CacheStatus::Expired => stats.expired += 1,
                CacheStatus::Miss => {}
            }
        }
        stats
    }

    fn expiring_within(&self, now: u64, window_s: i64) -> Vec<Fingerprint> {
        let guard = self.inner.lock().unwrap();
        guard
            .iter()
            .filter_map(|(fp, entry)| {
                let remaining = entry.seconds_until_expiry(now);
                (remaining >= 0 && remaining <= window_s).then(|| fp.clone())
            })
            .collect()
    }

    fn flush(&self, fp: Option<&Fingerprint>) {
        let mut guard = self.inner.lock().unwrap();
        match fp {
            Some(fp) => {
                guard.pop(fp);
            }
            None => guard.clear(),
        }
    }
}
