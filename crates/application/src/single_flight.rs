use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rustc_hash::FxBuildHasher;
use sentinel_dns_domain::{CacheEntry, DomainError, Fingerprint};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

use crate::ports::{L1CachePort, RefreshLockPort};

#[derive(Clone)]
enum Outcome<T> {
    Resolved(T),
    Failed(DomainError),
}

/// Single-flight coordinator (C8), step 1: ensures at most one in-flight
/// fetch per key within this process. `T` is the shared, cloneable result
/// type all waiters receive.
pub struct SingleFlight<T: Clone + Send + Sync + 'static> {
    inflight: DashMap<Fingerprint, broadcast::Sender<Outcome<T>>, FxBuildHasher>,
}

impl<T: Clone + Send + Sync + 'static> Default for SingleFlight<T> {
    fn default() -> Self {
        Self {
            inflight: DashMap::with_hasher(FxBuildHasher),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> SingleFlight<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `fetch` as the single in-flight operation for `fp`. Concurrent
    /// callers for the same key attach as waiters and receive the leader's
    /// result without re-running `fetch`.
    pub async fn run<F, Fut>(&self, fp: &Fingerprint, fetch: F) -> Result<T, DomainError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, DomainError>>,
    {
        let (is_leader, mut rx) = match self.inflight.entry(fp.clone()) {
            Entry::Occupied(o) => (false, o.get().subscribe()),
            Entry::Vacant(v) => {
                let (tx, rx) = broadcast::channel(1);
                v.insert(tx);
                (true, rx)
            }
        };

        if !is_leader {
            return Self::wait(&mut rx).await;
        }

        let result = fetch().await;
        let outcome = match &result {
            Ok(value) => Outcome::Resolved(value.clone()),
            Err(e) => Outcome::Failed(e.clone()),
        };
        if let Some((_, tx)) = self.inflight.remove(fp) {
            let _ = tx.send(outcome);
        }
        result
    }

    async fn wait(rx: &mut broadcast::Receiver<Outcome<T>>) -> Result<T, DomainError> {
        match rx.recv().await {
            Ok(Outcome::Resolved(value)) => Ok(value),
            Ok(Outcome::Failed(e)) => Err(e),
            Err(_) => Err(DomainError::DeadlineExceeded),
        }
    }
}

/// Result of a coordinated fetch: the resolved entry, and whether *this*
/// instance performed the upstream exchange (vs. observing another
/// instance's publish via L1).
pub struct CoordinatedFetch {
    pub entry: CacheEntry,
    pub we_fetched: bool,
}

impl Clone for CoordinatedFetch {
    fn clone(&self) -> Self {
        Self {
            entry: self.entry.clone(),
            we_fetched: self.we_fetched,
        }
    }
}

/// Cross-instance single-flight (C8 steps 2-3): wraps local dedup with the
/// `dnsmeta:lock` cross-instance mutex and an L1 poll loop for followers.
pub struct CrossInstanceCoordinator {
    local: SingleFlight<CoordinatedFetch>,
}

impl Default for CrossInstanceCoordinator {
    fn default() -> Self {
        Self {
            local: SingleFlight::new(),
        }
    }
}

impl CrossInstanceCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fetch<F, Fut>(
        &self,
        fp: &Fingerprint,
        lock: &dyn RefreshLockPort,
        l1: &dyn L1CachePort,
        instance_id: &str,
        fetch: F,
    ) -> Result<CoordinatedFetch, DomainError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CacheEntry, DomainError>>,
    {
        self.local
            .run(fp, || async move {
                if lock.try_acquire(fp, instance_id).await {
                    let result = fetch().await;
                    if let Ok(entry) = &result {
                        l1.set(fp, entry).await;
                    }
                    lock.release(fp, instance_id).await;
                    return result.map(|entry| CoordinatedFetch {
                        entry,
                        we_fetched: true,
                    });
                }

                let deadline = Instant::now() + lock.lock_ttl();
                let mut backoff = Duration::from_millis(20);
                loop {
                    if let Some(entry) = l1.get(fp).await {
                        return Ok(CoordinatedFetch {
                            entry,
                            we_fetched: false,
                        });
                    }
                    if Instant::now() >= deadline {
                        // The lock holder never published; fetch ourselves
                        // rather than wait indefinitely.
                        let result = fetch().await;
                        if let Ok(entry) = &result {
                            l1.set(fp, entry).await;
                        }
                        return result.map(|entry| CoordinatedFetch {
                            entry,
                            we_fetched: true,
                        });
                    }
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(Duration::from_millis(200));
                }
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_dns_domain::{fingerprint::QClass, RecordType, Source};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fp() -> Fingerprint {
        Fingerprint::new("example.com", RecordType::A, QClass::In)
    }

    fn entry() -> CacheEntry {
        CacheEntry {
            wire: Arc::from(vec![1, 2, 3]),
            rcode: 0,
            stored_at: 0,
            ttl_s: 60,
            stale_until_s: 0,
            source: Source::Upstream,
            upstream_addr: None,
        }
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_fetch() {
        let sf: Arc<SingleFlight<CacheEntry>> = Arc::new(SingleFlight::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let sf = sf.clone();
            let calls = calls.clone();
            let fp = fp();
            handles.push(tokio::spawn(async move {
                sf.run(&fp, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    Ok(entry())
                })
                .await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
