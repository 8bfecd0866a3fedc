use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Where a cache entry's contents came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Upstream,
    Local,
    Negative,
    Blocked,
}

/// Freshness classification returned by an L0/L1 lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Fresh,
    Stale,
    Expired,
    Miss,
}

/// A cached DNS answer. `wire` is the canonical response bytes minus the
/// transaction id (rewritten per reply). Stored under `dns:<FP>` in L1 and
/// under the fingerprint in L0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub wire: Arc<[u8]>,
    pub rcode: u8,
    /// Unix seconds at insert.
    pub stored_at: u64,
    pub ttl_s: u32,
    pub stale_until_s: u32,
    pub source: Source,
    pub upstream_addr: Option<Arc<str>>,
}

impl CacheEntry {
    pub fn fresh_boundary(&self) -> u64 {
        self.stored_at + self.ttl_s as u64
    }

    pub fn stale_boundary(&self) -> u64 {
        self.fresh_boundary() + self.stale_until_s as u64
    }

    pub fn status_at(&self, now: u64) -> CacheStatus {
        if now < self.fresh_boundary() {
            CacheStatus::Fresh
        } else if now < self.stale_boundary() {
            CacheStatus::Stale
        } else {
            CacheStatus::Expired
        }
    }

    /// Seconds until this entry stops being eligible to serve (the
    /// serve-stale boundary), used by the sweeper's candidate window.
    pub fn seconds_until_expiry(&self, now: u64) -> i64 {
        self.fresh_boundary() as i64 - now as i64
    }
}

/// Parameters governing TTL derivation on insert (§4.3 of the resolver
/// design). All fields carry the documented defaults.
#[derive(Debug, Clone, Copy)]
pub struct TtlPolicy {
    pub min_ttl: u32,
    pub max_ttl: u32,
    pub negative_ttl: u32,
    pub servfail_backoff: u32,
    pub respect_source_ttl: bool,
    pub stale_extension: u32,
    pub serve_stale_enabled: bool,
    pub blocked_ttl: u32,
    pub local_ttl: u32,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            min_ttl: 30,
            max_ttl: 86_400,
            negative_ttl: 300,
            servfail_backoff: 60,
            respect_source_ttl: false,
            stale_extension: 300,
            serve_stale_enabled: true,
            blocked_ttl: 3600,
            local_ttl: 3600,
        }
    }
}

/// Upstream response classification fed into TTL derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamOutcomeKind {
    /// NOERROR with at least one answer RR; carries the minimum TTL across
    /// the answer section.
    Positive { min_answer_ttl: u32 },
    /// NXDOMAIN or NODATA; carries the SOA-derived negative TTL if any.
    Negative { soa_ttl: u32 },
    Servfail,
}

impl TtlPolicy {
    /// Derive `(ttl_s, stale_until_s, source)` for a freshly resolved
    /// upstream answer, per §4.3.
    pub fn derive(&self, kind: UpstreamOutcomeKind) -> (u32, u32, Source) {
        let stale = if self.serve_stale_enabled {
            self.stale_extension
        } else {
            0
        };

        match kind {
            UpstreamOutcomeKind::Servfail => (self.servfail_backoff, 0, Source::Negative),
            UpstreamOutcomeKind::Negative { soa_ttl } => {
                let ttl = soa_ttl.clamp(0, self.negative_ttl);
                (ttl, stale, Source::Negative)
            }
            UpstreamOutcomeKind::Positive { min_answer_ttl } => {
                let ttl = if self.respect_source_ttl {
                    min_answer_ttl.clamp(0, self.max_ttl)
                } else {
                    min_answer_ttl.max(self.min_ttl).clamp(self.min_ttl, self.max_ttl)
                };
                (ttl, stale, Source::Upstream)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_at(stored_at: u64, ttl_s: u32, stale_until_s: u32) -> CacheEntry {
        CacheEntry {
            wire: Arc::from(vec![0u8; 4]),
            rcode: 0,
            stored_at,
            ttl_s,
            stale_until_s,
            source: Source::Upstream,
            upstream_addr: None,
        }
    }

    #[test]
    fn status_transitions_fresh_stale_expired() {
        let e = entry_at(1_000, 60, 300);
        assert_eq!(e.status_at(1_000), CacheStatus::Fresh);
        assert_eq!(e.status_at(1_059), CacheStatus::Fresh);
        assert_eq!(e.status_at(1_060), CacheStatus::Stale);
        assert_eq!(e.status_at(1_300), CacheStatus::Stale);
        assert_eq!(e.status_at(1_361), CacheStatus::Expired);
    }

    #[test]
    fn default_clamps_short_ttl_up_to_min() {
        let policy = TtlPolicy::default();
        let (ttl, stale, source) = policy.derive(UpstreamOutcomeKind::Positive { min_answer_ttl: 1 });
        assert_eq!(ttl, policy.min_ttl);
        assert_eq!(stale, policy.stale_extension);
        assert_eq!(source, Source::Upstream);
    }

    #[test]
    fn respect_source_ttl_skips_floor() {
        let mut policy = TtlPolicy::default();
        policy.respect_source_ttl = true;
        policy.serve_stale_enabled = false;
        let (ttl, stale, _) = policy.derive(UpstreamOutcomeKind::Positive { min_answer_ttl: 0 });
        assert_eq!(ttl, 0);
        assert_eq!(stale, 0);
    }

    #[test]
    fn servfail_uses_backoff_and_negative_source() {
        let policy = TtlPolicy::default();
        let (ttl, _, source) = policy.derive(UpstreamOutcomeKind::Servfail);
        assert_eq!(ttl, policy.servfail_backoff);
        assert_eq!(source, Source::Negative);
    }

    #[test]
    fn negative_answer_clamped_to_negative_ttl_cap() {
        let policy = TtlPolicy::default();
        let (ttl, _, source) = policy.derive(UpstreamOutcomeKind::Negative { soa_ttl: 10_000 });
        assert_eq!(ttl, policy.negative_ttl);
        assert_eq!(source, Source::Negative);
    }
}
