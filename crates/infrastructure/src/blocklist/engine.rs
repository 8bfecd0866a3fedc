use super::snapshot::BlockSnapshot;
use arc_swap::{ArcSwap, ArcSwapOption};
use sentinel_dns_application::ports::{BlockDecision, BlocklistPort};
use sentinel_dns_domain::Fingerprint;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// The compiled blocklist matcher (C2). `snapshot` is swapped wholesale on
/// reload via `ArcSwap`, so `check` never blocks behind a reload in
/// progress. Pause state is a separate atomic slot so an operator-triggered
/// pause survives reloads.
pub struct BlockFilterEngine {
    snapshot: ArcSwap<BlockSnapshot>,
    paused_until: ArcSwapOption<Instant>,
}

impl BlockFilterEngine {
    pub fn new(snapshot: BlockSnapshot) -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(snapshot),
            paused_until: ArcSwapOption::empty(),
        }
    }

    pub fn reload(&self, snapshot: BlockSnapshot) {
        self.snapshot.store(Arc::new(snapshot));
    }
}

impl BlocklistPort for BlockFilterEngine {
    fn check(&self, fp: &Fingerprint) -> BlockDecision {
        if self.is_paused() {
            return BlockDecision::Allow;
        }

        let snapshot = self.snapshot.load();

        // Allowlist is exact-only (§4.2): no suffix walk, no patterns.
        if snapshot.allow_exact.contains(fp.name()) {
            return BlockDecision::Allow;
        }

        for suffix in fp.suffixes() {
            if snapshot.deny_exact.contains(suffix) {
                return BlockDecision::Block;
            }
        }

        for pattern in &snapshot.deny_patterns {
            if pattern.is_match(fp.name()).unwrap_or(false) {
                return BlockDecision::Block;
            }
        }

        BlockDecision::Allow
    }

    fn pause(&self, duration: Duration) {
        self.paused_until.store(Some(Arc::new(Instant::now() + duration)));
    }

    fn resume(&self) {
        self.paused_until.store(None);
    }

    fn is_paused(&self) -> bool {
        match self.paused_until.load().as_ref() {
            Some(until) => Instant::now() < **until,
            None => false,
        }
    }

    fn compiled_domain_count(&self) -> usize {
        self.snapshot.load().domain_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_dns_domain::fingerprint::QClass;
    use sentinel_dns_domain::RecordType;

    fn fp(name: &str) -> Fingerprint {
        Fingerprint::new(name, RecordType::A, QClass::In)
    }

    fn snapshot_with(deny: &[&str], allow: &[&str]) -> BlockSnapshot {
        let mut snap = BlockSnapshot::empty();
        for d in deny {
            snap.deny_exact.insert(d.to_string());
            snap.domain_count += 1;
        }
        for a in allow {
            snap.allow_exact.insert(a.to_string());
        }
        snap
    }

    #[test]
    fn suffix_walk_blocks_subdomains_of_blocked_parent() {
        let engine = BlockFilterEngine::new(snapshot_with(&["ads.example.com"], &[]));
        assert_eq!(engine.check(&fp("x.ads.example.com")), BlockDecision::Block);
        assert_eq!(engine.check(&fp("example.com")), BlockDecision::Allow);
    }

    #[test]
    fn allowlist_exact_overrides_block_for_that_name_only() {
        let engine = BlockFilterEngine::new(snapshot_with(&["ads.example.com"], &["ads.example.com"]));
        assert_eq!(engine.check(&fp("ads.example.com")), BlockDecision::Allow);
        assert_eq!(engine.check(&fp("x.ads.example.com")), BlockDecision::Block);
    }

    #[test]
    fn pause_allows_everything_until_it_elapses() {
        let engine = BlockFilterEngine::new(snapshot_with(&["ads.example.com"], &[]));
        engine.pause(Duration::from_secs(60));
        assert!(engine.is_paused());
        assert_eq!(engine.check(&fp("ads.example.com")), BlockDecision::Allow);
        engine.resume();
        assert!(!engine.is_paused());
        assert_eq!(engine.check(&fp("ads.example.com")), BlockDecision::Block);
    }

    #[test]
    fn reload_swaps_snapshot_atomically() {
        let engine = BlockFilterEngine::new(snapshot_with(&[], &[]));
        assert_eq!(engine.check(&fp("ads.example.com")), BlockDecision::Allow);
        engine.reload(snapshot_with(&["ads.example.com"], &[]));
        assert_eq!(engine.check(&fp("ads.example.com")), BlockDecision::Block);
    }
}
