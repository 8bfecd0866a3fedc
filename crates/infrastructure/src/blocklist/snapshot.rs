use fancy_regex::Regex;
use rustc_hash::FxBuildHasher;
use std::collections::HashSet;

/// A compiled blocklist, swapped in wholesale on reload (C2). The suffix walk
/// in `BlockFilterEngine::check` tests progressively shorter suffixes of the
/// query name against `deny_exact`, so a single flat set serves both exact
/// and wildcard-style entries (`ads.example.com` blocks `x.ads.example.com`
/// too) — no separate trie is needed.
pub struct BlockSnapshot {
    pub deny_exact: HashSet<String, FxBuildHasher>,
    pub allow_exact: HashSet<String, FxBuildHasher>,
    pub deny_patterns: Vec<Regex>,
    pub domain_count: usize,
}

impl BlockSnapshot {
    pub fn empty() -> Self {
        Self {
            deny_exact: HashSet::with_hasher(FxBuildHasher),
            allow_exact: HashSet::with_hasher(FxBuildHasher),
            deny_patterns: Vec::new(),
            domain_count: 0,
        }
    }
}

impl Default for BlockSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}
