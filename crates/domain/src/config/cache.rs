use crate::cache_entry::TtlPolicy;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_min_ttl")]
    pub min_ttl: u32,
    #[serde(default = "default_max_ttl")]
    pub max_ttl: u32,
    #[serde(default = "default_negative_ttl")]
    pub negative_ttl: u32,
    #[serde(default = "default_servfail_backoff")]
    pub servfail_backoff: u32,
    #[serde(default)]
    pub respect_source_ttl: bool,
    #[serde(default = "default_l0_size")]
    pub l0_size: usize,
    #[serde(default = "default_stale_extension")]
    pub stale_extension_s: u32,
    #[serde(default = "default_true")]
    pub serve_stale_enabled: bool,
    #[serde(default)]
    pub redis_url: Option<String>,
}

fn default_min_ttl() -> u32 {
    30
}
fn default_max_ttl() -> u32 {
    86_400
}
fn default_negative_ttl() -> u32 {
    300
}
fn default_servfail_backoff() -> u32 {
    60
}
fn default_l0_size() -> usize {
    10_000
}
fn default_stale_extension() -> u32 {
    300
}
fn default_true() -> bool {
    true
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            min_ttl: default_min_ttl(),
            max_ttl: default_max_ttl(),
            negative_ttl: default_negative_ttl(),
            servfail_backoff: default_servfail_backoff(),
            respect_source_ttl: false,
            l0_size: default_l0_size(),
            stale_extension_s: default_stale_extension(),
            serve_stale_enabled: true,
            redis_url: None,
        }
    }
}

impl CacheConfig {
    pub fn ttl_policy(&self, blocked_ttl: u32, local_ttl: u32) -> TtlPolicy {
        TtlPolicy {
            min_ttl: self.min_ttl,
            max_ttl: self.max_ttl,
            negative_ttl: self.negative_ttl,
            servfail_backoff: self.servfail_backoff,
            respect_source_ttl: self.respect_source_ttl,
            stale_extension: self.stale_extension_s,
            serve_stale_enabled: self.serve_stale_enabled,
            blocked_ttl,
            local_ttl,
        }
    }
}
