use crate::upstream::{ResolverStrategy, UpstreamDescriptor};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamsConfig {
    pub servers: Vec<UpstreamDescriptor>,
    #[serde(default = "default_strategy")]
    pub resolver_strategy: ResolverStrategy,
    #[serde(default = "default_upstream_backoff_s")]
    pub upstream_backoff_s: u64,
    #[serde(default = "default_upstream_timeout_ms")]
    pub upstream_timeout_ms: u64,
}

fn default_strategy() -> ResolverStrategy {
    ResolverStrategy::Failover
}

fn default_upstream_backoff_s() -> u64 {
    30
}

fn default_upstream_timeout_ms() -> u64 {
    2000
}
