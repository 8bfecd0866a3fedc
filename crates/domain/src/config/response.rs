use serde::{Deserialize, Serialize};

/// How a blocked query is answered: either a synthetic NXDOMAIN, or an A/AAAA
/// sinkhole literal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockedResponse {
    Nxdomain,
    Sinkhole(std::net::IpAddr),
}

impl Default for BlockedResponse {
    fn default() -> Self {
        BlockedResponse::Nxdomain
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseConfig {
    #[serde(default)]
    pub blocked: BlockedResponse,
    #[serde(default = "default_blocked_ttl")]
    pub blocked_ttl: u32,
    #[serde(default = "default_local_ttl")]
    pub local_ttl: u32,
}

fn default_blocked_ttl() -> u32 {
    3600
}

fn default_local_ttl() -> u32 {
    3600
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            blocked: BlockedResponse::default(),
            blocked_ttl: default_blocked_ttl(),
            local_ttl: default_local_ttl(),
        }
    }
}
