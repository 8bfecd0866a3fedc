use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Udp,
    Tcp,
    Tls,
    Https,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolverStrategy {
    Failover,
    LoadBalance,
    Weighted,
}

/// Static configuration for one upstream, as read from config. Runtime
/// health state (failure count, EWMA, next-retry-time) lives alongside this
/// in the infrastructure pool, not here, since it mutates under concurrent
/// access and domain types stay plain data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamDescriptor {
    pub name: String,
    pub address: String,
    pub protocol: Protocol,
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_weight() -> u32 {
    1
}

impl fmt::Display for UpstreamDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({} {:?})", self.name, self.address, self.protocol)
    }
}

/// Error classification returned by an upstream client exchange, per §6.4's
/// client contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamErrorKind {
    Timeout,
    Refused,
    TlsHandshake,
    Protocol,
    Io,
}
