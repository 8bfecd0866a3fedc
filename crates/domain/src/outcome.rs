use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal classification of a query, used for both the response and the
/// analytics record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Cached,
    Local,
    Blocked,
    Upstream,
    UpstreamError,
    Servfail,
    Invalid,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Outcome::Cached => "cached",
            Outcome::Local => "local",
            Outcome::Blocked => "blocked",
            Outcome::Upstream => "upstream",
            Outcome::UpstreamError => "upstream_error",
            Outcome::Servfail => "servfail",
            Outcome::Invalid => "invalid",
        };
        f.write_str(s)
    }
}

/// The duration breakdown emitted with every query record, per §4.9.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DurationBreakdown {
    pub cache_lookup_ms: f64,
    pub network_write_ms: f64,
    pub duration_ms: f64,
}

/// One emitted query record, submitted to the analytics sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRecord {
    pub name: String,
    pub qtype: String,
    pub outcome: Outcome,
    pub stale_served: bool,
    pub upstream_addr: Option<String>,
    pub duration: DurationBreakdown,
    pub timestamp: u64,
}
