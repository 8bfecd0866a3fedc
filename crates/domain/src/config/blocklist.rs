use serde::{Deserialize, Serialize};

/// Where the blocklist matcher's rule sets come from. Fetching/parsing the
/// named sources is the external blocklist-builder collaborator's job
/// (§6.4); the core only consumes the resulting snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlocklistConfig {
    #[serde(default)]
    pub deny_sources: Vec<String>,
    #[serde(default)]
    pub allow_sources: Vec<String>,
    #[serde(default = "default_reload_interval_s")]
    pub reload_interval_s: u64,
}

fn default_reload_interval_s() -> u64 {
    3600
}

impl Default for BlocklistConfig {
    fn default() -> Self {
        Self {
            deny_sources: Vec::new(),
            allow_sources: Vec::new(),
            reload_interval_s: default_reload_interval_s(),
        }
    }
}
