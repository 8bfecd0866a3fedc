pub mod blocklist;
pub mod cache;
pub mod listen;
pub mod logging;
pub mod refresh;
pub mod response;
pub mod upstream;

pub use blocklist::BlocklistConfig;
pub use cache::CacheConfig;
pub use listen::ListenConfig;
pub use logging::LoggingConfig;
pub use refresh::RefreshConfig;
pub use response::ResponseConfig;
pub use upstream::UpstreamsConfig;

use crate::local_record::LocalRecord;
use serde::{Deserialize, Serialize};

/// Root configuration value the pipeline reads (§6.3). Parsing the TOML
/// document itself, hot-reload subscription, and validation-error reporting
/// back to an operator are the external config-store collaborator's job;
/// this type is the pure value it produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub listen: Vec<ListenConfig>,
    pub upstreams: UpstreamsConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub response: ResponseConfig,
    #[serde(default)]
    pub blocklist: BlocklistConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub local_records: Vec<LocalRecord>,
    #[serde(default = "default_instance_id")]
    pub instance_id: String,
    #[serde(default = "default_read_timeout_s")]
    pub read_timeout_s: u64,
}

fn default_instance_id() -> String {
    // Placeholder; the cli composition root overrides this with a randomly
    // generated id at startup via `Config::with_instance_id`.
    format!("sentinel-dns-{}", std::process::id())
}

fn default_read_timeout_s() -> u64 {
    5
}

impl Config {
    pub fn from_str(s: &str) -> Result<Self, crate::DomainError> {
        toml::from_str(s).map_err(|e| crate::DomainError::ConfigMissing(e.to_string()))
    }

    pub fn with_instance_id(mut self, id: impl Into<String>) -> Self {
        self.instance_id = id.into();
        self
    }

    /// Synchronous structural validation beyond what serde defaults cover.
    pub fn validate(&self) -> Result<(), crate::DomainError> {
        if self.upstreams.servers.is_empty() {
            return Err(crate::DomainError::ConfigMissing(
                "at least one upstream must be configured".into(),
            ));
        }
        if self.listen.is_empty() {
            return Err(crate::DomainError::ConfigMissing(
                "at least one listener must be configured".into(),
            ));
        }
        if self.cache.min_ttl > self.cache.max_ttl {
            return Err(crate::DomainError::ConfigMissing(
                "cache.min_ttl must be <= cache.max_ttl".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_toml_parses_with_defaults() {
        let toml = r#"
            [upstreams]
            servers = [{ name = "cloudflare", address = "1.1.1.1:53", protocol = "udp" }]

            [[listen]]
            address = "0.0.0.0:53"
            protocol = "udp"
        "#;
        let cfg = Config::from_str(toml).expect("parses");
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.cache.min_ttl, 30);
        assert_eq!(cfg.refresh.hot_threshold, 20);
    }

    #[test]
    fn rejects_empty_upstreams() {
        let toml = r#"
            upstreams = { servers = [] }
            [[listen]]
            address = "0.0.0.0:53"
            protocol = "udp"
        "#;
        let cfg = Config::from_str(toml).expect("parses");
        assert!(cfg.validate().is_err());
    }
}
