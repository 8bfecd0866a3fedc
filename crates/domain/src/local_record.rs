use crate::record_type::RecordType;
use serde::{Deserialize, Serialize};

/// A configured static answer, consulted before the blocklist (§4.9 step 2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: RecordType,
    pub value: String,
    #[serde(default = "default_local_ttl")]
    pub ttl: u32,
}

fn default_local_ttl() -> u32 {
    3600
}

impl LocalRecord {
    pub fn fqdn(&self) -> String {
        self.name.strip_suffix('.').unwrap_or(&self.name).to_ascii_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fqdn_strips_dot_and_lowercases() {
        let rec = LocalRecord {
            name: "Router.Home.".to_string(),
            record_type: RecordType::A,
            value: "192.168.1.1".to_string(),
            ttl: 60,
        };
        assert_eq!(rec.fqdn(), "router.home");
    }
}
