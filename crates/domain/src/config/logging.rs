use serde::{Deserialize, Serialize};

/// Ambient logging configuration consumed at process startup (§6.3). The
/// value here only names intent; `tracing-subscriber` initialization is the
/// cli composition root's job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}
