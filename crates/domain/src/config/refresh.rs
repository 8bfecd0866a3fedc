use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    #[serde(default = "default_hit_window_s")]
    pub hit_window_s: u64,
    #[serde(default = "default_hot_threshold")]
    pub hot_threshold: u64,
    #[serde(default = "default_hit_sample_rate")]
    pub hit_count_sample_rate: f64,
    #[serde(default = "default_lock_ttl_s")]
    pub lock_ttl_s: u64,
    #[serde(default = "default_max_inflight")]
    pub max_inflight: usize,
    #[serde(default = "default_sweep_interval_s")]
    pub sweep_interval_s: u64,
    #[serde(default = "default_sweep_window_s")]
    pub sweep_window_s: i64,
    #[serde(default = "default_sweep_min_hits")]
    pub sweep_min_hits: u64,
    #[serde(default = "default_sweep_hit_window_s")]
    pub sweep_hit_window_s: u64,
}

fn default_hit_window_s() -> u64 {
    60
}
fn default_hot_threshold() -> u64 {
    20
}
fn default_hit_sample_rate() -> f64 {
    1.0
}
fn default_lock_ttl_s() -> u64 {
    10
}
fn default_max_inflight() -> usize {
    50
}
fn default_sweep_interval_s() -> u64 {
    15
}
fn default_sweep_window_s() -> i64 {
    120
}
fn default_sweep_min_hits() -> u64 {
    1
}
fn default_sweep_hit_window_s() -> u64 {
    7 * 24 * 3600
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            hit_window_s: default_hit_window_s(),
            hot_threshold: default_hot_threshold(),
            hit_count_sample_rate: default_hit_sample_rate(),
            lock_ttl_s: default_lock_ttl_s(),
            max_inflight: default_max_inflight(),
            sweep_interval_s: default_sweep_interval_s(),
            sweep_window_s: default_sweep_window_s(),
            sweep_min_hits: default_sweep_min_hits(),
            sweep_hit_window_s: default_sweep_hit_window_s(),
        }
    }
}
