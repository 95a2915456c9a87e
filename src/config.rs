//! Loader configuration
//!
//! Plain serde structs with per-field defaults, loadable from a JSON file.
//! Every field is optional in the file; missing keys fall back to the
//! defaults below, so a partial config is always valid.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

fn default_max_concurrent() -> usize {
    3
}
fn default_max_queue_size() -> usize {
    50
}
fn default_cache_capacity() -> usize {
    100
}
fn default_max_retries() -> u32 {
    3
}

/// Scheduler and cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Initial in-flight budget. The adaptive controller moves it at runtime.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Pending queue bound; overflow evicts the lowest-priority entry.
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,
    /// Cache capacity in entries.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    /// Automatic re-submissions after a transient fetch failure.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub adaptive: AdaptiveConfig,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            max_queue_size: default_max_queue_size(),
            cache_capacity: default_cache_capacity(),
            max_retries: default_max_retries(),
            adaptive: AdaptiveConfig::default(),
        }
    }
}

fn default_interval_secs() -> f32 {
    5.0
}
fn default_low_mbps() -> f64 {
    2.0
}
fn default_high_mbps() -> f64 {
    6.0
}
fn default_low_perf() -> f64 {
    50.0
}
fn default_high_perf() -> f64 {
    75.0
}
fn default_min_concurrent() -> usize {
    1
}
fn default_max_budget() -> usize {
    10
}

/// Adaptive concurrency controller settings.
///
/// Bandwidth is measured in Mbps over all completed fetches; device
/// performance is the inverse of the average frame time reported since the
/// last evaluation (so 60 fps reads as 60.0).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveConfig {
    /// Seconds between budget evaluations.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: f32,
    /// Below this bandwidth the budget shrinks.
    #[serde(default = "default_low_mbps")]
    pub low_mbps: f64,
    /// Above this bandwidth the budget may grow.
    #[serde(default = "default_high_mbps")]
    pub high_mbps: f64,
    /// Below this frame rate the budget shrinks.
    #[serde(default = "default_low_perf")]
    pub low_perf: f64,
    /// Above this frame rate the budget may grow.
    #[serde(default = "default_high_perf")]
    pub high_perf: f64,
    /// Hard floor for the in-flight budget.
    #[serde(default = "default_min_concurrent")]
    pub min_concurrent: usize,
    /// Hard ceiling for the in-flight budget.
    #[serde(default = "default_max_budget")]
    pub max_budget: usize,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            low_mbps: default_low_mbps(),
            high_mbps: default_high_mbps(),
            low_perf: default_low_perf(),
            high_perf: default_high_perf(),
            min_concurrent: default_min_concurrent(),
            max_budget: default_max_budget(),
        }
    }
}

impl LoaderConfig {
    /// Load from a JSON file.
    pub fn load(path: &Path) -> Result<Self, String> {
        let text = fs::read_to_string(path).map_err(|e| e.to_string())?;
        serde_json::from_str(&text).map_err(|e| e.to_string())
    }

    /// Save as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let text = serde_json::to_string_pretty(self).map_err(|e| e.to_string())?;
        fs::write(path, text).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test: defaults
    /// Validates: documented default values
    #[test]
    fn test_defaults() {
        let cfg = LoaderConfig::default();
        assert_eq!(cfg.max_concurrent, 3);
        assert_eq!(cfg.max_queue_size, 50);
        assert_eq!(cfg.cache_capacity, 100);
        assert_eq!(cfg.max_retries, 3);
        assert_eq!(cfg.adaptive.min_concurrent, 1);
        assert_eq!(cfg.adaptive.max_budget, 10);
    }

    /// Test: partial JSON
    /// Validates: missing keys fall back to defaults
    #[test]
    fn test_partial_json() {
        let cfg: LoaderConfig =
            serde_json::from_str(r#"{"max_concurrent": 5, "adaptive": {"high_mbps": 8.0}}"#)
                .unwrap();
        assert_eq!(cfg.max_concurrent, 5);
        assert_eq!(cfg.max_queue_size, 50);
        assert!((cfg.adaptive.high_mbps - 8.0).abs() < f64::EPSILON);
        assert!((cfg.adaptive.low_mbps - 2.0).abs() < f64::EPSILON);
    }

    /// Test: round-trip through a file
    /// Validates: save/load preserves values
    #[test]
    fn test_save_load() {
        let path = std::env::temp_dir().join(format!("galleria-cfg-{}.json", std::process::id()));
        let mut cfg = LoaderConfig::default();
        cfg.max_concurrent = 7;
        cfg.save(&path).unwrap();
        let loaded = LoaderConfig::load(&path).unwrap();
        assert_eq!(loaded.max_concurrent, 7);
        std::fs::remove_file(&path).ok();
    }
}
