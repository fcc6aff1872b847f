//! Process configuration: a flat `key=value` file loaded once at startup.
//!
//! Unknown keys are ignored and a key whose value fails to parse silently
//! falls back to its default, mirroring the permissive key=value reader
//! this is adapted from. Keys are documented in full alongside the
//! external interface they configure.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{CoreError, Result};

/// Process-wide configuration, loaded once at startup and handed to `Core`
/// by value; nothing here is reloaded at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub total_threads: usize,
    pub total_memory_mb: f64,
    pub total_disk_gb: f64,
    pub enable_cgroup: bool,
    pub cgroup_base_path: String,
    pub monitoring_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            total_threads: 120,
            total_memory_mb: 8192.0,
            total_disk_gb: 100.0,
            enable_cgroup: false,
            cgroup_base_path: "/sys/fs/cgroup/cpu/tenant-core".to_string(),
            monitoring_interval_ms: 1000,
        }
    }
}

impl Config {
    /// Reads and parses a `key=value` file, falling back to defaults for
    /// any key that is absent or unparsable.
    pub fn load_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| CoreError::Configuration(format!("{}: {e}", path.display())))?;
        Ok(Self::load_str(&text))
    }

    /// Parses `key=value` pairs, one per line. Lines without a `=`, blank
    /// lines, and unknown keys are skipped rather than rejected.
    pub fn load_str(text: &str) -> Self {
        let mut config = Config::default();
        for line in text.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();
            if key.is_empty() {
                continue;
            }
            match key {
                "total_threads" => config.total_threads = parse_or_default(key, value, config.total_threads),
                "total_memory_mb" => config.total_memory_mb = parse_or_default(key, value, config.total_memory_mb),
                "total_disk_gb" => config.total_disk_gb = parse_or_default(key, value, config.total_disk_gb),
                "enable_cgroup" => config.enable_cgroup = parse_bool(value, config.enable_cgroup),
                "cgroup_base_path" => config.cgroup_base_path = value.to_string(),
                "monitoring_interval_ms" => {
                    config.monitoring_interval_ms = parse_or_default(key, value, config.monitoring_interval_ms)
                }
                _ => warn!(key, "ignoring unknown configuration key"),
            }
        }
        config
    }
}

fn parse_or_default<T: std::str::FromStr>(key: &str, value: &str, default: T) -> T {
    value.parse().unwrap_or_else(|_| {
        warn!(key, value, "unparsable configuration value, using default");
        default
    })
}

fn parse_bool(value: &str, default: bool) -> bool {
    match value {
        "true" | "1" => true,
        "false" | "0" => false,
        _ => default,
    }
}
