//! Monitor configuration stored as TOML.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Monitor configuration (TOML).
///
/// Missing fields default to values suitable for a local dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MonitorConfig {
    /// Bounded capacity of the ingestion command queue.
    pub queue_capacity: usize,

    pub feed: FeedConfig,

    pub reconnect: ReconnectConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FeedConfig {
    /// How often the notification feed is polled for new lines.
    pub poll_interval_ms: u64,
}

/// Transport retry policy: bounded attempts at a fixed interval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReconnectConfig {
    pub max_attempts: u32,
    pub interval_ms: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            interval_ms: 2_000,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            feed: FeedConfig::default(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl FeedConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl ReconnectConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl MonitorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(anyhow!("queue_capacity must be > 0"));
        }
        if self.feed.poll_interval_ms == 0 {
            return Err(anyhow!("feed.poll_interval_ms must be > 0"));
        }
        if self.reconnect.interval_ms == 0 {
            return Err(anyhow!("reconnect.interval_ms must be > 0"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `MonitorConfig::default()`.
pub fn load_config(path: &Path) -> Result<MonitorConfig> {
    if !path.exists() {
        let cfg = MonitorConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: MonitorConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &MonitorConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, buf).with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
