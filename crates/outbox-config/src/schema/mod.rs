//! Configuration schema definitions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::loader::ConfigLoader;

/// Port used when the reachability target does not name one.
pub const DEFAULT_PROBE_PORT: u16 = 443;

pub(crate) fn default_true() -> bool {
    true
}

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutboxConfig {
    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub reachability: ReachabilityConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Queue engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Delay between the launch hook and the first execution step, in seconds.
    #[serde(default = "default_launch_delay")]
    pub launch_delay_secs: f64,
}

impl QueueConfig {
    /// Launch delay as a [`Duration`]. Negative or non-finite values collapse to zero.
    pub fn launch_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.launch_delay_secs).unwrap_or(Duration::ZERO)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            launch_delay_secs: default_launch_delay(),
        }
    }
}

fn default_launch_delay() -> f64 {
    1.0
}

/// Reachability monitor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReachabilityConfig {
    /// Host (optionally `host:port`) probed for connectivity.
    #[serde(default = "default_target")]
    pub target: String,

    /// Whether a cellular-only link counts as reachable.
    #[serde(default = "default_true")]
    pub allow_cellular: bool,

    /// Seconds between background probes.
    #[serde(default = "default_probe_interval")]
    pub probe_interval_secs: u64,

    /// Connect timeout for a single probe, in milliseconds.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_ms: u64,
}

impl ReachabilityConfig {
    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Target in `host:port` form, with [`DEFAULT_PROBE_PORT`] appended when no port is given.
    pub fn socket_target(&self) -> String {
        match self.explicit_port() {
            Some(_) => self.target.clone(),
            None => format!("{}:{}", self.target, DEFAULT_PROBE_PORT),
        }
    }

    /// The port part of `target`, if it has one.
    pub(crate) fn explicit_port(&self) -> Option<&str> {
        let (host, port) = self.target.rsplit_once(':')?;
        // A bare IPv6 address has colons but no port.
        if host.contains(':') && !host.ends_with(']') {
            return None;
        }
        Some(port)
    }
}

impl Default for ReachabilityConfig {
    fn default() -> Self {
        Self {
            target: default_target(),
            allow_cellular: default_true(),
            probe_interval_secs: default_probe_interval(),
            probe_timeout_ms: default_probe_timeout(),
        }
    }
}

fn default_target() -> String {
    "example.com:443".to_string()
}

fn default_probe_interval() -> u64 {
    30
}

fn default_probe_timeout() -> u64 {
    5000
}

/// Durable store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database holding pending operations.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

impl StorageConfig {
    /// Database path with a leading `~` expanded.
    pub fn resolved_db_path(&self) -> PathBuf {
        PathBuf::from(ConfigLoader::expand_path(&self.db_path.to_string_lossy()))
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".outbox").join("queue.db"))
        .unwrap_or_else(|| PathBuf::from("outbox-queue.db"))
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for rolling daily log files. Console only when unset.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Emit JSON lines instead of human-readable text.
    #[serde(default)]
    pub json: bool,

    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,

    #[serde(default = "default_max_log_files")]
    pub max_log_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_dir: None,
            json: false,
            file_prefix: default_file_prefix(),
            max_log_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_file_prefix() -> String {
    "outbox".to_string()
}

fn default_max_log_files() -> usize {
    30
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
