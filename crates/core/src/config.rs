// SPDX-License-Identifier: MIT
// Copyright (c) 2026 spiderd contributors

//! Layered runtime configuration: hard-coded defaults, overridden by
//! `spiderd.toml`, overridden by `SPIDERD_*` environment variables.
//!
//! Recovers the original `RuntimeContext` global-config concept without a
//! process-wide singleton — a [`RuntimeConfig`] value is built once at
//! startup and threaded explicitly through `Manager::new`/the worker's entry
//! point.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("failed to parse config file {path}: {source}")]
    Parse { path: PathBuf, source: toml::de::Error },
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// On-disk shape of `spiderd.toml`. Every field is optional — anything
/// unset falls back to [`RuntimeConfig::default`]'s value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub db_root: Option<PathBuf>,
    pub packages_dir: Option<PathBuf>,
    pub containers_dir: Option<PathBuf>,
    pub watchdog_timeout_secs: Option<u64>,
    pub thread_maximum: Option<usize>,
    pub monitor_poll_ms: Option<u64>,
    pub worker_poll_ms: Option<u64>,
    pub emitted_row_queue_capacity: Option<usize>,
}

/// Fully-resolved configuration used by both `spiderd-daemon` and
/// `spiderd-worker`.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub db_root: PathBuf,
    pub packages_dir: PathBuf,
    pub containers_dir: PathBuf,
    pub watchdog_timeout: Duration,
    pub thread_maximum: usize,
    pub monitor_poll: Duration,
    pub worker_poll: Duration,
    pub emitted_row_queue_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            db_root: PathBuf::from("/var/lib/spiderd"),
            packages_dir: PathBuf::from("/var/lib/spiderd/packages"),
            containers_dir: PathBuf::from("/var/lib/spiderd/containers"),
            watchdog_timeout: Duration::from_secs(60),
            thread_maximum: 16,
            monitor_poll: Duration::from_millis(500),
            worker_poll: Duration::from_millis(500),
            emitted_row_queue_capacity: 100,
        }
    }
}

impl RuntimeConfig {
    /// Load `spiderd.toml` from `path` if it exists (missing file is not an
    /// error — defaults apply), then apply `SPIDERD_*` environment overrides.
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
            let file: ConfigFile = toml::from_str(&contents)
                .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
            config.apply_file(file);
        }

        config.apply_env()?;
        Ok(config)
    }

    fn apply_file(&mut self, file: ConfigFile) {
        if let Some(v) = file.db_root {
            self.db_root = v;
        }
        if let Some(v) = file.packages_dir {
            self.packages_dir = v;
        }
        if let Some(v) = file.containers_dir {
            self.containers_dir = v;
        }
        if let Some(v) = file.watchdog_timeout_secs {
            self.watchdog_timeout = Duration::from_secs(v);
        }
        if let Some(v) = file.thread_maximum {
            self.thread_maximum = v;
        }
        if let Some(v) = file.monitor_poll_ms {
            self.monitor_poll = Duration::from_millis(v);
        }
        if let Some(v) = file.worker_poll_ms {
            self.worker_poll = Duration::from_millis(v);
        }
        if let Some(v) = file.emitted_row_queue_capacity {
            self.emitted_row_queue_capacity = v;
        }
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(v) = std::env::var("SPIDERD_DB_ROOT") {
            self.db_root = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("SPIDERD_PACKAGES_DIR") {
            self.packages_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("SPIDERD_CONTAINERS_DIR") {
            self.containers_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("SPIDERD_WATCHDOG_TIMEOUT_SECS") {
            let secs: u64 = v.parse().map_err(|_| ConfigError::InvalidValue {
                field: "SPIDERD_WATCHDOG_TIMEOUT_SECS",
                reason: format!("{v:?} is not a valid integer"),
            })?;
            self.watchdog_timeout = Duration::from_secs(secs);
        }
        if let Ok(v) = std::env::var("SPIDERD_THREAD_MAXIMUM") {
            self.thread_maximum = v.parse().map_err(|_| ConfigError::InvalidValue {
                field: "SPIDERD_THREAD_MAXIMUM",
                reason: format!("{v:?} is not a valid integer"),
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let config = RuntimeConfig::load(std::path::Path::new("/nonexistent/spiderd.toml")).unwrap();
        assert_eq!(config.thread_maximum, 16);
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spiderd.toml");
        std::fs::write(&path, "thread_maximum = 4\nwatchdog_timeout_secs = 30\n").unwrap();

        let config = RuntimeConfig::load(&path).unwrap();
        assert_eq!(config.thread_maximum, 4);
        assert_eq!(config.watchdog_timeout, Duration::from_secs(30));
    }

    #[test]
    #[serial_test::serial]
    fn env_override_wins_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spiderd.toml");
        std::fs::write(&path, "thread_maximum = 4\n").unwrap();

        std::env::set_var("SPIDERD_THREAD_MAXIMUM", "9");
        let config = RuntimeConfig::load(&path).unwrap();
        std::env::remove_var("SPIDERD_THREAD_MAXIMUM");

        assert_eq!(config.thread_maximum, 9);
    }
}
