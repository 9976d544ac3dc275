//! Session configuration.
//!
//! Configuration is loaded from `~/.config/jobterm/config.toml`. Every field
//! has a default, so a missing file or a partial file is fine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::paths;

/// Tunables for one [`Session`](crate::Session).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Maximum number of tracked suspended jobs.
    pub suspended_capacity: usize,

    /// Maximum number of tracked background jobs.
    pub background_capacity: usize,

    /// Readiness timeout for the foreground capture pipe, in milliseconds.
    pub poll_interval_ms: u64,

    /// Readiness timeout for the multiWatch loop, in milliseconds.
    pub watch_poll_ms: u64,

    /// Delay between forking multiWatch commands and tailing their output.
    pub watch_warmup_ms: u64,

    /// Interpreter that receives every stage as `interpreter -c TEXT`.
    pub interpreter: PathBuf,

    /// History file. Relative paths resolve against the session's initial
    /// working directory.
    pub history_file: PathBuf,

    /// Directory for multiWatch capture files.
    pub watch_dir: PathBuf,

    /// Install a SIGINT handler for the duration of a multiWatch run.
    pub trap_watch_interrupt: bool,
}

fn default_interpreter() -> PathBuf {
    let bash = Path::new("/bin/bash");
    if bash.exists() {
        bash.to_path_buf()
    } else {
        PathBuf::from("/bin/sh")
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            suspended_capacity: 10,
            background_capacity: 10,
            poll_interval_ms: 50,
            watch_poll_ms: 100,
            watch_warmup_ms: 1000,
            interpreter: default_interpreter(),
            history_file: PathBuf::from(".jobterm_history.txt"),
            watch_dir: std::env::temp_dir(),
            trap_watch_interrupt: true,
        }
    }
}

impl SessionConfig {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, returns default configuration.
    pub fn load() -> Result<Self, ConfigError> {
        let path = paths::config_file();

        if !path.exists() {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Config tuned for tests: near-zero waits, no signal handler changes.
    pub fn fast() -> Self {
        Self {
            poll_interval_ms: 5,
            watch_poll_ms: 10,
            watch_warmup_ms: 20,
            trap_watch_interrupt: false,
            ..Self::default()
        }
    }

    pub fn with_capacities(mut self, suspended: usize, background: usize) -> Self {
        self.suspended_capacity = suspended;
        self.background_capacity = background;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_watch_poll(mut self, interval: Duration) -> Self {
        self.watch_poll_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_watch_warmup(mut self, delay: Duration) -> Self {
        self.watch_warmup_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_interpreter(mut self, interpreter: impl Into<PathBuf>) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    pub fn with_history_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.history_file = path.into();
        self
    }

    pub fn with_watch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.watch_dir = dir.into();
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn watch_poll(&self) -> Duration {
        Duration::from_millis(self.watch_poll_ms)
    }

    pub fn watch_warmup(&self) -> Duration {
        Duration::from_millis(self.watch_warmup_ms)
    }
}
