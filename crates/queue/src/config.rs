use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tasklane_core::config::{env_opt, env_parse, parse_toml, read_toml_file};
use tasklane_core::CoreError;

/// Task queue configuration, typically parsed from TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Worker thread name, also used as the `queue` log field.
    #[serde(default = "default_name")]
    pub name: String,
    /// Upper bound on a single idle wait, in milliseconds.
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,
    /// How long `send_task` blocks before logging a warning.
    #[serde(default = "default_send_task_warn_after_ms")]
    pub send_task_warn_after_ms: u64,
    /// Worker stack size in bytes. `None` uses the platform default.
    #[serde(default)]
    pub stack_size: Option<usize>,
}

fn default_name() -> String { "TaskQueue".into() }
fn default_max_wait_ms() -> u64 { 1000 }
fn default_send_task_warn_after_ms() -> u64 { 10_000 }

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            max_wait_ms: default_max_wait_ms(),
            send_task_warn_after_ms: default_send_task_warn_after_ms(),
            stack_size: None,
        }
    }
}

impl QueueConfig {
    /// Parse config from a TOML string, then apply env overrides and validate.
    pub fn from_toml(toml_str: &str) -> Result<Self, CoreError> {
        let mut config: Self = parse_toml(toml_str)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load config from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let mut config: Self = read_toml_file(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Apply environment variable overrides.
    ///
    /// - `TASKLANE_QUEUE_NAME` -> `name`
    /// - `TASKLANE_QUEUE_MAX_WAIT_MS` -> `max_wait_ms`
    /// - `TASKLANE_QUEUE_SEND_WARN_MS` -> `send_task_warn_after_ms`
    /// - `TASKLANE_QUEUE_STACK_SIZE` -> `stack_size`
    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = env_opt("TASKLANE_QUEUE_NAME") {
            self.name = v;
        }
        if let Some(v) = env_parse("TASKLANE_QUEUE_MAX_WAIT_MS") {
            self.max_wait_ms = v;
        }
        if let Some(v) = env_parse("TASKLANE_QUEUE_SEND_WARN_MS") {
            self.send_task_warn_after_ms = v;
        }
        if let Some(v) = env_parse("TASKLANE_QUEUE_STACK_SIZE") {
            self.stack_size = Some(v);
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.name.is_empty() {
            return Err(invalid("name", "must not be empty"));
        }
        if self.name.contains('\0') {
            return Err(invalid("name", "must not contain NUL bytes"));
        }
        if self.max_wait_ms == 0 {
            return Err(invalid("max_wait_ms", "must be greater than zero"));
        }
        if self.stack_size == Some(0) {
            return Err(invalid("stack_size", "must be greater than zero"));
        }
        Ok(())
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }

    pub fn send_task_warn_after(&self) -> Duration {
        Duration::from_millis(self.send_task_warn_after_ms)
    }
}

fn invalid(key: &str, reason: &str) -> CoreError {
    CoreError::InvalidConfig {
        key: key.into(),
        reason: reason.into(),
    }
}
