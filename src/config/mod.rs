//! Configuration system (layered: code > env > config file > defaults).

use std::path::{Path, PathBuf};
use std::time::Duration;

use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::error::LoopError;

const DEFAULT_MAX_STEPS: usize = 12;
const DEFAULT_HISTORY_CAPACITY: usize = 12;
const DEFAULT_STREAM_IDLE_TIMEOUT_MS: u64 = 120_000;

const CONFIG_PATH_ENV: &str = "TOOLLOOP_CONFIG";
const MAX_STEPS_ENV: &str = "TOOLLOOP_MAX_STEPS";
const HISTORY_CAPACITY_ENV: &str = "TOOLLOOP_HISTORY_CAPACITY";
const STREAMING_ENV: &str = "TOOLLOOP_STREAMING";
const TOOL_STREAMING_ENV: &str = "TOOLLOOP_TOOL_STREAMING";
const STREAM_IDLE_TIMEOUT_ENV: &str = "TOOLLOOP_STREAM_IDLE_TIMEOUT_MS";

/// Settings for one loop graph.
///
/// Resolution order, lowest first:
/// 1. Built-in defaults
/// 2. TOML file (`$TOOLLOOP_CONFIG`, else `<config dir>/toolloop/config.toml`)
/// 3. `TOOLLOOP_*` environment variables (a `.env` file is honored)
/// 4. Values set in code through the builder or struct fields
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Upper bound on step executions per run.
    #[builder(default = DEFAULT_MAX_STEPS)]
    pub max_steps: usize,
    /// Initial history capacity.
    #[builder(default = DEFAULT_HISTORY_CAPACITY)]
    pub history_capacity: usize,
    /// Stream model turns instead of generating whole messages.
    #[builder(default = true)]
    pub streaming: bool,
    /// Stream tool results instead of invoking tools for whole messages.
    #[builder(default = false)]
    pub tool_streaming: bool,
    /// Longest wait for the next chunk of a stream; 0 waits forever.
    #[builder(default = DEFAULT_STREAM_IDLE_TIMEOUT_MS)]
    pub stream_idle_timeout_ms: u64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            streaming: true,
            tool_streaming: false,
            stream_idle_timeout_ms: DEFAULT_STREAM_IDLE_TIMEOUT_MS,
        }
    }
}

impl LoopConfig {
    /// Load every layer: defaults, config file, environment.
    pub fn load() -> Result<Self, LoopError> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        let mut config = match config_file_path() {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env_from(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Defaults overlaid with environment variables only.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let mut config = Self::default();
        config.apply_env_from(|key| std::env::var(key).ok());
        config
    }

    /// Read a TOML file. A missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self, LoopError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => return Err(err.into()),
        };
        Self::from_toml_str(&raw).map_err(|e| match e {
            LoopError::Configuration(message) => {
                LoopError::Configuration(format!("{}: {message}", path.display()))
            }
            other => other,
        })
    }

    /// Parse TOML; absent keys keep their defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self, LoopError> {
        toml::from_str(raw).map_err(|e| LoopError::Configuration(e.to_string()))
    }

    /// Overlay values from `lookup`, keyed by environment variable name.
    ///
    /// Step counts and capacities must be positive integers and booleans
    /// accept `true/false/1/0/yes/no/on/off`; anything else is ignored.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(value) = lookup(MAX_STEPS_ENV).and_then(|v| parse_positive_usize(&v)) {
            self.max_steps = value;
        }
        if let Some(value) = lookup(HISTORY_CAPACITY_ENV).and_then(|v| parse_positive_usize(&v)) {
            self.history_capacity = value;
        }

        let flags = [
            (STREAMING_ENV, &mut self.streaming),
            (TOOL_STREAMING_ENV, &mut self.tool_streaming),
        ];
        for (env_var, field) in flags {
            if let Some(value) = lookup(env_var).and_then(|v| parse_bool(&v)) {
                *field = value;
            }
        }

        if let Some(value) = lookup(STREAM_IDLE_TIMEOUT_ENV).and_then(|v| v.trim().parse().ok()) {
            self.stream_idle_timeout_ms = value;
        }
    }

    /// Reject settings no run could succeed with.
    pub fn validate(&self) -> Result<(), LoopError> {
        if self.max_steps == 0 {
            return Err(LoopError::Configuration(
                "max_steps must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Idle timeout for stream reads, `None` when disabled.
    pub fn stream_idle_timeout(&self) -> Option<Duration> {
        (self.stream_idle_timeout_ms > 0).then(|| Duration::from_millis(self.stream_idle_timeout_ms))
    }
}

/// Where [`LoopConfig::load`] looks for its file.
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    directories::ProjectDirs::from("", "", "toolloop")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

fn parse_positive_usize(value: &str) -> Option<usize> {
    let parsed = value.trim().parse::<usize>().ok()?;
    if parsed == 0 {
        None
    } else {
        Some(parsed)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
