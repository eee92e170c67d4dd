//! Configuration loading from segscan.toml
//!
//! Configuration can be specified in a `segscan.toml` file, discovered by
//! walking up from the current directory. CLI flags override file values.

use segscan_core::MAX_ARRAY_SIZE;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Segscan configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SegscanConfig {
    /// Input array configuration
    #[serde(default)]
    pub input: InputConfig,
    /// Scan and worker configuration
    #[serde(default)]
    pub scan: ScanSettings,
    /// Output configuration
    #[serde(default)]
    pub output: OutputConfig,
}

/// Isolation mode for worker execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum IsolationMode {
    /// Run each worker in a separate OS process over dedicated pipes (default)
    #[default]
    Process,
    /// Run workers as OS threads over per-worker byte channels
    Thread,
    /// Run segments serially in-process (no isolation, useful for debugging)
    InProcess,
}

impl IsolationMode {
    /// Short name matching the config-file spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            IsolationMode::Process => "process",
            IsolationMode::Thread => "thread",
            IsolationMode::InProcess => "in-process",
        }
    }
}

impl std::str::FromStr for IsolationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "process" => Ok(IsolationMode::Process),
            "thread" => Ok(IsolationMode::Thread),
            "in-process" | "inprocess" => Ok(IsolationMode::InProcess),
            other => Err(format!("unknown isolation mode: {other}")),
        }
    }
}

/// Input array configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Array length
    #[serde(default = "default_length")]
    pub length: usize,
    /// Path of the generated/loaded input file
    #[serde(default = "default_input_path")]
    pub path: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            length: default_length(),
            path: default_input_path(),
        }
    }
}

fn default_length() -> usize {
    100_000
}
fn default_input_path() -> String {
    "input.txt".to_string()
}

/// Scan and worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSettings {
    /// Number of workers (array partitions)
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Global cap on reported hidden-key findings
    #[serde(default = "default_hidden_cap")]
    pub hidden_cap: usize,
    /// Isolation mode: "process", "thread", or "in-process"
    #[serde(default)]
    pub isolation: IsolationMode,
    /// Per-worker wait for a result record (e.g., "30s", "500ms")
    #[serde(default = "default_worker_timeout")]
    pub worker_timeout: String,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            hidden_cap: default_hidden_cap(),
            isolation: IsolationMode::default(),
            worker_timeout: default_worker_timeout(),
        }
    }
}

fn default_workers() -> usize {
    4
}
fn default_hidden_cap() -> usize {
    10
}
fn default_worker_timeout() -> String {
    "30s".to_string()
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Default output format: "human" or "json"
    #[serde(default = "default_format")]
    pub format: String,
    /// Output file path (stdout when absent)
    #[serde(default)]
    pub path: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            path: None,
        }
    }
}

fn default_format() -> String {
    "human".to_string()
}

/// Fatal configuration errors, caught before any worker is spawned.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("array length must be at least 1")]
    ZeroLength,

    #[error("array length {length} exceeds maximum {max}")]
    LengthTooLarge { length: usize, max: usize },

    #[error("worker count must be at least 1")]
    ZeroWorkers,

    #[error("worker count {workers} exceeds array length {length}")]
    TooManyWorkers { workers: usize, length: usize },

    #[error("hidden-key report cap must be at least 1")]
    ZeroHiddenCap,
}

impl SegscanConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Try to discover and load configuration by walking up from current directory
    pub fn discover() -> Option<Self> {
        let mut dir = std::env::current_dir().ok()?;
        loop {
            let config_path = dir.join("segscan.toml");
            if config_path.exists() {
                return Self::load(&config_path).ok();
            }
            if !dir.pop() {
                break;
            }
        }
        None
    }

    /// Check the run invariants: `1 <= workers <= length <= MAX_ARRAY_SIZE`
    /// and a positive findings cap.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.input.length == 0 {
            return Err(ConfigError::ZeroLength);
        }
        if self.input.length > MAX_ARRAY_SIZE {
            return Err(ConfigError::LengthTooLarge {
                length: self.input.length,
                max: MAX_ARRAY_SIZE,
            });
        }
        if self.scan.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if self.scan.workers > self.input.length {
            return Err(ConfigError::TooManyWorkers {
                workers: self.scan.workers,
                length: self.input.length,
            });
        }
        if self.scan.hidden_cap == 0 {
            return Err(ConfigError::ZeroHiddenCap);
        }
        Ok(())
    }

    /// Parse duration string (e.g., "3s", "500ms", "2m") to nanoseconds
    pub fn parse_duration(s: &str) -> anyhow::Result<u64> {
        let s = s.trim();
        if s.is_empty() {
            return Err(anyhow::anyhow!("Empty duration string"));
        }

        let (num_part, unit_part) = s
            .char_indices()
            .find(|(_, c)| c.is_alphabetic())
            .map(|(i, _)| s.split_at(i))
            .unwrap_or((s, "s"));

        let value: f64 = num_part
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid duration number: {}", num_part))?;

        let multiplier: u64 = match unit_part.to_lowercase().as_str() {
            "ns" => 1,
            "us" => 1_000,
            "ms" => 1_000_000,
            "s" | "" => 1_000_000_000,
            "m" | "min" => 60_000_000_000,
            _ => return Err(anyhow::anyhow!("Unknown duration unit: {}", unit_part)),
        };

        Ok((value * multiplier as f64) as u64)
    }
}
