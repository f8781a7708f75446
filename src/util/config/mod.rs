//! memsim configuration system
//!
//! # Configuration hierarchy
//!
//! ```text
//! Priority (high → low):
//! 1. CLI arguments
//! 2. Environment variables (MEMSIM_SIZE, MEMSIM_LOG)
//! 3. Project-level (memsim.toml, or the file given with --config)
//! 4. Default values
//! ```
//!
//! # Usage
//!
//! ```rust
//! use memsim::util::config::SimConfig;
//!
//! let config: SimConfig = toml::from_str("[memory]\nsize = 32").unwrap();
//! assert_eq!(config.memory.size, 32);
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::util::logger::LogLevel;

/// Project-level config file name
pub const PROJECT_CONFIG_FILE: &str = "memsim.toml";

/// Environment variable overriding `memory.size`
pub const ENV_SIZE: &str = "MEMSIM_SIZE";

/// Environment variable overriding `log.level`
pub const ENV_LOG: &str = "MEMSIM_LOG";

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SimConfig {
    /// Simulated memory settings
    #[serde(default)]
    pub memory: MemoryConfig,
    /// Logging settings
    #[serde(default)]
    pub log: LogConfig,
    /// REPL settings
    #[serde(default)]
    pub repl: ReplConfig,
}

/// Simulated memory configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Number of cells, fixed for the manager's lifetime
    #[serde(default = "default_size")]
    pub size: usize,
}

fn default_size() -> usize {
    64
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self { size: 64 }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LogConfig {
    /// Minimum level that is printed
    #[serde(default)]
    pub level: LogLevel,
}

/// REPL configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplConfig {
    /// Prompt string
    #[serde(default = "default_prompt")]
    pub prompt: String,
    /// History file path
    #[serde(default)]
    pub history_file: Option<PathBuf>,
}

fn default_prompt() -> String {
    "mem> ".to_string()
}

impl Default for ReplConfig {
    fn default() -> Self {
        Self {
            prompt: "mem> ".to_string(),
            history_file: None,
        }
    }
}

impl SimConfig {
    /// Apply overrides from a variable lookup (normally `std::env::var`)
    pub fn apply_overrides<F>(
        &mut self,
        lookup: F,
    ) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(size) = lookup(ENV_SIZE) {
            self.memory.size = size
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("{}={} is not a size", ENV_SIZE, size)))?;
        }
        if let Some(level) = lookup(ENV_LOG) {
            self.log.level = level.parse().map_err(ConfigError::Invalid)?;
        }
        Ok(())
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.memory.size == 0 {
            return Err(ConfigError::Invalid(
                "memory.size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::SerializeError)
    }
}

/// Parse configuration from TOML text
pub fn parse_config(content: &str) -> Result<SimConfig, ConfigError> {
    toml::from_str(content).map_err(ConfigError::ParseError)
}

/// Load configuration from a file
pub fn load_config_file(path: &Path) -> Result<SimConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::IoError)?;
    parse_config(&content)
}

/// Load configuration following the hierarchy above (CLI flags excluded)
///
/// An explicit `path` must exist; the project file is optional. The result is
/// not validated, so CLI flags can still replace a bad value; call
/// [`SimConfig::validate`] once they are applied.
pub fn load_config(path: Option<&Path>) -> Result<SimConfig, ConfigError> {
    let mut config = match path {
        Some(path) => load_config_file(path)?,
        None => {
            let project = Path::new(PROJECT_CONFIG_FILE);
            if project.exists() {
                load_config_file(project)?
            } else {
                SimConfig::default()
            }
        }
    };

    config.apply_overrides(|key| std::env::var(key).ok())?;
    Ok(config)
}

/// Configuration errors
#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    ParseError(toml::de::Error),
    SerializeError(toml::ser::Error),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::ParseError(e) => write!(f, "Config parse error: {}", e),
            ConfigError::SerializeError(e) => write!(f, "Config serialize error: {}", e),
            ConfigError::Invalid(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}
