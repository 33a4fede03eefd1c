//! Configuration System
//!
//! Provides hierarchical configuration loading from:
//! - config.toml (default configuration)
//! - config.local.toml (git-ignored local overrides)
//! - Environment variables (RAM_* prefix)
//!
//! ## Example
//!
//! ```toml
//! # config.toml
//! [runtime]
//! jobs = 4
//!
//! [io]
//! fact_dir = "."
//! output_dir = "."
//! delimiter = "\t"
//! ```
//!
//! Environment variable overrides:
//! ```bash
//! RAM_RUNTIME__JOBS=8
//! RAM_IO__FACT_DIR=/data/facts
//! ```

use figment::{providers::{Env, Format, Toml}, Figment};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Provenance instrumentation mode (`--provenance`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProvenanceMode {
    #[default]
    None,
    Explain,
    SubtreeHeights,
    Explore,
}

impl std::str::FromStr for ProvenanceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(ProvenanceMode::None),
            "explain" => Ok(ProvenanceMode::Explain),
            "subtreeHeights" => Ok(ProvenanceMode::SubtreeHeights),
            "explore" => Ok(ProvenanceMode::Explore),
            other => Err(format!("unknown provenance mode `{other}`")),
        }
    }
}

/// Main configuration struct
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub io: IoConfig,
    #[serde(default)]
    pub profile: ProfileConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub library_dirs: Vec<PathBuf>,
    #[serde(default)]
    pub libraries: Vec<String>,
    #[serde(default)]
    pub provenance: ProvenanceMode,
}

/// Worker pool / scheduling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Worker pool size for parallel scan partitioning.
    /// 0 means "implementation-chosen" (`num_cpus::get()`).
    #[serde(default)]
    pub jobs: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig { jobs: 0 }
    }
}

/// Fact/output directory and default IO settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IoConfig {
    #[serde(default = "default_dot")]
    pub fact_dir: PathBuf,
    #[serde(default = "default_dot")]
    pub output_dir: PathBuf,
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
}

fn default_dot() -> PathBuf {
    PathBuf::from(".")
}

fn default_delimiter() -> String {
    "\t".to_string()
}

impl Default for IoConfig {
    fn default() -> Self {
        IoConfig {
            fact_dir: default_dot(),
            output_dir: default_dot(),
            delimiter: default_delimiter(),
        }
    }
}

/// Profiler output settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileConfig {
    pub path: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). Overridden to `debug` by `--verbose`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// Merges in order:
    /// 1. config.toml (base configuration)
    /// 2. config.local.toml (local overrides, git-ignored)
    /// 3. Environment variables (RAM_* prefix)
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file("config.toml"))
            .merge(Toml::file("config.local.toml"))
            .merge(Env::prefixed("RAM_").split("__"))
            .extract()
    }

    /// Load configuration from a specific file path
    pub fn from_file(path: &str) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("RAM_").split("__"))
            .extract()
    }

    /// Effective worker count: `jobs` if set, else the number of logical CPUs.
    pub fn effective_jobs(&self) -> usize {
        if self.runtime.jobs == 0 {
            num_cpus::get()
        } else {
            self.runtime.jobs
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            runtime: RuntimeConfig::default(),
            io: IoConfig::default(),
            profile: ProfileConfig::default(),
            logging: LoggingConfig::default(),
            library_dirs: Vec::new(),
            libraries: Vec::new(),
            provenance: ProvenanceMode::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_io_defaults() {
        let config = Config::default();
        assert_eq!(config.io.fact_dir, PathBuf::from("."));
        assert_eq!(config.io.delimiter, "\t");
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn effective_jobs_falls_back_to_cpu_count() {
        let config = Config::default();
        assert!(config.effective_jobs() >= 1);
    }

    #[test]
    fn config_round_trips_through_toml() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        assert!(toml_str.contains("[runtime]"));
        assert!(toml_str.contains("[io]"));
    }

    #[test]
    fn provenance_mode_parses_all_variants() {
        use std::str::FromStr;
        assert_eq!(ProvenanceMode::from_str("none"), Ok(ProvenanceMode::None));
        assert_eq!(ProvenanceMode::from_str("explain"), Ok(ProvenanceMode::Explain));
        assert_eq!(
            ProvenanceMode::from_str("subtreeHeights"),
            Ok(ProvenanceMode::SubtreeHeights)
        );
        assert_eq!(ProvenanceMode::from_str("explore"), Ok(ProvenanceMode::Explore));
        assert!(ProvenanceMode::from_str("bogus").is_err());
    }
}
