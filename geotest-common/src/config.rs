//! Configuration loading and credential resolution
//!
//! Resolution order for the config file:
//! 1. Command-line argument (highest priority)
//! 2. `GEOTEST_CONFIG` environment variable
//! 3. `<config_dir>/geotest/geotest.toml`
//! 4. Compiled defaults (a missing file never stops startup)
//!
//! Provider credentials resolve ENV → TOML.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "GEOTEST_CONFIG";

/// Top-level TOML configuration
///
/// Every section is optional; omitted sections and keys take compiled defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub providers: ProviderKeys,
    pub analysis: AnalysisSettings,
}

/// HTTP listener configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5780,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive handed to the tracing EnvFilter (e.g. "info", "geotest_ai=debug")
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Provider API keys as written in TOML (environment variables take precedence)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderKeys {
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub perplexity_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
}

/// Tunables for provider calls, progress reporting and caching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    /// Per-request HTTP timeout
    pub request_timeout_ms: u64,
    /// Total attempts per provider call
    pub max_retries: u32,
    /// Linear backoff unit: attempt N waits N × backoff_base_ms
    pub backoff_base_ms: u64,
    /// Synthetic progress tick interval
    pub progress_tick_ms: u64,
    /// Valid credentials needed before the deployment counts as production-ready
    pub min_ready_providers: usize,
    /// Response cache TTL
    pub cache_ttl_secs: u64,
    /// Scraped content is truncated to this many characters before prompting
    pub content_max_chars: usize,
    /// Seed for mock-mode randomness; unseeded runs draw from entropy
    pub mock_seed: Option<u64>,
    /// Downgrade transport failures to mock results instead of recording a failure
    pub mock_on_transport_error: bool,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            request_timeout_ms: 30_000,
            max_retries: 3,
            backoff_base_ms: 1_000,
            progress_tick_ms: 800,
            min_ready_providers: 2,
            cache_ttl_secs: 300,
            content_max_chars: 5_000,
            mock_seed: None,
            mock_on_transport_error: false,
        }
    }
}

impl AnalysisSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn progress_tick(&self) -> Duration {
        Duration::from_millis(self.progress_tick_ms.max(1))
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

/// Where a resolved credential came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeySource {
    Environment,
    Toml,
}

/// Default config file location for the platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("geotest").join("geotest.toml"))
}

/// Pick the config file to load, if any
///
/// An explicit path (CLI or ENV) is returned even when it does not exist so the
/// caller can warn about it; the platform default is only returned when present.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    default_config_path().filter(|p| p.exists())
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed ({}): {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)?;
    validate(&config)?;
    Ok(config)
}

/// Load configuration with graceful degradation
///
/// A missing file logs a warning and yields defaults. A file that exists but
/// does not parse is an error.
pub fn load_or_default(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    match resolve_config_path(cli_arg) {
        Some(path) if path.exists() => {
            info!("Loading configuration from {}", path.display());
            load_toml_config(&path)
        }
        Some(path) => {
            warn!(
                "Config file {} not found, using compiled defaults",
                path.display()
            );
            Ok(TomlConfig::default())
        }
        None => {
            info!("No config file found, using compiled defaults");
            Ok(TomlConfig::default())
        }
    }
}

fn validate(config: &TomlConfig) -> Result<()> {
    if config.analysis.max_retries == 0 {
        return Err(Error::Config(
            "analysis.max_retries must be at least 1".to_string(),
        ));
    }
    if config.analysis.content_max_chars == 0 {
        return Err(Error::Config(
            "analysis.content_max_chars must be positive".to_string(),
        ));
    }
    Ok(())
}

/// Resolve an API key from ENV → TOML
///
/// Blank values are treated as absent. When both sources carry a key the
/// environment wins and a warning is logged.
pub fn resolve_api_key(env_var: &str, toml_value: Option<&str>) -> Option<(String, KeySource)> {
    let env_key = std::env::var(env_var)
        .ok()
        .filter(|k| !k.trim().is_empty());
    let toml_key = toml_value
        .filter(|k| !k.trim().is_empty())
        .map(str::to_string);

    if env_key.is_some() && toml_key.is_some() {
        warn!(
            "{} found in both environment and TOML config. Using environment (highest priority).",
            env_var
        );
    }

    env_key
        .map(|k| (k, KeySource::Environment))
        .or_else(|| toml_key.map(|k| (k, KeySource::Toml)))
}
