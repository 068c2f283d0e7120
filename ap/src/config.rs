//! agentpipe configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Main agentpipe configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Pipeline policy
    pub pipeline: PipelineConfig,

    /// LLM provider configuration
    pub llm: LlmConfig,

    /// HTTP server configuration
    pub server: ServerConfig,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .agentpipe.yml
        let local_config = PathBuf::from(".agentpipe.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/agentpipe/agentpipe.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("agentpipe").join("agentpipe.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is initialized
    ///
    /// Errors are swallowed; the full load reports them once logging is up.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let path = match config_path {
            Some(path) => path.clone(),
            None => {
                let local = PathBuf::from(".agentpipe.yml");
                if local.exists() {
                    local
                } else {
                    dirs::config_dir()?.join("agentpipe").join("agentpipe.yml")
                }
            }
        };
        let content = fs::read_to_string(path).ok()?;
        let config: Self = serde_yaml::from_str(&content).ok()?;
        config.log_level
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Pipeline policy as supplied by the caller
///
/// Values are raw: range checks happen when a coordinator is built from them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Force deterministic (true) or externally-sourced (false) workers; unset
    /// picks externally-sourced only when an API key is available
    pub mock: Option<bool>,

    /// Maximum revision passes sent back from review to analysis
    #[serde(rename = "max-iterations")]
    pub max_iterations: i32,

    /// Minimum review score for approval, in [0, 1]
    #[serde(rename = "approval-threshold")]
    pub approval_threshold: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mock: None,
            max_iterations: 3,
            approval_threshold: 0.6,
        }
    }
}

impl PipelineConfig {
    /// Resolve the worker mode: explicit setting wins, otherwise deterministic
    /// unless a credential is present
    pub fn resolve_mock(&self, credential_present: bool) -> bool {
        debug!(mock = ?self.mock, credential_present, "PipelineConfig::resolve_mock: called");
        self.mock.unwrap_or(!credential_present)
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name (currently only "anthropic" supported)
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: "claude-3-haiku-20240307".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            max_tokens: 512,
            timeout_ms: 60_000,
        }
    }
}

impl LlmConfig {
    /// The API key from the configured environment variable, if set and non-empty
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env).ok().filter(|key| !key.trim().is_empty())
    }

    /// Whether an external-access credential is present in the environment
    pub fn credential_present(&self) -> bool {
        self.api_key().is_some()
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,

    pub port: u16,

    /// Deadline applied around each pipeline run, in milliseconds
    #[serde(rename = "run-timeout-ms")]
    pub run_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            run_timeout_ms: 120_000,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_millis(self.run_timeout_ms)
    }
}
