//! Application settings and configuration management

use crate::error::{AppError, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Generation backend configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// API key override; `GEMINI_API_KEY` is used when absent
    #[serde(default)]
    pub api_key: Option<String>,
    /// Whether the configured key already grants elevated quota
    #[serde(default)]
    pub elevated_quota: bool,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_quota_cooldown")]
    pub quota_cooldown_ms: u64,
    #[serde(default = "default_quota_retries")]
    pub quota_max_retries: u32,
}

fn default_model() -> String {
    "gemini-2.5-flash-image".to_string()
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_request_timeout() -> u64 {
    120000 // 2 minutes
}

fn default_quota_cooldown() -> u64 {
    30000
}

fn default_quota_retries() -> u32 {
    2
}

/// Queue pacing configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    /// Inter-item delay when the active credential grants elevated quota
    #[serde(default = "default_elevated_delay")]
    pub elevated_delay_ms: u64,
    /// Inter-item delay at the standard (free) tier
    #[serde(default = "default_standard_delay")]
    pub standard_delay_ms: u64,
}

fn default_elevated_delay() -> u64 {
    5000
}

fn default_standard_delay() -> u64 {
    45000
}

impl QueueConfig {
    pub fn elevated_delay(&self) -> Duration {
        Duration::from_millis(self.elevated_delay_ms)
    }

    pub fn standard_delay(&self) -> Duration {
        Duration::from_millis(self.standard_delay_ms)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Settings {
    /// Load settings from configuration files and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/default.toml")
    }

    /// Load settings from a specific configuration file path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port() as i64)?
            .set_default("generation.model", default_model())?
            .set_default("generation.base_url", default_base_url())?
            .set_default("queue.elevated_delay_ms", default_elevated_delay() as i64)?
            .set_default("queue.standard_delay_ms", default_standard_delay() as i64)?
            .add_source(File::with_name(path.as_ref().to_str().unwrap_or("config/default")).required(false))
            // Override with environment variables (prefixed with STUDIO_)
            .add_source(
                Environment::with_prefix("STUDIO")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        Ok(settings)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(AppError::Config(config::ConfigError::Message(
                "Server port cannot be 0".to_string(),
            )));
        }

        if self.generation.model.is_empty() {
            return Err(AppError::Config(config::ConfigError::Message(
                "Generation model cannot be empty".to_string(),
            )));
        }

        if self.generation.base_url.is_empty() {
            return Err(AppError::Config(config::ConfigError::Message(
                "Generation base URL cannot be empty".to_string(),
            )));
        }

        if self.queue.standard_delay_ms < self.queue.elevated_delay_ms {
            return Err(AppError::Config(config::ConfigError::Message(
                "Standard-tier delay cannot be shorter than the elevated-tier delay".to_string(),
            )));
        }

        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            generation: GenerationConfig::default(),
            queue: QueueConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_base_url(),
            api_key: None,
            elevated_quota: false,
            request_timeout_ms: default_request_timeout(),
            quota_cooldown_ms: default_quota_cooldown(),
            quota_max_retries: default_quota_retries(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            elevated_delay_ms: default_elevated_delay(),
            standard_delay_ms: default_standard_delay(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}
