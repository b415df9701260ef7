//! Client configuration loaded from YAML
//!
//! ```yaml
//! endpoint: wss://westus.stt.speech.microsoft.com/speech/recognition/interactive/cognitiveservices/v1
//! language: en-US
//! format: detailed
//! stream_buffer_size: 4096
//! log_level: info
//! device:
//!   manufacturer: Acme
//!   model: Kiosk
//!   version: "2"
//! ```
//!
//! The subscription key never lives in the file; it is read from
//! `SPEECH_SUBSCRIPTION_KEY`.

use crate::core::context::ContextOptions;
use crate::core::logging::{LogConfig, LogLevel};
use crate::protocol::constants::{DEFAULT_HANDSHAKE_HEADER_BUDGET, DEFAULT_STREAM_BUFFER_SIZE};
use crate::protocol::speech_config::DeviceInfo;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::info;

pub const SUBSCRIPTION_KEY_ENV: &str = "SPEECH_SUBSCRIPTION_KEY";
pub const ENDPOINT_ENV: &str = "SPEECH_ENDPOINT";

/// Header carrying the subscription key on the upgrade request
pub const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarMissing(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Shape of recognition results requested from the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResultFormat {
    /// One display text per phrase
    #[default]
    Simple,
    /// NBest alternatives with confidence
    Detailed,
}

impl ResultFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultFormat::Simple => "simple",
            ResultFormat::Detailed => "detailed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// WebSocket endpoint, `ws://` or `wss://`
    pub endpoint: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub format: ResultFormat,
    #[serde(default = "default_stream_buffer_size")]
    pub stream_buffer_size: usize,
    #[serde(default = "default_handshake_header_budget")]
    pub handshake_header_budget: usize,
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub device: DeviceInfo,

    /// Subscription key from the environment (not in YAML)
    #[serde(skip)]
    pub subscription_key: Option<String>,
}

impl SpeechConfig {
    /// Load configuration from YAML file
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        let yaml_content = std::fs::read_to_string(config_path)?;
        let mut config: SpeechConfig = serde_yaml::from_str(&yaml_content)?;

        if let Ok(endpoint) = std::env::var(ENDPOINT_ENV) {
            info!("Overriding endpoint from environment variable");
            config.endpoint = endpoint;
        }
        config.subscription_key = std::env::var(SUBSCRIPTION_KEY_ENV)
            .ok()
            .filter(|key| !key.is_empty());

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !(self.endpoint.starts_with("ws://") || self.endpoint.starts_with("wss://")) {
            return Err(ConfigError::ValidationError(
                "endpoint must start with ws:// or wss://".to_string(),
            ));
        }

        if self.language.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "language must not be empty".to_string(),
            ));
        }

        if self.stream_buffer_size == 0 {
            return Err(ConfigError::ValidationError(
                "stream_buffer_size must be greater than 0".to_string(),
            ));
        }

        if self.handshake_header_budget == 0 {
            return Err(ConfigError::ValidationError(
                "handshake_header_budget must be greater than 0".to_string(),
            ));
        }

        if self.log_level.parse::<LogLevel>().is_err() {
            let valid_levels = ["off", "error", "warn", "info", "debug", "trace"];
            return Err(ConfigError::ValidationError(format!(
                "log_level must be one of: {}",
                valid_levels.join(", ")
            )));
        }

        Ok(())
    }

    /// Subscription key or an error naming the variable to set
    pub fn require_subscription_key(&self) -> Result<&str> {
        self.subscription_key
            .as_deref()
            .ok_or_else(|| ConfigError::EnvVarMissing(SUBSCRIPTION_KEY_ENV.to_string()))
    }

    /// `Name: Value` line for the upgrade request, if a key is configured
    pub fn authentication_header(&self) -> Option<String> {
        self.subscription_key
            .as_ref()
            .map(|key| format!("{}: {}", SUBSCRIPTION_KEY_HEADER, key))
    }

    /// Endpoint with `language` and `format` query parameters added unless
    /// the endpoint already carries them
    pub fn endpoint_uri(&self) -> String {
        let mut uri = self.endpoint.clone();
        let has_param = |uri: &str, name: &str| {
            uri.split_once('?')
                .map(|(_, query)| {
                    query
                        .split('&')
                        .any(|pair| pair.split('=').next() == Some(name))
                })
                .unwrap_or(false)
        };

        for (name, value) in [("language", self.language.as_str()), ("format", self.format.as_str())] {
            if !has_param(&uri, name) {
                uri.push(if uri.contains('?') { '&' } else { '?' });
                uri.push_str(name);
                uri.push('=');
                uri.push_str(value);
            }
        }
        uri
    }

    pub fn log_level(&self) -> LogLevel {
        self.log_level.parse().unwrap_or_default()
    }

    pub fn context_options(&self) -> ContextOptions {
        ContextOptions {
            log: LogConfig::new(self.log_level()),
            stream_buffer_size: self.stream_buffer_size,
            handshake_header_budget: self.handshake_header_budget,
            device: self.device.clone(),
        }
    }

    /// Log configuration summary
    pub fn log(&self) {
        info!("Configuration loaded:");
        info!("  Endpoint: {}", self.endpoint);
        info!("  Language: {}", self.language);
        info!("  Format: {}", self.format.as_str());
        info!("  Stream buffer: {} bytes", self.stream_buffer_size);
        info!("  Log level: {}", self.log_level);
        info!(
            "  Subscription key: {}",
            if self.subscription_key.is_some() { "set" } else { "not set" }
        );
    }
}

fn default_language() -> String {
    "en-US".to_string()
}

fn default_stream_buffer_size() -> usize {
    DEFAULT_STREAM_BUFFER_SIZE
}

fn default_handshake_header_budget() -> usize {
    DEFAULT_HANDSHAKE_HEADER_BUDGET
}

fn default_log_level() -> String {
    "info".to_string()
}
