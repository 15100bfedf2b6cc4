//! Wolfelect Configuration
//!
//! This module provides configuration structures for the wolfelect
//! leader elector.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main wolfelect configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectorConfig {
    /// Consul connection configuration
    pub consul: ConsulConfig,

    /// Session configuration
    pub session: SessionConfig,

    /// Session-creation retry configuration
    #[serde(default)]
    pub retry: RetryConfig,

    /// Polling configuration
    #[serde(default)]
    pub poll: PollConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Consul connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsulConfig {
    /// Base URL of the Consul agent, e.g. "http://127.0.0.1:8500"
    pub url: String,

    /// Basic auth username (optional)
    #[serde(default)]
    pub username: Option<String>,

    /// Basic auth password (optional)
    #[serde(default)]
    pub password: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Name of the role being contested; also names the Consul session
    pub service_name: String,

    /// Session TTL in seconds (Consul enforces a 10s minimum)
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,

    /// Lock delay in seconds
    #[serde(default)]
    pub lock_delay_secs: u64,

    /// Keep acting (or start acting) as leader when Consul is unreachable
    #[serde(default = "default_true")]
    pub allow_island_mode: bool,
}

/// Session-creation retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of session-creation attempts
    #[serde(default = "default_max_tries")]
    pub max_tries: u32,

    /// Base retry period in seconds
    #[serde(default = "default_base_period")]
    pub base_period_secs: f64,

    /// Backoff multiplier applied per attempt
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

/// Polling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Delay before the first poll in seconds
    #[serde(default = "default_poll_initial_delay")]
    pub initial_delay_secs: u64,

    /// Interval between polls in seconds
    #[serde(default = "default_poll_interval")]
    pub interval_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_request_timeout() -> u64 {
    10
}

fn default_ttl() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_max_tries() -> u32 {
    5
}

fn default_base_period() -> f64 {
    2.0
}

fn default_backoff_multiplier() -> f64 {
    1.5
}

fn default_poll_initial_delay() -> u64 {
    1
}

fn default_poll_interval() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_tries: default_max_tries(),
            base_period_secs: default_base_period(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_delay_secs: default_poll_initial_delay(),
            interval_secs: default_poll_interval(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl ElectorConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_str(content: &str) -> crate::Result<Self> {
        let config: ElectorConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.consul.url.is_empty() {
            return Err(crate::Error::Config("consul.url cannot be empty".into()));
        }

        if self.session.service_name.is_empty() {
            return Err(crate::Error::Config(
                "session.service_name cannot be empty".into(),
            ));
        }

        if self.retry.max_tries == 0 {
            return Err(crate::Error::Config(
                "retry.max_tries must be at least 1".into(),
            ));
        }

        if self.retry.base_period_secs < 0.0 || !self.retry.base_period_secs.is_finite() {
            return Err(crate::Error::Config(
                "retry.base_period_secs must be a non-negative number".into(),
            ));
        }

        if self.retry.backoff_multiplier < 0.0 || !self.retry.backoff_multiplier.is_finite() {
            return Err(crate::Error::Config(
                "retry.backoff_multiplier must be a non-negative number".into(),
            ));
        }

        if self.consul.username.is_some() != self.consul.password.is_some() {
            return Err(crate::Error::Config(
                "consul.username and consul.password must be set together".into(),
            ));
        }

        Ok(())
    }

    /// Get the per-request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.consul.request_timeout_secs)
    }

    /// Get the poll initial delay as Duration
    pub fn poll_initial_delay(&self) -> Duration {
        Duration::from_secs(self.poll.initial_delay_secs)
    }

    /// Get the poll interval as Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll.interval_secs)
    }
}
