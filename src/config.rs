//! Application configuration management
//!
//! This module handles loading and validating configuration from environment variables.
//! All configuration is loaded at startup and validated before the application runs.

use std::env;
use std::sync::LazyLock;
use std::time::Duration;

use crate::constants::{
    DEFAULT_DATABASE_MAX_CONNECTIONS, DEFAULT_EVALUATION_TIMEOUT_MS, DEFAULT_KEY_EXPIRY_SECS,
    DEFAULT_OUTBOX_BATCH_SIZE, DEFAULT_OUTBOX_STREAM, DEFAULT_OUTBOX_SWEEP_INTERVAL_SECS,
    DEFAULT_SERVER_HOST, DEFAULT_SERVER_PORT, DEFAULT_WORKFLOW_CACHE_CAP,
};

/// Global application configuration (lazily initialized)
pub static CONFIG: LazyLock<Config> = LazyLock::new(|| {
    Config::from_env().expect("Failed to load configuration from environment")
});

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub evaluation: EvaluationConfig,
    pub cache: CacheConfig,
    pub outbox: OutboxConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub rust_log: String,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Redis configuration
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
}

/// Rule-evaluation configuration
#[derive(Debug, Clone)]
pub struct EvaluationConfig {
    /// Per-rule evaluation timeout
    pub rule_timeout: Duration,
    /// Cap on the compiled-workflow cache
    pub workflow_cache_cap: usize,
}

/// Promotion-cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Expiry applied to warmed keys
    pub default_key_expiry_secs: u64,
}

/// Outbox sweeper configuration
#[derive(Debug, Clone)]
pub struct OutboxConfig {
    pub sweep_interval: Duration,
    pub batch_size: i64,
    pub stream: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            server: ServerConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
            redis: RedisConfig::from_env()?,
            evaluation: EvaluationConfig::from_env()?,
            cache: CacheConfig::from_env()?,
            outbox: OutboxConfig::from_env()?,
        })
    }
}

impl ServerConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| DEFAULT_SERVER_HOST.to_string()),
            port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| DEFAULT_SERVER_PORT.to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".to_string()))?,
            rust_log: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

impl DatabaseConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::Missing("DATABASE_URL".to_string()))?,
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| DEFAULT_DATABASE_MAX_CONNECTIONS.to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DATABASE_MAX_CONNECTIONS".to_string()))?,
        })
    }
}

impl RedisConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            url: env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string()),
        })
    }
}

impl EvaluationConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let timeout_ms: u64 = env::var("EVALUATION_TIMEOUT_MS")
            .unwrap_or_else(|_| DEFAULT_EVALUATION_TIMEOUT_MS.to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("EVALUATION_TIMEOUT_MS".to_string()))?;

        Ok(Self {
            rule_timeout: Duration::from_millis(timeout_ms),
            workflow_cache_cap: env::var("WORKFLOW_CACHE_CAP")
                .unwrap_or_else(|_| DEFAULT_WORKFLOW_CACHE_CAP.to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("WORKFLOW_CACHE_CAP".to_string()))?,
        })
    }
}

impl CacheConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            default_key_expiry_secs: env::var("DEFAULT_KEY_EXPIRY_SECS")
                .unwrap_or_else(|_| DEFAULT_KEY_EXPIRY_SECS.to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DEFAULT_KEY_EXPIRY_SECS".to_string()))?,
        })
    }
}

impl OutboxConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let interval_secs: u64 = env::var("OUTBOX_SWEEP_INTERVAL_SECS")
            .unwrap_or_else(|_| DEFAULT_OUTBOX_SWEEP_INTERVAL_SECS.to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("OUTBOX_SWEEP_INTERVAL_SECS".to_string()))?;

        Ok(Self {
            sweep_interval: Duration::from_secs(interval_secs),
            batch_size: env::var("OUTBOX_BATCH_SIZE")
                .unwrap_or_else(|_| DEFAULT_OUTBOX_BATCH_SIZE.to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("OUTBOX_BATCH_SIZE".to_string()))?,
            stream: env::var("OUTBOX_STREAM").unwrap_or_else(|_| DEFAULT_OUTBOX_STREAM.to_string()),
        })
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(String),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        // Test that defaults are applied when env vars are not set
        let server = ServerConfig {
            host: DEFAULT_SERVER_HOST.to_string(),
            port: DEFAULT_SERVER_PORT,
            rust_log: "info".to_string(),
        };
        assert_eq!(server.host, "0.0.0.0");
        assert_eq!(server.port, 8080);
    }
}
