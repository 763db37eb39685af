use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{
    DEFAULT_BASE_URL, DEFAULT_INTER_SYMBOL_DELAY_MS, DEFAULT_MIN_REQUEST_INTERVAL_MS, DEFAULT_PORT,
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SYNC_HOUR_UTC, DEFAULT_SYNC_MINUTE_UTC, DEMO_API_KEY,
};
use crate::error::{AppError, Result};
use crate::utils::{env_or, get_api_key, get_database_path};

/// How much history the provider returns per request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSize {
    /// Latest 100 data points
    Compact,
    /// Full history (20+ years)
    Full,
}

impl OutputSize {
    /// Query parameter value
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputSize::Compact => "compact",
            OutputSize::Full => "full",
        }
    }

    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> std::result::Result<Self, String> {
        match s.trim().to_lowercase().as_str() {
            "compact" => Ok(OutputSize::Compact),
            "full" => Ok(OutputSize::Full),
            _ => Err(format!("Invalid output size: {}. Valid options: compact, full", s)),
        }
    }
}

/// Configuration for the sync job
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// SQLite database file
    pub database_path: PathBuf,

    /// Alpha Vantage API key
    pub api_key: String,

    /// Alpha Vantage query endpoint
    pub base_url: String,

    /// Per-request HTTP timeout
    pub request_timeout: Duration,

    /// History depth requested per symbol
    pub output_size: OutputSize,

    /// Throttle MIN_INTERVAL between two provider calls
    pub min_request_interval: Duration,

    /// Courtesy pause between two symbols of a sweep
    pub inter_symbol_delay: Duration,

    /// Daily sweep fire time (UTC)
    pub sync_hour_utc: u32,
    pub sync_minute_utc: u32,

    /// Operator HTTP port for `serve`
    pub port: u16,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("stocksync.db"),
            api_key: DEMO_API_KEY.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            output_size: OutputSize::Full,
            min_request_interval: Duration::from_millis(DEFAULT_MIN_REQUEST_INTERVAL_MS),
            inter_symbol_delay: Duration::from_millis(DEFAULT_INTER_SYMBOL_DELAY_MS),
            sync_hour_utc: DEFAULT_SYNC_HOUR_UTC,
            sync_minute_utc: DEFAULT_SYNC_MINUTE_UTC,
            port: DEFAULT_PORT,
        }
    }
}

impl SyncConfig {
    /// Resolve configuration from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        let output_size = match std::env::var("ALPHA_VANTAGE_OUTPUT_SIZE") {
            Ok(raw) => OutputSize::from_str(&raw).map_err(AppError::Config)?,
            Err(_) => OutputSize::Full,
        };

        let config = Self {
            database_path: get_database_path(),
            api_key: get_api_key(),
            base_url: std::env::var("ALPHA_VANTAGE_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            request_timeout: Duration::from_secs(
                env_or("ALPHA_VANTAGE_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)
                    .map_err(AppError::Config)?,
            ),
            output_size,
            min_request_interval: Duration::from_millis(
                env_or("SYNC_MIN_REQUEST_INTERVAL_MS", DEFAULT_MIN_REQUEST_INTERVAL_MS)
                    .map_err(AppError::Config)?,
            ),
            inter_symbol_delay: Duration::from_millis(
                env_or("SYNC_INTER_SYMBOL_DELAY_MS", DEFAULT_INTER_SYMBOL_DELAY_MS)
                    .map_err(AppError::Config)?,
            ),
            sync_hour_utc: env_or("SYNC_DAILY_HOUR_UTC", DEFAULT_SYNC_HOUR_UTC)
                .map_err(AppError::Config)?,
            sync_minute_utc: env_or("SYNC_DAILY_MINUTE_UTC", DEFAULT_SYNC_MINUTE_UTC)
                .map_err(AppError::Config)?,
            port: env_or("PORT", DEFAULT_PORT).map_err(AppError::Config)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the sync job cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.sync_hour_utc >= 24 {
            return Err(AppError::Config(format!(
                "daily sync hour must be 0-23, got {}",
                self.sync_hour_utc
            )));
        }
        if self.sync_minute_utc >= 60 {
            return Err(AppError::Config(format!(
                "daily sync minute must be 0-59, got {}",
                self.sync_minute_utc
            )));
        }
        if self.min_request_interval.is_zero() {
            return Err(AppError::Config(
                "minimum request interval must be greater than zero".to_string(),
            ));
        }
        if self.inter_symbol_delay <= self.min_request_interval {
            return Err(AppError::Config(format!(
                "inter-symbol delay ({:?}) must be larger than the request interval ({:?})",
                self.inter_symbol_delay, self.min_request_interval
            )));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(AppError::Config(format!(
                "Invalid base_url: must start with http:// or https://, got: '{}'",
                self.base_url
            )));
        }
        Ok(())
    }

    pub fn uses_demo_key(&self) -> bool {
        self.api_key == DEMO_API_KEY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SyncConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sync_hour_utc, 14);
        assert_eq!(config.sync_minute_utc, 30);
        assert!(config.uses_demo_key());
    }

    #[test]
    fn test_courtesy_delay_must_exceed_throttle() {
        let config = SyncConfig {
            min_request_interval: Duration::from_millis(500),
            inter_symbol_delay: Duration::from_millis(500),
            ..SyncConfig::default()
        };
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_invalid_fire_time() {
        let config = SyncConfig {
            sync_hour_utc: 24,
            ..SyncConfig::default()
        };
        assert!(config.validate().is_err());

        let config = SyncConfig {
            sync_minute_utc: 60,
            ..SyncConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_output_size_parse() {
        assert_eq!(OutputSize::from_str("FULL").unwrap(), OutputSize::Full);
        assert_eq!(OutputSize::from_str(" compact ").unwrap(), OutputSize::Compact);
        assert!(OutputSize::from_str("everything").is_err());
    }
}
