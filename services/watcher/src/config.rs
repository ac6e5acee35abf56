//! services/watcher/src/config.rs
//!
//! Defines the watcher's process-level configuration and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The
//! `.env` file is used for local development. Everything that changes while
//! the watcher runs (refresh interval, subscription endpoint) lives in the
//! config store instead, not here.

use std::time::Duration;
use tracing::Level;

/// The slot-selection page of the grocery storefront.
const DEFAULT_SLOT_PAGE_URL: &str =
    "https://www.amazon.com/gp/buy/shipoptionselect/handlers/display.html?hasWorkingJavascript=1";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub webdriver_url: String,
    pub slot_page_url: String,
    /// How long to wait after a refresh or an interaction for the page's
    /// asynchronous slot data to finish loading.
    pub settle_delay: Duration,
    pub notify_api_url: String,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for
    /// development, but this is skipped in test environments to ensure tests
    /// are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://slot_watcher.db?mode=rwc".to_string());

        let webdriver_url = std::env::var("WEBDRIVER_URL")
            .unwrap_or_else(|_| "http://localhost:9515".to_string());

        let slot_page_url =
            std::env::var("SLOT_PAGE_URL").unwrap_or_else(|_| DEFAULT_SLOT_PAGE_URL.to_string());

        let settle_delay_str =
            std::env::var("SETTLE_DELAY_SECS").unwrap_or_else(|_| "10".to_string());
        let settle_delay = settle_delay_str
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| {
                ConfigError::InvalidValue("SETTLE_DELAY_SECS".to_string(), e.to_string())
            })?;

        let notify_api_url =
            std::env::var("NOTIFY_API_URL").unwrap_or_else(|_| "https://notify.run".to_string());

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            database_url,
            webdriver_url,
            slot_page_url,
            settle_delay,
            notify_api_url,
            log_level,
        })
    }
}
