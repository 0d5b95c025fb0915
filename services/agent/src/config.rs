//! services/agent/src/config.rs
//!
//! Defines the agent's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// Postgres URL. When unset the agent runs on a non-durable in-memory store.
    pub database_url: Option<String>,
    pub log_level: Level,
    pub scan_interval: Duration,
    pub delivery_timeout: Duration,
    pub reconcile_settle: Duration,
    pub jitter_tolerance: Duration,
    pub webhook_url: Option<String>,
    pub wake_buffer: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 3000)),
            database_url: None,
            log_level: Level::INFO,
            scan_interval: Duration::from_secs(60),
            delivery_timeout: Duration::from_secs(10),
            reconcile_settle: Duration::from_millis(250),
            jitter_tolerance: Duration::from_secs(30),
            webhook_url: None,
            wake_buffer: 32,
        }
    }
}

/// Reads `name` and parses it, falling back to `default` when unset.
fn parse_var<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        let defaults = Config::default();

        // --- Load Server and Database Settings ---
        let bind_address = parse_var("BIND_ADDRESS", defaults.bind_address)?;
        let database_url = non_empty_var("DATABASE_URL");

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Scheduler Settings ---
        let scan_interval_secs = parse_var("SCAN_INTERVAL_SECS", defaults.scan_interval.as_secs())?;
        if scan_interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "SCAN_INTERVAL_SECS".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        let delivery_timeout_secs =
            parse_var("DELIVERY_TIMEOUT_SECS", defaults.delivery_timeout.as_secs())?;
        let reconcile_settle_ms = parse_var(
            "RECONCILE_SETTLE_MS",
            defaults.reconcile_settle.as_millis() as u64,
        )?;
        let jitter_tolerance_secs =
            parse_var("JITTER_TOLERANCE_SECS", defaults.jitter_tolerance.as_secs())?;
        let wake_buffer = parse_var("WAKE_BUFFER", defaults.wake_buffer)?.max(1);

        // --- Load Delivery Settings ---
        let webhook_url = non_empty_var("WEBHOOK_URL");

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            scan_interval: Duration::from_secs(scan_interval_secs),
            delivery_timeout: Duration::from_secs(delivery_timeout_secs),
            reconcile_settle: Duration::from_millis(reconcile_settle_ms),
            jitter_tolerance: Duration::from_secs(jitter_tolerance_secs),
            webhook_url,
            wake_buffer,
        })
    }

    /// The jitter tolerance as the calculator expects it.
    pub fn calculator(&self) -> reminder_core::Calculator {
        let tolerance = chrono::Duration::from_std(self.jitter_tolerance).unwrap_or_else(|_| {
            chrono::Duration::seconds(reminder_core::schedule::DEFAULT_JITTER_TOLERANCE_SECS)
        });
        reminder_core::Calculator::new(tolerance)
    }
}
