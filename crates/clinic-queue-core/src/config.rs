//! Runtime configuration.
//!
//! Resolved once at process startup and passed into the core. Nothing in the
//! request path reads environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

pub const ENV_DB_PATH: &str = "CLINIC_DB_PATH";
pub const ENV_STORE_TIMEOUT_MS: &str = "CLINIC_STORE_TIMEOUT_MS";
pub const ENV_TOKEN_RETRIES: &str = "CLINIC_TOKEN_RETRIES";
pub const ENV_TOKEN_BACKOFF_MS: &str = "CLINIC_TOKEN_BACKOFF_MS";
pub const ENV_TOKEN_FALLBACK: &str = "CLINIC_TOKEN_FALLBACK";

const MAX_TOKEN_RETRIES: u32 = 10;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },

    #[error("store timeout must be greater than zero")]
    ZeroTimeout,

    #[error("token retries must be at most 10, got {0}")]
    TooManyRetries(u32),
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug, PartialEq)]
pub struct ClinicConfig {
    db_path: Option<PathBuf>,
    store_timeout: Duration,
    token_retry_attempts: u32,
    token_retry_backoff: Duration,
    token_fallback_enabled: bool,
}

impl Default for ClinicConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            store_timeout: Duration::from_secs(5),
            token_retry_attempts: 2,
            token_retry_backoff: Duration::from_millis(50),
            token_fallback_enabled: true,
        }
    }
}

impl ClinicConfig {
    pub fn new(
        db_path: Option<PathBuf>,
        store_timeout: Duration,
        token_retry_attempts: u32,
        token_retry_backoff: Duration,
        token_fallback_enabled: bool,
    ) -> Result<Self, ConfigError> {
        if store_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if token_retry_attempts > MAX_TOKEN_RETRIES {
            return Err(ConfigError::TooManyRetries(token_retry_attempts));
        }

        Ok(Self {
            db_path,
            store_timeout,
            token_retry_attempts,
            token_retry_backoff,
            token_fallback_enabled,
        })
    }

    /// Resolve from process environment, falling back to defaults for unset keys.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let db_path = lookup(ENV_DB_PATH)
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);
        let store_timeout = parse_millis(&lookup, ENV_STORE_TIMEOUT_MS)?.unwrap_or(defaults.store_timeout);
        let token_retry_attempts =
            parse_value::<u32, _>(&lookup, ENV_TOKEN_RETRIES)?.unwrap_or(defaults.token_retry_attempts);
        let token_retry_backoff =
            parse_millis(&lookup, ENV_TOKEN_BACKOFF_MS)?.unwrap_or(defaults.token_retry_backoff);
        let token_fallback_enabled = match lookup(ENV_TOKEN_FALLBACK) {
            None => defaults.token_fallback_enabled,
            Some(raw) => parse_bool(&raw).ok_or(ConfigError::InvalidValue {
                key: ENV_TOKEN_FALLBACK,
                value: raw,
            })?,
        };

        Self::new(
            db_path,
            store_timeout,
            token_retry_attempts,
            token_retry_backoff,
            token_fallback_enabled,
        )
    }

    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = Some(path.into());
        self
    }

    pub fn with_token_retries(mut self, attempts: u32, backoff: Duration) -> Self {
        self.token_retry_attempts = attempts.min(MAX_TOKEN_RETRIES);
        self.token_retry_backoff = backoff;
        self
    }

    pub fn with_token_fallback(mut self, enabled: bool) -> Self {
        self.token_fallback_enabled = enabled;
        self
    }

    /// `None` means an in-memory store.
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Upper bound on one store round trip waiting for a lock.
    pub fn store_timeout(&self) -> Duration {
        self.store_timeout
    }

    /// Extra attempts on the atomic token path before falling back.
    pub fn token_retry_attempts(&self) -> u32 {
        self.token_retry_attempts
    }

    /// Delay before the first retry; doubles on each further retry.
    pub fn token_retry_backoff(&self) -> Duration {
        self.token_retry_backoff
    }

    pub fn token_fallback_enabled(&self) -> bool {
        self.token_fallback_enabled
    }
}

fn parse_value<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
    }
}

fn parse_millis<F>(lookup: &F, key: &'static str) -> Result<Option<Duration>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    Ok(parse_value::<u64, _>(lookup, key)?.map(Duration::from_millis))
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
