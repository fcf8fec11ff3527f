//! Configuration for taskbudget.
//!
//! Settings are read from the environment, after loading a `.env` file if
//! one is present.

use secrecy::{ExposeSecret, SecretString};

use crate::error::ConfigError;
use crate::estimation::ErrorPolicy;

const DEFAULT_POOL_SIZE: usize = 10;

/// Main configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Only required by commands that touch the database.
    pub database: Option<DatabaseConfig>,
    pub estimation: EstimationConfig,
    /// User whose budgets `report` loads when none is given.
    pub default_user: Option<String>,
}

/// Database configuration.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: SecretString,
    pub pool_size: usize,
}

impl DatabaseConfig {
    /// Get the database URL (exposes the secret).
    pub fn url(&self) -> &str {
        self.url.expose_secret()
    }
}

/// Estimation configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct EstimationConfig {
    pub policy: ErrorPolicy,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database = match get("DATABASE_URL") {
            Some(url) => Some(DatabaseConfig {
                url: SecretString::from(url),
                pool_size: parse_or(get("DATABASE_POOL_SIZE"), "DATABASE_POOL_SIZE", DEFAULT_POOL_SIZE)?,
            }),
            None => None,
        };

        let policy = parse_or(get("ESTIMATION_POLICY"), "ESTIMATION_POLICY", ErrorPolicy::default())?;

        Ok(Self {
            database,
            estimation: EstimationConfig { policy },
            default_user: get("TASKBUDGET_USER"),
        })
    }

    /// Database settings, or an error naming the missing variable.
    pub fn require_database(&self) -> Result<&DatabaseConfig, ConfigError> {
        self.database
            .as_ref()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_URL".to_string()))
    }
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}
