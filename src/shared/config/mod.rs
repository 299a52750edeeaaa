//! Application configuration module
//!
//! Provides the `SyncConfig` type and its builder. Configuration is normally
//! read from the process environment (see [`SyncConfig::from_env`]); tests
//! build it explicitly through [`SyncConfigBuilder`].
//!
//! # Environment Variables
//!
//! | variable | default |
//! |---|---|
//! | `DATABASE_URL` | unset (in-memory store) |
//! | `SERVER_PORT` | `3000` |
//! | `JWT_SECRET` | required in release builds |
//! | `SYNC_RETENTION_DAYS` | `7` (at most 36500) |
//! | `SYNC_PRUNE_INTERVAL_SECS` | `3600` |
//! | `SYNC_SWEEP_INTERVAL_SECS` | `3600` |
//! | `SYNC_CATCHUP_LIMIT` | `1000` |

use std::time::Duration;
use thiserror::Error;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_RETENTION_DAYS: u64 = 7;
const MAX_RETENTION_DAYS: u64 = 36_500;
const SECS_PER_DAY: u64 = 24 * 60 * 60;
const DEFAULT_PRUNE_INTERVAL_SECS: u64 = 3600;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3600;
const DEFAULT_CATCHUP_LIMIT: i64 = 1000;

#[cfg(debug_assertions)]
const DEV_JWT_SECRET: &str = "classroom-sync-dev-secret-change-me";

/// Sync service configuration
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// PostgreSQL URL; `None` runs against the in-memory store
    pub database_url: Option<String>,
    /// Port the HTTP server binds on
    pub port: u16,
    /// HMAC secret for bearer tokens
    pub jwt_secret: String,
    /// How long change records are kept
    pub retention: Duration,
    /// How often the retention job runs
    pub prune_interval: Duration,
    /// How often dead connections are swept from the registry
    pub sweep_interval: Duration,
    /// Upper bound on rows returned by one catch-up query
    pub catch_up_limit: i64,
}

impl SyncConfig {
    /// Create a new SyncConfigBuilder
    pub fn builder() -> SyncConfigBuilder {
        SyncConfigBuilder::default()
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<SyncConfig, ConfigError> {
        let mut builder = SyncConfig::builder();

        if let Some(url) = env_var("DATABASE_URL") {
            builder = builder.database_url(url);
        }
        if let Some(port) = env_parse::<u16>("SERVER_PORT")? {
            builder = builder.port(port);
        }
        if let Some(secret) = env_var("JWT_SECRET") {
            builder = builder.jwt_secret(secret);
        }
        if let Some(days) = env_parse::<u64>("SYNC_RETENTION_DAYS")? {
            let secs = days
                .checked_mul(SECS_PER_DAY)
                .ok_or_else(|| ConfigError::InvalidValue {
                    name: "SYNC_RETENTION_DAYS",
                    message: format!("{} days is out of range", days),
                })?;
            builder = builder.retention(Duration::from_secs(secs));
        }
        if let Some(secs) = env_parse::<u64>("SYNC_PRUNE_INTERVAL_SECS")? {
            builder = builder.prune_interval(Duration::from_secs(secs));
        }
        if let Some(secs) = env_parse::<u64>("SYNC_SWEEP_INTERVAL_SECS")? {
            builder = builder.sweep_interval(Duration::from_secs(secs));
        }
        if let Some(limit) = env_parse::<i64>("SYNC_CATCHUP_LIMIT")? {
            builder = builder.catch_up_limit(limit);
        }

        builder.build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.is_empty() {
            return Err(ConfigError::MissingValue("JWT_SECRET"));
        }
        if self.retention > Duration::from_secs(MAX_RETENTION_DAYS * SECS_PER_DAY) {
            return Err(ConfigError::InvalidValue {
                name: "SYNC_RETENTION_DAYS",
                message: format!("must be at most {} days", MAX_RETENTION_DAYS),
            });
        }
        if self.prune_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "SYNC_PRUNE_INTERVAL_SECS",
                message: "must be greater than zero".to_string(),
            });
        }
        if self.sweep_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "SYNC_SWEEP_INTERVAL_SECS",
                message: "must be greater than zero".to_string(),
            });
        }
        if self.catch_up_limit <= 0 {
            return Err(ConfigError::InvalidValue {
                name: "SYNC_CATCHUP_LIMIT",
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Builder for SyncConfig
#[derive(Debug, Default)]
pub struct SyncConfigBuilder {
    database_url: Option<String>,
    port: Option<u16>,
    jwt_secret: Option<String>,
    retention: Option<Duration>,
    prune_interval: Option<Duration>,
    sweep_interval: Option<Duration>,
    catch_up_limit: Option<i64>,
}

impl SyncConfigBuilder {
    /// Set the database URL
    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn jwt_secret(mut self, secret: impl Into<String>) -> Self {
        self.jwt_secret = Some(secret.into());
        self
    }

    pub fn retention(mut self, retention: Duration) -> Self {
        self.retention = Some(retention);
        self
    }

    pub fn prune_interval(mut self, interval: Duration) -> Self {
        self.prune_interval = Some(interval);
        self
    }

    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = Some(interval);
        self
    }

    pub fn catch_up_limit(mut self, limit: i64) -> Self {
        self.catch_up_limit = Some(limit);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<SyncConfig, ConfigError> {
        let jwt_secret = match self.jwt_secret {
            Some(secret) => secret,
            None => default_jwt_secret()?,
        };

        let config = SyncConfig {
            database_url: self.database_url,
            port: self.port.unwrap_or(DEFAULT_PORT),
            jwt_secret,
            retention: self
                .retention
                .unwrap_or(Duration::from_secs(DEFAULT_RETENTION_DAYS * SECS_PER_DAY)),
            prune_interval: self
                .prune_interval
                .unwrap_or(Duration::from_secs(DEFAULT_PRUNE_INTERVAL_SECS)),
            sweep_interval: self
                .sweep_interval
                .unwrap_or(Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS)),
            catch_up_limit: self.catch_up_limit.unwrap_or(DEFAULT_CATCHUP_LIMIT),
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(debug_assertions)]
fn default_jwt_secret() -> Result<String, ConfigError> {
    tracing::warn!("[Config] JWT_SECRET not set, using the development secret");
    Ok(DEV_JWT_SECRET.to_string())
}

#[cfg(not(debug_assertions))]
fn default_jwt_secret() -> Result<String, ConfigError> {
    Err(ConfigError::MissingValue("JWT_SECRET"))
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env_var(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                name,
                message: format!("cannot parse '{}'", raw),
            }),
        None => Ok(None),
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: &'static str, message: String },
    #[error("missing value: {0}")]
    MissingValue(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_builder_defaults() {
        let config = SyncConfig::builder().jwt_secret("s3cret").build().unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.retention, Duration::from_secs(7 * 24 * 60 * 60));
        assert_eq!(config.prune_interval, Duration::from_secs(3600));
        assert_eq!(config.catch_up_limit, 1000);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let result = SyncConfig::builder()
            .jwt_secret("s3cret")
            .sweep_interval(Duration::ZERO)
            .build();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { name: "SYNC_SWEEP_INTERVAL_SECS", .. })
        ));

        let result = SyncConfig::builder().jwt_secret("s3cret").catch_up_limit(0).build();
        assert!(result.is_err());

        let result = SyncConfig::builder().jwt_secret("").build();
        assert!(matches!(result, Err(ConfigError::MissingValue("JWT_SECRET"))));
    }

    #[test]
    #[serial]
    fn test_from_env() {
        std::env::set_var("JWT_SECRET", "env-secret");
        std::env::set_var("SERVER_PORT", "8081");
        std::env::set_var("SYNC_RETENTION_DAYS", "2");
        let config = SyncConfig::from_env().unwrap();
        assert_eq!(config.jwt_secret, "env-secret");
        assert_eq!(config.port, 8081);
        assert_eq!(config.retention, Duration::from_secs(2 * 24 * 60 * 60));
        std::env::remove_var("JWT_SECRET");
        std::env::remove_var("SERVER_PORT");
        std::env::remove_var("SYNC_RETENTION_DAYS");
    }

    #[test]
    fn test_validate_bounds_retention() {
        let longest = Duration::from_secs(MAX_RETENTION_DAYS * SECS_PER_DAY);
        assert!(SyncConfig::builder().jwt_secret("s3cret").retention(longest).build().is_ok());

        let result = SyncConfig::builder()
            .jwt_secret("s3cret")
            .retention(longest + Duration::from_secs(1))
            .build();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { name: "SYNC_RETENTION_DAYS", .. })
        ));
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_overflowing_retention() {
        std::env::set_var("JWT_SECRET", "env-secret");
        for days in [u64::MAX.to_string(), "100000".to_string()] {
            std::env::set_var("SYNC_RETENTION_DAYS", &days);
            let result = SyncConfig::from_env();
            assert!(
                matches!(result, Err(ConfigError::InvalidValue { name: "SYNC_RETENTION_DAYS", .. })),
                "{} days",
                days
            );
        }
        std::env::remove_var("JWT_SECRET");
        std::env::remove_var("SYNC_RETENTION_DAYS");
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_garbage() {
        std::env::set_var("JWT_SECRET", "env-secret");
        std::env::set_var("SYNC_CATCHUP_LIMIT", "lots");
        let result = SyncConfig::from_env();
        assert!(matches!(result, Err(ConfigError::InvalidValue { name: "SYNC_CATCHUP_LIMIT", .. })));
        std::env::remove_var("JWT_SECRET");
        std::env::remove_var("SYNC_CATCHUP_LIMIT");
    }
}
