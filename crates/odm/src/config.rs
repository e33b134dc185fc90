//! ODM configuration
//!
//! Defaults can be overridden from the environment:
//! `ODM_DATABASE` (database name) and `ODM_CTX_TIMEOUT_MS` (default operation
//! timeout in milliseconds).

use std::env;
use std::time::Duration;

use crate::error::ModelError;

pub const DATABASE_ENV: &str = "ODM_DATABASE";
pub const CTX_TIMEOUT_ENV: &str = "ODM_CTX_TIMEOUT_MS";

pub const DEFAULT_DATABASE: &str = "models";
pub const DEFAULT_CTX_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {field}: '{value}', expected {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },

    #[error("Validation failed for {field}: {reason}")]
    ValidationFailed { field: String, reason: String },
}

impl From<ConfigError> for ModelError {
    fn from(err: ConfigError) -> Self {
        ModelError::Configuration(err.to_string())
    }
}

/// Connection-wide settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OdmConfig {
    /// Logical database the collections belong to
    pub database: String,
    /// Timeout applied to contexts created by the connection
    pub ctx_timeout: Duration,
}

impl OdmConfig {
    pub fn new() -> Self {
        Self {
            database: DEFAULT_DATABASE.to_string(),
            ctx_timeout: DEFAULT_CTX_TIMEOUT,
        }
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn with_ctx_timeout(mut self, timeout: Duration) -> Self {
        self.ctx_timeout = timeout;
        self
    }

    /// Load from the environment, falling back to defaults for unset variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::new();

        if let Ok(database) = env::var(DATABASE_ENV) {
            config.database = database;
        }

        if let Ok(timeout_str) = env::var(CTX_TIMEOUT_ENV) {
            let millis: u64 = timeout_str.parse().map_err(|_| ConfigError::InvalidValue {
                field: "ctx_timeout".to_string(),
                value: timeout_str.clone(),
                expected: "timeout in milliseconds".to_string(),
            })?;
            config.ctx_timeout = Duration::from_millis(millis);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.trim().is_empty() {
            return Err(ConfigError::ValidationFailed {
                field: "database".to_string(),
                reason: "database name cannot be empty".to_string(),
            });
        }

        if self.ctx_timeout.is_zero() {
            return Err(ConfigError::ValidationFailed {
                field: "ctx_timeout".to_string(),
                reason: "timeout must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for OdmConfig {
    fn default() -> Self {
        Self::new()
    }
}
