//! Runtime configuration.
//!
//! Resolved once at startup and handed to [`crate::ClinicCore`]; nothing
//! reads the environment while serving calls.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::repository::DEFAULT_CASCADE_ATTEMPTS;
use crate::session::{Credentials, DEFAULT_LOGIN_EMAIL, DEFAULT_LOGIN_PASSWORD};
use crate::store::{DocumentStore, MemoryStore, SqliteStore, StoreResult};

/// SQLite database file. Unset means an in-memory store.
pub const ENV_DB_PATH: &str = "CLINIC_DB_PATH";
pub const ENV_LOGIN_EMAIL: &str = "CLINIC_LOGIN_EMAIL";
pub const ENV_LOGIN_PASSWORD: &str = "CLINIC_LOGIN_PASSWORD";
pub const ENV_CASCADE_ATTEMPTS: &str = "CLINIC_CASCADE_ATTEMPTS";

/// Cap on cascade-delete attempts.
const MAX_CASCADE_ATTEMPTS: u32 = 10;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?}")]
    InvalidValue { var: String, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration for one clinic instance.
#[derive(Debug, Clone)]
pub struct ClinicConfig {
    database_path: Option<PathBuf>,
    credentials: Credentials,
    cascade_attempts: u32,
}

impl Default for ClinicConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            credentials: Credentials::default(),
            cascade_attempts: DEFAULT_CASCADE_ATTEMPTS,
        }
    }
}

impl ClinicConfig {
    pub fn new(
        database_path: Option<PathBuf>,
        credentials: Credentials,
        cascade_attempts: u32,
    ) -> Result<Self, ConfigError> {
        if credentials.email().trim().is_empty() {
            return Err(ConfigError::Invalid("login email cannot be empty".into()));
        }
        if !(1..=MAX_CASCADE_ATTEMPTS).contains(&cascade_attempts) {
            return Err(ConfigError::Invalid(format!(
                "cascade attempts must be between 1 and {}",
                MAX_CASCADE_ATTEMPTS
            )));
        }

        Ok(Self {
            database_path,
            credentials,
            cascade_attempts,
        })
    }

    /// Build from process environment, loading a `.env` file first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_path = lookup(ENV_DB_PATH)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        let email = lookup(ENV_LOGIN_EMAIL).unwrap_or_else(|| DEFAULT_LOGIN_EMAIL.into());
        let password =
            lookup(ENV_LOGIN_PASSWORD).unwrap_or_else(|| DEFAULT_LOGIN_PASSWORD.into());

        let cascade_attempts = match lookup(ENV_CASCADE_ATTEMPTS) {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                var: ENV_CASCADE_ATTEMPTS.into(),
                value: raw.clone(),
            })?,
            None => DEFAULT_CASCADE_ATTEMPTS,
        };

        Self::new(
            database_path,
            Credentials::new(email, password),
            cascade_attempts,
        )
    }

    pub fn database_path(&self) -> Option<&Path> {
        self.database_path.as_deref()
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn cascade_attempts(&self) -> u32 {
        self.cascade_attempts
    }

    /// Open the configured store.
    pub fn open_store(&self) -> StoreResult<Box<dyn DocumentStore>> {
        match &self.database_path {
            Some(path) => Ok(Box::new(SqliteStore::open(path)?)),
            None => Ok(Box::new(MemoryStore::new())),
        }
    }
}
