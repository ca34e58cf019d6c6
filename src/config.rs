//! Runtime configuration: database location and ease policy.
//!
//! Values come from defaults, then `SPEAKWELL_DB` / `SPEAKWELL_EASE_POLICY`,
//! then command-line flags.

use crate::models::EasePolicy;
use std::path::PathBuf;
use thiserror::Error;

pub const DB_PATH_VAR: &str = "SPEAKWELL_DB";
pub const EASE_POLICY_VAR: &str = "SPEAKWELL_EASE_POLICY";
pub const DEFAULT_DB_PATH: &str = "db.sqlite3";

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidValue { var: &'static str, reason: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub db_path: PathBuf,
    pub ease_policy: EasePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            ease_policy: EasePolicy::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any variable source. Empty values are ignored.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(path) = get(DB_PATH_VAR) {
            config.db_path = PathBuf::from(path);
        }
        if let Some(policy) = get(EASE_POLICY_VAR) {
            config.ease_policy = policy
                .parse()
                .map_err(|reason| ConfigError::InvalidValue {
                    var: EASE_POLICY_VAR,
                    reason,
                })?;
        }

        Ok(config)
    }

    pub fn with_overrides(mut self, db_path: Option<PathBuf>, ease_policy: Option<EasePolicy>) -> Self {
        if let Some(path) = db_path {
            self.db_path = path;
        }
        if let Some(policy) = ease_policy {
            self.ease_policy = policy;
        }
        self
    }
}
