//! Server configuration read from `ONBOARDING_*` environment variables.

use std::path::PathBuf;
use std::str::FromStr;

use secrecy::SecretString;

use crate::error::ConfigError;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DB_PATH: &str = "./data/onboarding.db";
const DEFAULT_SESSION_TTL_MINS: i64 = 120;
const MAX_SESSION_TTL_MINS: i64 = 365 * 24 * 60;

/// Runtime configuration for the onboarding server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP listen port.
    pub port: u16,
    /// libSQL database file holding submitted applications.
    pub db_path: PathBuf,
    /// External backend to POST applications to. When unset, applications
    /// are written to the local database instead.
    pub submit_url: Option<String>,
    /// Bearer token for `submit_url`.
    pub submit_token: Option<SecretString>,
    /// Sessions untouched for this long are pruned.
    pub session_ttl: chrono::Duration,
    /// Directory for daily-rolling log files. Logs go to stderr only when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            submit_url: None,
            submit_token: None,
            session_ttl: chrono::Duration::minutes(DEFAULT_SESSION_TTL_MINS),
            log_dir: None,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = parse_or(var("ONBOARDING_PORT"), "ONBOARDING_PORT", defaults.port)?;

        let ttl_mins: i64 = parse_or(
            var("ONBOARDING_SESSION_TTL_MINS"),
            "ONBOARDING_SESSION_TTL_MINS",
            DEFAULT_SESSION_TTL_MINS,
        )?;
        let session_ttl = ttl_from_minutes(ttl_mins).ok_or_else(|| ConfigError::InvalidValue {
            key: "ONBOARDING_SESSION_TTL_MINS".to_string(),
            message: format!("must be between 1 and {MAX_SESSION_TTL_MINS} minutes"),
        })?;

        Ok(Self {
            port,
            db_path: var("ONBOARDING_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            submit_url: var("ONBOARDING_SUBMIT_URL"),
            submit_token: var("ONBOARDING_SUBMIT_TOKEN").map(SecretString::from),
            session_ttl,
            log_dir: var("ONBOARDING_LOG_DIR").map(PathBuf::from),
        })
    }
}

fn ttl_from_minutes(mins: i64) -> Option<chrono::Duration> {
    if !(1..=MAX_SESSION_TTL_MINS).contains(&mins) {
        return None;
    }
    chrono::Duration::try_minutes(mins)
}

fn parse_or<T>(raw: Option<String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(s) => s.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{s:?}: {e}"),
        }),
    }
}
