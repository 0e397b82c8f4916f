//! services/bot/src/config.rs
//!
//! Defines the bot's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// What to do with a reminder whose time already passed when it gets armed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PastDuePolicy {
    /// Never deliver it.
    #[default]
    Drop,
    /// Deliver it once, right away.
    FireImmediately,
}

impl FromStr for PastDuePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drop" => Ok(Self::Drop),
            "fire" | "fire_immediately" => Ok(Self::FireImmediately),
            other => Err(format!("'{}' is not one of: drop, fire", other)),
        }
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bot_token: String,
    pub data_path: PathBuf,
    pub log_level: Level,
    pub telegram_api_url: String,
    pub poll_timeout: Duration,
    pub past_due_policy: PastDuePolicy,
    pub prune_past_reminders: bool,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Credentials ---
        let bot_token = lookup("TELEGRAM_BOT_TOKEN")
            .or_else(|| lookup("API_TOKEN"))
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingVar("TELEGRAM_BOT_TOKEN".to_string()))?;

        // --- Storage and Logging ---
        let data_path = lookup("DATA_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("userdata.json"));

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Transport Settings ---
        let telegram_api_url = lookup("TELEGRAM_API_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| "https://api.telegram.org".to_string());

        let poll_timeout = match lookup("POLL_TIMEOUT_SECS") {
            Some(raw) => raw.trim().parse::<u64>().map(Duration::from_secs).map_err(|e| {
                ConfigError::InvalidValue("POLL_TIMEOUT_SECS".to_string(), e.to_string())
            })?,
            None => Duration::from_secs(60),
        };

        // --- Reminder Settings ---
        let past_due_policy = match lookup("PAST_DUE_REMINDERS") {
            Some(raw) => raw
                .parse::<PastDuePolicy>()
                .map_err(|e| ConfigError::InvalidValue("PAST_DUE_REMINDERS".to_string(), e))?,
            None => PastDuePolicy::default(),
        };

        let prune_past_reminders = match lookup("PRUNE_PAST_REMINDERS") {
            Some(raw) => raw.trim().parse::<bool>().map_err(|e| {
                ConfigError::InvalidValue("PRUNE_PAST_REMINDERS".to_string(), e.to_string())
            })?,
            None => true,
        };

        Ok(Self {
            bot_token,
            data_path,
            log_level,
            telegram_api_url,
            poll_timeout,
            past_due_policy,
            prune_past_reminders,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_token_is_fatal() {
        let err = Config::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(var) if var == "TELEGRAM_BOT_TOKEN"));
    }

    #[test]
    fn blank_token_counts_as_missing() {
        let err = Config::from_lookup(lookup_from(&[("TELEGRAM_BOT_TOKEN", "  ")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(_)));
    }

    #[test]
    fn defaults_apply() {
        let config = Config::from_lookup(lookup_from(&[("API_TOKEN", "abc")])).unwrap();
        assert_eq!(config.bot_token, "abc");
        assert_eq!(config.data_path, PathBuf::from("userdata.json"));
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.telegram_api_url, "https://api.telegram.org");
        assert_eq!(config.poll_timeout, Duration::from_secs(60));
        assert_eq!(config.past_due_policy, PastDuePolicy::Drop);
        assert!(config.prune_past_reminders);
    }

    #[test]
    fn overrides_are_read() {
        let config = Config::from_lookup(lookup_from(&[
            ("TELEGRAM_BOT_TOKEN", "t"),
            ("DATA_PATH", "/var/lib/bot/state.json"),
            ("RUST_LOG", "debug"),
            ("TELEGRAM_API_URL", "http://localhost:8081/"),
            ("POLL_TIMEOUT_SECS", "5"),
            ("PAST_DUE_REMINDERS", "fire"),
            ("PRUNE_PAST_REMINDERS", "false"),
        ]))
        .unwrap();
        assert_eq!(config.data_path, PathBuf::from("/var/lib/bot/state.json"));
        assert_eq!(config.log_level, Level::DEBUG);
        assert_eq!(config.telegram_api_url, "http://localhost:8081");
        assert_eq!(config.poll_timeout, Duration::from_secs(5));
        assert_eq!(config.past_due_policy, PastDuePolicy::FireImmediately);
        assert!(!config.prune_past_reminders);
    }

    #[test]
    fn invalid_values_are_reported() {
        let err = Config::from_lookup(lookup_from(&[
            ("TELEGRAM_BOT_TOKEN", "t"),
            ("PAST_DUE_REMINDERS", "later"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(var, _) if var == "PAST_DUE_REMINDERS"));

        let err = Config::from_lookup(lookup_from(&[
            ("TELEGRAM_BOT_TOKEN", "t"),
            ("POLL_TIMEOUT_SECS", "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(var, _) if var == "POLL_TIMEOUT_SECS"));
    }
}
