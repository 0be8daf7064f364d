//! services/discussion_client/src/config.rs
//!
//! Defines the client's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables. The `.env` file is
//! used for local development.

use discussion_core::ports::ConnectOptions;
use std::time::Duration;
use tracing::Level;

/// The fixed namespace that carries discussion traffic on the gateway.
pub const DISCUSSION_NAMESPACE: &str = "/threads";

/// Gateway used when `DISCUSSION_GATEWAY_URL` is unset.
pub const DEFAULT_GATEWAY_URL: &str = "http://localhost:3005";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration for the discussion client.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub gateway_url: String,
    pub log_level: Level,
    pub auth_cookie: Option<String>,
    pub reconnection_attempts: u32,
    pub reconnection_delay: Duration,
    pub reconnection_delay_max: Duration,
    pub connect_timeout: Duration,
    /// Re-announce the current thread after a transparent reconnect.
    pub rejoin_on_reconnect: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            log_level: Level::INFO,
            auth_cookie: None,
            reconnection_attempts: 5,
            reconnection_delay: Duration::from_millis(1000),
            reconnection_delay_max: Duration::from_millis(5000),
            connect_timeout: Duration::from_millis(20000),
            rejoin_on_reconnect: false,
        }
    }
}

impl ClientConfig {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test builds to keep tests hermetic.
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
        let defaults = Self::default();

        let gateway_url = lookup("DISCUSSION_GATEWAY_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.gateway_url);
        let parsed = url::Url::parse(&gateway_url).map_err(|e| {
            ConfigError::InvalidValue("DISCUSSION_GATEWAY_URL".to_string(), e.to_string())
        })?;
        if !matches!(parsed.scheme(), "http" | "https" | "ws" | "wss") {
            return Err(ConfigError::InvalidValue(
                "DISCUSSION_GATEWAY_URL".to_string(),
                format!("unsupported scheme '{}'", parsed.scheme()),
            ));
        }

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let auth_cookie = lookup("DISCUSSION_AUTH_COOKIE").filter(|v| !v.is_empty());

        let reconnection_attempts =
            parse_or(&lookup, "DISCUSSION_RECONNECT_ATTEMPTS", defaults.reconnection_attempts)?;
        let reconnection_delay = parse_millis_or(
            &lookup,
            "DISCUSSION_RECONNECT_DELAY_MS",
            defaults.reconnection_delay,
        )?;
        let reconnection_delay_max = parse_millis_or(
            &lookup,
            "DISCUSSION_RECONNECT_DELAY_MAX_MS",
            defaults.reconnection_delay_max,
        )?;
        if reconnection_delay_max < reconnection_delay {
            return Err(ConfigError::InvalidValue(
                "DISCUSSION_RECONNECT_DELAY_MAX_MS".to_string(),
                "must not be lower than DISCUSSION_RECONNECT_DELAY_MS".to_string(),
            ));
        }
        let connect_timeout =
            parse_millis_or(&lookup, "DISCUSSION_CONNECT_TIMEOUT_MS", defaults.connect_timeout)?;
        let rejoin_on_reconnect = parse_or(
            &lookup,
            "DISCUSSION_REJOIN_ON_RECONNECT",
            defaults.rejoin_on_reconnect,
        )?;

        Ok(Self {
            gateway_url,
            log_level,
            auth_cookie,
            reconnection_attempts,
            reconnection_delay,
            reconnection_delay_max,
            connect_timeout,
            rejoin_on_reconnect,
        })
    }

    /// The transport options for the discussion namespace.
    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            base_url: self.gateway_url.clone(),
            namespace: DISCUSSION_NAMESPACE.to_string(),
            auth_cookie: self.auth_cookie.clone(),
            reconnection: true,
            reconnection_attempts: self.reconnection_attempts,
            reconnection_delay: self.reconnection_delay,
            reconnection_delay_max: self.reconnection_delay_max,
            timeout: self.connect_timeout,
            ..ConnectOptions::default()
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}

fn parse_millis_or<F>(lookup: &F, key: &str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let millis = parse_or(lookup, key, default.as_millis() as u64)?;
    Ok(Duration::from_millis(millis))
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
    fn defaults_when_environment_is_empty() {
        let config = ClientConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.gateway_url, DEFAULT_GATEWAY_URL);
        assert_eq!(config.reconnection_attempts, 5);
        assert_eq!(config.reconnection_delay, Duration::from_millis(1000));
        assert_eq!(config.reconnection_delay_max, Duration::from_millis(5000));
        assert_eq!(config.connect_timeout, Duration::from_millis(20000));
        assert!(!config.rejoin_on_reconnect);
        assert_eq!(config.log_level, Level::INFO);
    }

    #[test]
    fn reads_overrides() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            ("DISCUSSION_GATEWAY_URL", "https://discuss.example.com"),
            ("DISCUSSION_RECONNECT_ATTEMPTS", "9"),
            ("DISCUSSION_CONNECT_TIMEOUT_MS", "2500"),
            ("DISCUSSION_REJOIN_ON_RECONNECT", "true"),
            ("DISCUSSION_AUTH_COOKIE", "session=abc"),
            ("RUST_LOG", "debug"),
        ]))
        .unwrap();
        assert_eq!(config.gateway_url, "https://discuss.example.com");
        assert_eq!(config.reconnection_attempts, 9);
        assert_eq!(config.connect_timeout, Duration::from_millis(2500));
        assert!(config.rejoin_on_reconnect);
        assert_eq!(config.auth_cookie.as_deref(), Some("session=abc"));
        assert_eq!(config.log_level, Level::DEBUG);

        let options = config.connect_options();
        assert_eq!(options.namespace, DISCUSSION_NAMESPACE);
        assert_eq!(options.reconnection_attempts, 9);
    }

    #[test]
    fn rejects_bad_values() {
        let err = ClientConfig::from_lookup(lookup_from(&[("DISCUSSION_RECONNECT_ATTEMPTS", "lots")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(key, _) if key == "DISCUSSION_RECONNECT_ATTEMPTS"));

        let err = ClientConfig::from_lookup(lookup_from(&[("DISCUSSION_GATEWAY_URL", "ftp://x")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(key, _) if key == "DISCUSSION_GATEWAY_URL"));

        let err = ClientConfig::from_lookup(lookup_from(&[
            ("DISCUSSION_RECONNECT_DELAY_MS", "6000"),
            ("DISCUSSION_RECONNECT_DELAY_MAX_MS", "5000"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_, _)));
    }
}
