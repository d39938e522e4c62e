use std::{env, time::Duration};

use secrecy::SecretString;
use thiserror::Error;
use tracing::warn;

const DEFAULT_DATABASE_URL: &str = "sqlite://tasker.sqlite?mode=rwc";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 4000;
const DEFAULT_JWT_SECRET: &str = "caist_secret";
const DEFAULT_JWT_EXPIRES_IN: &str = "7d";
const DEFAULT_LOGIN_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_LOGIN_LOCKOUT_SECS: u64 = 180;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid duration '{0}': expected <n>[s|m|h|d]")]
    InvalidDuration(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginThrottleConfig {
    /// Consecutive failures that trigger a lockout.
    pub max_attempts: u32,
    pub lockout: Duration,
}

impl Default for LoginThrottleConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_LOGIN_MAX_ATTEMPTS,
            lockout: Duration::from_secs(DEFAULT_LOGIN_LOCKOUT_SECS),
        }
    }
}

#[derive(Debug)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: SecretString,
    pub jwt_expires_in: Duration,
    pub login: LoginThrottleConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            jwt_secret: SecretString::from(DEFAULT_JWT_SECRET.to_string()),
            jwt_expires_in: Duration::from_secs(7 * 24 * 60 * 60),
            login: LoginThrottleConfig::default(),
        }
    }
}

impl Config {
    /// Reads the process environment. Invalid values are logged and replaced
    /// by their defaults.
    pub fn from_env() -> Self {
        Self::from_env_with(|name| env::var(name).ok())
    }

    pub fn from_env_with<F>(get_env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let database_url =
            read_env_string("DATABASE_URL", &get_env).unwrap_or(defaults.database_url);
        let host = read_env_string("HOST", &get_env).unwrap_or(defaults.host);
        let port = match read_env_string("BACKEND_PORT", &get_env) {
            Some(_) => read_env_parsed("BACKEND_PORT", defaults.port, &get_env),
            None => read_env_parsed("PORT", defaults.port, &get_env),
        };

        let jwt_secret = match read_env_string("JWT_SECRET", &get_env) {
            Some(secret) => SecretString::from(secret),
            None => {
                warn!("JWT_SECRET is not set; using the built-in development secret");
                defaults.jwt_secret
            }
        };

        let jwt_expires_in = match read_env_string("JWT_EXPIRES_IN", &get_env) {
            Some(raw) => match parse_duration(&raw) {
                Ok(duration) => duration,
                Err(err) => {
                    warn!("{err}. Using default {DEFAULT_JWT_EXPIRES_IN}.");
                    defaults.jwt_expires_in
                }
            },
            None => defaults.jwt_expires_in,
        };

        let max_attempts =
            read_env_parsed("LOGIN_MAX_ATTEMPTS", defaults.login.max_attempts, &get_env).max(1);
        let lockout_secs =
            read_env_parsed("LOGIN_LOCKOUT_SECS", DEFAULT_LOGIN_LOCKOUT_SECS, &get_env);

        Self {
            database_url,
            host,
            port,
            jwt_secret,
            jwt_expires_in,
            login: LoginThrottleConfig {
                max_attempts,
                lockout: Duration::from_secs(lockout_secs),
            },
        }
    }
}

/// Parses `<n>[s|m|h|d]` or a bare number of seconds.
pub fn parse_duration(raw: &str) -> Result<Duration, ConfigError> {
    let trimmed = raw.trim();
    let invalid = || ConfigError::InvalidDuration(trimmed.to_string());
    let (digits, unit_secs) = match trimmed.char_indices().last() {
        Some((idx, 's')) => (&trimmed[..idx], 1),
        Some((idx, 'm')) => (&trimmed[..idx], 60),
        Some((idx, 'h')) => (&trimmed[..idx], 60 * 60),
        Some((idx, 'd')) => (&trimmed[..idx], 24 * 60 * 60),
        Some(_) => (trimmed, 1),
        None => return Err(invalid()),
    };
    let value: u64 = digits.trim().parse().map_err(|_| invalid())?;
    if value == 0 {
        return Err(invalid());
    }
    value
        .checked_mul(unit_secs)
        .map(Duration::from_secs)
        .ok_or_else(invalid)
}

fn read_env_string<F>(name: &str, get_env: &F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    let value = get_env(name)?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        warn!("{name} is set but empty; using default");
        return None;
    }
    Some(trimmed.to_string())
}

fn read_env_parsed<T, F>(name: &str, default: T, get_env: &F) -> T
where
    T: std::str::FromStr + std::fmt::Display + Copy,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match read_env_string(name, get_env) {
        Some(value) => match value.parse::<T>() {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!("Invalid {name}='{value}': {err}. Using default {default}.");
                default
            }
        },
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_are_used_without_env() {
        let cfg = Config::from_env_with(|_| None);
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert_eq!(cfg.host, DEFAULT_HOST);
        assert_eq!(cfg.jwt_secret.expose_secret(), DEFAULT_JWT_SECRET);
        assert_eq!(cfg.jwt_expires_in, Duration::from_secs(7 * 24 * 3600));
        assert_eq!(cfg.login.max_attempts, 3);
        assert_eq!(cfg.login.lockout, Duration::from_secs(180));
    }

    #[test]
    fn env_overrides_are_applied() {
        let cfg = Config::from_env_with(env_from(&[
            ("PORT", "5001"),
            ("JWT_SECRET", "s3cret"),
            ("JWT_EXPIRES_IN", "12h"),
            ("LOGIN_MAX_ATTEMPTS", "5"),
            ("LOGIN_LOCKOUT_SECS", "60"),
            ("DATABASE_URL", "sqlite::memory:"),
        ]));
        assert_eq!(cfg.port, 5001);
        assert_eq!(cfg.jwt_secret.expose_secret(), "s3cret");
        assert_eq!(cfg.jwt_expires_in, Duration::from_secs(12 * 3600));
        assert_eq!(cfg.login.max_attempts, 5);
        assert_eq!(cfg.login.lockout, Duration::from_secs(60));
        assert_eq!(cfg.database_url, "sqlite::memory:");
    }

    #[test]
    fn backend_port_wins_over_port() {
        let cfg = Config::from_env_with(env_from(&[("PORT", "5001"), ("BACKEND_PORT", "6001")]));
        assert_eq!(cfg.port, 6001);
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let cfg = Config::from_env_with(env_from(&[
            ("PORT", "not-a-port"),
            ("JWT_EXPIRES_IN", "soon"),
            ("LOGIN_MAX_ATTEMPTS", "0"),
        ]));
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert_eq!(cfg.jwt_expires_in, Duration::from_secs(7 * 24 * 3600));
        assert_eq!(cfg.login.max_attempts, 1);
    }

    #[test]
    fn duration_units_are_parsed() {
        assert_eq!(parse_duration("45s").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_duration("30m").unwrap(), Duration::from_secs(1800));
        assert_eq!(parse_duration("7d").unwrap(), Duration::from_secs(604_800));
        assert_eq!(parse_duration("90").unwrap(), Duration::from_secs(90));
        assert!(parse_duration("").is_err());
        assert!(parse_duration("0h").is_err());
        assert!(parse_duration("1w").is_err());
    }
}
