//! Environment-driven configuration.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::http::HttpSettings;
use crate::retry::RetryPolicy;
use crate::sync::SyncSettings;

const WEEK_DELAY_MIN_MS: u64 = 100;
const WEEK_DELAY_MAX_MS: u64 = 250;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub http: HttpSettings,
    pub retry: RetryPolicy,
    pub sync: SyncSettings,
    pub cleanup_interval: Duration,
    pub team_aliases_path: Option<PathBuf>,
    pub poll_interval_seconds: u64,
    /// If true, run one score sync and exit (no polling loop)
    pub run_once: bool,
    pub full_sync_on_start: bool,
    pub run_deadline: Duration,
    pub health_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Database URL, or its parts with the password from a Docker secret
        let database_url = match lookup("DATABASE_URL") {
            Some(v) if !v.trim().is_empty() => v,
            Some(_) => return Err(anyhow!("DATABASE_URL is set but empty")),
            None => {
                let db_user = lookup("DB_USER").unwrap_or_else(|| "pickem".to_string());
                let db_name = lookup("DB_NAME").unwrap_or_else(|| "pickem".to_string());
                let db_host = lookup("DB_HOST").unwrap_or_else(|| "postgres".to_string());
                let db_port = lookup("DB_PORT").unwrap_or_else(|| "5432".to_string());
                let db_password = match lookup("DB_PASSWORD") {
                    Some(v) => v,
                    None => read_secret_file("/run/secrets/db_password", "db_password")?,
                };
                format!(
                    "postgresql://{}:{}@{}:{}/{}",
                    db_user, db_password, db_host, db_port, db_name
                )
            }
        };

        let defaults = HttpSettings::default();
        let base_url = match lookup("ESPN_BASE_URL") {
            Some(v) if !v.trim().is_empty() => v.trim().to_string(),
            Some(_) => return Err(anyhow!("ESPN_BASE_URL is set but empty")),
            None => defaults.base_url.clone(),
        };

        let http = HttpSettings {
            base_url,
            timeout: Duration::from_secs(parse_or(&lookup, "HTTP_TIMEOUT_SECONDS", 15)?),
            max_idle_per_host: parse_or(&lookup, "HTTP_MAX_IDLE_PER_HOST", defaults.max_idle_per_host)?,
            max_concurrent: parse_or(&lookup, "HTTP_MAX_CONCURRENT", defaults.max_concurrent)?,
            requests_per_minute: parse_or(&lookup, "REQUESTS_PER_MINUTE", defaults.requests_per_minute)?,
            ..defaults
        };

        let retry = RetryPolicy::new(
            parse_or(&lookup, "RETRY_MAX_ATTEMPTS", 3)?,
            Duration::from_millis(parse_or(&lookup, "RETRY_BASE_DELAY_MS", 1000)?),
        );

        let week_delay_ms: u64 = parse_or(&lookup, "WEEK_DELAY_MS", 150)?;
        let sync = SyncSettings {
            week_delay: Duration::from_millis(week_delay_ms.clamp(WEEK_DELAY_MIN_MS, WEEK_DELAY_MAX_MS)),
            include_preseason: parse_bool(&lookup, "INCLUDE_PRESEASON", true),
        };

        Ok(Self {
            database_url,
            http,
            retry,
            sync,
            cleanup_interval: Duration::from_secs(parse_or(&lookup, "CLEANUP_INTERVAL_SECONDS", 600)?),
            team_aliases_path: lookup("TEAM_ALIASES_PATH")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            poll_interval_seconds: parse_or(&lookup, "POLL_INTERVAL_SECONDS", 300)?,
            run_once: parse_bool(&lookup, "RUN_ONCE", false),
            full_sync_on_start: parse_bool(&lookup, "FULL_SYNC_ON_START", false),
            run_deadline: Duration::from_secs(parse_or(&lookup, "RUN_DEADLINE_SECONDS", 900)?),
            health_port: parse_or(&lookup, "HEALTH_PORT", 8084)?,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(v) if !v.trim().is_empty() => v
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value '{}'", key, v)),
        _ => Ok(default),
    }
}

fn parse_bool<F>(lookup: &F, key: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_lowercase() == "true")
        .unwrap_or(default)
}

/// Read a secret from Docker secret file - REQUIRED, NO fallbacks
fn read_secret_file(file_path: &str, secret_name: &str) -> Result<String> {
    std::fs::read_to_string(file_path)
        .map(|s| s.trim().to_string())
        .context(format!(
            "CRITICAL: Secret file not found at {} ({}). Set DATABASE_URL or mount secrets.",
            file_path, secret_name
        ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://localhost/pickem")])).unwrap();
        assert_eq!(config.http.timeout, Duration::from_secs(15));
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.base_delay, Duration::from_secs(1));
        assert_eq!(config.sync.week_delay, Duration::from_millis(150));
        assert_eq!(config.cleanup_interval, Duration::from_secs(600));
        assert!(!config.run_once);
        assert!(config.team_aliases_path.is_none());
    }

    #[test]
    fn week_delay_is_clamped() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/pickem"),
            ("WEEK_DELAY_MS", "5000"),
        ]))
        .unwrap();
        assert_eq!(config.sync.week_delay, Duration::from_millis(250));
    }

    #[test]
    fn builds_database_url_from_parts() {
        let config = Config::from_lookup(lookup(&[
            ("DB_USER", "app"),
            ("DB_PASSWORD", "secret"),
            ("DB_HOST", "db"),
            ("DB_NAME", "nfl"),
        ]))
        .unwrap();
        assert_eq!(config.database_url, "postgresql://app:secret@db:5432/nfl");
    }

    #[test]
    fn rejects_empty_and_invalid_values() {
        assert!(Config::from_lookup(lookup(&[("DATABASE_URL", " ")])).is_err());
        assert!(Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/pickem"),
            ("HEALTH_PORT", "not-a-port"),
        ]))
        .is_err());
    }
}
