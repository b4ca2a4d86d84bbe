use std::{env, fmt::Display, str::FromStr, time::Duration};

use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Runtime settings, read from the environment after `.env` is loaded
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Hosted Postgres holding `global.notifications`. Without it the server
    /// serves the built-in sample list.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub host: String,
    pub port: u16,
    /// How many successive ports to try when the configured one is taken
    pub port_attempts: u16,
    pub fetch_timeout: Duration,
    /// Registered screens with no subscribers and no activity for this long
    /// are torn down
    pub screen_idle_ttl: Duration,
    pub screen_sweep_interval: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());
        let fetch_timeout_ms: u64 = try_load(&lookup, "FETCH_TIMEOUT_MS", "5000")?;
        let screen_idle_ttl_secs: u64 = try_load(&lookup, "SCREEN_IDLE_TTL_SECS", "1800")?;
        let screen_sweep_interval_secs: u64 =
            try_load(&lookup, "SCREEN_SWEEP_INTERVAL_SECS", "60")?;

        Ok(Self {
            database_url,
            database_max_connections: try_load(&lookup, "DATABASE_MAX_CONNECTIONS", "5")?,
            host: try_load(&lookup, "HOST", "127.0.0.1")?,
            port: try_load(&lookup, "PORT", "9500")?,
            port_attempts: try_load(&lookup, "PORT_ATTEMPTS", "5")?,
            fetch_timeout: Duration::from_millis(fetch_timeout_ms),
            screen_idle_ttl: Duration::from_secs(screen_idle_ttl_secs),
            // tokio intervals panic on a zero period
            screen_sweep_interval: Duration::from_secs(screen_sweep_interval_secs.max(1)),
        })
    }
}

fn try_load<F, T>(lookup: &F, key: &str, default: &str) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    let raw = lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        reason: e.to_string(),
    })
}
