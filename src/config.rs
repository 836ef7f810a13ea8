//! Application-level configuration loading: pause ceiling, retry bounds and sweep cadence.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "DUOPLAY_BACK_CONFIG_PATH";

const DEFAULT_PAUSE_CEILING_SECS: u64 = 30 * 60;
const DEFAULT_PAUSE_SWEEP_INTERVAL_SECS: u64 = 60;
const DEFAULT_TRANSACTION_ATTEMPTS: u32 = 3;
const DEFAULT_ROOM_CODE_ATTEMPTS: u32 = 10;
const DEFAULT_RETRY_BACKOFF_MS: u64 = 50;
const DEFAULT_HUB_CAPACITY: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// How long a session may stay paused before it can no longer be resumed.
    pub pause_ceiling: Duration,
    /// Cadence of the background sweep finalizing stale paused sessions.
    pub pause_sweep_interval: Duration,
    /// Total attempts of a session read-modify-write before giving up.
    pub transaction_attempts: u32,
    /// Room-code generation attempts before accepting an unchecked code.
    pub room_code_attempts: u32,
    /// Base delay between transaction attempts; grows linearly.
    pub retry_backoff: Duration,
    /// Buffered updates per session broadcast channel.
    pub hub_capacity: usize,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        pause_ceiling_secs = app_config.pause_ceiling.as_secs(),
                        transaction_attempts = app_config.transaction_attempts,
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    pause_ceiling_secs: Option<u64>,
    pause_sweep_interval_secs: Option<u64>,
    transaction_attempts: Option<u32>,
    room_code_attempts: Option<u32>,
    retry_backoff_ms: Option<u64>,
    hub_capacity: Option<usize>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        Self {
            pause_ceiling: Duration::from_secs(
                value.pause_ceiling_secs.unwrap_or(DEFAULT_PAUSE_CEILING_SECS),
            ),
            pause_sweep_interval: Duration::from_secs(
                value
                    .pause_sweep_interval_secs
                    .unwrap_or(DEFAULT_PAUSE_SWEEP_INTERVAL_SECS)
                    .max(1),
            ),
            transaction_attempts: value
                .transaction_attempts
                .unwrap_or(DEFAULT_TRANSACTION_ATTEMPTS)
                .max(1),
            room_code_attempts: value
                .room_code_attempts
                .unwrap_or(DEFAULT_ROOM_CODE_ATTEMPTS)
                .max(1),
            retry_backoff: Duration::from_millis(
                value.retry_backoff_ms.unwrap_or(DEFAULT_RETRY_BACKOFF_MS),
            ),
            hub_capacity: value.hub_capacity.unwrap_or(DEFAULT_HUB_CAPACITY).max(1),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_setting() {
        let config = AppConfig::default();
        assert_eq!(config.pause_ceiling, Duration::from_secs(1800));
        assert_eq!(config.transaction_attempts, 3);
        assert_eq!(config.room_code_attempts, 10);
    }

    #[test]
    fn partial_files_keep_remaining_defaults() {
        let raw: RawConfig =
            serde_json::from_str(r#"{ "pause_ceiling_secs": 5, "transaction_attempts": 0 }"#)
                .unwrap();
        let config = AppConfig::from(raw);
        assert_eq!(config.pause_ceiling, Duration::from_secs(5));
        assert_eq!(config.transaction_attempts, 1);
        assert_eq!(config.pause_sweep_interval, Duration::from_secs(60));
    }
}
