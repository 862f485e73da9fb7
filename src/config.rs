//! Application-level configuration loading: input thresholds, sweep cadence, and bot credentials.

use std::{collections::HashSet, env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::{dao::models::OwnerId, state::continuation::DEFAULT_CONTINUATION_THRESHOLD};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "TALE_FORGE_CONFIG_PATH";
const DEFAULT_MERGE_IDLE_MS: u64 = 2_000;
const DEFAULT_WIZARD_IDLE_SECS: u64 = 30 * 60;
const DEFAULT_SIDE_FLOW_IDLE_SECS: u64 = 10 * 60;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 30;
const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Fragment length (UTF-16 units) at which a message is assumed to be split by the platform.
    pub continuation_threshold: usize,
    /// Idle time after which a long-text merge is abandoned.
    pub merge_idle: Duration,
    /// Idle time after which a wizard buffer and its pending question are abandoned.
    pub wizard_idle: Duration,
    /// Idle time after which side flows such as cover uploads expire.
    pub side_flow_idle: Duration,
    /// Minimum time between two sweeps.
    pub sweep_interval: Duration,
    /// Owners allowed to author stories.
    pub admin_ids: HashSet<OwnerId>,
    /// Bot API token; without it outbound messages are only logged.
    pub bot_token: Option<String>,
    /// Base URL of the bot API.
    pub telegram_api_url: String,
    /// Shared secret expected on webhook calls.
    pub webhook_secret: Option<String>,
}

impl AppConfig {
    /// Load the configuration from disk, then apply environment overrides.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let config = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    info!(path = %path.display(), "loaded configuration file");
                    raw.into()
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
        };

        config.with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Some(token) = non_empty_env("TELEGRAM_BOT_TOKEN") {
            self.bot_token = Some(token);
        }
        if let Some(secret) = non_empty_env("TELEGRAM_WEBHOOK_SECRET") {
            self.webhook_secret = Some(secret);
        }
        if let Some(url) = non_empty_env("TELEGRAM_API_URL") {
            self.telegram_api_url = url;
        }
        if let Some(ids) = non_empty_env("ADMIN_IDS") {
            self.admin_ids = parse_admin_ids(&ids);
        }
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    continuation_threshold: usize,
    merge_idle_ms: u64,
    wizard_idle_secs: u64,
    side_flow_idle_secs: u64,
    sweep_interval_secs: u64,
    admin_ids: Vec<OwnerId>,
    telegram_api_url: String,
    webhook_secret: Option<String>,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            continuation_threshold: DEFAULT_CONTINUATION_THRESHOLD,
            merge_idle_ms: DEFAULT_MERGE_IDLE_MS,
            wizard_idle_secs: DEFAULT_WIZARD_IDLE_SECS,
            side_flow_idle_secs: DEFAULT_SIDE_FLOW_IDLE_SECS,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            admin_ids: Vec::new(),
            telegram_api_url: DEFAULT_TELEGRAM_API_URL.to_owned(),
            webhook_secret: None,
        }
    }
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        Self {
            continuation_threshold: value.continuation_threshold,
            merge_idle: Duration::from_millis(value.merge_idle_ms),
            wizard_idle: Duration::from_secs(value.wizard_idle_secs),
            side_flow_idle: Duration::from_secs(value.side_flow_idle_secs),
            sweep_interval: Duration::from_secs(value.sweep_interval_secs),
            admin_ids: value.admin_ids.into_iter().collect(),
            bot_token: None,
            telegram_api_url: value.telegram_api_url,
            webhook_secret: value.webhook_secret,
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

fn non_empty_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

/// Parse a comma-separated list of owner ids, skipping malformed entries.
fn parse_admin_ids(raw: &str) -> HashSet<OwnerId> {
    raw.split(',')
        .filter_map(|part| {
            let part = part.trim();
            match part.parse::<OwnerId>() {
                Ok(id) => Some(id),
                Err(_) if part.is_empty() => None,
                Err(err) => {
                    warn!(entry = part, error = %err, "ignoring malformed admin id");
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults_for_missing_keys() {
        let raw: RawConfig = serde_json::from_str(r#"{ "admin_ids": [42], "merge_idle_ms": 500 }"#)
            .expect("valid config");
        let config: AppConfig = raw.into();

        assert_eq!(config.admin_ids, HashSet::from([42]));
        assert_eq!(config.merge_idle, Duration::from_millis(500));
        assert_eq!(config.continuation_threshold, DEFAULT_CONTINUATION_THRESHOLD);
        assert_eq!(config.sweep_interval, Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS));
    }

    #[test]
    fn admin_ids_parse_skips_garbage() {
        let ids = parse_admin_ids(" 1, 2 ,abc,, 3");
        assert_eq!(ids, HashSet::from([1, 2, 3]));
    }
}
