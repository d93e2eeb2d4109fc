use crate::core::models::{DataPath, validate_api_url};
use crate::core::poller::TransientErrorPolicy;
use serde::{Deserialize, Serialize};
use std::io;
use std::time::Duration;

/// Settings stored in `config.toml` under the data directory
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub progress: ProgressConfig,
    #[serde(default)]
    pub realtime: RealtimeConfig,
    #[serde(default = "default_version")]
    pub version: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            polling: PollingConfig::default(),
            progress: ProgressConfig::default(),
            realtime: RealtimeConfig::default(),
            version: default_version(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub user_id: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: String::new(),
            user_id: String::new(),
        }
    }
}

impl AppConfig {
    /// The rules `ConfigService::set_value` enforces, applied to a loaded file.
    pub fn validate(&self) -> io::Result<()> {
        validate_api_url(&self.api.base_url)?;
        check_minimum("polling.interval_ms", self.polling.interval_ms, MIN_POLL_INTERVAL_MS)?;
        check_minimum("polling.max_duration_ms", self.polling.max_duration_ms, 1)?;
        check_minimum("progress.average_time_ms", self.progress.average_time_ms, 1)?;
        check_target_percentage("progress.target_percentage", self.progress.target_percentage)?;
        check_minimum("progress.frame_interval_ms", self.progress.frame_interval_ms, 1)?;
        check_minimum("realtime.reconnect_delay_ms", self.realtime.reconnect_delay_ms, 1)?;
        Ok(())
    }
}

impl ApiConfig {
    pub fn api_base_url(&self) -> String {
        format!("{}/api", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PollingConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_max_duration_ms")]
    pub max_duration_ms: u64,
    #[serde(default)]
    pub transient_errors: TransientErrorPolicy,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_duration_ms: default_max_duration_ms(),
            transient_errors: TransientErrorPolicy::default(),
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn max_duration(&self) -> Duration {
        Duration::from_millis(self.max_duration_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressConfig {
    #[serde(default = "default_average_time_ms")]
    pub average_time_ms: u64,
    #[serde(default = "default_target_percentage")]
    pub target_percentage: f64,
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            average_time_ms: default_average_time_ms(),
            target_percentage: default_target_percentage(),
            frame_interval_ms: default_frame_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RealtimeConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            reconnect_delay_ms: default_reconnect_delay_ms(),
        }
    }
}

/// Anything faster hammers the backend.
pub const MIN_POLL_INTERVAL_MS: u64 = 50;

fn default_version() -> u32 {
    1
}
fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}
fn default_interval_ms() -> u64 {
    2_000
}
fn default_max_duration_ms() -> u64 {
    300_000
}
fn default_average_time_ms() -> u64 {
    30_000
}
fn default_target_percentage() -> f64 {
    95.0
}
fn default_frame_interval_ms() -> u64 {
    16
}
fn default_reconnect_delay_ms() -> u64 {
    1_000
}
fn default_true() -> bool {
    true
}

pub const CONFIG_KEYS: &[&str] = &[
    "api.base_url",
    "api.token",
    "api.user_id",
    "polling.interval_ms",
    "polling.max_duration_ms",
    "polling.transient_errors",
    "progress.average_time_ms",
    "progress.target_percentage",
    "progress.frame_interval_ms",
    "realtime.enabled",
    "realtime.reconnect_delay_ms",
];

pub struct ConfigService;

impl ConfigService {
    /// Missing file yields defaults; a malformed file is an `InvalidData` error.
    pub fn load_config(data_path: &DataPath) -> io::Result<AppConfig> {
        let config_path = data_path.config_path();
        if !config_path.exists() {
            log::debug!("No config at {}, using defaults", config_path.display());
            return Ok(AppConfig::default());
        }

        let content = std::fs::read_to_string(&config_path)?;
        let config: AppConfig = toml::from_str(&content).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Invalid config format in {}: {e}", config_path.display()),
            )
        })?;
        config.validate().map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Invalid config value in {}: {e}", config_path.display()),
            )
        })?;
        Ok(config)
    }

    pub fn save_config(config: &AppConfig, data_path: &DataPath) -> io::Result<()> {
        let config_path = data_path.config_path();
        let toml_content = toml::to_string_pretty(config).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Failed to serialize config: {e}"),
            )
        })?;

        std::fs::create_dir_all(&data_path.root)?;
        std::fs::write(&config_path, toml_content)?;
        log::info!("Saved configuration to {}", config_path.display());
        Ok(())
    }

    /// Read a dotted key. The token is masked.
    pub fn get_value(config: &AppConfig, key: &str) -> io::Result<String> {
        let value = match key {
            "api.base_url" => config.api.base_url.clone(),
            "api.token" => mask_secret(&config.api.token),
            "api.user_id" => config.api.user_id.clone(),
            "polling.interval_ms" => config.polling.interval_ms.to_string(),
            "polling.max_duration_ms" => config.polling.max_duration_ms.to_string(),
            "polling.transient_errors" => config.polling.transient_errors.to_string(),
            "progress.average_time_ms" => config.progress.average_time_ms.to_string(),
            "progress.target_percentage" => config.progress.target_percentage.to_string(),
            "progress.frame_interval_ms" => config.progress.frame_interval_ms.to_string(),
            "realtime.enabled" => config.realtime.enabled.to_string(),
            "realtime.reconnect_delay_ms" => config.realtime.reconnect_delay_ms.to_string(),
            _ => return Err(unknown_key(key)),
        };
        Ok(value)
    }

    pub fn set_value(config: &mut AppConfig, key: &str, value: &str) -> io::Result<()> {
        let value = value.trim();
        match key {
            "api.base_url" => {
                validate_api_url(value)?;
                config.api.base_url = value.trim_end_matches('/').to_string();
            }
            "api.token" => config.api.token = value.to_string(),
            "api.user_id" => config.api.user_id = value.to_string(),
            "polling.interval_ms" => config.polling.interval_ms = parse_millis(key, value, MIN_POLL_INTERVAL_MS)?,
            "polling.max_duration_ms" => {
                config.polling.max_duration_ms = parse_millis(key, value, 1)?
            }
            "polling.transient_errors" => {
                config.polling.transient_errors = value
                    .parse()
                    .map_err(|e: String| io::Error::new(io::ErrorKind::InvalidInput, e))?
            }
            "progress.average_time_ms" => {
                config.progress.average_time_ms = parse_millis(key, value, 1)?
            }
            "progress.target_percentage" => {
                let target: f64 = value.parse().map_err(|_| {
                    io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("{key} must be a number"),
                    )
                })?;
                check_target_percentage(key, target)?;
                config.progress.target_percentage = target;
            }
            "progress.frame_interval_ms" => {
                config.progress.frame_interval_ms = parse_millis(key, value, 1)?
            }
            "realtime.enabled" => {
                config.realtime.enabled = value.parse().map_err(|_| {
                    io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("{key} must be true or false"),
                    )
                })?
            }
            "realtime.reconnect_delay_ms" => {
                config.realtime.reconnect_delay_ms = parse_millis(key, value, 1)?
            }
            _ => return Err(unknown_key(key)),
        }
        Ok(())
    }
}

fn parse_millis(key: &str, value: &str, minimum: u64) -> io::Result<u64> {
    let parsed: u64 = value.parse().map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{key} must be a whole number of milliseconds"),
        )
    })?;
    check_minimum(key, parsed, minimum)?;
    Ok(parsed)
}

fn check_minimum(key: &str, value: u64, minimum: u64) -> io::Result<()> {
    if value < minimum {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{key} must be at least {minimum}"),
        ));
    }
    Ok(())
}

fn check_target_percentage(key: &str, target: f64) -> io::Result<()> {
    if !(target > 0.0 && target <= 100.0) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{key} must be in (0, 100]"),
        ));
    }
    Ok(())
}

fn unknown_key(key: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("Unknown key: {key} (known keys: {})", CONFIG_KEYS.join(", ")),
    )
}

fn mask_secret(secret: &str) -> String {
    if secret.is_empty() {
        return String::new();
    }
    let visible: String = secret.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
    format!("****{visible}")
}
