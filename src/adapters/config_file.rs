//! JSON config file adapter.
//!
//! Implements [`ConfigPort`] over a flat JSON object on disk. Loading
//! never aborts start-up: a missing, unreadable or invalid file falls back
//! to [`SystemConfig::default()`] with a warning (see [`load_or_default`]).
//! Credentials may also come from the environment, which wins over the
//! file.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::SystemConfig;

/// Environment variables that override the file's credentials.
pub const ENV_USERNAME: &str = "ADAFRUIT_IO_USERNAME";
pub const ENV_KEY: &str = "ADAFRUIT_IO_KEY";

pub struct JsonConfigFile {
    path: PathBuf,
}

impl JsonConfigFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ConfigPort for JsonConfigFile {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        let text = fs::read_to_string(&self.path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ConfigError::NotFound,
            kind => ConfigError::IoError(kind),
        })?;
        let config: SystemConfig =
            serde_json::from_str(&text).map_err(|e| ConfigError::Corrupted(e.to_string()))?;
        validate_config(&config)?;
        info!("Config: loaded {}", self.path.display());
        Ok(config)
    }
}

/// Load through `port`, falling back to defaults on any error.
pub fn load_or_default(port: &impl ConfigPort) -> SystemConfig {
    match port.load() {
        Ok(config) => config,
        Err(ConfigError::NotFound) => {
            warn!("Config: file not found, using defaults");
            SystemConfig::default()
        }
        Err(e) => {
            warn!("Config: {}, using defaults", e);
            SystemConfig::default()
        }
    }
}

/// Replace credentials with any non-empty value `lookup` returns.
pub fn apply_env_overrides(config: &mut SystemConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(user) = lookup(ENV_USERNAME).filter(|v| !v.trim().is_empty()) {
        config.username = user;
    }
    if let Some(key) = lookup(ENV_KEY).filter(|v| !v.trim().is_empty()) {
        config.key = key;
    }
}

/// Range checks. Credentials are not checked here; a controller refuses
/// to build without them.
pub fn validate_config(cfg: &SystemConfig) -> Result<(), ConfigError> {
    let intervals = [
        cfg.security_check_interval,
        cfg.security_send_interval,
        cfg.env_interval,
        cfg.flushing_interval,
        cfg.error_backoff,
    ];
    if intervals.contains(&0) {
        return Err(ConfigError::ValidationFailed(
            "intervals must be at least 1 second",
        ));
    }
    if cfg.security_check_interval > cfg.env_interval {
        return Err(ConfigError::ValidationFailed(
            "security_check_interval must be <= env_interval",
        ));
    }
    if cfg.security_check_interval > cfg.security_send_interval {
        return Err(ConfigError::ValidationFailed(
            "security_check_interval must be <= security_send_interval",
        ));
    }
    if cfg.env_read_attempts == 0 {
        return Err(ConfigError::ValidationFailed(
            "env_read_attempts must be at least 1",
        ));
    }
    if cfg.lcd_cols == 0 || cfg.lcd_rows == 0 {
        return Err(ConfigError::ValidationFailed(
            "LCD_COLS and LCD_ROWS must be non-zero",
        ));
    }
    if cfg.mqtt_port == 0 {
        return Err(ConfigError::ValidationFailed("MQTT_PORT must be non-zero"));
    }
    if cfg.buzzer_freq == 0 {
        return Err(ConfigError::ValidationFailed("BUZZER_FREQ must be non-zero"));
    }
    Ok(())
}
